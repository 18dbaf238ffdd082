//! Listing controller behaviour against a scripted endpoint.

mod common;

use std::future::IntoFuture;

use futures_util::poll;
use tokio::sync::{mpsc, watch};

use common::{page, server_error, FakeEndpoint};
use freelify_jobs::api::job::{SortOrder, WorkLocation};
use freelify_jobs::listing::{
    FetchMode, FetchOutcome, Filter, ListingController, QueryState, ScrollFeed,
};

fn ids(controller: &ListingController) -> Vec<String> {
    controller
        .snapshot()
        .items()
        .iter()
        .map(|job| job.id.clone())
        .collect()
}

/// Controller with the first page (12 of `total`) already loaded
async fn loaded(endpoint: &std::sync::Arc<FakeEndpoint>, total: u64) -> ListingController {
    let controller = ListingController::new(endpoint.clone(), 12);
    endpoint.reply(Ok(page(0..12, total)));
    assert!(controller.refresh().await.is_loaded());
    controller
}

#[tokio::test]
async fn filter_change_clears_list_before_response_arrives() {
    let endpoint = FakeEndpoint::new();
    let controller = loaded(&endpoint, 30).await;
    endpoint.reply(Ok(page(12..24, 30)));
    assert!(controller.load_next_page().await.is_loaded());
    assert_eq!(controller.snapshot().page(), 2);

    let fetch = controller.set_filter(Filter::Search("logo".into()));
    let state = controller.snapshot();
    assert_eq!(state.page(), 1);
    assert!(state.items().is_empty());
    assert!(state.is_loading());
    assert!(!state.is_loading_more());
    assert_eq!(fetch.mode(), Some(FetchMode::Reset));

    endpoint.reply(Ok(page(100..105, 5)));
    assert!(fetch.await.is_loaded());
    assert_eq!(endpoint.last_call().search.as_deref(), Some("logo"));
    assert_eq!(endpoint.last_call().page, 1);
    assert_eq!(controller.snapshot().items().len(), 5);
    assert!(!controller.snapshot().has_more());
}

#[tokio::test]
async fn sort_change_clears_list_and_rewinds() {
    let endpoint = FakeEndpoint::new();
    let controller = loaded(&endpoint, 30).await;
    endpoint.reply(Ok(page(12..24, 30)));
    controller.load_next_page().await;

    let fetch = controller.set_sort_order(SortOrder::Ascending);
    let state = controller.snapshot();
    assert_eq!(state.page(), 1);
    assert!(state.items().is_empty());
    assert!(state.is_loading());

    endpoint.reply(Ok(page(0..12, 30)));
    fetch.await;
    let request = endpoint.last_call();
    assert_eq!(request.sort, SortOrder::Ascending);
    assert_eq!(request.page, 1);
}

#[tokio::test]
async fn second_load_while_one_is_pending_is_skipped() {
    let endpoint = FakeEndpoint::new();
    let controller = loaded(&endpoint, 30).await;

    let gate = endpoint.gate();
    let first = controller.load_next_page();
    let second = controller.load_next_page();
    assert!(!first.is_skipped());
    assert!(second.is_skipped());
    assert!(matches!(second.await, FetchOutcome::Skipped));

    gate.send(Ok(page(12..24, 30))).unwrap();
    assert!(first.await.is_loaded());

    // the initial refresh plus exactly one append
    assert_eq!(endpoint.call_count(), 2);
    assert_eq!(endpoint.last_call().page, 2);
}

#[tokio::test]
async fn appends_extend_without_reordering() {
    let endpoint = FakeEndpoint::new();
    let controller = loaded(&endpoint, 30).await;
    let first_page = ids(&controller);

    endpoint.reply(Ok(page(12..24, 30)));
    controller.load_next_page().await;
    let after_second = ids(&controller);
    assert_eq!(after_second.len(), 24);
    assert_eq!(&after_second[..12], &first_page[..]);

    endpoint.reply(Ok(page(24..30, 30)));
    controller.load_next_page().await;
    let after_third = ids(&controller);
    assert_eq!(after_third.len(), 30);
    assert_eq!(&after_third[..24], &after_second[..]);
}

#[tokio::test]
async fn has_more_tracks_remaining_records() {
    let endpoint = FakeEndpoint::new();
    let controller = loaded(&endpoint, 30).await;
    assert!(controller.snapshot().has_more());
    assert_eq!(controller.snapshot().total_count(), 30);

    endpoint.reply(Ok(page(12..24, 30)));
    controller.load_next_page().await;
    assert!(controller.snapshot().has_more());

    endpoint.reply(Ok(page(24..30, 30)));
    controller.load_next_page().await;
    assert!(!controller.snapshot().has_more());

    let calls = endpoint.call_count();
    assert!(controller.load_next_page().is_skipped());
    assert_eq!(endpoint.call_count(), calls);
}

#[tokio::test]
async fn failed_append_keeps_loaded_records() {
    let endpoint = FakeEndpoint::new();
    let controller = loaded(&endpoint, 30).await;

    endpoint.reply(Err(server_error()));
    let outcome = controller.load_next_page().await;
    assert!(matches!(
        outcome,
        FetchOutcome::Failed {
            mode: FetchMode::Append,
            ..
        }
    ));

    let state = controller.snapshot();
    assert_eq!(state.items().len(), 12);
    assert!(!state.is_loading_more());
    assert!(state.has_more());
    assert_eq!(state.page(), 1);
    let failure = state.last_failure().unwrap();
    assert_eq!(failure.message(), "Could not load more jobs");

    // retry asks for the page that failed
    endpoint.reply(Ok(page(12..24, 30)));
    assert!(controller.load_next_page().await.is_loaded());
    assert_eq!(endpoint.last_call().page, 2);
    assert!(controller.snapshot().last_failure().is_none());
    assert_eq!(controller.snapshot().items().len(), 24);
}

#[tokio::test]
async fn failed_reset_empties_list_until_refresh() {
    let endpoint = FakeEndpoint::new();
    let controller = loaded(&endpoint, 30).await;

    endpoint.reply(Err(server_error()));
    let outcome = controller
        .set_filter(Filter::Location(Some(WorkLocation::Hybrid)))
        .await;
    assert!(outcome.is_failed());

    let state = controller.snapshot();
    assert!(state.items().is_empty());
    assert!(!state.is_loading());
    assert!(!state.has_more());
    assert_eq!(state.last_failure().unwrap().message(), "Could not load jobs");

    let calls = endpoint.call_count();
    assert!(controller.load_next_page().is_skipped());
    assert_eq!(endpoint.call_count(), calls);

    endpoint.reply(Ok(page(0..4, 4)));
    assert!(controller.refresh().await.is_loaded());
    assert_eq!(controller.snapshot().items().len(), 4);
    assert_eq!(endpoint.last_call().location, Some(WorkLocation::Hybrid));
}

#[tokio::test]
async fn cleared_category_is_not_sent() {
    let endpoint = FakeEndpoint::new();
    let controller = ListingController::new(endpoint.clone(), 12);

    endpoint.reply(Ok(page(0..3, 3)));
    controller.set_filter(Filter::category("Design")).await;
    assert_eq!(endpoint.last_call().category.as_deref(), Some("Design"));

    endpoint.reply(Ok(page(0..3, 3)));
    controller.set_filter(Filter::category("")).await;
    let request = endpoint.last_call();
    assert!(request.category.is_none());
    let query = serde_json::to_value(&request).unwrap();
    assert!(query.get("category").is_none());
}

#[tokio::test]
async fn clear_filters_keeps_sort_order() {
    let endpoint = FakeEndpoint::new();
    let query = QueryState::default()
        .with_filter(Filter::Search("react".into()))
        .with_sort(SortOrder::Ascending);
    let controller = ListingController::with_query(endpoint.clone(), query);

    endpoint.reply(Ok(page(0..2, 2)));
    controller.refresh().await;
    assert_eq!(endpoint.last_call().search.as_deref(), Some("react"));

    endpoint.reply(Ok(page(0..12, 40)));
    controller.clear_filters().await;
    let request = endpoint.last_call();
    assert!(request.search.is_none());
    assert_eq!(request.sort, SortOrder::Ascending);
    assert!(!controller.snapshot().query().has_filters());
}

#[tokio::test]
async fn pages_through_filtered_results_to_the_end() {
    let endpoint = FakeEndpoint::new();
    let controller = ListingController::new(endpoint.clone(), 12);

    endpoint.reply(Ok(page(0..12, 25)));
    controller.set_filter(Filter::Search("logo".into())).await;
    assert_eq!(controller.snapshot().items().len(), 12);
    assert!(controller.snapshot().has_more());

    endpoint.reply(Ok(page(12..24, 25)));
    controller.load_next_page().await;
    assert_eq!(controller.snapshot().items().len(), 24);
    assert!(controller.snapshot().has_more());

    endpoint.reply(Ok(page(24..25, 25)));
    controller.load_next_page().await;
    let state = controller.snapshot();
    assert_eq!(state.items().len(), 25);
    assert!(!state.has_more());
    assert_eq!(state.page(), 3);

    assert!(controller.load_next_page().is_skipped());
    let pages: Vec<u32> = endpoint.calls().iter().map(|call| call.page).collect();
    assert_eq!(pages, vec![1, 2, 3]);
    assert!(endpoint
        .calls()
        .iter()
        .all(|call| call.search.as_deref() == Some("logo")));
}

#[tokio::test]
async fn stale_reset_response_is_discarded() {
    let endpoint = FakeEndpoint::new();
    let controller = ListingController::new(endpoint.clone(), 12);

    let stale_gate = endpoint.gate();
    let mut stale = controller
        .set_filter(Filter::Search("rust".into()))
        .into_future();
    assert!(poll!(&mut stale).is_pending());
    assert_eq!(endpoint.call_count(), 1);

    endpoint.reply(Ok(page(50..52, 2)));
    let fresh = controller.set_filter(Filter::Search("go".into())).await;
    assert!(fresh.is_loaded());

    stale_gate.send(Ok(page(0..12, 40))).unwrap();
    assert!(matches!(stale.await, FetchOutcome::Superseded));

    let state = controller.snapshot();
    assert_eq!(ids(&controller), vec!["job-50", "job-51"]);
    assert_eq!(state.total_count(), 2);
    assert!(!state.is_loading());
    assert_eq!(state.query().search(), "go");
}

#[tokio::test]
async fn stale_append_does_not_touch_the_new_query() {
    let endpoint = FakeEndpoint::new();
    let controller = loaded(&endpoint, 30).await;

    let append_gate = endpoint.gate();
    let mut append = controller.load_next_page().into_future();
    assert!(poll!(&mut append).is_pending());

    let reset_gate = endpoint.gate();
    let reset = controller.set_sort_order(SortOrder::Ascending);
    let state = controller.snapshot();
    assert!(state.is_loading());
    assert!(!state.is_loading_more());
    assert_eq!(state.page(), 1);

    append_gate.send(Ok(page(12..24, 30))).unwrap();
    assert!(matches!(append.await, FetchOutcome::Superseded));
    assert!(controller.snapshot().items().is_empty());
    assert!(controller.snapshot().is_loading());

    reset_gate.send(Ok(page(0..12, 30))).unwrap();
    assert!(reset.await.is_loaded());
    assert_eq!(controller.snapshot().items().len(), 12);
    assert_eq!(controller.snapshot().page(), 1);
}

#[tokio::test]
async fn dropping_a_fetch_releases_its_flag() {
    let endpoint = FakeEndpoint::new();
    let controller = loaded(&endpoint, 30).await;

    let fetch = controller.load_next_page();
    assert!(controller.snapshot().is_loading_more());
    drop(fetch);
    let state = controller.snapshot();
    assert!(!state.is_loading_more());
    assert_eq!(state.page(), 1);

    let _gate = endpoint.gate();
    let mut in_flight = controller.load_next_page().into_future();
    assert!(poll!(&mut in_flight).is_pending());
    drop(in_flight);
    assert!(!controller.snapshot().is_loading_more());
    assert!(!controller.load_next_page().is_skipped());

    let reset = controller.refresh();
    assert!(controller.snapshot().is_loading());
    drop(reset);
    assert!(!controller.snapshot().is_loading());
}

#[tokio::test]
async fn repeated_records_are_not_added_twice() {
    let endpoint = FakeEndpoint::new();
    let controller = loaded(&endpoint, 30).await;

    // backend shifted by one record between requests
    endpoint.reply(Ok(page(11..23, 30)));
    let outcome = controller.load_next_page().await;
    assert!(matches!(outcome, FetchOutcome::Loaded { added: 11, .. }));
    assert_eq!(controller.snapshot().items().len(), 23);
    assert!(controller.snapshot().has_more());

    // a page with nothing new ends the scroll
    endpoint.reply(Ok(page(0..12, 30)));
    let outcome = controller.load_next_page().await;
    assert!(matches!(outcome, FetchOutcome::Loaded { added: 0, .. }));
    assert!(!controller.snapshot().has_more());
}

#[tokio::test]
async fn subscribers_see_each_transition() {
    let endpoint = FakeEndpoint::new();
    let controller = ListingController::new(endpoint.clone(), 12);
    let mut rx = controller.subscribe();

    let fetch = controller.refresh();
    assert!(rx.has_changed().unwrap());
    assert!(rx.borrow_and_update().is_loading());

    endpoint.reply(Ok(page(0..12, 12)));
    fetch.await;
    rx.changed().await.unwrap();
    let state = rx.borrow_and_update();
    assert!(!state.is_loading());
    assert_eq!(state.items().len(), 12);
}

#[tokio::test]
async fn scroll_feed_absorbs_repeated_sentinels() {
    let endpoint = FakeEndpoint::new();
    let controller = loaded(&endpoint, 30).await;
    let gate = endpoint.gate();

    let (sentinel_tx, sentinel_rx) = mpsc::channel(8);
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let feed = ScrollFeed::new(controller.clone());
    let handle = tokio::spawn(async move { feed.run(sentinel_rx, shutdown_rx).await });

    for _ in 0..3 {
        sentinel_tx.send(()).await.unwrap();
    }
    drop(sentinel_tx);
    gate.send(Ok(page(12..24, 30))).unwrap();
    handle.await.unwrap();

    assert_eq!(endpoint.call_count(), 2);
    assert_eq!(controller.snapshot().items().len(), 24);
    assert!(!controller.snapshot().is_loading_more());
}

#[tokio::test]
async fn scroll_feed_stops_on_shutdown() {
    let endpoint = FakeEndpoint::new();
    let controller = loaded(&endpoint, 12).await;

    let (_sentinel_tx, sentinel_rx) = mpsc::channel::<()>(8);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let feed = ScrollFeed::new(controller);
    let handle = tokio::spawn(async move { feed.run(sentinel_rx, shutdown_rx).await });

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(std::time::Duration::from_secs(5), handle)
        .await
        .expect("feed did not stop")
        .unwrap();
}

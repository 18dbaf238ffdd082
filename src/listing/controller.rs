use std::collections::HashSet;
use std::future::IntoFuture;
use std::sync::Arc;

use futures_util::future::{self, BoxFuture, FutureExt};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::api::error::ApiError;
use crate::api::job::{JobRecord, ResultPage, SortOrder};

use super::endpoint::JobsEndpoint;
use super::query::{Filter, PageRequest, QueryState};

/// Whether a fetch replaces the accumulated list or extends it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    Reset,
    Append,
}

/// Last failed load, kept until the next fetch starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadFailure {
    pub mode: FetchMode,
    pub detail: String,
}

impl LoadFailure {
    /// Message for the presentation layer
    pub fn message(&self) -> &'static str {
        match self.mode {
            FetchMode::Reset => "Could not load jobs",
            FetchMode::Append => "Could not load more jobs",
        }
    }
}

/// Everything the presentation layer renders from
#[derive(Debug, Clone)]
pub struct ListingState {
    query: QueryState,
    items: Vec<JobRecord>,
    total_count: u64,
    is_loading: bool,
    is_loading_more: bool,
    has_more: bool,
    last_failure: Option<LoadFailure>,
    generation: u64,
}

impl ListingState {
    fn new(query: QueryState) -> Self {
        Self {
            query,
            items: Vec::new(),
            total_count: 0,
            is_loading: false,
            is_loading_more: false,
            has_more: false,
            last_failure: None,
            generation: 0,
        }
    }

    pub fn items(&self) -> &[JobRecord] {
        &self.items
    }

    pub fn total_count(&self) -> u64 {
        self.total_count
    }

    /// A reset fetch is in flight (full skeleton)
    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    /// An append fetch is in flight (inline spinner)
    pub fn is_loading_more(&self) -> bool {
        self.is_loading_more
    }

    pub fn is_busy(&self) -> bool {
        self.is_loading || self.is_loading_more
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn page(&self) -> u32 {
        self.query.page()
    }

    pub fn query(&self) -> &QueryState {
        &self.query
    }

    pub fn last_failure(&self) -> Option<&LoadFailure> {
        self.last_failure.as_ref()
    }

    /// Bumped by every reset; responses from older generations are dropped
    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn begin_reset(&mut self) -> PageRequest {
        self.generation += 1;
        self.items.clear();
        self.total_count = 0;
        self.has_more = false;
        self.is_loading = true;
        self.is_loading_more = false;
        self.last_failure = None;
        self.query.to_request()
    }

    fn begin_append(&mut self) -> Option<PageRequest> {
        if self.is_busy() || !self.has_more {
            return None;
        }
        self.query.advance();
        self.is_loading_more = true;
        self.last_failure = None;
        Some(self.query.to_request())
    }

    fn finish(&mut self, mode: FetchMode) {
        match mode {
            FetchMode::Reset => self.is_loading = false,
            FetchMode::Append => self.is_loading_more = false,
        }
    }

    /// Merge a page and return how many records were added
    fn apply_page(&mut self, mode: FetchMode, page: ResultPage) -> usize {
        let ResultPage { items, total } = page;
        if mode == FetchMode::Reset {
            self.items.clear();
        }

        let before = self.items.len();
        let mut seen: HashSet<String> = self.items.iter().map(|job| job.id.clone()).collect();
        let mut duplicates = 0;
        for job in items {
            if seen.insert(job.id.clone()) {
                self.items.push(job);
            } else {
                duplicates += 1;
            }
        }
        if duplicates > 0 {
            warn!(
                "Listing: skipped {} records already loaded on page {}",
                duplicates,
                self.query.page()
            );
        }

        let added = self.items.len() - before;
        self.total_count = total;
        // a page that adds nothing ends the scroll even if `total` says otherwise
        self.has_more = added > 0 && (self.items.len() as u64) < total;
        added
    }

    fn apply_failure(&mut self, mode: FetchMode, error: &ApiError) {
        match mode {
            FetchMode::Reset => {
                self.items.clear();
                self.total_count = 0;
                self.has_more = false;
            }
            // retry asks for the same page again
            FetchMode::Append => self.query.step_back(),
        }
        self.last_failure = Some(LoadFailure {
            mode,
            detail: error.to_string(),
        });
    }

    fn abandon(&mut self, mode: FetchMode) {
        self.finish(mode);
        if mode == FetchMode::Append {
            self.query.step_back();
        }
    }
}

/// How a fetch ended
#[derive(Debug)]
pub enum FetchOutcome {
    /// The page was merged into the list
    Loaded {
        mode: FetchMode,
        added: usize,
        total: u64,
    },
    /// The request failed; state records the failure and stays usable
    Failed { mode: FetchMode, error: ApiError },
    /// A newer reset started while this request was in flight
    Superseded,
    /// Nothing was requested (already loading, or no more pages)
    Skipped,
}

impl FetchOutcome {
    pub fn is_loaded(&self) -> bool {
        matches!(self, FetchOutcome::Loaded { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, FetchOutcome::Failed { .. })
    }
}

/// A fetch triggered by a controller mutator
///
/// The state change (flags, page, cleared list) has already happened when a
/// `Fetch` is handed out; awaiting it sends the request and merges the
/// response. Dropping it unawaited releases the loading flag.
#[must_use = "the request is only sent once the fetch is awaited"]
pub struct Fetch {
    flight: Option<Flight>,
}

impl Fetch {
    fn skipped() -> Self {
        Self { flight: None }
    }

    pub fn is_skipped(&self) -> bool {
        self.flight.is_none()
    }

    pub fn mode(&self) -> Option<FetchMode> {
        self.flight.as_ref().map(|flight| flight.guard.mode)
    }

    pub fn request(&self) -> Option<&PageRequest> {
        self.flight.as_ref().map(|flight| &flight.request)
    }
}

impl IntoFuture for Fetch {
    type Output = FetchOutcome;
    type IntoFuture = BoxFuture<'static, FetchOutcome>;

    fn into_future(self) -> Self::IntoFuture {
        match self.flight {
            Some(flight) => flight.run().boxed(),
            None => future::ready(FetchOutcome::Skipped).boxed(),
        }
    }
}

struct Flight {
    endpoint: Arc<dyn JobsEndpoint>,
    request: PageRequest,
    guard: FlightGuard,
}

impl Flight {
    async fn run(self) -> FetchOutcome {
        let Flight {
            endpoint,
            request,
            guard,
        } = self;
        debug!(
            "Listing: requesting page {} ({:?}, generation {})",
            request.page, guard.mode, guard.generation
        );
        let result = endpoint.fetch_page(&request).await;
        guard.settle(result)
    }
}

/// Clears the loading flag of its generation however the fetch ends
struct FlightGuard {
    state: Arc<watch::Sender<ListingState>>,
    generation: u64,
    mode: FetchMode,
    armed: bool,
}

impl FlightGuard {
    fn settle(mut self, result: Result<ResultPage, ApiError>) -> FetchOutcome {
        self.armed = false;
        let (generation, mode) = (self.generation, self.mode);
        let mut outcome = FetchOutcome::Superseded;

        self.state.send_if_modified(|state| {
            if state.generation != generation {
                return false;
            }
            state.finish(mode);
            outcome = match result {
                Ok(page) => {
                    let total = page.total;
                    let added = state.apply_page(mode, page);
                    info!(
                        "Listing: page {} loaded, {} added, {}/{} shown",
                        state.query.page(),
                        added,
                        state.items.len(),
                        total
                    );
                    FetchOutcome::Loaded { mode, added, total }
                }
                Err(error) => {
                    warn!(
                        "Listing: {:?} fetch for page {} failed: {}",
                        mode,
                        state.query.page(),
                        error
                    );
                    state.apply_failure(mode, &error);
                    FetchOutcome::Failed { mode, error }
                }
            };
            true
        });

        if matches!(outcome, FetchOutcome::Superseded) {
            debug!(
                "Listing: dropped response from generation {} ({:?})",
                generation, mode
            );
        }
        outcome
    }
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let (generation, mode) = (self.generation, self.mode);
        let released = self.state.send_if_modified(|state| {
            if state.generation != generation {
                return false;
            }
            state.abandon(mode);
            true
        });
        if released {
            debug!("Listing: {:?} fetch abandoned before completion", mode);
        }
    }
}

/// Drives the job listing: owns the query, the accumulated list and the
/// loading flags
///
/// Mutators are synchronous and return a [`Fetch`]; the caller decides
/// whether to await it inline or spawn it. Cloning shares the same state.
#[derive(Clone)]
pub struct ListingController {
    endpoint: Arc<dyn JobsEndpoint>,
    state: Arc<watch::Sender<ListingState>>,
}

impl ListingController {
    pub fn new(endpoint: Arc<dyn JobsEndpoint>, page_size: u32) -> Self {
        Self::with_query(endpoint, QueryState::new(page_size))
    }

    /// Controller whose first `refresh` uses `query`
    pub fn with_query(endpoint: Arc<dyn JobsEndpoint>, query: QueryState) -> Self {
        let (state, _) = watch::channel(ListingState::new(query));
        Self {
            endpoint,
            state: Arc::new(state),
        }
    }

    pub fn snapshot(&self) -> ListingState {
        self.state.borrow().clone()
    }

    /// Receiver that wakes on every state change
    pub fn subscribe(&self) -> watch::Receiver<ListingState> {
        self.state.subscribe()
    }

    /// Reload the first page of the current query (initial load and retry)
    pub fn refresh(&self) -> Fetch {
        self.reset_with(QueryState::rewind)
    }

    pub fn set_filter(&self, filter: Filter) -> Fetch {
        debug!("Listing: filter changed to {:?}", filter);
        self.reset_with(|query| query.apply(filter))
    }

    pub fn set_sort_order(&self, order: SortOrder) -> Fetch {
        debug!("Listing: sort order changed to {}", order);
        self.reset_with(|query| query.set_sort(order))
    }

    /// Drop search, category and location; the sort order stays
    pub fn clear_filters(&self) -> Fetch {
        debug!("Listing: clearing filters");
        self.reset_with(QueryState::clear_filters)
    }

    /// Request the next page, unless a fetch is in flight or nothing is left
    pub fn load_next_page(&self) -> Fetch {
        let mut started = None;
        self.state.send_if_modified(|state| match state.begin_append() {
            Some(request) => {
                started = Some((state.generation, request));
                true
            }
            None => false,
        });

        match started {
            Some((generation, request)) => self.launch(generation, FetchMode::Append, request),
            None => Fetch::skipped(),
        }
    }

    fn reset_with(&self, update: impl FnOnce(&mut QueryState)) -> Fetch {
        let mut started = None;
        self.state.send_modify(|state| {
            update(&mut state.query);
            let request = state.begin_reset();
            started = Some((state.generation, request));
        });

        match started {
            Some((generation, request)) => self.launch(generation, FetchMode::Reset, request),
            None => Fetch::skipped(),
        }
    }

    fn launch(&self, generation: u64, mode: FetchMode, request: PageRequest) -> Fetch {
        Fetch {
            flight: Some(Flight {
                endpoint: Arc::clone(&self.endpoint),
                request,
                guard: FlightGuard {
                    state: Arc::clone(&self.state),
                    generation,
                    mode,
                    armed: true,
                },
            }),
        }
    }
}

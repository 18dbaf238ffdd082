//! Shared helpers for listing tests: a scripted endpoint and record builders.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::ops::Range;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::json;
use tokio::sync::oneshot;

use freelify_jobs::api::error::ApiError;
use freelify_jobs::api::job::{JobRecord, ResultPage};
use freelify_jobs::listing::{JobsEndpoint, PageRequest};

pub type Reply = Result<ResultPage, ApiError>;

pub fn job(id: &str) -> JobRecord {
    serde_json::from_value(json!({
        "_id": id,
        "title": format!("Job {}", id),
        "category": "Web Development",
    }))
    .unwrap()
}

/// Records `job-<n>` for every n in `ids`
pub fn page(ids: Range<usize>, total: u64) -> ResultPage {
    ResultPage {
        items: ids.map(|n| job(&format!("job-{}", n))).collect(),
        total,
    }
}

pub fn server_error() -> ApiError {
    ApiError::Status {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        message: "Internal Server Error".to_string(),
    }
}

/// Endpoint that answers calls in order from replies queued by the test
///
/// `reply` queues an answer that is ready immediately; `gate` queues one the
/// test completes later through the returned sender.
#[derive(Default)]
pub struct FakeEndpoint {
    calls: Mutex<Vec<PageRequest>>,
    replies: Mutex<VecDeque<oneshot::Receiver<Reply>>>,
}

impl FakeEndpoint {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reply(&self, reply: Reply) {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(reply);
        self.replies.lock().unwrap().push_back(rx);
    }

    pub fn gate(&self) -> oneshot::Sender<Reply> {
        let (tx, rx) = oneshot::channel();
        self.replies.lock().unwrap().push_back(rx);
        tx
    }

    pub fn calls(&self) -> Vec<PageRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn last_call(&self) -> PageRequest {
        self.calls.lock().unwrap().last().cloned().expect("no call made")
    }
}

#[async_trait]
impl JobsEndpoint for FakeEndpoint {
    async fn fetch_page(&self, request: &PageRequest) -> Reply {
        self.calls.lock().unwrap().push(request.clone());
        let reply = self.replies.lock().unwrap().pop_front();
        match reply {
            Some(rx) => rx
                .await
                .unwrap_or_else(|_| Err(ApiError::Rejected("gate dropped".to_string()))),
            None => Err(ApiError::Rejected("no reply queued".to_string())),
        }
    }
}

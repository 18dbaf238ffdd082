use async_trait::async_trait;

use crate::api::error::ApiError;
use crate::api::job::ResultPage;

use super::query::PageRequest;

/// Remote collection the listing controller pages through
///
/// `JobService` implements this against `GET /jobs`; tests plug in fakes.
#[async_trait]
pub trait JobsEndpoint: Send + Sync {
    async fn fetch_page(&self, request: &PageRequest) -> Result<ResultPage, ApiError>;
}

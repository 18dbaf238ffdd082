use async_trait::async_trait;
use chrono::Utc;
use reqwest::Method;
use serde::Serialize;
use tracing::{info, warn};

use crate::api::client::ApiClient;
use crate::api::error::ApiError;
use crate::listing::{JobsEndpoint, PageRequest};

use super::dto::{InsertResponse, JobsPayload, ResultPage, UpdateResponse, WriteCounts};
use super::models::{AcceptedJob, Category, JobDraft, JobRecord, UserStats};

#[derive(Serialize)]
struct EmailQuery<'a> {
    email: &'a str,
}

/// Job endpoints of the marketplace API
#[derive(Clone, Debug)]
pub struct JobService {
    client: ApiClient,
}

impl JobService {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// One page of `/jobs` for the given query
    pub async fn list_jobs(&self, request: &PageRequest) -> Result<ResultPage, ApiError> {
        let payload: JobsPayload = self.client.get_json_with(&["jobs"], request).await?;
        Ok(payload.into())
    }

    pub async fn job_details(&self, id: &str) -> Result<JobRecord, ApiError> {
        self.client.get_json(&["jobs", id]).await
    }

    /// Most recent postings shown on the home page
    pub async fn latest_jobs(&self) -> Result<Vec<JobRecord>, ApiError> {
        let payload: JobsPayload = self.client.get_json(&["latest-jobs"]).await?;
        Ok(ResultPage::from(payload).items)
    }

    pub async fn my_added_jobs(&self, email: &str) -> Result<Vec<JobRecord>, ApiError> {
        let payload: JobsPayload = self
            .client
            .get_json_with(&["myAddedJobs"], &EmailQuery { email })
            .await?;
        Ok(ResultPage::from(payload).items)
    }

    pub async fn my_accepted_jobs(&self, email: &str) -> Result<Vec<AcceptedJob>, ApiError> {
        self.client
            .get_json_with(&["my-accepted-jobs"], &EmailQuery { email })
            .await
    }

    /// Take on a job posted by someone else
    pub async fn accept_job(&self, job: &JobRecord, user_email: &str) -> Result<(), ApiError> {
        if job.is_owned_by(user_email) {
            warn!("Service: {} tried to accept their own job {}", user_email, job.id);
            return Err(ApiError::Rejected(
                "You cannot accept your own job".to_string(),
            ));
        }

        let accepted = AcceptedJob::from_job(job, user_email, Utc::now());
        let _: serde_json::Value = self
            .client
            .send_json(Method::POST, &["accepted-jobs"], &accepted)
            .await?;

        info!("Service: job {} accepted by {}", job.id, user_email);
        Ok(())
    }

    /// Mark an accepted job done or cancelled; `true` when a record was removed
    pub async fn remove_accepted(&self, id: &str) -> Result<bool, ApiError> {
        let counts: WriteCounts = self
            .client
            .delete_json(&["accepted-jobs", id])
            .await?;
        Ok(counts.deleted_count > 0)
    }

    /// Validate and post a new job; returns the id the backend assigned
    pub async fn add_job(&self, mut draft: JobDraft) -> Result<String, ApiError> {
        draft.normalize();
        draft.check()?;
        info!("Service: posting job title={}", draft.title);

        let response: InsertResponse = self
            .client
            .send_json(Method::POST, &["jobs"], &draft)
            .await?;

        match response {
            InsertResponse {
                success: Some(true) | None,
                inserted_id: Some(id),
                ..
            } => {
                info!("Service: job created with id={}", id);
                Ok(id)
            }
            InsertResponse { message, .. } => Err(ApiError::Rejected(
                message.unwrap_or_else(|| "Failed to post job".to_string()),
            )),
        }
    }

    /// `Ok(false)` means the backend found nothing to change
    pub async fn update_job(&self, id: &str, mut draft: JobDraft) -> Result<bool, ApiError> {
        draft.normalize();
        draft.check()?;

        let response: UpdateResponse = self
            .client
            .send_json(Method::PUT, &["updateJob", id], &draft)
            .await?;

        let modified = WriteCounts::from(response).modified_count > 0;
        if modified {
            info!("Service: job {} updated", id);
        } else {
            info!("Service: job {} unchanged", id);
        }
        Ok(modified)
    }

    pub async fn delete_job(&self, id: &str) -> Result<bool, ApiError> {
        let counts: WriteCounts = self
            .client
            .delete_json(&["deleteJob", id])
            .await?;

        let deleted = counts.deleted_count > 0 || counts.success == Some(true);
        if deleted {
            info!("Service: job {} deleted", id);
        } else {
            warn!("Service: delete of job {} removed nothing", id);
        }
        Ok(deleted)
    }

    pub async fn categories(&self) -> Result<Vec<Category>, ApiError> {
        self.client.get_json(&["categories"]).await
    }

    /// Dashboard counters for the signed-in user
    pub async fn user_stats(&self) -> Result<UserStats, ApiError> {
        self.client.get_json(&["dashboard", "user", "stats"]).await
    }
}

#[async_trait]
impl JobsEndpoint for JobService {
    async fn fetch_page(&self, request: &PageRequest) -> Result<ResultPage, ApiError> {
        self.list_jobs(request).await
    }
}

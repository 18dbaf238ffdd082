use serde::Deserialize;

use super::models::JobRecord;

/// One page of listings in canonical form
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultPage {
    pub items: Vec<JobRecord>,
    /// Records matching the filters, across all pages
    pub total: u64,
}

/// `/jobs` answers either with a bare array or with `{ jobs, total }`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum JobsPayload {
    Bare(Vec<JobRecord>),
    Paged {
        jobs: Vec<JobRecord>,
        #[serde(default)]
        total: Option<u64>,
    },
}

impl From<JobsPayload> for ResultPage {
    fn from(payload: JobsPayload) -> Self {
        match payload {
            // an unpaginated answer is the whole collection
            JobsPayload::Bare(items) => ResultPage {
                total: items.len() as u64,
                items,
            },
            JobsPayload::Paged { jobs, total } => ResultPage {
                total: total.unwrap_or(jobs.len() as u64),
                items: jobs,
            },
        }
    }
}

/// `POST /jobs`
///
/// Older deployments answer with only `insertedId`; newer ones add
/// `success`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertResponse {
    #[serde(default)]
    pub success: Option<bool>,
    pub inserted_id: Option<String>,
    pub message: Option<String>,
}

/// `PUT /updateJob/{id}` answers with the driver result, either bare or
/// wrapped in `data`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum UpdateResponse {
    Wrapped {
        data: WriteCounts,
        #[serde(default)]
        message: Option<String>,
    },
    Bare(WriteCounts),
}

impl From<UpdateResponse> for WriteCounts {
    fn from(response: UpdateResponse) -> Self {
        match response {
            UpdateResponse::Wrapped { data, .. } => data,
            UpdateResponse::Bare(counts) => counts,
        }
    }
}

/// Driver result of a write; delete endpoints answer with it directly
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteCounts {
    #[serde(default)]
    pub modified_count: u64,
    #[serde(default)]
    pub deleted_count: u64,
    #[serde(default)]
    pub success: Option<bool>,
}

use std::collections::BTreeMap;

use reqwest::StatusCode;
use thiserror::Error;

/// Errors produced by any call against the marketplace API
#[derive(Debug, Error)]
pub enum ApiError {
    /// No response was received (connection refused, timeout, TLS, ...)
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The endpoint answered with a non-2xx status
    #[error("Endpoint responded with {status}: {message}")]
    Status { status: StatusCode, message: String },

    /// The body did not have the expected shape
    #[error("Malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Local validation failed before anything was sent
    #[error("Validation failed: {}", summarize(.0))]
    Invalid(BTreeMap<String, Vec<String>>),

    /// The request was refused by a business rule
    #[error("{0}")]
    Rejected(String),

    /// The configured base URL cannot have paths joined onto it
    #[error("Invalid API URL: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    /// 401 and 403 mean the stored token is no longer accepted
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            ApiError::Status { status, .. }
                if *status == StatusCode::UNAUTHORIZED || *status == StatusCode::FORBIDDEN
        )
    }
}

fn summarize(fields: &BTreeMap<String, Vec<String>>) -> String {
    fields
        .iter()
        .map(|(field, messages)| format!("{}: {}", field, messages.join(", ")))
        .collect::<Vec<_>>()
        .join("; ")
}

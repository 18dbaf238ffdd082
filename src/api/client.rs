use std::time::Duration;

use reqwest::{Method, RequestBuilder, StatusCode, Url};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use super::auth::Session;
use super::error::ApiError;

/// HTTP client for the marketplace API
///
/// Paths are given as segments (`&["jobs", id]`) and each one is
/// percent-encoded, so ids and emails can never leak into another route.
/// A public client sends no credentials. An authenticated client attaches
/// the session's bearer token to every request and signs the session out
/// when the backend answers 401 or 403. The error is still returned to the
/// caller through the normal error path.
#[derive(Clone, Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    session: Option<Session>,
}

/// Error bodies look like `{ "message": "..." }` most of the time
#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    error: Option<String>,
}

impl ApiClient {
    /// Client for public endpoints
    pub fn public(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        Self::build(base_url, timeout, None)
    }

    /// Client that carries the session's bearer token
    pub fn authenticated(
        base_url: &str,
        timeout: Duration,
        session: Session,
    ) -> Result<Self, ApiError> {
        Self::build(base_url, timeout, Some(session))
    }

    fn build(base_url: &str, timeout: Duration, session: Option<Session>) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("freelify-jobs/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        let base_url = Url::parse(base_url.trim())
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(base_url.to_string()));
        }

        Ok(Self {
            http,
            base_url,
            session,
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    fn url(&self, path: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(path);
        Ok(url)
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &[&str]) -> Result<T, ApiError> {
        self.execute(self.http.get(self.url(path)?)).await
    }

    /// GET with query parameters; `None` fields are left out of the query
    /// string entirely
    pub async fn get_json_with<T, Q>(&self, path: &[&str], query: &Q) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        self.execute(self.http.get(self.url(path)?).query(query)).await
    }

    pub async fn send_json<T, B>(
        &self,
        method: Method,
        path: &[&str],
        body: &B,
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.execute(self.http.request(method, self.url(path)?).json(body))
            .await
    }

    pub async fn delete_json<T: DeserializeOwned>(&self, path: &[&str]) -> Result<T, ApiError> {
        self.execute(self.http.delete(self.url(path)?)).await
    }

    async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let request = match self.session.as_ref().and_then(Session::token) {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request.send().await?;
        let status = response.status();
        let url = response.url().clone();
        let body = response.bytes().await?;
        debug!("{} answered {} ({} bytes)", url, status, body.len());

        if !status.is_success() {
            if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                if let Some(session) = &self.session {
                    warn!("Token rejected by {} ({}), signing out", url.path(), status);
                    session.sign_out();
                }
            }
            return Err(ApiError::Status {
                status,
                message: error_message(&body, status),
            });
        }

        Ok(serde_json::from_slice(&body)?)
    }
}

fn error_message(body: &[u8], status: StatusCode) -> String {
    if let Ok(ErrorBody { message, error }) = serde_json::from_slice::<ErrorBody>(body) {
        if let Some(message) = message.or(error) {
            return message;
        }
    }

    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        text.chars().take(200).collect()
    }
}

use std::env;
use std::time::Duration;

use crate::listing::DEFAULT_PAGE_SIZE;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Base URL of the marketplace API
    /// Default: http://localhost:3000
    pub api_url: String,

    /// Bearer token to start the session with, if any
    pub api_token: Option<String>,

    /// Listings requested per page
    /// Default: 12
    pub page_size: u32,

    /// Timeout for a single API request
    /// Default: 15 seconds
    pub request_timeout: Duration,

    /// Directory for the rolling log files
    /// Default: logs
    pub log_dir: String,
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Optional environment variables:
    /// - API_URL: marketplace API base URL (default: http://localhost:3000)
    /// - API_TOKEN: JWT to seed the session with
    /// - PAGE_SIZE: listings per page, at least 1 (default: 12)
    /// - REQUEST_TIMEOUT_SECS: per-request timeout (default: 15)
    /// - LOG_DIR: log directory (default: logs)
    pub fn from_env() -> Result<Self, String> {
        // Load .env file if it exists
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let api_url = lookup("API_URL")
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| "http://localhost:3000".to_string());

        if !api_url.starts_with("http://") && !api_url.starts_with("https://") {
            return Err(format!("API_URL must be an http(s) URL, got '{}'", api_url));
        }

        let api_token = lookup("API_TOKEN").filter(|token| !token.trim().is_empty());

        let page_size = match lookup("PAGE_SIZE") {
            Some(raw) => match raw.trim().parse::<u32>() {
                Ok(0) | Err(_) => {
                    return Err(format!("PAGE_SIZE must be a positive integer, got '{}'", raw))
                }
                Ok(size) => size,
            },
            None => DEFAULT_PAGE_SIZE,
        };

        // Parse REQUEST_TIMEOUT_SECS with default fallback
        let request_timeout = lookup("REQUEST_TIMEOUT_SECS")
            .and_then(|s| s.trim().parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(15));

        let log_dir = lookup("LOG_DIR").unwrap_or_else(|| "logs".to_string());

        Ok(Config {
            api_url,
            api_token,
            page_size,
            request_timeout,
            log_dir,
        })
    }
}

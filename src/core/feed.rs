//! Daily rate feed abstraction

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use super::record::Record;

/// Failure of a single day's fetch. Never aborts the whole run.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to build request for {url}: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),

    #[error("request timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("status {0}")]
    Status(u16),

    #[error("xml decode: {0}")]
    Decode(String),

    #[error("fetch task aborted: {0}")]
    Aborted(String),
}

impl FetchError {
    /// Maps a transport error into the taxonomy above.
    pub fn from_reqwest(err: reqwest::Error, url: &str, timeout_secs: u64) -> Self {
        if err.is_timeout() {
            FetchError::Timeout { secs: timeout_secs }
        } else if err.is_builder() {
            FetchError::Request {
                url: url.to_string(),
                source: err,
            }
        } else {
            FetchError::Network(err)
        }
    }
}

#[async_trait]
pub trait RateFeed: Send + Sync {
    /// Fetches every parseable rate published for `date`. An empty list is a
    /// valid answer and is distinct from an error.
    async fn fetch(&self, date: NaiveDate) -> Result<Vec<Record>, FetchError>;
}

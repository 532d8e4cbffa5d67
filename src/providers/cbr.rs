use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, HeaderMap, HeaderValue};
use std::time::Duration;
use tracing::{debug, instrument};

use super::xml;
use crate::core::config::FeedConfig;
use crate::core::{FetchError, RateFeed, Record};

/// Client for the Central Bank of Russia daily rates feed.
///
/// Holds a single connection pool that is shared by every concurrent fetch.
#[derive(Debug, Clone)]
pub struct CbrFeedClient {
    base_url: String,
    timeout_secs: u64,
    client: reqwest::Client,
}

impl CbrFeedClient {
    pub fn new(config: &FeedConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/xml, text/xml, */*"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("ru-RU,en;q=0.9"));

        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(CbrFeedClient {
            base_url: config.base_url.clone(),
            timeout_secs: config.timeout_secs,
            client,
        })
    }

    /// `<base_url>?date_req=DD/MM/YYYY`, slashes left unescaped.
    pub fn url_for(&self, date: NaiveDate) -> String {
        format!("{}?date_req={}", self.base_url, date.format("%d/%m/%Y"))
    }
}

#[async_trait]
impl RateFeed for CbrFeedClient {
    #[instrument(name = "CbrFetch", skip(self), fields(date = %date))]
    async fn fetch(&self, date: NaiveDate) -> Result<Vec<Record>, FetchError> {
        let url = self.url_for(date);
        debug!("Requesting rates from {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(e, &url, self.timeout_secs))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::from_reqwest(e, &url, self.timeout_secs))?;
        debug!(bytes = body.len(), "Received feed body");

        xml::decode_records(&body, content_type.as_deref(), date)
    }
}

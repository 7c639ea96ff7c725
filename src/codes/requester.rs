//! HTTP client for the code sources.
//!
//! This module provides the [`SourceRequester`] struct downloading raw
//! payloads, and the [`Requester`] trait the fetcher depends on.

use std::time::Duration;

use log::{debug, info};
use mockall::automock;
use reqwest::{Client, header};
use thiserror::Error;

use crate::codes::structs::SourceKind;

const USER_AGENT: &str = concat!("codewatch/", env!("CARGO_PKG_VERSION"));

/// Failure of a single HTTP request.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("request timed out")]
    Timeout,
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("HTTP {0}")]
    Status(u16),
    #[error("failed to read response: {0}")]
    Body(String),
}

impl RequestError {
    /// Whether retrying the same request later may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            RequestError::Timeout | RequestError::Connect(_) => true,
            RequestError::Status(status) => *status == 429 || *status >= 500,
            RequestError::Body(_) => false,
        }
    }
}

impl From<reqwest::Error> for RequestError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            RequestError::Timeout
        } else if e.is_connect() {
            RequestError::Connect(e.to_string())
        } else if let Some(status) = e.status() {
            RequestError::Status(status.as_u16())
        } else {
            RequestError::Body(e.to_string())
        }
    }
}

/// Trait for downloading source payloads.
///
/// This trait abstracts the HTTP operations for easier testing with mocks.
#[automock]
pub trait Requester {
    /// Downloads the body of `url`, expecting a payload of the given kind.
    async fn get_text(&self, url: &str, kind: SourceKind) -> Result<String, RequestError>;
}

/// HTTP client for the JSON APIs and wiki pages.
///
/// # Examples
///
/// ```no_run
/// let requester = SourceRequester::new(Duration::from_secs(15), Duration::from_secs(20));
/// let body = requester.get_text("https://hoyo-codes.seria.moe/codes?game=genshin", SourceKind::Json).await?;
/// ```
pub struct SourceRequester {
    /// Timeout applied to JSON API requests
    json_timeout: Duration,
    /// Timeout applied to wiki page requests, pages are much heavier
    wiki_timeout: Duration,
    /// HTTP client
    client: Client,
}

impl SourceRequester {
    /// Create a new [SourceRequester].
    ///
    /// # Arguments
    ///
    /// * `json_timeout` - Timeout of API requests
    /// * `wiki_timeout` - Timeout of wiki page requests
    pub fn new(json_timeout: Duration, wiki_timeout: Duration) -> Self {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|_| Client::new());

        SourceRequester {
            json_timeout,
            wiki_timeout,
            client,
        }
    }
}

impl Requester for SourceRequester {
    async fn get_text(&self, url: &str, kind: SourceKind) -> Result<String, RequestError> {
        let (timeout, accept) = match kind {
            SourceKind::Json => (self.json_timeout, "application/json"),
            SourceKind::Wiki => (self.wiki_timeout, "text/html"),
        };
        info!("request {:?} source {}", kind, url);

        let response = self
            .client
            .get(url)
            .header(header::ACCEPT, accept)
            .timeout(timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            debug!("response from {} -> {}", url, status);
            return Err(RequestError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        debug!("response from {} -> {} bytes", url, body.len());

        Ok(body)
    }
}

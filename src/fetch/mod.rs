//! Single-resource fetchers
//!
//! [`ResourceFetcher`] retrieves raw bytes; [`ImageFetcher`] retrieves and
//! decodes a raster image. Both make exactly one attempt per request, never
//! fail the call itself, and record exactly one diagnostic per outcome. A
//! failure is visible to the caller only as an [`Entry`] without payload.

mod request;


pub use request::PreparedRequest;

use crate::config::{Config, FetchConfig};
use crate::diagnostics::{Code, LogSink, Severity};
use crate::error::{FetchError, Result};
use crate::types::{Entry, FetchRequest};
use bytes::Bytes;
use image::DynamicImage;
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::spawn_blocking;

const MODULE: &str = "fetch";

/// Build the HTTP client shared by all fetchers of a downloader
pub fn build_client(config: &FetchConfig) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .user_agent(config.user_agent.as_str())
        .build()?)
}

/// A successfully read response
#[derive(Clone, Debug)]
pub struct Fetched {
    /// Response status (always a success status)
    pub status: StatusCode,
    /// Response body
    pub body: Bytes,
}

/// Fetches one URL as raw bytes
#[derive(Clone, Debug)]
pub struct ResourceFetcher {
    client: reqwest::Client,
    request: Arc<PreparedRequest>,
    timeout: Option<Duration>,
    log: LogSink,
}

impl ResourceFetcher {
    /// Create a fetcher from its parts
    pub fn new(
        client: reqwest::Client,
        request: PreparedRequest,
        timeout: Option<Duration>,
        log: LogSink,
    ) -> Self {
        Self {
            client,
            request: Arc::new(request),
            timeout,
            log,
        }
    }

    /// Create a fetcher from configuration, building a fresh HTTP client
    pub fn from_config(config: &Config, log: LogSink) -> Result<Self> {
        let client = build_client(&config.fetch)?;
        let request = config.request.prepare()?;
        Ok(Self::new(client, request, config.fetch.timeout, log))
    }

    /// Per-fetch timeout
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Fetch one request, resolving to an entry whether or not it succeeded
    pub async fn fetch(&self, request: FetchRequest) -> Entry<Bytes> {
        match self.try_fetch(&request.url).await {
            Ok(fetched) => {
                let message = format!(
                    "{}: fetched {} bytes from {} (HTTP {})",
                    request.filename,
                    fetched.body.len(),
                    request.url,
                    fetched.status.as_u16()
                );
                if fetched.status == StatusCode::OK {
                    self.log.record(Severity::Info, MODULE, Code::FetchOk, message);
                } else {
                    self.log
                        .record(Severity::Debug, MODULE, Code::FetchOkNonCanonical, message);
                }
                Entry::resolved(request.url, request.filename, fetched.body)
            }
            Err(e) => {
                self.log.record(
                    e.severity(),
                    MODULE,
                    e.code(),
                    format!("{}: {}", request.filename, e),
                );
                Entry::unresolved(request.url, request.filename)
            }
        }
    }

    /// One retrieval attempt with the timeout applied
    ///
    /// An elapsed timeout is a network error: the transport never delivered
    /// a complete response.
    pub async fn try_fetch(&self, url: &str) -> std::result::Result<Fetched, FetchError> {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.send_and_read(url))
                .await
                .unwrap_or_else(|_| {
                    Err(FetchError::Network {
                        url: url.to_string(),
                        reason: format!("timed out after {:?}", limit),
                    })
                }),
            None => self.send_and_read(url).await,
        }
    }

    /// Send, check the status, read the body; each stage owns one failure class
    pub(crate) async fn send_and_read(&self, url: &str) -> std::result::Result<Fetched, FetchError> {
        let response = self
            .request
            .build(&self.client, url)
            .send()
            .await
            .map_err(|e| FetchError::Network {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|e| FetchError::Decode {
            url: url.to_string(),
            reason: format!("failed to read body: {}", e),
        })?;

        Ok(Fetched { status, body })
    }
}

/// Fetches one URL and decodes it as a raster image
///
/// Three terminal outcomes: loaded, failed (transport, status or decode), or
/// aborted when the fetch timeout elapses first.
#[derive(Clone, Debug)]
pub struct ImageFetcher {
    resources: ResourceFetcher,
}

impl ImageFetcher {
    /// Wrap a resource fetcher; its timeout becomes the abort deadline
    pub fn new(resources: ResourceFetcher) -> Self {
        Self { resources }
    }

    /// Fetch and decode one request, resolving to an entry whether or not it succeeded
    pub async fn fetch(&self, request: FetchRequest) -> Entry<DynamicImage> {
        let log = &self.resources.log;
        match self.try_load(&request.url).await {
            Ok(image) => {
                log.record(
                    Severity::Info,
                    MODULE,
                    Code::ImageLoaded,
                    format!(
                        "{}: loaded {}x{} image from {}",
                        request.filename,
                        image.width(),
                        image.height(),
                        request.url
                    ),
                );
                Entry::resolved(request.url, request.filename, image)
            }
            Err(e) => {
                log.record(
                    e.severity(),
                    MODULE,
                    e.code(),
                    format!("{}: {}", request.filename, e),
                );
                Entry::unresolved(request.url, request.filename)
            }
        }
    }

    /// One load attempt: fetch, then decode on the blocking pool
    pub async fn try_load(&self, url: &str) -> std::result::Result<DynamicImage, FetchError> {
        match self.resources.timeout {
            Some(limit) => tokio::time::timeout(limit, self.load(url))
                .await
                .unwrap_or_else(|_| {
                    Err(FetchError::Aborted {
                        url: url.to_string(),
                        timeout: limit,
                    })
                }),
            None => self.load(url).await,
        }
    }

    async fn load(&self, url: &str) -> std::result::Result<DynamicImage, FetchError> {
        let fetched = self.resources.send_and_read(url).await?;
        let decoded = spawn_blocking(move || image::load_from_memory(&fetched.body))
            .await
            .map_err(|e| FetchError::Decode {
                url: url.to_string(),
                reason: format!("decode task failed: {}", e),
            })?;
        decoded.map_err(|e| FetchError::Decode {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }
}

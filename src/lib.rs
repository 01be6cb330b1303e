//! # bundle-dl
//!
//! Batch resource downloader that packages what it fetched into a single
//! deliverable: a ZIP archive of raw files, a ZIP archive of re-encoded
//! images, or a video assembled from an image sequence.
//!
//! ## Design Philosophy
//!
//! bundle-dl is designed to be:
//! - **Partial-failure tolerant** - One bad URL never aborts a batch; it is
//!   left out and explained in the diagnostic log embedded in the archive
//! - **Sensible defaults** - Works out of the box with zero configuration
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Event-driven** - Consumers subscribe to events, no polling required
//!
//! ## Quick Start
//!
//! ```no_run
//! use bundle_dl::{BundleDownloader, Config, FetchRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let downloader = BundleDownloader::new(Config::default())?;
//!
//!     // Subscribe to events
//!     let mut events = downloader.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let requests = vec![
//!         FetchRequest::from_url("https://example.com/images/1.jpg"),
//!         FetchRequest::from_url("https://example.com/images/2.jpg"),
//!     ];
//!     let outcome = downloader.download_and_archive(&requests, "images").await?;
//!     println!("saved to {:?}", outcome.location);
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// ZIP archive assembly
pub mod archive;
/// Ordered, concurrency-capped batch loading
pub mod batch;
/// Video assembly from image sequences
pub mod capture;
/// Configuration types
pub mod config;
/// Leveled, coded diagnostic log
pub mod diagnostics;
/// Top-level downloader and its pipelines
pub mod downloader;
/// Raster re-encoding
pub mod encode;
/// Error types
pub mod error;
/// HTTP and image fetching
pub mod fetch;
/// Human-readable archive manifest
pub mod manifest;
/// Persisting finished blobs
pub mod output;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use config::{Config, FileCollisionAction};
pub use diagnostics::{Code, LogQuery, LogRecord, LogSink, Severity};
pub use downloader::BundleDownloader;
pub use error::{CaptureError, EncodeError, Error, FetchError, Result};
pub use types::{
    Blob, Entry, Event, FetchRequest, RasterType, SaveOutcome, SaveReason, VideoType,
};

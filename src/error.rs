//! Error types for bundle-dl
//!
//! This module provides the error handling for the library:
//! - The crate-wide [`Error`] type returned by fallible top-level calls
//! - Per-stage error types ([`FetchError`], [`EncodeError`], [`CaptureError`])
//!   that are recovered locally and turned into diagnostic records
//! - A mapping from every error to its stable diagnostic [`Code`]

use crate::diagnostics::{Code, Severity};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for bundle-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for bundle-dl
///
/// Per-entry failures (a single unreachable URL, a corrupt image) never surface
/// here; they degrade the entry to "no payload". This type is reserved for
/// caller errors and for operations that cannot run at all.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "capture.fps")
        key: Option<String>,
    },

    /// Video capture failed or could not be initialized
    #[error("capture error: {0}")]
    Capture(#[from] CaptureError),

    /// ZIP serialization failed
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client could not be constructed
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Output file already exists and the collision action forbids replacing it
    #[error("file collision at {path}: {reason}")]
    FileCollision {
        /// The path where the collision occurred
        path: PathBuf,
        /// The reason for the collision
        reason: String,
    },
}

impl Error {
    /// Shorthand for a configuration error tied to a specific key
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// Diagnostic code of the underlying stage failure, if there is one
    pub fn code(&self) -> Option<Code> {
        match self {
            Error::Capture(e) => Some(e.code()),
            _ => None,
        }
    }
}

/// Failure of a single network retrieval
///
/// The variants are mutually exclusive and decided by the stage that failed:
/// sending the request, checking the status, or reading the body.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The transport never reached the server (DNS, connect, timeout)
    #[error("network error for {url}: {reason}")]
    Network {
        /// The requested URL
        url: String,
        /// Transport failure description
        reason: String,
    },

    /// The server answered with a failure status
    #[error("HTTP {status} for {url}")]
    Http {
        /// The requested URL
        url: String,
        /// The response status code
        status: u16,
    },

    /// The response body (or the image inside it) could not be materialized
    #[error("failed to decode {url}: {reason}")]
    Decode {
        /// The requested URL
        url: String,
        /// Decode failure description
        reason: String,
    },

    /// The image load was abandoned before it completed
    #[error("load of {url} aborted after {timeout:?}")]
    Aborted {
        /// The requested URL
        url: String,
        /// The timeout that elapsed
        timeout: Duration,
    },
}

impl FetchError {
    /// Stable diagnostic code for this failure class
    pub fn code(&self) -> Code {
        match self {
            FetchError::Network { .. } => Code::NetworkError,
            FetchError::Http { .. } => Code::HttpError,
            FetchError::Decode { .. } => Code::DecodeError,
            FetchError::Aborted { .. } => Code::ImageAborted,
        }
    }

    /// Severity used when this failure is recorded in the log sink
    pub fn severity(&self) -> Severity {
        match self {
            FetchError::Aborted { .. } => Severity::Warn,
            _ => Severity::Error,
        }
    }

    /// The URL this failure belongs to
    pub fn url(&self) -> &str {
        match self {
            FetchError::Network { url, .. }
            | FetchError::Http { url, .. }
            | FetchError::Decode { url, .. }
            | FetchError::Aborted { url, .. } => url,
        }
    }
}

/// Raster re-encoding errors
#[derive(Debug, Error)]
pub enum EncodeError {
    /// The drawable surface could not be allocated for the image dimensions
    #[error("cannot allocate {width}x{height} surface: {reason}")]
    SurfaceAllocation {
        /// Requested width in pixels
        width: u32,
        /// Requested height in pixels
        height: u32,
        /// Why allocation was refused
        reason: String,
    },

    /// The codec rejected the surface
    #[error("{format} encoding failed: {source}")]
    Codec {
        /// Target format name (e.g., "PNG")
        format: &'static str,
        /// Underlying codec error
        #[source]
        source: image::ImageError,
    },

    /// The blocking encode task did not complete
    #[error("encode task failed: {0}")]
    Task(String),
}

impl EncodeError {
    /// Stable diagnostic code for this failure
    pub fn code(&self) -> Code {
        Code::EncodeError
    }
}

/// Video capture errors
#[derive(Debug, Error)]
pub enum CaptureError {
    /// No recorder is available for the requested media type
    #[error("cannot record {media_type}: {reason}")]
    Unsupported {
        /// The requested media type (e.g., "video/webm")
        media_type: &'static str,
        /// Why the recorder could not be created
        reason: String,
    },

    /// The frame sequence is empty so there is nothing to play
    #[error("cannot capture an empty frame sequence")]
    EmptySequence,

    /// Capture was already requested or has already finished for this session
    #[error("capture session is {state}; a new capture cannot be requested")]
    SessionInUse {
        /// The current session state
        state: String,
    },

    /// Playback ended before capture completed
    #[error("playback stopped before capture finished")]
    Stopped,

    /// The recorder failed while capturing
    #[error("recorder failed: {0}")]
    Recorder(String),
}

impl CaptureError {
    /// Stable diagnostic code for this failure
    pub fn code(&self) -> Code {
        match self {
            CaptureError::Unsupported { .. } => Code::CaptureInitError,
            _ => Code::CaptureError,
        }
    }
}

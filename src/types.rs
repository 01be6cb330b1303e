//! Core types for bundle-dl

use crate::error::{Error, Result};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// One requested resource: where to get it and what to call it
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchRequest {
    /// Origin URL
    pub url: String,
    /// Target filename inside the archive (or for the final save)
    pub filename: String,
}

impl FetchRequest {
    /// Create a request with an explicit target filename
    pub fn new(url: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            filename: filename.into(),
        }
    }

    /// Create a request whose filename is the last segment of the URL path
    pub fn from_url(url: impl Into<String>) -> Self {
        let url = url.into();
        let filename = crate::utils::filename_from_url(&url);
        Self { url, filename }
    }
}

/// The unit flowing through the pipeline
///
/// `source` and `filename` are always present; `payload` is the only optional
/// part and its absence is the only signal that the entry failed.
#[derive(Clone, Debug, PartialEq)]
pub struct Entry<P> {
    source: String,
    filename: String,
    payload: Option<P>,
}

impl<P> Entry<P> {
    /// An entry that has not (or could not) be resolved
    pub fn unresolved(source: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            filename: filename.into(),
            payload: None,
        }
    }

    /// An entry carrying its payload
    pub fn resolved(source: impl Into<String>, filename: impl Into<String>, payload: P) -> Self {
        Self {
            source: source.into(),
            filename: filename.into(),
            payload: Some(payload),
        }
    }

    /// Origin URL
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Target filename
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Payload, if the entry resolved
    pub fn payload(&self) -> Option<&P> {
        self.payload.as_ref()
    }

    /// Whether the entry carries a payload
    pub fn is_resolved(&self) -> bool {
        self.payload.is_some()
    }

    /// Split into source, filename and payload
    pub fn into_parts(self) -> (String, String, Option<P>) {
        (self.source, self.filename, self.payload)
    }
}

impl<P> From<&FetchRequest> for Entry<P> {
    fn from(request: &FetchRequest) -> Self {
        Entry::unresolved(request.url.clone(), request.filename.clone())
    }
}

/// Ordered outcome of a batch fetch; one entry per request, in request order
pub type BatchResult<P> = Vec<Entry<P>>;

/// An immutable binary blob tagged with its media type
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Blob {
    bytes: Bytes,
    media_type: &'static str,
}

impl Blob {
    /// Wrap bytes with a media type
    pub fn new(bytes: impl Into<Bytes>, media_type: &'static str) -> Self {
        Self {
            bytes: bytes.into(),
            media_type,
        }
    }

    /// Concatenate buffered chunks into a single blob
    pub fn from_chunks(chunks: Vec<Bytes>, media_type: &'static str) -> Self {
        let chunks = match <[Bytes; 1]>::try_from(chunks) {
            Ok([only]) => return Self::new(only, media_type),
            Err(chunks) => chunks,
        };
        let total = chunks.iter().map(Bytes::len).sum();
        let mut joined = Vec::with_capacity(total);
        for chunk in &chunks {
            joined.extend_from_slice(chunk);
        }
        Self::new(joined, media_type)
    }

    /// Raw bytes (shared, cheap to clone)
    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    /// Media type, e.g. `application/zip`
    pub fn media_type(&self) -> &'static str {
        self.media_type
    }

    /// Length in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the blob holds no bytes
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl AsRef<[u8]> for Blob {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

/// Why a save ended the way it did
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveReason {
    /// The blob was persisted
    Success,
    /// There was nothing to persist
    Empty,
}

/// Result of a save, returned by every top-level operation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveOutcome {
    /// Whether bytes were persisted
    pub ok: bool,
    /// Outcome classification
    pub reason: SaveReason,
    /// Where the blob was written, when the sink writes to a filesystem
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<PathBuf>,
}

impl SaveOutcome {
    /// Successful save
    pub fn success(location: Option<PathBuf>) -> Self {
        Self {
            ok: true,
            reason: SaveReason::Success,
            location,
        }
    }

    /// Nothing to save
    pub fn empty() -> Self {
        Self {
            ok: false,
            reason: SaveReason::Empty,
            location: None,
        }
    }
}

/// Target raster format
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RasterType {
    /// JPEG
    Jpg,
    /// PNG
    Png,
    /// WebP (lossless)
    Webp,
}

impl RasterType {
    /// File extension without the dot
    pub fn extension(&self) -> &'static str {
        match self {
            RasterType::Jpg => "jpg",
            RasterType::Png => "png",
            RasterType::Webp => "webp",
        }
    }

    /// Media type string
    pub fn media_type(&self) -> &'static str {
        match self {
            RasterType::Jpg => "image/jpeg",
            RasterType::Png => "image/png",
            RasterType::Webp => "image/webp",
        }
    }

    /// Short format name for messages
    pub fn name(&self) -> &'static str {
        match self {
            RasterType::Jpg => "JPEG",
            RasterType::Png => "PNG",
            RasterType::Webp => "WebP",
        }
    }
}

impl FromStr for RasterType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Ok(RasterType::Jpg),
            "png" => Ok(RasterType::Png),
            "webp" => Ok(RasterType::Webp),
            _ => Err(Error::config(
                "raster_type",
                format!("unknown raster type '{s}' (expected JPG, PNG or WEBP)"),
            )),
        }
    }
}

impl fmt::Display for RasterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Target video container
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoType {
    /// Matroska
    Mkv,
    /// MPEG-4 (fragmented)
    Mp4,
    /// WebM
    Webm,
}

impl VideoType {
    /// File extension without the dot
    pub fn extension(&self) -> &'static str {
        match self {
            VideoType::Mkv => "mkv",
            VideoType::Mp4 => "mp4",
            VideoType::Webm => "webm",
        }
    }

    /// Media type string
    pub fn media_type(&self) -> &'static str {
        match self {
            VideoType::Mkv => "video/x-matroska",
            VideoType::Mp4 => "video/mp4",
            VideoType::Webm => "video/webm",
        }
    }
}

impl FromStr for VideoType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "mkv" | "matroska" => Ok(VideoType::Mkv),
            "mp4" => Ok(VideoType::Mp4),
            "webm" => Ok(VideoType::Webm),
            _ => Err(Error::config(
                "video_type",
                format!("unknown video type '{s}' (expected MKV, MP4 or WEBM)"),
            )),
        }
    }
}

impl fmt::Display for VideoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.media_type())
    }
}

/// Event emitted while a top-level operation runs
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A batch fetch started
    BatchStarted {
        /// Number of requests
        total: usize,
    },

    /// One request settled
    EntryResolved {
        /// Position in the request sequence
        index: usize,
        /// Target filename
        filename: String,
        /// Whether a payload was obtained
        ok: bool,
    },

    /// Every request in the batch settled
    BatchFinished {
        /// Entries with a payload
        succeeded: usize,
        /// Entries without a payload
        failed: usize,
    },

    /// Images were re-encoded
    Encoded {
        /// Entries successfully encoded
        succeeded: usize,
        /// Target format
        target: RasterType,
    },

    /// A video capture was requested
    CaptureRequested {
        /// Frames in the sequence
        frames: usize,
        /// Playback rate
        fps: u32,
    },

    /// A video capture completed
    CaptureFinished {
        /// Size of the produced video
        bytes: usize,
        /// Container media type
        media_type: String,
    },

    /// An archive was serialized
    ArchiveBuilt {
        /// Payload entries in the archive
        entries: usize,
        /// Serialized size
        bytes: usize,
    },

    /// A blob was saved
    Saved {
        /// Requested filename
        filename: String,
        /// Bytes written
        bytes: usize,
    },

    /// An operation ended with nothing to save
    NothingToSave {
        /// Requested filename
        filename: String,
    },
}

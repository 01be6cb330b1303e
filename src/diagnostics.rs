//! Diagnostic log sink
//!
//! Every stage of the pipeline reports what happened to each entry as a
//! [`LogRecord`] carrying a stable [`Code`]. Records accumulate in a
//! [`LogSink`] owned by the downloader and are embedded in the final archive,
//! so a fully failed batch still produces a readable forensic trail.
//!
//! Each record is also forwarded to `tracing` at the matching level.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::ops::{Bound, RangeBounds};
use std::sync::{Arc, Mutex, MutexGuard};

/// Severity of a diagnostic record
///
/// Ordered from least to most severe. `Unknown` sorts after `Fatal`, so a
/// `Debug..=Fatal` range excludes it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    /// Verbose detail
    Debug,
    /// Normal progress
    Info,
    /// Recoverable anomaly
    Warn,
    /// An entry failed
    Error,
    /// An operation could not run at all
    Fatal,
    /// Unclassified
    Unknown,
}

impl Severity {
    /// Upper-case label used in the formatted log
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
            Severity::Fatal => "FATAL",
            Severity::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable diagnostic codes
///
/// The numeric value ([`Code::as_u16`]) is part of the log format and must not
/// change between releases.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Code {
    /// Resource fetched with status 200
    FetchOk,
    /// Resource fetched with a non-canonical success status
    FetchOkNonCanonical,
    /// Transport failure
    NetworkError,
    /// Failure status from the server
    HttpError,
    /// Body or image could not be materialized
    DecodeError,
    /// Image fetched and decoded
    ImageLoaded,
    /// Image load abandoned
    ImageAborted,
    /// Batch settled
    BatchSummary,
    /// Image re-encoded
    Encoded,
    /// Image re-encoding failed
    EncodeError,
    /// Entry without payload skipped by the encoder
    EncodeSkipped,
    /// Encoder produced nothing
    NoImagesEncoded,
    /// Capture requested
    CaptureArmed,
    /// Recording started on frame 0
    CaptureStarted,
    /// Recording finished on the last frame
    CaptureFinished,
    /// Recorder could not be created
    CaptureInitError,
    /// Recorder failed during capture
    CaptureError,
    /// Entry added to the archive
    ArchiveEntryAdded,
    /// Entry without payload left out of the archive
    ArchiveEntrySkipped,
    /// Entry renamed to avoid a name clash
    ArchiveEntryRenamed,
    /// Archive requested for an empty input sequence
    ArchiveEmptyInput,
    /// Archive has no payload entries
    ArchiveNoContent,
    /// Archive serialized
    ArchiveBuilt,
    /// Blob persisted
    Saved,
    /// Nothing to persist
    SaveEmpty,
}

impl Code {
    /// Numeric code as written in the log
    pub fn as_u16(&self) -> u16 {
        match self {
            Code::FetchOk => 1000,
            Code::FetchOkNonCanonical => 1001,
            Code::NetworkError => 1100,
            Code::HttpError => 1101,
            Code::DecodeError => 1102,
            Code::ImageLoaded => 1200,
            Code::ImageAborted => 1202,
            Code::BatchSummary => 1300,
            Code::Encoded => 2000,
            Code::EncodeError => 2100,
            Code::EncodeSkipped => 2101,
            Code::NoImagesEncoded => 2102,
            Code::CaptureArmed => 3000,
            Code::CaptureStarted => 3001,
            Code::CaptureFinished => 3002,
            Code::CaptureInitError => 3100,
            Code::CaptureError => 3101,
            Code::ArchiveEntryAdded => 4000,
            Code::ArchiveEntrySkipped => 4100,
            Code::ArchiveEntryRenamed => 4101,
            Code::ArchiveEmptyInput => 4102,
            Code::ArchiveNoContent => 4103,
            Code::ArchiveBuilt => 4200,
            Code::Saved => 5000,
            Code::SaveEmpty => 5100,
        }
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u16())
    }
}

/// A single diagnostic record
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    /// When the record was emitted
    pub timestamp: DateTime<Utc>,
    /// Record severity
    pub severity: Severity,
    /// Emitting module (e.g., "fetch", "archive")
    pub module: String,
    /// Stable diagnostic code
    pub code: Code,
    /// Human-readable message
    pub message: String,
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] {}/{}: {}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            self.severity,
            self.module,
            self.code,
            self.message
        )
    }
}

/// Filter over log records
///
/// All criteria are combined with AND; unset criteria match everything.
///
/// ```
/// use bundle_dl::diagnostics::{Code, LogQuery, Severity};
///
/// let query = LogQuery::new()
///     .severity(Severity::Warn..=Severity::Fatal)
///     .codes([Code::HttpError, Code::NetworkError])
///     .module("fetch");
/// # let _ = query;
/// ```
#[derive(Clone, Debug)]
pub struct LogQuery {
    time: (Bound<DateTime<Utc>>, Bound<DateTime<Utc>>),
    severity: (Bound<Severity>, Bound<Severity>),
    codes: Option<HashSet<Code>>,
    module: Option<String>,
}

impl Default for LogQuery {
    fn default() -> Self {
        Self {
            time: (Bound::Unbounded, Bound::Unbounded),
            severity: (Bound::Unbounded, Bound::Unbounded),
            codes: None,
            module: None,
        }
    }
}

impl LogQuery {
    /// Query matching every record
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to records emitted within a time range
    pub fn time(mut self, range: impl RangeBounds<DateTime<Utc>>) -> Self {
        self.time = (range.start_bound().cloned(), range.end_bound().cloned());
        self
    }

    /// Restrict to a severity range; bounds may be inclusive or exclusive
    pub fn severity(mut self, range: impl RangeBounds<Severity>) -> Self {
        self.severity = (range.start_bound().cloned(), range.end_bound().cloned());
        self
    }

    /// Restrict to a set of codes
    pub fn codes(mut self, codes: impl IntoIterator<Item = Code>) -> Self {
        self.codes = Some(codes.into_iter().collect());
        self
    }

    /// Restrict to a single emitting module
    pub fn module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    /// Whether a record satisfies every criterion
    pub fn matches(&self, record: &LogRecord) -> bool {
        self.time.contains(&record.timestamp)
            && self.severity.contains(&record.severity)
            && self
                .codes
                .as_ref()
                .is_none_or(|codes| codes.contains(&record.code))
            && self
                .module
                .as_deref()
                .is_none_or(|module| module == record.module)
    }
}

/// Shared, append-only diagnostic log
///
/// Cloning a `LogSink` yields another handle to the same log; each pipeline
/// component holds one. Records keep emission order.
#[derive(Clone, Debug, Default)]
pub struct LogSink {
    records: Arc<Mutex<Vec<LogRecord>>>,
}

impl LogSink {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<LogRecord>> {
        // A panic while holding the lock cannot leave a Vec half-pushed
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append a record and forward it to `tracing`
    pub fn record(&self, severity: Severity, module: &str, code: Code, message: impl Into<String>) {
        let message = message.into();
        let code_num = code.as_u16();
        match severity {
            Severity::Debug => tracing::debug!(module, code = code_num, "{}", message),
            Severity::Info => tracing::info!(module, code = code_num, "{}", message),
            Severity::Warn => tracing::warn!(module, code = code_num, "{}", message),
            Severity::Error | Severity::Fatal => {
                tracing::error!(module, code = code_num, severity = %severity, "{}", message)
            }
            Severity::Unknown => tracing::trace!(module, code = code_num, "{}", message),
        }

        self.lock().push(LogRecord {
            timestamp: Utc::now(),
            severity,
            module: module.to_string(),
            code,
            message,
        });
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no record has been emitted yet
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Snapshot of every record in emission order
    pub fn records(&self) -> Vec<LogRecord> {
        self.lock().clone()
    }

    /// Records matching a query, in emission order
    pub fn query(&self, query: &LogQuery) -> Vec<LogRecord> {
        self.lock()
            .iter()
            .filter(|record| query.matches(record))
            .cloned()
            .collect()
    }

    /// Plain-text rendering, one record per line
    pub fn format(&self) -> String {
        self.lock()
            .iter()
            .map(|record| format!("{record}\n"))
            .collect()
    }
}

//! Top-level downloader split into focused submodules.
//!
//! The `BundleDownloader` struct owns the shared pieces (configuration, HTTP
//! client, diagnostic log, output sink, recorder factory, event channel) and
//! its operations are organized by pipeline:
//! - [`bundle`] - Fetch raw resources into an archive
//! - [`convert`] - Fetch images, re-encode them, archive the results
//! - [`video`] - Fetch images and assemble a video

mod bundle;
mod convert;
mod video;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use crate::archive::ArchiveBuilder;
use crate::batch::BatchLoader;
use crate::capture::{FfmpegRecorderFactory, RecorderFactory};
use crate::config::Config;
use crate::diagnostics::LogSink;
use crate::error::Result;
use crate::fetch::{ImageFetcher, ResourceFetcher};
use crate::output::{DirectorySink, OutputSink};
use crate::types::{Blob, Entry, Event, SaveOutcome};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Main downloader instance (cloneable - all fields are Arc-wrapped or cheap handles)
#[derive(Clone)]
pub struct BundleDownloader {
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Fetcher sharing one HTTP client and request template
    pub(crate) fetcher: ResourceFetcher,
    /// Diagnostic log, accumulated across every operation of this instance
    pub(crate) log: LogSink,
    /// Where finished blobs are persisted
    pub(crate) sink: Arc<dyn OutputSink>,
    /// Opens video recorders
    pub(crate) recorders: Arc<dyn RecorderFactory>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
}

impl std::fmt::Debug for BundleDownloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BundleDownloader")
            .field("config", &self.config)
            .field("recorders", &self.recorders.name())
            .field("log_records", &self.log.len())
            .finish()
    }
}

impl BundleDownloader {
    /// Create a new BundleDownloader instance
    ///
    /// Validates the configuration, builds the HTTP client and request
    /// template, and resolves the `ffmpeg` binary for video capture. A
    /// missing binary is not an error here; video operations fail later
    /// with a capture-initialization error.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let log = LogSink::new();
        let fetcher = ResourceFetcher::from_config(&config, log.clone())?;
        let sink: Arc<dyn OutputSink> =
            Arc::new(DirectorySink::new(config.output.clone(), log.clone()));
        let recorders: Arc<dyn RecorderFactory> =
            Arc::new(FfmpegRecorderFactory::from_config(&config.capture));

        // Buffer of 1000 events per subscriber
        let (event_tx, _rx) = broadcast::channel(1000);

        tracing::info!(
            output_dir = %config.output.output_dir.display(),
            recorder = recorders.name(),
            max_concurrent = ?config.fetch.max_concurrent,
            "bundle downloader initialized"
        );

        Ok(Self {
            config: Arc::new(config),
            fetcher,
            log,
            sink,
            recorders,
            event_tx,
        })
    }

    /// Replace the output sink
    pub fn with_sink(mut self, sink: Arc<dyn OutputSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Replace the recorder factory used for video assembly
    pub fn with_recorder_factory(mut self, recorders: Arc<dyn RecorderFactory>) -> Self {
        self.recorders = recorders;
        self
    }

    /// Subscribe to pipeline events
    ///
    /// Multiple subscribers are supported. Each subscriber receives all events independently.
    /// A subscriber that falls more than 1000 events behind receives `RecvError::Lagged`.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Get the current configuration
    pub fn get_config(&self) -> Arc<Config> {
        self.config.clone()
    }

    /// Diagnostic log shared by every operation of this downloader
    pub fn log(&self) -> &LogSink {
        &self.log
    }

    pub(crate) fn emit_event(&self, event: Event) {
        // send() returns Err if there are no receivers, which is fine - we just drop the event
        self.event_tx.send(event).ok();
    }

    pub(crate) fn batch_loader(&self) -> BatchLoader {
        BatchLoader::new(self.config.fetch.max_concurrent, self.log.clone())
            .with_events(self.event_tx.clone())
    }

    pub(crate) fn image_fetcher(&self) -> ImageFetcher {
        ImageFetcher::new(self.fetcher.clone())
    }

    /// Build and serialize an archive, announcing it when there is one
    pub(crate) fn build_archive<P: AsRef<[u8]>>(
        &self,
        entries: &[Entry<P>],
        manifest: Option<&str>,
    ) -> Result<Option<Blob>> {
        let builder = ArchiveBuilder::new(self.config.archive.clone(), self.log.clone());
        let archive = builder.build(entries, manifest);
        let entries_added = archive.payload_count();
        let blob = archive.to_blob()?;
        if let Some(blob) = &blob {
            self.emit_event(Event::ArchiveBuilt {
                entries: entries_added,
                bytes: blob.len(),
            });
        }
        Ok(blob)
    }

    /// Hand a blob to the output sink and announce the outcome
    pub(crate) async fn save(&self, blob: Option<Blob>, filename: &str) -> Result<SaveOutcome> {
        let outcome = self.sink.save(blob.as_ref(), filename).await?;
        if outcome.ok {
            self.emit_event(Event::Saved {
                filename: filename.to_string(),
                bytes: blob.as_ref().map_or(0, Blob::len),
            });
        } else {
            self.emit_event(Event::NothingToSave {
                filename: filename.to_string(),
            });
        }
        Ok(outcome)
    }
}

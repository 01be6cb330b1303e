//! Persisting the final blob
//!
//! [`OutputSink`] is the seam between the pipeline and wherever results end
//! up. [`DirectorySink`] writes into a local directory.

use crate::config::OutputConfig;
use crate::diagnostics::{Code, LogSink, Severity};
use crate::error::Result;
use crate::types::{Blob, SaveOutcome};
use crate::utils::{get_unique_path, sanitize_filename};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

const MODULE: &str = "output";

/// Destination for a finished blob
///
/// An absent or empty blob is not an error: implementations report
/// [`SaveOutcome::empty`]. `Err` is reserved for failures of the destination
/// itself.
#[async_trait]
pub trait OutputSink: Send + Sync {
    /// Persist `blob` under `filename`
    async fn save(&self, blob: Option<&Blob>, filename: &str) -> Result<SaveOutcome>;
}

/// Writes blobs into a directory
///
/// Bytes go to a hidden staging file first and are renamed into place, so a
/// reader never observes a half-written result. A staging file left behind
/// by a failed rename is removed once the release delay has passed.
#[derive(Clone, Debug)]
pub struct DirectorySink {
    config: OutputConfig,
    log: LogSink,
}

impl DirectorySink {
    /// Create a sink for the configured output directory
    pub fn new(config: OutputConfig, log: LogSink) -> Self {
        Self { config, log }
    }

    /// Target directory
    pub fn output_dir(&self) -> &Path {
        &self.config.output_dir
    }

    fn staging_path(target: &Path) -> PathBuf {
        let name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        target.with_file_name(format!(".{}.part", name))
    }

    fn release_later(&self, staging: PathBuf) {
        let delay = self.config.release_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = tokio::fs::remove_file(&staging).await
                && e.kind() != std::io::ErrorKind::NotFound
            {
                tracing::warn!(path = ?staging, error = %e, "failed to remove staging file");
            }
        });
    }
}

#[async_trait]
impl OutputSink for DirectorySink {
    async fn save(&self, blob: Option<&Blob>, filename: &str) -> Result<SaveOutcome> {
        let Some(blob) = blob.filter(|b| !b.is_empty()) else {
            self.log.record(
                Severity::Warn,
                MODULE,
                Code::SaveEmpty,
                format!("{}: nothing to save", filename),
            );
            return Ok(SaveOutcome::empty());
        };

        tokio::fs::create_dir_all(&self.config.output_dir).await?;
        let wanted = self.config.output_dir.join(sanitize_filename(filename));
        let target = get_unique_path(&wanted, self.config.file_collision)?;
        let staging = Self::staging_path(&target);

        let written = match tokio::fs::write(&staging, blob.bytes()).await {
            Ok(()) => tokio::fs::rename(&staging, &target).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            tracing::error!(path = ?target, error = %e, "save failed");
            self.release_later(staging);
            return Err(e.into());
        }

        self.log.record(
            Severity::Info,
            MODULE,
            Code::Saved,
            format!(
                "{}: saved {} bytes ({}) to {}",
                filename,
                blob.len(),
                blob.media_type(),
                target.display()
            ),
        );
        Ok(SaveOutcome::success(Some(target)))
    }
}

//! ZIP archive assembly
//!
//! The builder turns a batch into an [`Archive`]: payload entries in input
//! order, then the optional manifest, then the optional diagnostic log.
//! Serialization is deterministic (fixed timestamps, compression and
//! permissions), so the same input always yields the same bytes.

use crate::config::ArchiveConfig;
use crate::diagnostics::{Code, LogSink, Severity};
use crate::error::Result;
use crate::types::{Blob, Entry};
use crate::utils::{numbered_name, sanitize_filename};
use std::collections::HashSet;
use std::io::{Cursor, Write};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

const MODULE: &str = "archive";

/// Media type of a serialized archive
pub const ZIP_MEDIA_TYPE: &str = "application/zip";

/// Builds archives from batch results
#[derive(Clone, Debug)]
pub struct ArchiveBuilder {
    config: ArchiveConfig,
    log: LogSink,
}

/// A named set of entries ready to be serialized
#[derive(Debug)]
pub struct Archive<'a> {
    entries: Vec<(String, &'a [u8])>,
    manifest: Option<(String, String)>,
    log_text: Option<(String, String)>,
    log: LogSink,
}

impl ArchiveBuilder {
    /// Create a builder
    pub fn new(config: ArchiveConfig, log: LogSink) -> Self {
        Self { config, log }
    }

    /// Build an archive, embedding the accumulated diagnostic log
    ///
    /// The log is captured after this call's own diagnostics, so skipped
    /// entries are explained inside the archive itself.
    pub fn build<'a, P: AsRef<[u8]>>(
        &self,
        entries: &'a [Entry<P>],
        manifest: Option<&str>,
    ) -> Archive<'a> {
        let mut archive = self.collect(entries, manifest);
        if self.config.embed_log {
            let text = self.log.format();
            if !text.is_empty() {
                archive.log_text = Some((self.config.log_name.clone(), text));
            }
        }
        archive
    }

    /// Build an archive with caller-supplied log text instead of the sink contents
    ///
    /// Empty text embeds no log entry.
    pub fn build_with_log_text<'a, P: AsRef<[u8]>>(
        &self,
        entries: &'a [Entry<P>],
        manifest: Option<&str>,
        log_text: &str,
    ) -> Archive<'a> {
        let mut archive = self.collect(entries, manifest);
        if !log_text.is_empty() {
            archive.log_text = Some((self.config.log_name.clone(), log_text.to_string()));
        }
        archive
    }

    fn collect<'a, P: AsRef<[u8]>>(
        &self,
        entries: &'a [Entry<P>],
        manifest: Option<&str>,
    ) -> Archive<'a> {
        if entries.is_empty() {
            self.log.record(
                Severity::Warn,
                MODULE,
                Code::ArchiveEmptyInput,
                "archive requested for an empty entry sequence",
            );
        }

        let mut taken: HashSet<String> = [
            self.config.manifest_name.clone(),
            self.config.log_name.clone(),
        ]
        .into_iter()
        .collect();
        let mut added = Vec::new();

        for entry in entries {
            let Some(payload) = entry.payload() else {
                self.log.record(
                    Severity::Warn,
                    MODULE,
                    Code::ArchiveEntrySkipped,
                    format!("{}: no payload, left out of the archive", entry.filename()),
                );
                continue;
            };

            let wanted = sanitize_filename(entry.filename());
            let name = if taken.contains(&wanted) {
                let renamed = (1..)
                    .map(|n| numbered_name(&wanted, n))
                    .find(|candidate| !taken.contains(candidate))
                    .unwrap_or_else(|| wanted.clone());
                self.log.record(
                    Severity::Info,
                    MODULE,
                    Code::ArchiveEntryRenamed,
                    format!("{}: name already used, stored as {}", wanted, renamed),
                );
                renamed
            } else {
                wanted
            };

            self.log.record(
                Severity::Debug,
                MODULE,
                Code::ArchiveEntryAdded,
                format!("{}: added ({} bytes)", name, payload.as_ref().len()),
            );
            taken.insert(name.clone());
            added.push((name, payload.as_ref()));
        }

        if added.is_empty() && !entries.is_empty() {
            self.log.record(
                Severity::Warn,
                MODULE,
                Code::ArchiveNoContent,
                format!("none of the {} entries had content", entries.len()),
            );
        }

        let manifest = match manifest {
            Some(text) if !added.is_empty() => {
                Some((self.config.manifest_name.clone(), text.to_string()))
            }
            _ => None,
        };

        Archive {
            entries: added,
            manifest,
            log_text: None,
            log: self.log.clone(),
        }
    }
}

impl Archive<'_> {
    /// Payload entries in the archive
    pub fn payload_count(&self) -> usize {
        self.entries.len()
    }

    /// Whether at least one payload entry was added
    pub fn has_content(&self) -> bool {
        !self.entries.is_empty()
    }

    /// Entry names in serialization order, manifest and log included
    pub fn file_names(&self) -> Vec<&str> {
        self.entries
            .iter()
            .map(|(name, _)| name.as_str())
            .chain(self.manifest.iter().map(|(name, _)| name.as_str()))
            .chain(self.log_text.iter().map(|(name, _)| name.as_str()))
            .collect()
    }

    /// Serialize to a ZIP blob; `None` when there is no entry at all
    pub fn to_blob(&self) -> Result<Option<Blob>> {
        if self.entries.is_empty() && self.manifest.is_none() && self.log_text.is_none() {
            return Ok(None);
        }

        let options = FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(zip::DateTime::default())
            .unix_permissions(0o644);

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, bytes) in &self.entries {
            writer.start_file(name.as_str(), options)?;
            writer.write_all(bytes)?;
        }
        for (name, text) in self.manifest.iter().chain(self.log_text.iter()) {
            writer.start_file(name.as_str(), options)?;
            writer.write_all(text.as_bytes())?;
        }
        let bytes = writer.finish()?.into_inner();

        self.log.record(
            Severity::Info,
            MODULE,
            Code::ArchiveBuilt,
            format!(
                "archive built with {} entries ({} bytes)",
                self.entries.len(),
                bytes.len()
            ),
        );
        Ok(Some(Blob::new(bytes, ZIP_MEDIA_TYPE)))
    }
}

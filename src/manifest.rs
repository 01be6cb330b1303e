//! Human-readable listing of the intended archive contents
//!
//! The manifest lists every requested file, including the ones that could
//! not be obtained, so a reader can tell at a glance what is missing. It
//! carries no timestamp; the same batch always renders the same text.

use crate::types::Entry;
use sha2::{Digest, Sha256};
use std::fmt::Write as _;

#[derive(Clone, Debug, PartialEq, Eq)]
struct Line {
    filename: String,
    source: String,
    content: Option<(usize, String)>,
}

/// Manifest under construction
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Manifest {
    title: String,
    lines: Vec<Line>,
}

impl Manifest {
    /// Start an empty manifest
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            lines: Vec::new(),
        }
    }

    /// Build a manifest listing every entry of a batch
    pub fn from_entries<P: AsRef<[u8]>>(title: impl Into<String>, entries: &[Entry<P>]) -> Self {
        let mut manifest = Self::new(title);
        for entry in entries {
            manifest.push(
                entry.filename(),
                entry.source(),
                entry.payload().map(|p| p.as_ref()),
            );
        }
        manifest
    }

    /// List one file; `None` content marks it missing
    pub fn push(&mut self, filename: &str, source: &str, content: Option<&[u8]>) {
        let content = content.map(|bytes| (bytes.len(), format!("{:x}", Sha256::digest(bytes))));
        self.lines.push(Line {
            filename: filename.to_string(),
            source: source.to_string(),
            content,
        });
    }

    /// Files listed
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether nothing is listed
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Files listed with content
    pub fn available(&self) -> usize {
        self.lines.iter().filter(|l| l.content.is_some()).count()
    }

    /// Render as plain text
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", self.title);
        let _ = writeln!(out, "{}", "=".repeat(self.title.chars().count()));
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "Requested: {}, available: {}, missing: {}",
            self.len(),
            self.available(),
            self.len() - self.available()
        );
        let _ = writeln!(out);

        for line in &self.lines {
            match &line.content {
                Some((size, sha256)) => {
                    let _ = writeln!(out, "{}", line.filename);
                    let _ = writeln!(out, "    source: {}", line.source);
                    let _ = writeln!(out, "    size:   {} bytes", size);
                    let _ = writeln!(out, "    sha256: {}", sha256);
                }
                None => {
                    let _ = writeln!(out, "{} [MISSING]", line.filename);
                    let _ = writeln!(out, "    source: {}", line.source);
                }
            }
        }
        out
    }
}

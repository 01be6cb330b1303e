//! Utility functions for filenames and output paths

use crate::config::FileCollisionAction;
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// Maximum number of rename attempts when resolving file collisions
const MAX_RENAME_ATTEMPTS: u32 = 9999;

/// Fallback name for URLs without a usable path segment
const FALLBACK_FILENAME: &str = "download";

/// Build the `name (n).ext` variant of a filename
pub(crate) fn numbered_name(name: &str, n: u32) -> String {
    let path = Path::new(name);
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or(name);
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{} ({}).{}", stem, n, ext),
        None => format!("{} ({})", stem, n),
    }
}

/// Get a unique path for a file, handling collisions according to the specified action
///
/// # Arguments
///
/// * `path` - The desired file path
/// * `action` - How to handle file collisions
///
/// # Returns
///
/// Returns the final path to use. For Rename action, this may have a suffix added.
/// For Skip action, returns an error if the file already exists.
/// For Overwrite action, returns the original path unchanged.
///
/// # Examples
///
/// ```
/// use bundle_dl::utils::get_unique_path;
/// use bundle_dl::config::FileCollisionAction;
/// use std::path::Path;
///
/// let path = Path::new("/tmp/bundle.zip");
/// let unique = get_unique_path(path, FileCollisionAction::Rename).unwrap();
/// // If /tmp/bundle.zip exists, returns /tmp/bundle (1).zip
/// ```
pub fn get_unique_path(path: &Path, action: FileCollisionAction) -> Result<PathBuf> {
    match action {
        FileCollisionAction::Overwrite => Ok(path.to_path_buf()),
        FileCollisionAction::Skip => {
            if path.exists() {
                return Err(Error::FileCollision {
                    path: path.to_path_buf(),
                    reason: "file already exists and collision action is skip".to_string(),
                });
            }
            Ok(path.to_path_buf())
        }
        FileCollisionAction::Rename => {
            if !path.exists() {
                return Ok(path.to_path_buf());
            }

            let name = path.file_name().and_then(|n| n.to_str()).ok_or_else(|| {
                Error::FileCollision {
                    path: path.to_path_buf(),
                    reason: "cannot extract file name".to_string(),
                }
            })?;
            let parent = path.parent().unwrap_or_else(|| Path::new(""));

            for i in 1..=MAX_RENAME_ATTEMPTS {
                let candidate = parent.join(numbered_name(name, i));
                if !candidate.exists() {
                    return Ok(candidate);
                }
            }

            Err(Error::FileCollision {
                path: path.to_path_buf(),
                reason: format!(
                    "could not find unique filename after {} attempts",
                    MAX_RENAME_ATTEMPTS
                ),
            })
        }
    }
}

/// Reduce a caller-supplied filename to a single safe path component
///
/// Path separators become `_`, control characters are dropped, and names that
/// would escape the target directory (`..`, empty) fall back to `download`.
///
/// ```
/// use bundle_dl::utils::sanitize_filename;
///
/// assert_eq!(sanitize_filename("../etc/passwd"), ".._etc_passwd");
/// assert_eq!(sanitize_filename("frame 01.png"), "frame 01.png");
/// assert_eq!(sanitize_filename(".."), "download");
/// ```
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| match c {
            '/' | '\\' | ':' => '_',
            other => other,
        })
        .collect();
    let cleaned = cleaned.trim();

    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        FALLBACK_FILENAME.to_string()
    } else {
        cleaned.to_string()
    }
}

/// Derive a filename from the last path segment of a URL
///
/// Percent-encoding is decoded. Falls back to `download` when the URL cannot
/// be parsed or has no final segment.
///
/// ```
/// use bundle_dl::utils::filename_from_url;
///
/// assert_eq!(filename_from_url("https://x/img/frame%2001.png?v=2"), "frame 01.png");
/// assert_eq!(filename_from_url("https://x/"), "download");
/// ```
#[must_use]
pub fn filename_from_url(url: &str) -> String {
    if let Ok(parsed_url) = url::Url::parse(url)
        && let Some(mut segments) = parsed_url.path_segments()
        && let Some(last_segment) = segments.next_back()
        && !last_segment.is_empty()
    {
        let decoded = urlencoding::decode(last_segment)
            .map(|s| s.into_owned())
            .unwrap_or_else(|_| last_segment.to_string());
        return sanitize_filename(&decoded);
    }

    FALLBACK_FILENAME.to_string()
}

/// Replace (or add) the extension of a filename
///
/// ```
/// use bundle_dl::utils::replace_extension;
///
/// assert_eq!(replace_extension("frame.jpg", "png"), "frame.png");
/// assert_eq!(replace_extension("frame", "webp"), "frame.webp");
/// ```
#[must_use]
pub fn replace_extension(filename: &str, extension: &str) -> String {
    Path::new(filename)
        .with_extension(extension)
        .to_string_lossy()
        .into_owned()
}

/// Add an extension unless the filename already ends with it (case-insensitive)
///
/// ```
/// use bundle_dl::utils::ensure_extension;
///
/// assert_eq!(ensure_extension("bundle", "zip"), "bundle.zip");
/// assert_eq!(ensure_extension("bundle.ZIP", "zip"), "bundle.ZIP");
/// ```
#[must_use]
pub fn ensure_extension(filename: &str, extension: &str) -> String {
    let has_extension = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(extension));
    if has_extension {
        filename.to_string()
    } else {
        format!("{}.{}", filename, extension)
    }
}

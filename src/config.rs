//! Configuration types for bundle-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, path::Path, path::PathBuf, time::Duration};

/// Main configuration for [`BundleDownloader`](crate::BundleDownloader)
///
/// Every section has sensible defaults, so `Config::default()` works out of the
/// box: unauthenticated GET requests, 30 second fetch timeout, archives with a
/// `README.txt` manifest and a `log.txt` operation log written to
/// `./downloads`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Fetch behaviour (timeouts, concurrency)
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Request options applied to every fetch
    #[serde(default)]
    pub request: RequestConfig,

    /// Raster re-encoding settings
    #[serde(default)]
    pub encode: EncodeConfig,

    /// Video capture settings
    #[serde(default)]
    pub capture: CaptureConfig,

    /// Archive layout
    #[serde(default)]
    pub archive: ArchiveConfig,

    /// Where and how results are saved
    #[serde(default)]
    pub output: OutputConfig,
}

impl Config {
    /// Parse a configuration from JSON, applying defaults for missing fields
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a JSON file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Check values that deserialize fine but cannot work
    pub fn validate(&self) -> Result<()> {
        if self.capture.fps == 0 {
            return Err(Error::config("capture.fps", "fps must be greater than zero"));
        }
        if self.fetch.timeout.is_some_and(|t| t.is_zero()) {
            return Err(Error::config(
                "fetch.timeout",
                "timeout must be greater than zero (use null to wait indefinitely)",
            ));
        }
        if self.fetch.max_concurrent == Some(0) {
            return Err(Error::config(
                "fetch.max_concurrent",
                "concurrency cap must be greater than zero (use null for unbounded)",
            ));
        }
        if self.encode.jpeg_quality == 0 || self.encode.jpeg_quality > 100 {
            return Err(Error::config(
                "encode.jpeg_quality",
                "JPEG quality must be between 1 and 100",
            ));
        }
        if self.archive.manifest_name.trim().is_empty() {
            return Err(Error::config("archive.manifest_name", "manifest name is empty"));
        }
        if self.archive.log_name.trim().is_empty() {
            return Err(Error::config("archive.log_name", "log name is empty"));
        }
        if self.archive.manifest_name == self.archive.log_name {
            return Err(Error::config(
                "archive.log_name",
                "manifest and log must use different entry names",
            ));
        }
        self.request.prepare()?;
        Ok(())
    }
}

/// Fetch behaviour
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Per-fetch timeout in seconds, fractions allowed; `None` waits indefinitely (default: 30)
    #[serde(default = "default_fetch_timeout", with = "optional_secs_f64_serde")]
    pub timeout: Option<Duration>,

    /// Maximum requests in flight per batch; `None` launches all at once
    #[serde(default)]
    pub max_concurrent: Option<usize>,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: default_fetch_timeout(),
            max_concurrent: None,
            user_agent: default_user_agent(),
        }
    }
}

/// Whether credentials (cookies, authorization) accompany requests
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Credentials {
    /// Strip credential headers (default)
    #[default]
    Omit,
    /// Send configured credential headers
    Include,
}

/// Request mode
///
/// Only meaningful inside a browser; kept so request descriptions written for
/// one round-trip unchanged.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestMode {
    /// Cross-origin request with CORS (default)
    #[default]
    Cors,
    /// Opaque cross-origin request
    NoCors,
}

/// Cache directive sent with requests
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CacheMode {
    /// No directive (default)
    #[default]
    Default,
    /// `Cache-Control: no-store`
    NoStore,
    /// `Cache-Control: no-cache` plus `Pragma: no-cache`
    Reload,
    /// `Cache-Control: max-age=0`
    NoCache,
    /// `Cache-Control: max-stale`
    ForceCache,
}

/// Referrer policy applied to the configured referrer
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReferrerPolicy {
    /// Never send a referrer
    NoReferrer,
    /// Send only the referrer's origin
    Origin,
    /// Full referrer to same origin, origin only cross-origin, nothing on
    /// an https → http downgrade (default)
    #[default]
    StrictOriginWhenCrossOrigin,
    /// Always send the full referrer
    UnsafeUrl,
}

/// Request options applied to every fetch of a batch
///
/// Defaults to a plain, unauthenticated GET.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RequestConfig {
    /// HTTP method (default: "GET")
    #[serde(default = "default_method")]
    pub method: String,

    /// Extra request headers
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Credentials mode
    #[serde(default)]
    pub credentials: Credentials,

    /// Request mode
    #[serde(default)]
    pub mode: RequestMode,

    /// Cache directive
    #[serde(default)]
    pub cache: CacheMode,

    /// Referrer URL
    #[serde(default)]
    pub referrer: Option<String>,

    /// Referrer policy
    #[serde(default)]
    pub referrer_policy: ReferrerPolicy,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            method: default_method(),
            headers: BTreeMap::new(),
            credentials: Credentials::default(),
            mode: RequestMode::default(),
            cache: CacheMode::default(),
            referrer: None,
            referrer_policy: ReferrerPolicy::default(),
        }
    }
}

/// Raster re-encoding settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EncodeConfig {
    /// JPEG quality, 1-100 (default: 92)
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,

    /// Largest surface, in pixels, the encoder will allocate (default: 100 MP)
    #[serde(default = "default_max_pixels")]
    pub max_pixels: u64,
}

impl Default for EncodeConfig {
    fn default() -> Self {
        Self {
            jpeg_quality: default_jpeg_quality(),
            max_pixels: default_max_pixels(),
        }
    }
}

/// Video capture settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Playback rate in frames per second (default: 10)
    #[serde(default = "default_fps")]
    pub fps: u32,

    /// Path to the ffmpeg executable (auto-detected if None)
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    /// Whether to search PATH for ffmpeg if no explicit path is set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            fps: default_fps(),
            ffmpeg_path: None,
            search_path: true,
        }
    }
}

/// Archive layout
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Add a manifest listing the intended contents (default: true)
    #[serde(default = "default_true")]
    pub manifest: bool,

    /// Manifest entry name (default: "README.txt")
    #[serde(default = "default_manifest_name")]
    pub manifest_name: String,

    /// First line of the manifest
    #[serde(default = "default_manifest_title")]
    pub manifest_title: String,

    /// Embed the diagnostic log (default: true)
    #[serde(default = "default_true")]
    pub embed_log: bool,

    /// Log entry name (default: "log.txt")
    #[serde(default = "default_log_name")]
    pub log_name: String,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            manifest: true,
            manifest_name: default_manifest_name(),
            manifest_title: default_manifest_title(),
            embed_log: true,
            log_name: default_log_name(),
        }
    }
}

/// File collision handling when saving
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileCollisionAction {
    /// Append (1), (2), etc. to filename (default)
    #[default]
    Rename,
    /// Overwrite existing file
    Overwrite,
    /// Refuse to save, keep existing
    Skip,
}

/// Where and how results are saved
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Output directory (default: "./downloads")
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// File collision handling
    #[serde(default)]
    pub file_collision: FileCollisionAction,

    /// Delay before an abandoned staging file is removed, in milliseconds (default: 1000)
    #[serde(default = "default_release_delay", with = "millis_serde")]
    pub release_delay: Duration,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            file_collision: FileCollisionAction::default(),
            release_delay: default_release_delay(),
        }
    }
}

fn default_fetch_timeout() -> Option<Duration> {
    Some(Duration::from_secs(30))
}

fn default_user_agent() -> String {
    concat!("bundle-dl/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_jpeg_quality() -> u8 {
    92
}

fn default_max_pixels() -> u64 {
    100_000_000
}

fn default_fps() -> u32 {
    10
}

fn default_true() -> bool {
    true
}

fn default_manifest_name() -> String {
    "README.txt".to_string()
}

fn default_manifest_title() -> String {
    "bundle-dl download manifest".to_string()
}

fn default_log_name() -> String {
    "log.txt".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./downloads")
}

fn default_release_delay() -> Duration {
    Duration::from_millis(1000)
}

// Optional Duration serialization helper (seconds, sub-second precision kept)
mod optional_secs_f64_serde {
    use serde::{Deserialize, Deserializer, Serializer, de::Error};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&d.as_secs_f64()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<f64>::deserialize(deserializer)?
            .map(|secs| Duration::try_from_secs_f64(secs).map_err(D::Error::custom))
            .transpose()
    }
}

// Duration serialization helper (milliseconds)
mod millis_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

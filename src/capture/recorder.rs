//! Recording primitives
//!
//! A [`RecorderFactory`] opens one [`FrameRecorder`] per capture. The
//! production recorder pipes raw RGBA frames into an `ffmpeg` child process
//! and buffers the container bytes it writes to stdout.

use crate::config::CaptureConfig;
use crate::error::CaptureError;
use crate::types::VideoType;
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use image::RgbaImage;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};
use tokio::task::JoinHandle;

const READ_CHUNK: usize = 64 * 1024;

/// Parameters of one recording
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecordingSpec {
    /// Output container
    pub video: VideoType,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Frames per second
    pub fps: u32,
}

/// An open recording that accepts frames until finished
#[async_trait]
pub trait FrameRecorder: Send {
    /// Append one frame; its size must match the recording
    async fn push_frame(&mut self, frame: &RgbaImage) -> Result<(), CaptureError>;

    /// Close the recording and return the buffered container chunks in order
    async fn finish(self: Box<Self>) -> Result<Vec<Bytes>, CaptureError>;
}

/// Opens recorders
#[async_trait]
pub trait RecorderFactory: Send + Sync {
    /// Open a recorder, or fail with [`CaptureError::Unsupported`]
    async fn start(&self, spec: &RecordingSpec) -> Result<Box<dyn FrameRecorder>, CaptureError>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// Records through an external `ffmpeg` binary
#[derive(Clone, Debug)]
pub struct FfmpegRecorderFactory {
    binary_path: Option<PathBuf>,
}

impl FfmpegRecorderFactory {
    /// Use an explicit binary
    pub fn new(binary_path: PathBuf) -> Self {
        Self {
            binary_path: Some(binary_path),
        }
    }

    /// Attempt to find `ffmpeg` in PATH
    pub fn from_path() -> Option<Self> {
        which::which("ffmpeg").ok().map(Self::new)
    }

    /// Resolve the binary from configuration
    ///
    /// Without an explicit path and with PATH search disabled (or fruitless)
    /// the factory still builds, but every `start` fails as unsupported.
    pub fn from_config(config: &CaptureConfig) -> Self {
        let binary_path = config.ffmpeg_path.clone().or_else(|| {
            if config.search_path {
                which::which("ffmpeg").ok()
            } else {
                None
            }
        });
        if binary_path.is_none() {
            tracing::warn!("ffmpeg not found, video capture unavailable");
        }
        Self { binary_path }
    }

    /// Resolved binary, if any
    pub fn binary_path(&self) -> Option<&PathBuf> {
        self.binary_path.as_ref()
    }
}

/// Command line for one recording; frames arrive on stdin, the container leaves on stdout
pub(crate) fn ffmpeg_args(spec: &RecordingSpec) -> Vec<String> {
    let mut args: Vec<String> = [
        "-hide_banner",
        "-loglevel",
        "error",
        "-f",
        "rawvideo",
        "-pix_fmt",
        "rgba",
        "-s",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    args.push(format!("{}x{}", spec.width, spec.height));
    args.extend(
        [
            "-framerate".to_string(),
            spec.fps.to_string(),
            "-i".to_string(),
            "pipe:0".to_string(),
            // yuv420p needs even dimensions
            "-vf".to_string(),
            "pad=ceil(iw/2)*2:ceil(ih/2)*2".to_string(),
            "-an".to_string(),
        ],
    );

    let codec: &[&str] = match spec.video {
        VideoType::Webm => &["-c:v", "libvpx-vp9", "-pix_fmt", "yuv420p", "-f", "webm"],
        VideoType::Mp4 => &[
            "-c:v",
            "libx264",
            "-pix_fmt",
            "yuv420p",
            "-movflags",
            "frag_keyframe+empty_moov",
            "-f",
            "mp4",
        ],
        VideoType::Mkv => &["-c:v", "libx264", "-pix_fmt", "yuv420p", "-f", "matroska"],
    };
    args.extend(codec.iter().map(|s| s.to_string()));
    args.push("pipe:1".to_string());
    args
}

#[async_trait]
impl RecorderFactory for FfmpegRecorderFactory {
    async fn start(&self, spec: &RecordingSpec) -> Result<Box<dyn FrameRecorder>, CaptureError> {
        let unsupported = |reason: String| CaptureError::Unsupported {
            media_type: spec.video.media_type(),
            reason,
        };
        let binary = self
            .binary_path
            .as_ref()
            .ok_or_else(|| unsupported("ffmpeg binary not found".to_string()))?;

        let args = ffmpeg_args(spec);
        tracing::debug!(binary = ?binary, args = ?args, "starting ffmpeg");
        let mut child = Command::new(binary)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| unsupported(format!("failed to start ffmpeg: {}", e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| unsupported("failed to open ffmpeg stdin".to_string()))?;
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| unsupported("failed to open ffmpeg stdout".to_string()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| unsupported("failed to open ffmpeg stderr".to_string()))?;

        let reader = tokio::spawn(async move {
            let mut chunks = Vec::new();
            loop {
                let mut buf = BytesMut::with_capacity(READ_CHUNK);
                if stdout.read_buf(&mut buf).await? == 0 {
                    break;
                }
                chunks.push(buf.freeze());
            }
            Ok::<_, std::io::Error>(chunks)
        });

        // Drain stderr so ffmpeg never blocks on a full pipe
        let diagnostics = tokio::spawn(async move {
            let mut output = String::new();
            match stderr.read_to_string(&mut output).await {
                Ok(_) => output,
                Err(e) => format!("<failed to read ffmpeg stderr: {}>", e),
            }
        });

        tracing::info!(
            pid = ?child.id(),
            width = spec.width,
            height = spec.height,
            "ffmpeg recorder started"
        );
        Ok(Box::new(FfmpegRecorder {
            spec: *spec,
            child,
            stdin: Some(stdin),
            reader,
            diagnostics,
        }))
    }

    fn name(&self) -> &'static str {
        "ffmpeg"
    }
}

struct FfmpegRecorder {
    spec: RecordingSpec,
    child: Child,
    stdin: Option<ChildStdin>,
    reader: JoinHandle<std::io::Result<Vec<Bytes>>>,
    diagnostics: JoinHandle<String>,
}

#[async_trait]
impl FrameRecorder for FfmpegRecorder {
    async fn push_frame(&mut self, frame: &RgbaImage) -> Result<(), CaptureError> {
        if frame.dimensions() != (self.spec.width, self.spec.height) {
            return Err(CaptureError::Recorder(format!(
                "frame is {}x{}, recording is {}x{}",
                frame.width(),
                frame.height(),
                self.spec.width,
                self.spec.height
            )));
        }
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| CaptureError::Recorder("recording already closed".to_string()))?;
        stdin
            .write_all(frame.as_raw())
            .await
            .map_err(|e| CaptureError::Recorder(format!("failed to write frame: {}", e)))
    }

    async fn finish(mut self: Box<Self>) -> Result<Vec<Bytes>, CaptureError> {
        // Closing stdin ends the input stream
        drop(self.stdin.take());

        let chunks = (&mut self.reader)
            .await
            .map_err(|e| CaptureError::Recorder(format!("output reader failed: {}", e)))?
            .map_err(|e| CaptureError::Recorder(format!("failed to read ffmpeg output: {}", e)))?;
        let status = self
            .child
            .wait()
            .await
            .map_err(|e| CaptureError::Recorder(format!("failed to wait for ffmpeg: {}", e)))?;
        let stderr = (&mut self.diagnostics).await.unwrap_or_default();

        if !status.success() {
            return Err(CaptureError::Recorder(format!(
                "ffmpeg exited with {}: {}",
                status,
                stderr.trim()
            )));
        }
        tracing::debug!(chunks = chunks.len(), "ffmpeg recorder finished");
        Ok(chunks)
    }
}

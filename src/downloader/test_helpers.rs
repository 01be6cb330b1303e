//! Shared test helpers for building BundleDownloader instances and fixtures.

use crate::capture::{FrameRecorder, RecorderFactory, RecordingSpec};
use crate::config::Config;
use crate::downloader::BundleDownloader;
use crate::error::CaptureError;
use crate::output::OutputSink;
use crate::types::{Blob, SaveOutcome};
use async_trait::async_trait;
use bytes::Bytes;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use tempfile::tempdir;

/// Encode a solid `width`x`height` PNG whose red channel is `red`
pub(crate) fn solid_png(width: u32, height: u32, red: u8) -> Vec<u8> {
    let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
        width,
        height,
        Rgba([red, 64, 128, 255]),
    ));
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

/// Encode a small PNG of the given size
pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    solid_png(width, height, 200)
}

/// Helper to create a test BundleDownloader writing into a temp dir.
/// Returns the downloader and the tempdir (which must be kept alive).
pub(crate) fn create_test_downloader() -> (BundleDownloader, tempfile::TempDir) {
    let temp_dir = tempdir().unwrap();

    let mut config = Config::default();
    config.output.output_dir = temp_dir.path().join("downloads");
    config.capture.search_path = false;
    config.fetch.timeout = Some(std::time::Duration::from_secs(5));

    let downloader = BundleDownloader::new(config).unwrap();
    (downloader, temp_dir)
}

/// Output sink that keeps every saved blob in memory
#[derive(Default)]
pub(crate) struct MemorySink {
    pub(crate) saved: Mutex<Vec<(String, Blob)>>,
}

#[async_trait]
impl OutputSink for MemorySink {
    async fn save(&self, blob: Option<&Blob>, filename: &str) -> crate::Result<SaveOutcome> {
        match blob.filter(|b| !b.is_empty()) {
            Some(blob) => {
                self.saved
                    .lock()
                    .unwrap()
                    .push((filename.to_string(), blob.clone()));
                Ok(SaveOutcome::success(None))
            }
            None => Ok(SaveOutcome::empty()),
        }
    }
}

/// Recorder factory whose recordings hold one byte per frame: the red
/// channel of the frame's top-left pixel
#[derive(Default)]
pub(crate) struct MemoryRecorderFactory {
    pub(crate) specs: Mutex<Vec<RecordingSpec>>,
    /// Fail the push of this frame number (0-based)
    pub(crate) fail_on_push: Option<usize>,
}

struct MemoryRecorder {
    frames: Vec<u8>,
    fail_on_push: Option<usize>,
}

#[async_trait]
impl RecorderFactory for MemoryRecorderFactory {
    async fn start(&self, spec: &RecordingSpec) -> Result<Box<dyn FrameRecorder>, CaptureError> {
        self.specs.lock().unwrap().push(*spec);
        Ok(Box::new(MemoryRecorder {
            frames: Vec::new(),
            fail_on_push: self.fail_on_push,
        }))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[async_trait]
impl FrameRecorder for MemoryRecorder {
    async fn push_frame(&mut self, frame: &RgbaImage) -> Result<(), CaptureError> {
        if self.fail_on_push == Some(self.frames.len()) {
            return Err(CaptureError::Recorder("disk full".to_string()));
        }
        self.frames.push(frame.get_pixel(0, 0)[0]);
        Ok(())
    }

    async fn finish(self: Box<Self>) -> Result<Vec<Bytes>, CaptureError> {
        Ok(self.frames.into_iter().map(|f| Bytes::from(vec![f])).collect())
    }
}

/// Recorder factory that can never record
pub(crate) struct UnsupportedFactory;

#[async_trait]
impl RecorderFactory for UnsupportedFactory {
    async fn start(&self, spec: &RecordingSpec) -> Result<Box<dyn FrameRecorder>, CaptureError> {
        Err(CaptureError::Unsupported {
            media_type: spec.video.media_type(),
            reason: "no encoder".to_string(),
        })
    }

    fn name(&self) -> &'static str {
        "unsupported"
    }
}

/// Downloader with in-memory output and recording
pub(crate) fn create_memory_downloader() -> (BundleDownloader, Arc<MemorySink>, tempfile::TempDir) {
    let (downloader, temp_dir) = create_test_downloader();
    let sink = Arc::new(MemorySink::default());
    let downloader = downloader
        .with_sink(sink.clone())
        .with_recorder_factory(Arc::new(MemoryRecorderFactory::default()));
    (downloader, sink, temp_dir)
}

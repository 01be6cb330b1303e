//! Image fixtures, mock servers and in-memory collaborators

use async_trait::async_trait;
use bundle_dl::capture::{FrameRecorder, RecorderFactory, RecordingSpec};
use bundle_dl::output::OutputSink;
use bundle_dl::{Blob, BundleDownloader, CaptureError, Config, FetchRequest, SaveOutcome};
use bytes::Bytes;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use std::io::{Cursor, Read};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Encode a solid image in `format`; the red channel identifies the frame
pub fn solid_image(width: u32, height: u32, red: u8, format: ImageFormat) -> Vec<u8> {
    let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
        width,
        height,
        Rgba([red, 100, 50, 255]),
    ));
    let image = match format {
        // JPEG has no alpha channel
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(image.to_rgb8()),
        _ => image,
    };
    let mut buf = Cursor::new(Vec::new());
    image
        .write_to(&mut buf, format)
        .expect("fixture image should encode");
    buf.into_inner()
}

/// A served path and the response it gets
pub enum Served {
    /// 200 with this body
    Body(Vec<u8>),
    /// Bare failure status
    Status(u16),
}

/// Start a mock server answering each `(path, response)` pair
pub async fn serve(routes: Vec<(&str, Served)>) -> MockServer {
    let server = MockServer::start().await;
    for (route, served) in routes {
        let response = match served {
            Served::Body(body) => ResponseTemplate::new(200).set_body_bytes(body),
            Served::Status(status) => ResponseTemplate::new(status),
        };
        Mock::given(method("GET"))
            .and(path(format!("/{route}")))
            .respond_with(response)
            .mount(&server)
            .await;
    }
    server
}

/// Requests for `names` on `server`, each saved under its own name
pub fn requests_for(server: &MockServer, names: &[&str]) -> Vec<FetchRequest> {
    names
        .iter()
        .map(|name| FetchRequest::new(format!("{}/{}", server.uri(), name), *name))
        .collect()
}

/// Downloader writing into a fresh temp dir, with PATH lookup for ffmpeg disabled
pub fn downloader_in_tempdir() -> (BundleDownloader, TempDir) {
    let temp_dir = tempfile::tempdir().expect("temp dir");
    let mut config = Config::default();
    config.output.output_dir = temp_dir.path().to_path_buf();
    config.capture.search_path = false;
    let downloader = BundleDownloader::new(config).expect("default config is valid");
    (downloader, temp_dir)
}

/// Read every entry of a ZIP file, in archive order
pub fn read_zip(bytes: &[u8]) -> Vec<(String, Vec<u8>)> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes.to_vec())).expect("valid zip");
    (0..archive.len())
        .map(|i| {
            let mut file = archive.by_index(i).expect("zip entry");
            let mut contents = Vec::new();
            file.read_to_end(&mut contents).expect("zip entry contents");
            (file.name().to_string(), contents)
        })
        .collect()
}

/// Output sink capturing saved blobs
#[derive(Default)]
pub struct CollectingSink {
    pub saved: Mutex<Vec<(String, Blob)>>,
}

#[async_trait]
impl OutputSink for CollectingSink {
    async fn save(&self, blob: Option<&Blob>, filename: &str) -> bundle_dl::Result<SaveOutcome> {
        match blob {
            Some(blob) if !blob.is_empty() => {
                self.saved
                    .lock()
                    .unwrap()
                    .push((filename.to_string(), blob.clone()));
                Ok(SaveOutcome::success(None))
            }
            _ => Ok(SaveOutcome::empty()),
        }
    }
}

/// Recorder factory producing a text "video": one `red@WxH` line per frame
#[derive(Default)]
pub struct TranscriptFactory {
    pub started: Mutex<Vec<RecordingSpec>>,
}

struct TranscriptRecorder {
    lines: Vec<Bytes>,
}

#[async_trait]
impl RecorderFactory for TranscriptFactory {
    async fn start(&self, spec: &RecordingSpec) -> Result<Box<dyn FrameRecorder>, CaptureError> {
        self.started.lock().unwrap().push(*spec);
        Ok(Box::new(TranscriptRecorder { lines: Vec::new() }))
    }

    fn name(&self) -> &'static str {
        "transcript"
    }
}

#[async_trait]
impl FrameRecorder for TranscriptRecorder {
    async fn push_frame(&mut self, frame: &RgbaImage) -> Result<(), CaptureError> {
        let line = format!(
            "{}@{}x{}\n",
            frame.get_pixel(0, 0)[0],
            frame.width(),
            frame.height()
        );
        self.lines.push(Bytes::from(line));
        Ok(())
    }

    async fn finish(self: Box<Self>) -> Result<Vec<Bytes>, CaptureError> {
        Ok(self.lines)
    }
}

/// Downloader with a collecting sink and the transcript recorder
pub fn collecting_downloader() -> (
    BundleDownloader,
    Arc<CollectingSink>,
    Arc<TranscriptFactory>,
    TempDir,
) {
    let (downloader, temp_dir) = downloader_in_tempdir();
    let sink = Arc::new(CollectingSink::default());
    let factory = Arc::new(TranscriptFactory::default());
    let downloader = downloader
        .with_sink(sink.clone())
        .with_recorder_factory(factory.clone());
    (downloader, sink, factory, temp_dir)
}

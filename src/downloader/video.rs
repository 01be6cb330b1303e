//! Video assembly (fetch images → capture loop → save)

use super::BundleDownloader;
use crate::capture::FrameCapture;
use crate::error::Result;
use crate::types::{Event, FetchRequest, SaveOutcome, VideoType};
use crate::utils::ensure_extension;

impl BundleDownloader {
    /// Download every request as an image and record one pass over the
    /// loaded frames at `fps` into a `video_type` container
    ///
    /// Frames that fail to load are dropped from the sequence. With no frame
    /// at all nothing is recorded and the outcome is `empty`. A recorder that
    /// cannot be opened for `video_type` fails the call.
    pub async fn download_and_encode_video(
        &self,
        requests: &[FetchRequest],
        video_type: VideoType,
        fps: u32,
        filename: &str,
    ) -> Result<SaveOutcome> {
        let capture = FrameCapture::new(fps, self.recorders.clone(), self.log.clone())?;
        let filename = ensure_extension(filename, video_type.extension());
        tracing::info!(requests = requests.len(), fps, video = %filename, "assembling video");

        let images = self
            .batch_loader()
            .load_images(&self.image_fetcher(), requests)
            .await;
        let frames: Vec<_> = images
            .into_iter()
            .filter_map(|entry| entry.into_parts().2)
            .collect();

        if frames.is_empty() {
            return self.save(None, &filename).await;
        }

        self.emit_event(Event::CaptureRequested {
            frames: frames.len(),
            fps,
        });
        let video = capture.record(frames, video_type).await?;
        self.emit_event(Event::CaptureFinished {
            bytes: video.len(),
            media_type: video.media_type().to_string(),
        });

        self.save(Some(video), &filename).await
    }
}

//! Raster re-encoding
//!
//! Each image is drawn onto its own RGBA surface at natural size and the
//! surface is serialized in the target format. Failures stay per entry.

use crate::config::EncodeConfig;
use crate::diagnostics::{Code, LogSink, Severity};
use crate::error::EncodeError;
use crate::types::{Blob, Entry, RasterType};
use crate::utils::replace_extension;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::{DynamicImage, RgbaImage, imageops};

const MODULE: &str = "encode";

/// Re-encodes decoded images into a target raster format
#[derive(Clone, Debug)]
pub struct RasterEncoder {
    config: EncodeConfig,
    log: LogSink,
}

impl RasterEncoder {
    /// Create an encoder
    pub fn new(config: EncodeConfig, log: LogSink) -> Self {
        Self { config, log }
    }

    /// Allocate a surface sized to the image and draw the image onto it
    fn render(&self, image: &DynamicImage) -> Result<RgbaImage, EncodeError> {
        let (width, height) = (image.width(), image.height());
        if width == 0 || height == 0 {
            return Err(EncodeError::SurfaceAllocation {
                width,
                height,
                reason: "image has no pixels".to_string(),
            });
        }
        let pixels = u64::from(width) * u64::from(height);
        if pixels > self.config.max_pixels {
            return Err(EncodeError::SurfaceAllocation {
                width,
                height,
                reason: format!(
                    "{} pixels exceeds the limit of {}",
                    pixels, self.config.max_pixels
                ),
            });
        }

        let mut surface = RgbaImage::new(width, height);
        imageops::replace(&mut surface, &image.to_rgba8(), 0, 0);
        Ok(surface)
    }

    /// Encode one image synchronously
    pub fn encode(&self, image: &DynamicImage, target: RasterType) -> Result<Blob, EncodeError> {
        let surface = self.render(image)?;
        let codec_error = |source| EncodeError::Codec {
            format: target.name(),
            source,
        };

        let mut buf = Vec::new();
        match target {
            RasterType::Png => surface
                .write_with_encoder(PngEncoder::new(&mut buf))
                .map_err(codec_error)?,
            RasterType::Jpg => {
                // JPEG carries no alpha channel
                let flattened = DynamicImage::ImageRgba8(surface).to_rgb8();
                flattened
                    .write_with_encoder(JpegEncoder::new_with_quality(
                        &mut buf,
                        self.config.jpeg_quality,
                    ))
                    .map_err(codec_error)?
            }
            RasterType::Webp => surface
                .write_with_encoder(WebPEncoder::new_lossless(&mut buf))
                .map_err(codec_error)?,
        }

        Ok(Blob::new(buf, target.media_type()))
    }

    /// Encode every entry with a payload, returning only the encoded ones
    ///
    /// Entries without payload are skipped and failed encodes are dropped;
    /// each case leaves one diagnostic. Output filenames take the target
    /// extension.
    pub async fn encode_all(
        &self,
        entries: Vec<Entry<DynamicImage>>,
        target: RasterType,
    ) -> Vec<Entry<Blob>> {
        let mut encoded = Vec::with_capacity(entries.len());

        for entry in entries {
            let (source, filename, payload) = entry.into_parts();
            let Some(image) = payload else {
                self.log.record(
                    Severity::Warn,
                    MODULE,
                    Code::EncodeSkipped,
                    format!("{}: no image to encode", filename),
                );
                continue;
            };

            let encoder = self.clone();
            let result = tokio::task::spawn_blocking(move || encoder.encode(&image, target))
                .await
                .unwrap_or_else(|e| Err(EncodeError::Task(e.to_string())));

            match result {
                Ok(blob) => {
                    let renamed = replace_extension(&filename, target.extension());
                    self.log.record(
                        Severity::Info,
                        MODULE,
                        Code::Encoded,
                        format!("{}: encoded as {} ({} bytes)", renamed, target.name(), blob.len()),
                    );
                    encoded.push(Entry::resolved(source, renamed, blob));
                }
                Err(e) => {
                    tracing::warn!(filename = %filename, error = %e, "encode failed");
                    self.log.record(
                        Severity::Error,
                        MODULE,
                        e.code(),
                        format!("{}: {}", filename, e),
                    );
                }
            }
        }

        if encoded.is_empty() {
            self.log.record(
                Severity::Warn,
                MODULE,
                Code::NoImagesEncoded,
                format!("no images were encoded as {}", target.name()),
            );
        }

        encoded
    }
}

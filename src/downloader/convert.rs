//! Image conversion (fetch images → re-encode → archive → save)

use super::BundleDownloader;
use crate::encode::RasterEncoder;
use crate::error::Result;
use crate::manifest::Manifest;
use crate::types::{Event, FetchRequest, RasterType, SaveOutcome};
use crate::utils::{ensure_extension, replace_extension};

impl BundleDownloader {
    /// Download every request as an image, re-encode to `raster_type`, and
    /// save the converted images as one ZIP archive
    ///
    /// Entries keep their names with the extension swapped for the target
    /// type. Images that fail to load or encode are listed as missing in the
    /// manifest and explained in the embedded log.
    pub async fn download_and_convert(
        &self,
        requests: &[FetchRequest],
        raster_type: RasterType,
        archive_name: &str,
    ) -> Result<SaveOutcome> {
        tracing::info!(
            requests = requests.len(),
            target = %raster_type,
            archive = %archive_name,
            "converting images"
        );

        let images = self
            .batch_loader()
            .load_images(&self.image_fetcher(), requests)
            .await;
        let listing: Vec<(String, String)> = images
            .iter()
            .map(|e| {
                (
                    e.source().to_string(),
                    replace_extension(e.filename(), raster_type.extension()),
                )
            })
            .collect();

        let encoder = RasterEncoder::new(self.config.encode.clone(), self.log.clone());
        let encoded = encoder.encode_all(images, raster_type).await;
        self.emit_event(Event::Encoded {
            succeeded: encoded.len(),
            target: raster_type,
        });

        let manifest = self.config.archive.manifest.then(|| {
            // Encoded entries keep the relative order of their sources
            let mut manifest = Manifest::new(self.config.archive.manifest_title.as_str());
            let mut remaining = encoded.iter().peekable();
            for (source, filename) in &listing {
                let content = remaining
                    .next_if(|e| e.source() == source && e.filename() == filename)
                    .and_then(|e| e.payload())
                    .map(|blob| blob.as_ref());
                manifest.push(filename, source, content);
            }
            manifest.render()
        });
        let blob = self.build_archive(&encoded, manifest.as_deref())?;

        self.save(blob, &ensure_extension(archive_name, "zip")).await
    }
}

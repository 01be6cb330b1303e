//! Raw resource bundling (fetch → archive → save)

use super::BundleDownloader;
use crate::error::Result;
use crate::manifest::Manifest;
use crate::types::{FetchRequest, SaveOutcome};
use crate::utils::ensure_extension;

impl BundleDownloader {
    /// Download every request and save the results as one ZIP archive
    ///
    /// Unreachable or failing requests are left out of the archive and
    /// explained in its embedded log. The call itself only fails when the
    /// archive cannot be serialized or the output sink fails.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use bundle_dl::{BundleDownloader, Config, FetchRequest};
    ///
    /// # async fn run() -> bundle_dl::Result<()> {
    /// let downloader = BundleDownloader::new(Config::default())?;
    /// let requests = vec![
    ///     FetchRequest::new("https://example.com/1.jpg", "1.jpg"),
    ///     FetchRequest::new("https://example.com/2.jpg", "2.jpg"),
    /// ];
    /// let outcome = downloader.download_and_archive(&requests, "frames").await?;
    /// println!("saved: {}", outcome.ok);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn download_and_archive(
        &self,
        requests: &[FetchRequest],
        archive_name: &str,
    ) -> Result<SaveOutcome> {
        tracing::info!(requests = requests.len(), archive = %archive_name, "bundling resources");

        let entries = self
            .batch_loader()
            .load_resources(&self.fetcher, requests)
            .await;

        let manifest = self.config.archive.manifest.then(|| {
            Manifest::from_entries(self.config.archive.manifest_title.as_str(), &entries).render()
        });
        let blob = self.build_archive(&entries, manifest.as_deref())?;

        self.save(blob, &ensure_extension(archive_name, "zip")).await
    }
}

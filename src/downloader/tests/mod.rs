use super::*;
use crate::downloader::test_helpers::{create_memory_downloader, create_test_downloader, solid_png};
use crate::types::{FetchRequest, RasterType, SaveReason, VideoType};
use std::collections::BTreeMap;
use std::io::{Cursor, Read};

mod video;

/// Unpack a ZIP blob into (name -> contents), in archive order
fn unzip(blob: &Blob) -> Vec<(String, Vec<u8>)> {
    let mut archive = zip::ZipArchive::new(Cursor::new(blob.bytes().to_vec())).unwrap();
    (0..archive.len())
        .map(|i| {
            let mut file = archive.by_index(i).unwrap();
            let mut contents = Vec::new();
            file.read_to_end(&mut contents).unwrap();
            (file.name().to_string(), contents)
        })
        .collect()
}

fn unzip_map(blob: &Blob) -> BTreeMap<String, Vec<u8>> {
    unzip(blob).into_iter().collect()
}

#[test]
fn test_new_rejects_invalid_config() {
    let mut config = Config::default();
    config.capture.fps = 0;
    let err = BundleDownloader::new(config).unwrap_err();
    assert!(
        matches!(err, crate::Error::Config { ref key, .. } if key.as_deref() == Some("capture.fps")),
        "got {err:?}"
    );
}

#[tokio::test]
async fn test_subscribe_receives_batch_events() {
    let (downloader, _sink, _temp_dir) = create_memory_downloader();
    let mut events = downloader.subscribe();

    // Empty batch: still a full start/finish cycle
    downloader.download_and_archive(&[], "nothing").await.unwrap();

    assert!(matches!(
        events.recv().await.unwrap(),
        Event::BatchStarted { total: 0 }
    ));
    assert!(matches!(
        events.recv().await.unwrap(),
        Event::BatchFinished {
            succeeded: 0,
            failed: 0
        }
    ));
}

#[tokio::test]
async fn test_debug_does_not_dump_internals() {
    let (downloader, _temp_dir) = create_test_downloader();
    let debug = format!("{downloader:?}");
    assert!(debug.contains("BundleDownloader"));
    assert!(debug.contains("recorders: \"ffmpeg\""));
}

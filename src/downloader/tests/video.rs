use super::*;
use crate::capture::RecorderFactory;
use crate::downloader::test_helpers::{MemoryRecorderFactory, UnsupportedFactory};
use crate::error::CaptureError;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn frame_server() -> MockServer {
    let server = MockServer::start().await;
    for (i, red) in [(0, 10u8), (1, 20), (2, 30)] {
        Mock::given(method("GET"))
            .and(path(format!("/frame{i}.png")))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(solid_png(6, 4, red)))
            .mount(&server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/missing.png"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    server
}

fn frame_requests(server: &MockServer, names: &[&str]) -> Vec<FetchRequest> {
    names
        .iter()
        .map(|name| FetchRequest::new(format!("{}/{}", server.uri(), name), *name))
        .collect()
}

#[tokio::test]
async fn test_video_records_loaded_frames_in_order() {
    let (downloader, sink, _temp_dir) = create_memory_downloader();
    let factory = Arc::new(MemoryRecorderFactory::default());
    let downloader = downloader.with_recorder_factory(factory.clone());
    let server = frame_server().await;
    let requests = frame_requests(
        &server,
        &["frame0.png", "missing.png", "frame1.png", "frame2.png"],
    );
    let mut events = downloader.subscribe();

    let outcome = downloader
        .download_and_encode_video(&requests, VideoType::Webm, 50, "clip")
        .await
        .unwrap();
    assert!(outcome.ok);

    let saved = sink.saved.lock().unwrap().clone();
    let (filename, blob) = &saved[0];
    assert_eq!(filename, "clip.webm");
    assert_eq!(blob.media_type(), "video/webm");
    // One byte per frame: the red channel of each frame
    assert_eq!(&blob.bytes()[..], &[10, 20, 30]);

    let specs = factory.specs.lock().unwrap().clone();
    assert_eq!((specs[0].width, specs[0].height, specs[0].fps), (6, 4, 50));

    let mut requested = None;
    let mut finished = None;
    while let Ok(event) = events.try_recv() {
        match event {
            Event::CaptureRequested { frames, fps } => requested = Some((frames, fps)),
            Event::CaptureFinished { bytes, media_type } => finished = Some((bytes, media_type)),
            _ => {}
        }
    }
    assert_eq!(requested, Some((3, 50)));
    assert_eq!(finished, Some((3, "video/webm".to_string())));
}

#[tokio::test]
async fn test_video_without_frames_is_empty() {
    let (downloader, sink, _temp_dir) = create_memory_downloader();
    let server = frame_server().await;
    let requests = frame_requests(&server, &["missing.png"]);

    let outcome = downloader
        .download_and_encode_video(&requests, VideoType::Mp4, 10, "clip.mp4")
        .await
        .unwrap();
    assert!(!outcome.ok);
    assert_eq!(outcome.reason, SaveReason::Empty);
    assert!(sink.saved.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_video_with_unsupported_recorder_fails() {
    let (downloader, sink, _temp_dir) = create_memory_downloader();
    let factory: Arc<dyn RecorderFactory> = Arc::new(UnsupportedFactory);
    let downloader = downloader.with_recorder_factory(factory);
    let server = frame_server().await;
    let requests = frame_requests(&server, &["frame0.png"]);

    let err = downloader
        .download_and_encode_video(&requests, VideoType::Mkv, 10, "clip")
        .await
        .unwrap_err();
    assert!(
        matches!(err, crate::Error::Capture(CaptureError::Unsupported { .. })),
        "got {err:?}"
    );
    assert!(sink.saved.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_video_rejects_zero_fps_before_fetching() {
    let (downloader, _sink, _temp_dir) = create_memory_downloader();
    let server = frame_server().await;
    let requests = frame_requests(&server, &["frame0.png"]);

    let err = downloader
        .download_and_encode_video(&requests, VideoType::Webm, 0, "clip")
        .await
        .unwrap_err();
    assert!(matches!(err, crate::Error::Config { .. }), "got {err:?}");
    assert!(server.received_requests().await.unwrap().is_empty());
}

use super::*;
use crate::downloader::test_helpers::{MemoryRecorderFactory, UnsupportedFactory};
use image::Rgba;

/// Solid frames whose red channel is their index
fn frames(n: u8) -> Vec<DynamicImage> {
    (0..n)
        .map(|i| DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 2, Rgba([i, 0, 0, 255]))))
        .collect()
}

fn capture_with(factory: Arc<dyn RecorderFactory>, log: &LogSink) -> FrameCapture {
    FrameCapture::new(10, factory, log.clone()).unwrap()
}

#[tokio::test(start_paused = true)]
async fn records_exactly_one_pass() {
    let log = LogSink::new();
    let factory = Arc::new(MemoryRecorderFactory::default());
    let capture = capture_with(factory.clone(), &log);

    let blob = capture.record(frames(3), VideoType::Webm).await.unwrap();

    assert_eq!(&blob.bytes()[..], &[0, 1, 2]);
    assert_eq!(blob.media_type(), "video/webm");

    let specs = factory.specs.lock().unwrap().clone();
    assert_eq!(
        specs,
        vec![RecordingSpec {
            video: VideoType::Webm,
            width: 4,
            height: 2,
            fps: 10
        }]
    );

    let codes: Vec<Code> = log.records().iter().map(|r| r.code).collect();
    assert_eq!(
        codes,
        vec![Code::CaptureArmed, Code::CaptureStarted, Code::CaptureFinished]
    );
}

#[tokio::test(start_paused = true)]
async fn single_frame_completes_after_one_cycle() {
    let log = LogSink::new();
    let capture = capture_with(Arc::new(MemoryRecorderFactory::default()), &log);

    let started = Instant::now();
    let blob = capture.record(frames(1), VideoType::Mp4).await.unwrap();

    assert_eq!(&blob.bytes()[..], &[0]);
    assert_eq!(blob.media_type(), "video/mp4");
    // Start on the first draw, stop on the next one
    let elapsed = started.elapsed();
    assert!(
        elapsed >= Duration::from_millis(100) && elapsed < Duration::from_millis(200),
        "elapsed {elapsed:?}"
    );
}

#[tokio::test(start_paused = true)]
async fn arming_mid_loop_waits_for_frame_zero() {
    let log = LogSink::new();
    let capture = capture_with(Arc::new(MemoryRecorderFactory::default()), &log);

    let started = Instant::now();
    let playback = capture.play(frames(3)).unwrap();
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(playback.state(), CaptureState::Idle);

    let blob = playback.capture(VideoType::Mkv).await.unwrap();
    assert_eq!(&blob.bytes()[..], &[0, 1, 2]);

    // Frame 0 comes around at 300ms, frame 2 is drawn at 500ms
    let elapsed = started.elapsed();
    assert!(
        elapsed >= Duration::from_millis(500) && elapsed < Duration::from_millis(600),
        "elapsed {elapsed:?}"
    );
    assert_eq!(playback.state(), CaptureState::Finished);
}

#[tokio::test(start_paused = true)]
async fn frames_are_scaled_to_the_first_frame() {
    let factory = Arc::new(MemoryRecorderFactory::default());
    let capture = capture_with(factory.clone(), &LogSink::new());

    let mut sequence = frames(2);
    sequence.push(DynamicImage::ImageRgba8(RgbaImage::from_pixel(
        8,
        8,
        Rgba([7, 0, 0, 255]),
    )));
    let blob = capture.record(sequence, VideoType::Webm).await.unwrap();

    assert_eq!(&blob.bytes()[..], &[0, 1, 7]);
    assert_eq!(factory.specs.lock().unwrap()[0].width, 4);
}

#[tokio::test(start_paused = true)]
async fn empty_sequence_is_rejected_immediately() {
    let capture = capture_with(Arc::new(MemoryRecorderFactory::default()), &LogSink::new());
    let err = capture.record(Vec::new(), VideoType::Webm).await.unwrap_err();
    assert!(
        matches!(err, Error::Capture(CaptureError::EmptySequence)),
        "got {err:?}"
    );
}

#[tokio::test(start_paused = true)]
async fn unsupported_recorder_fails_instead_of_hanging() {
    let log = LogSink::new();
    let capture = capture_with(Arc::new(UnsupportedFactory), &log);
    let playback = capture.play(frames(2)).unwrap();

    let err = playback.capture(VideoType::Webm).await.unwrap_err();
    assert!(
        matches!(err, Error::Capture(CaptureError::Unsupported { .. })),
        "got {err:?}"
    );
    assert_eq!(playback.state(), CaptureState::Idle);
    assert_eq!(log.records().last().unwrap().code, Code::CaptureInitError);
}

#[tokio::test(start_paused = true)]
async fn second_request_is_rejected() {
    let capture = capture_with(Arc::new(MemoryRecorderFactory::default()), &LogSink::new());
    let playback = capture.play(frames(3)).unwrap();

    let (first, second) = tokio::join!(playback.capture(VideoType::Webm), async {
        tokio::task::yield_now().await;
        playback.capture(VideoType::Webm).await
    });

    assert_eq!(&first.unwrap().bytes()[..], &[0, 1, 2]);
    assert!(
        matches!(second, Err(Error::Capture(CaptureError::SessionInUse { .. }))),
        "got {second:?}"
    );

    let again = playback.capture(VideoType::Webm).await.unwrap_err();
    assert!(
        matches!(again, Error::Capture(CaptureError::SessionInUse { ref state }) if state == "finished"),
        "got {again:?}"
    );
}

#[tokio::test(start_paused = true)]
async fn stop_ends_an_unarmed_loop() {
    let capture = capture_with(Arc::new(MemoryRecorderFactory::default()), &LogSink::new());
    let playback = capture.play(frames(2)).unwrap();
    tokio::time::sleep(Duration::from_millis(350)).await;

    playback.stop();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(playback.is_finished());

    let err = playback.capture(VideoType::Webm).await.unwrap_err();
    assert!(matches!(err, Error::Capture(CaptureError::Stopped)), "got {err:?}");
}

#[tokio::test(start_paused = true)]
async fn recorder_failure_resolves_the_request() {
    let log = LogSink::new();
    let factory = Arc::new(MemoryRecorderFactory {
        fail_on_push: Some(1),
        ..Default::default()
    });
    let capture = capture_with(factory, &log);

    let err = capture.record(frames(3), VideoType::Webm).await.unwrap_err();
    assert!(
        matches!(err, Error::Capture(CaptureError::Recorder(ref msg)) if msg == "disk full"),
        "got {err:?}"
    );
    assert_eq!(log.records().last().unwrap().code, Code::CaptureError);
}

#[test]
fn zero_fps_is_a_config_error() {
    let err = FrameCapture::new(0, Arc::new(UnsupportedFactory), LogSink::new()).unwrap_err();
    assert!(matches!(err, Error::Config { .. }), "got {err:?}");
}

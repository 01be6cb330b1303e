//! Video assembly from a still-image sequence
//!
//! [`FrameCapture::play`] starts a playback loop that cycles through the
//! frames at a fixed rate. [`Playback::capture`] arms it: recording starts
//! the next time frame 0 comes around and stops after the last frame, so the
//! video always holds exactly one full pass over the sequence.
//!
//! ```no_run
//! use bundle_dl::capture::{FfmpegRecorderFactory, FrameCapture};
//! use bundle_dl::diagnostics::LogSink;
//! use bundle_dl::VideoType;
//! use std::sync::Arc;
//!
//! # async fn run(frames: Vec<image::DynamicImage>) -> bundle_dl::Result<()> {
//! let factory = Arc::new(FfmpegRecorderFactory::from_path().expect("ffmpeg in PATH"));
//! let capture = FrameCapture::new(10, factory, LogSink::new())?;
//! let video = capture.record(frames, VideoType::Webm).await?;
//! println!("{} bytes of {}", video.len(), video.media_type());
//! # Ok(())
//! # }
//! ```

mod recorder;
mod session;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use recorder::{FfmpegRecorderFactory, FrameRecorder, RecorderFactory, RecordingSpec};
pub use session::{CaptureSession, CaptureState, Tick, TickAction};

use crate::diagnostics::{Code, LogSink, Severity};
use crate::error::{CaptureError, Error, Result};
use crate::types::{Blob, VideoType};
use image::{DynamicImage, RgbaImage, imageops};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;

const MODULE: &str = "capture";

type Reply = oneshot::Sender<std::result::Result<Blob, CaptureError>>;

enum Command {
    Capture { video: VideoType, reply: Reply },
}

/// Plays frame sequences and records them into video containers
#[derive(Clone)]
pub struct FrameCapture {
    fps: u32,
    factory: Arc<dyn RecorderFactory>,
    log: LogSink,
}

impl std::fmt::Debug for FrameCapture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameCapture")
            .field("fps", &self.fps)
            .field("factory", &self.factory.name())
            .finish()
    }
}

impl FrameCapture {
    /// Create a capture driver; `fps` must be positive
    pub fn new(fps: u32, factory: Arc<dyn RecorderFactory>, log: LogSink) -> Result<Self> {
        if fps == 0 {
            return Err(Error::config("capture.fps", "fps must be greater than zero"));
        }
        Ok(Self { fps, factory, log })
    }

    /// Frame interval
    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.fps))
    }

    /// Start a playback loop over `frames`
    ///
    /// The surface takes the size of the first frame. Must be called from
    /// within a tokio runtime.
    pub fn play(&self, frames: Vec<DynamicImage>) -> Result<Playback> {
        let session = CaptureSession::new(frames.len(), self.interval())?;
        let (width, height) = (frames[0].width(), frames[0].height());

        let (commands_tx, commands_rx) = mpsc::channel(8);
        let (state_tx, state_rx) = watch::channel(CaptureState::Idle);
        let cancel = CancellationToken::new();

        let playback_loop = PlaybackLoop {
            session,
            frames,
            width,
            height,
            fps: self.fps,
            factory: self.factory.clone(),
            log: self.log.clone(),
            commands: commands_rx,
            state: state_tx,
            cancel: cancel.clone(),
            active: None,
        };
        let task = tokio::spawn(playback_loop.run());

        Ok(Playback {
            commands: commands_tx,
            state: state_rx,
            cancel,
            task,
        })
    }

    /// Play `frames` and record one full pass
    pub async fn record(&self, frames: Vec<DynamicImage>, video: VideoType) -> Result<Blob> {
        let playback = self.play(frames)?;
        playback.capture(video).await
    }
}

/// Handle to a running playback loop
///
/// Dropping the handle stops the loop.
#[derive(Debug)]
pub struct Playback {
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<CaptureState>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl Playback {
    /// Arm capture and wait for the recorded video
    ///
    /// Fails immediately when no recorder can be opened for `video`, and
    /// when this playback already captured (or is capturing).
    pub async fn capture(&self, video: VideoType) -> Result<Blob> {
        let (reply, response) = oneshot::channel();
        if self
            .commands
            .send(Command::Capture { video, reply })
            .await
            .is_err()
        {
            return Err(self.ended().into());
        }
        match response.await {
            Ok(result) => result.map_err(Error::from),
            Err(_) => Err(self.ended().into()),
        }
    }

    fn ended(&self) -> CaptureError {
        match *self.state.borrow() {
            CaptureState::Finished => CaptureError::SessionInUse {
                state: CaptureState::Finished.to_string(),
            },
            _ => CaptureError::Stopped,
        }
    }

    /// Current capture state
    pub fn state(&self) -> CaptureState {
        *self.state.borrow()
    }

    /// Stop the loop; a pending capture resolves to [`CaptureError::Stopped`]
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Whether the loop has exited
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for Playback {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct ActiveCapture {
    video: VideoType,
    recorder: Box<dyn FrameRecorder>,
    reply: Reply,
}

struct PlaybackLoop {
    session: CaptureSession,
    frames: Vec<DynamicImage>,
    width: u32,
    height: u32,
    fps: u32,
    factory: Arc<dyn RecorderFactory>,
    log: LogSink,
    commands: mpsc::Receiver<Command>,
    state: watch::Sender<CaptureState>,
    cancel: CancellationToken,
    active: Option<ActiveCapture>,
}

impl PlaybackLoop {
    async fn run(mut self) {
        loop {
            let deadline = self.session.next_deadline();
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    if let Some(active) = self.active.take() {
                        active.reply.send(Err(CaptureError::Stopped)).ok();
                    }
                    tracing::debug!("playback stopped");
                    break;
                }
                Some(command) = self.commands.recv() => self.handle(command).await,
                _ = sleep_until(deadline) => {
                    if !self.tick(Instant::now()).await {
                        break;
                    }
                }
            }
        }
    }

    async fn handle(&mut self, command: Command) {
        let Command::Capture { video, reply } = command;

        if self.session.state() != CaptureState::Idle {
            let err = CaptureError::SessionInUse {
                state: self.session.state().to_string(),
            };
            self.log
                .record(Severity::Error, MODULE, err.code(), err.to_string());
            reply.send(Err(err)).ok();
            return;
        }

        let spec = RecordingSpec {
            video,
            width: self.width,
            height: self.height,
            fps: self.fps,
        };
        match self.factory.start(&spec).await {
            Ok(recorder) => {
                if let Err(e) = self.session.arm() {
                    reply.send(Err(e)).ok();
                    return;
                }
                self.state.send_replace(CaptureState::Armed);
                self.log.record(
                    Severity::Info,
                    MODULE,
                    Code::CaptureArmed,
                    format!(
                        "capture of {} armed ({} frames at {} fps, {}x{})",
                        video.media_type(),
                        self.frames.len(),
                        self.fps,
                        self.width,
                        self.height
                    ),
                );
                self.active = Some(ActiveCapture {
                    video,
                    recorder,
                    reply,
                });
            }
            Err(e) => {
                self.log
                    .record(Severity::Error, MODULE, e.code(), e.to_string());
                reply.send(Err(e)).ok();
            }
        }
    }

    /// Draw the next frame if due; returns false once the loop should exit
    async fn tick(&mut self, now: Instant) -> bool {
        let Some(tick) = self.session.poll(now) else {
            return true;
        };
        // Display-only ticks never touch pixels
        let surface = match tick.action {
            TickAction::Draw => return true,
            action => action.records_frame().then(|| self.render(tick.index)),
        };

        let outcome = match (tick.action, surface) {
            (TickAction::Start, Some(surface)) => {
                self.state.send_replace(CaptureState::Capturing);
                self.log.record(
                    Severity::Info,
                    MODULE,
                    Code::CaptureStarted,
                    "recording started on frame 0",
                );
                self.record(&surface).await
            }
            (TickAction::Finish { .. }, surface) => {
                let recorded = match surface {
                    Some(surface) => self.record(&surface).await,
                    None => Ok(()),
                };
                match recorded {
                    Ok(()) => {
                        self.finish().await;
                        return false;
                    }
                    Err(e) => Err(e),
                }
            }
            (_, Some(surface)) => self.record(&surface).await,
            (_, None) => Ok(()),
        };

        match outcome {
            Ok(()) => true,
            Err(e) => {
                self.fail(e);
                false
            }
        }
    }

    /// Render one frame onto a fresh surface of the playback size
    fn render(&self, index: usize) -> RgbaImage {
        let frame = &self.frames[index];
        if frame.width() == self.width && frame.height() == self.height {
            frame.to_rgba8()
        } else {
            imageops::resize(
                &frame.to_rgba8(),
                self.width,
                self.height,
                imageops::FilterType::Triangle,
            )
        }
    }

    async fn record(&mut self, surface: &RgbaImage) -> std::result::Result<(), CaptureError> {
        match self.active.as_mut() {
            Some(active) => active.recorder.push_frame(surface).await,
            None => Err(CaptureError::Recorder("no active recorder".to_string())),
        }
    }

    async fn finish(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };
        match active.recorder.finish().await {
            Ok(chunks) => {
                let blob = Blob::from_chunks(chunks, active.video.media_type());
                self.state.send_replace(CaptureState::Finished);
                self.log.record(
                    Severity::Info,
                    MODULE,
                    Code::CaptureFinished,
                    format!(
                        "recorded {} frames into {} bytes of {}",
                        self.session.recorded(),
                        blob.len(),
                        blob.media_type()
                    ),
                );
                active.reply.send(Ok(blob)).ok();
            }
            Err(e) => {
                self.state.send_replace(CaptureState::Finished);
                self.log
                    .record(Severity::Error, MODULE, e.code(), e.to_string());
                active.reply.send(Err(e)).ok();
            }
        }
    }

    fn fail(&mut self, err: CaptureError) {
        self.state.send_replace(CaptureState::Finished);
        self.log
            .record(Severity::Error, MODULE, err.code(), err.to_string());
        if let Some(active) = self.active.take() {
            active.reply.send(Err(err)).ok();
        }
    }
}

//! Capture session state machine
//!
//! Pure bookkeeping for one playback pass: which frame comes next, when the
//! last one was drawn, and where capture stands. The playback loop drives it
//! with the current time and acts on the returned [`Tick`].

use crate::error::CaptureError;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

/// Where a session stands with respect to capture
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureState {
    /// Playing, no capture requested
    Idle,
    /// Capture requested, waiting for the first frame to come around
    Armed,
    /// Recording
    Capturing,
    /// Recording done; the session is spent
    Finished,
}

impl fmt::Display for CaptureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CaptureState::Idle => "idle",
            CaptureState::Armed => "armed",
            CaptureState::Capturing => "capturing",
            CaptureState::Finished => "finished",
        })
    }
}

/// What the loop must do with the frame it is about to draw
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickAction {
    /// Display only
    Draw,
    /// Start recording, then record this frame
    Start,
    /// Record this frame
    Record,
    /// Stop recording; record this frame first when `record` is set
    Finish {
        /// Whether this frame still belongs to the recording
        record: bool,
    },
}

impl TickAction {
    /// Whether this tick pushes a frame to the recorder
    ///
    /// Display-only ticks never need a rendered surface.
    pub fn records_frame(&self) -> bool {
        match self {
            TickAction::Draw => false,
            TickAction::Start | TickAction::Record => true,
            TickAction::Finish { record } => *record,
        }
    }
}

/// One drawn frame
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Tick {
    /// Index of the frame to draw
    pub index: usize,
    /// Capture action tied to this frame
    pub action: TickAction,
}

/// Runtime state of one video-assembly pass
#[derive(Debug)]
pub struct CaptureSession {
    len: usize,
    index: usize,
    interval: Duration,
    last_drawn: Option<Instant>,
    state: CaptureState,
    recorded: usize,
}

impl CaptureSession {
    /// Create a session over `len` frames drawn every `interval`
    pub fn new(len: usize, interval: Duration) -> Result<Self, CaptureError> {
        if len == 0 {
            return Err(CaptureError::EmptySequence);
        }
        Ok(Self {
            len,
            index: 0,
            interval,
            last_drawn: None,
            state: CaptureState::Idle,
            recorded: 0,
        })
    }

    /// Current state
    pub fn state(&self) -> CaptureState {
        self.state
    }

    /// Index of the next frame to draw
    pub fn index(&self) -> usize {
        self.index
    }

    /// Frames recorded so far
    pub fn recorded(&self) -> usize {
        self.recorded
    }

    /// When the next frame is due; immediately if nothing was drawn yet
    pub fn next_deadline(&self) -> Instant {
        match self.last_drawn {
            Some(at) => at + self.interval,
            None => Instant::now(),
        }
    }

    /// Request capture; only an idle session can be armed
    pub fn arm(&mut self) -> Result<(), CaptureError> {
        match self.state {
            CaptureState::Idle => {
                self.state = CaptureState::Armed;
                Ok(())
            }
            state => Err(CaptureError::SessionInUse {
                state: state.to_string(),
            }),
        }
    }

    /// Advance the loop if a full interval has passed since the last draw
    ///
    /// An early call is a no-op. The draw time becomes `now`, so a late tick
    /// shifts the schedule instead of queueing catch-up frames.
    pub fn poll(&mut self, now: Instant) -> Option<Tick> {
        if let Some(at) = self.last_drawn
            && now.saturating_duration_since(at) < self.interval
        {
            return None;
        }
        self.last_drawn = Some(now);
        Some(self.advance())
    }

    fn advance(&mut self) -> Tick {
        let index = self.index;
        let last = self.len - 1;

        let action = match self.state {
            CaptureState::Armed if index == 0 => {
                self.state = CaptureState::Capturing;
                self.recorded = 1;
                TickAction::Start
            }
            CaptureState::Capturing if index == last => {
                self.state = CaptureState::Finished;
                let record = self.recorded < self.len;
                if record {
                    self.recorded += 1;
                }
                TickAction::Finish { record }
            }
            CaptureState::Capturing => {
                self.recorded += 1;
                TickAction::Record
            }
            _ => TickAction::Draw,
        };

        self.index = (index + 1) % self.len;
        Tick { index, action }
    }
}

use crate::patterns::PatternMode;
use crate::sequence::Sequence;
use crossbeam_channel::Sender;
use std::fmt;

// ─── Grid defaults ──────────────────────────────────────────────────────────

/// Default intensity resolution: levels run 0..=9, row 9 = full intensity.
pub const DEFAULT_ROWS: u32 = 10;
/// Default number of steps in a fresh sequence.
pub const DEFAULT_STEPS: usize = 16;
/// Default time between steps.
pub const DEFAULT_STEP_DURATION_MS: u64 = 500;
/// Step duration bounds. Values outside are clamped, never rejected.
pub const STEP_DURATION_MIN_MS: u64 = 250;
pub const STEP_DURATION_MAX_MS: u64 = 3000;

// ─── Actuator commands ──────────────────────────────────────────────────────

/// A normalized command as observed by an actuator sink.
/// `MemorySink` records these; transports encode them on the wire.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ActuatorCommand {
    /// Move to `position` (0.0 = rest, 1.0 = full stroke) over `duration_ms`.
    Linear { position: f64, duration_ms: u64 },
    /// Vibrate at `intensity` (0.0 = off, 1.0 = max).
    Vibrate { intensity: f64 },
}

impl ActuatorCommand {
    /// The normalized intensity carried by this command, whatever its shape.
    pub fn magnitude(&self) -> f64 {
        match *self {
            ActuatorCommand::Linear { position, .. } => position,
            ActuatorCommand::Vibrate { intensity } => intensity,
        }
    }
}

impl fmt::Display for ActuatorCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ActuatorCommand::Linear {
                position,
                duration_ms,
            } => write!(f, "linear pos={:.3} dur={}ms", position, duration_ms),
            ActuatorCommand::Vibrate { intensity } => write!(f, "vibrate {:.3}", intensity),
        }
    }
}

// ─── Inter-thread messages ──────────────────────────────────────────────────

/// Control commands accepted by the engine thread.
/// Commands and playback ticks are interleaved on one timeline, so every
/// sink write happens in command/tick order.
#[derive(Debug)]
pub enum EngineCmd {
    /// Stop the current playback (if any) and start the given playlist entry.
    Activate(usize),
    /// Stop playback. The ack is sent after the zero command has been
    /// issued to the sink, making the stop synchronous for the caller.
    StopPlayback { done: Sender<()> },
    SetAutoAdvance(bool),
    /// Append a sequence to the playlist.
    Push(Sequence),
    /// Remove a playlist entry, stopping it first if active.
    Remove(usize),
    /// Replace a playlist entry's levels with a fresh generator run.
    Regenerate {
        index: usize,
        mode: PatternMode,
        seed: Option<f64>,
    },
    /// Single-cell edit of one playlist entry.
    SetLevel {
        index: usize,
        step: usize,
        value: u32,
    },
    SetStepDuration {
        index: usize,
        ms: u64,
    },
    /// Stop playback, close the session, and exit the engine loop.
    Shutdown { done: Sender<()> },
}

/// Events broadcast by the engine to any number of listeners.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// One playback tick was dispatched.
    Step {
        index: usize,
        cursor: usize,
        intensity: f64,
    },
    /// The cursor of the given playlist entry wrapped back to step 0.
    LoopComplete(usize),
    /// Auto-advance moved from one playlist entry to the next.
    Advanced { from: usize, to: usize },
    /// The last playlist entry completed and auto-advance stopped the chain.
    Finished,
    /// Playback was stopped by command.
    Stopped,
}

use crate::sequence::Sequence;
use crate::session::DeviceSession;
use log::{debug, warn};
use std::time::Duration;

/// What one tick did: where the cursor landed, what was sent, and whether
/// the cursor wrapped back to step 0 (the loop-complete signal consumed by
/// the chain controller).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReport {
    pub cursor: usize,
    pub intensity: f64,
    pub loop_complete: bool,
}

/// Playback state machine: Stopped → Running → Stopped.
///
/// The cursor pre-increments, so a fresh 4-step run visits steps 1, 2, 3, 0,
/// 1, … and reports loop-complete on the tick that lands on 0. `Playback`
/// holds no timer of its own — the engine thread calls [`Playback::tick`] at
/// the configured interval, which keeps ticks serialized by construction and
/// lets a stop command always be the last thing the sink sees.
pub struct Playback {
    cursor: usize,
    running: bool,
    bound_steps: usize,
    bound_interval_ms: u64,
    warned_no_caps: bool,
}

impl Playback {
    pub fn new() -> Self {
        Self {
            cursor: 0,
            running: false,
            bound_steps: 0,
            bound_interval_ms: 0,
            warned_no_caps: false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// The tick interval the engine should pace at.
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.bound_interval_ms)
    }

    /// Begin (or re-begin) playback of `seq`. Idempotent while already
    /// running against the same binding; a different step count or duration
    /// resets the cursor to 0 and re-arms the interval.
    pub fn start(&mut self, seq: &Sequence, session: &DeviceSession) {
        if self.running
            && self.bound_steps == seq.len()
            && self.bound_interval_ms == seq.step_duration_ms()
        {
            return;
        }
        self.cursor = 0;
        self.running = true;
        self.bound_steps = seq.len();
        self.bound_interval_ms = seq.step_duration_ms();

        if let Some((linear, vibrate)) = session_caps(session) {
            if !linear && !vibrate && !self.warned_no_caps {
                warn!("sink advertises neither linear nor vibrate; playback will be silent");
                self.warned_no_caps = true;
            }
        }
    }

    /// Advance one step and dispatch the command for it. Returns `None` when
    /// stopped (no command is sent). A step-count change since the last tick
    /// resets the cursor before advancing.
    pub fn tick(&mut self, seq: &Sequence, session: &mut DeviceSession) -> Option<TickReport> {
        if !self.running || seq.is_empty() {
            return None;
        }
        if seq.len() != self.bound_steps {
            self.bound_steps = seq.len();
            self.cursor = 0;
        }
        self.bound_interval_ms = seq.step_duration_ms();

        self.cursor = (self.cursor + 1) % self.bound_steps;
        let intensity = seq.intensity(self.cursor);
        self.dispatch(session, intensity);

        Some(TickReport {
            cursor: self.cursor,
            intensity,
            loop_complete: self.cursor == 0,
        })
    }

    /// Transition to Stopped and park the actuator with a single zero
    /// command. Stopping an already-stopped playback sends nothing.
    pub fn stop(&mut self, session: &mut DeviceSession) {
        if !self.running {
            return;
        }
        self.running = false;
        self.dispatch(session, 0.0);
    }

    /// Send one intensity to whichever capability the sink advertises,
    /// preferring linear movement. A sink with neither capability (or a
    /// closed session) is a silent no-op.
    fn dispatch(&self, session: &mut DeviceSession, intensity: f64) {
        let duration_ms = self.bound_interval_ms;
        let Some(sink) = session.sink_mut() else {
            return;
        };
        let result = if sink.supports_linear() {
            sink.send_linear(intensity, duration_ms)
        } else if sink.supports_vibrate() {
            sink.send_vibrate(intensity)
        } else {
            Ok(())
        };
        if let Err(e) = result {
            debug!("sink send error: {}", e);
        }
    }
}

impl Default for Playback {
    fn default() -> Self {
        Self::new()
    }
}

fn session_caps(session: &DeviceSession) -> Option<(bool, bool)> {
    session
        .sink_ref()
        .map(|s| (s.supports_linear(), s.supports_vibrate()))
}

// ─── Tests ──────────────────────────────────────────────────────────────────

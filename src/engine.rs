use crate::chain::{ChainController, ChainTransition};
use crate::session::DeviceSession;
use crate::types::*;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, info, warn};
use std::time::{Duration, Instant};

/// The engine thread: owns the chain controller and the device session,
/// interleaving control commands with self-paced playback ticks on one
/// timeline. Every sink write happens here, so commands reach the device in
/// tick order and a stop is always the last thing the sink sees.
///
/// Pacing uses `recv_timeout` against the next tick deadline — there is no
/// separate timer to cancel or leak; changing the step duration simply
/// re-arms the deadline on the next iteration.
pub struct Engine {
    cmd_rx: Receiver<EngineCmd>,
    event_txs: Vec<Sender<EngineEvent>>,
    controller: ChainController,
    session: DeviceSession,
}

impl Engine {
    pub fn new(
        cmd_rx: Receiver<EngineCmd>,
        event_txs: Vec<Sender<EngineEvent>>,
        controller: ChainController,
        session: DeviceSession,
    ) -> Self {
        Self {
            cmd_rx,
            event_txs,
            controller,
            session,
        }
    }

    /// Run the engine loop. Blocks the calling thread until shutdown or
    /// until all command senders are dropped.
    pub fn run(&mut self) {
        info!(
            "engine running ({} playlist entries, session '{}')",
            self.controller.len(),
            self.session.name()
        );
        let mut next_tick: Option<Instant> = None;

        loop {
            let cmd = match next_tick {
                Some(deadline) => {
                    let timeout = deadline.saturating_duration_since(Instant::now());
                    match self.cmd_rx.recv_timeout(timeout) {
                        Ok(cmd) => Some(cmd),
                        Err(RecvTimeoutError::Timeout) => None,
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                // Idle: nothing to pace, just wait for a command.
                None => match self.cmd_rx.recv() {
                    Ok(cmd) => Some(cmd),
                    Err(_) => break,
                },
            };

            match cmd {
                Some(cmd) => {
                    // Activation rebinds the cadence: the first tick of the
                    // new entry is one full interval from now.
                    if matches!(cmd, EngineCmd::Activate(_)) {
                        next_tick = None;
                    }
                    if self.handle(cmd) {
                        return;
                    }
                }
                None => self.tick(),
            }

            next_tick = self.arm(next_tick);
        }

        // Senders gone: park the device on the way out.
        self.controller.stop(&mut self.session);
        self.session.close();
        info!("engine shutting down (channel closed)");
    }

    /// Compute the next tick deadline. A fresh activation (or a duration
    /// change) re-arms from now; an in-flight cadence keeps its deadline.
    fn arm(&self, current: Option<Instant>) -> Option<Instant> {
        let interval = self.controller.tick_interval()?;
        match current {
            Some(deadline) if deadline > Instant::now() => Some(deadline),
            _ => Some(Instant::now() + interval),
        }
    }

    fn tick(&mut self) {
        let Some(outcome) = self.controller.tick(&mut self.session) else {
            return;
        };
        self.emit(EngineEvent::Step {
            index: outcome.index,
            cursor: outcome.report.cursor,
            intensity: outcome.report.intensity,
        });
        if outcome.report.loop_complete {
            self.emit(EngineEvent::LoopComplete(outcome.index));
        }
        match outcome.transition {
            Some(ChainTransition::Advanced { from, to }) => {
                self.emit(EngineEvent::Advanced { from, to });
            }
            Some(ChainTransition::Finished) => {
                self.emit(EngineEvent::Finished);
            }
            None => {}
        }
    }

    /// Apply one command. Returns true when the engine should exit.
    fn handle(&mut self, cmd: EngineCmd) -> bool {
        match cmd {
            EngineCmd::Activate(index) => {
                if let Err(e) = self.controller.activate(index, &mut self.session) {
                    warn!("activate: {}", e);
                }
            }
            EngineCmd::StopPlayback { done } => {
                self.controller.stop(&mut self.session);
                self.emit(EngineEvent::Stopped);
                let _ = done.send(());
            }
            EngineCmd::SetAutoAdvance(enabled) => {
                self.controller.set_auto_advance(enabled);
            }
            EngineCmd::Push(seq) => {
                self.controller.push(seq);
            }
            EngineCmd::Remove(index) => {
                if let Err(e) = self.controller.remove(index, &mut self.session) {
                    warn!("remove: {}", e);
                }
            }
            EngineCmd::Regenerate { index, mode, seed } => {
                match self.controller.sequence_mut(index) {
                    Some(seq) => {
                        let steps = seq.len();
                        seq.regenerate(mode, steps, seed);
                        debug!("regenerated entry {} with {}", index, mode);
                    }
                    None => warn!("regenerate: no playlist entry {}", index),
                }
            }
            EngineCmd::SetLevel { index, step, value } => {
                match self.controller.sequence_mut(index) {
                    Some(seq) => {
                        if let Err(e) = seq.set_level(step, value) {
                            warn!("edit rejected: {}", e);
                        }
                    }
                    None => warn!("edit: no playlist entry {}", index),
                }
            }
            EngineCmd::SetStepDuration { index, ms } => {
                match self.controller.sequence_mut(index) {
                    Some(seq) => seq.set_step_duration(ms),
                    None => warn!("set duration: no playlist entry {}", index),
                }
            }
            EngineCmd::Shutdown { done } => {
                self.controller.stop(&mut self.session);
                self.session.close();
                info!("engine shutting down");
                let _ = done.send(());
                return true;
            }
        }
        false
    }

    fn emit(&self, event: EngineEvent) {
        for tx in &self.event_txs {
            let _ = tx.send(event.clone());
        }
    }
}

// ─── Handle ─────────────────────────────────────────────────────────────────

/// Cloneable client for a running engine. Most operations are
/// fire-and-forget; `stop` and `shutdown` block until the engine has parked
/// the actuator, making cancellation synchronous for the caller.
#[derive(Clone)]
pub struct EngineHandle {
    tx: Sender<EngineCmd>,
}

impl EngineHandle {
    pub fn new(tx: Sender<EngineCmd>) -> Self {
        Self { tx }
    }

    pub fn activate(&self, index: usize) {
        let _ = self.tx.send(EngineCmd::Activate(index));
    }

    /// Stop playback and wait for the zero command to have been issued.
    pub fn stop(&self) {
        let (done_tx, done_rx) = bounded(1);
        if self.tx.send(EngineCmd::StopPlayback { done: done_tx }).is_ok() {
            let _ = done_rx.recv();
        }
    }

    pub fn set_auto_advance(&self, enabled: bool) {
        let _ = self.tx.send(EngineCmd::SetAutoAdvance(enabled));
    }

    pub fn push(&self, seq: crate::sequence::Sequence) {
        let _ = self.tx.send(EngineCmd::Push(seq));
    }

    pub fn remove(&self, index: usize) {
        let _ = self.tx.send(EngineCmd::Remove(index));
    }

    pub fn regenerate(&self, index: usize, mode: crate::patterns::PatternMode, seed: Option<f64>) {
        let _ = self.tx.send(EngineCmd::Regenerate { index, mode, seed });
    }

    pub fn set_level(&self, index: usize, step: usize, value: u32) {
        let _ = self.tx.send(EngineCmd::SetLevel { index, step, value });
    }

    pub fn set_step_duration(&self, index: usize, ms: u64) {
        let _ = self.tx.send(EngineCmd::SetStepDuration { index, ms });
    }

    /// Stop, close the session, and wait for the engine loop to exit.
    pub fn shutdown(&self) {
        let (done_tx, done_rx) = bounded(1);
        if self.tx.send(EngineCmd::Shutdown { done: done_tx }).is_ok() {
            let _ = done_rx.recv();
        }
    }
}

use crate::scheduler::{Playback, TickReport};
use crate::sequence::Sequence;
use crate::session::DeviceSession;
use log::info;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChainError {
    #[error("playlist index {index} out of range (playlist has {len} entries)")]
    IndexOutOfRange { index: usize, len: usize },
}

/// A playlist transition triggered by a completed loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainTransition {
    /// Auto-advance handed off to the next entry.
    Advanced { from: usize, to: usize },
    /// The last entry finished; the chain stopped without wrapping around.
    Finished,
}

/// Everything one chain tick produced.
#[derive(Debug, Clone, Copy)]
pub struct TickOutcome {
    pub index: usize,
    pub report: TickReport,
    pub transition: Option<ChainTransition>,
}

/// Owns the playlist and decides which sequence is playing. There is exactly
/// one `Playback` inside, so "at most one active scheduler per sink" holds
/// structurally; hand-off between entries is stop-then-start, never
/// overlapping.
pub struct ChainController {
    playlist: Vec<Sequence>,
    active: Option<usize>,
    auto_advance: bool,
    playback: Playback,
}

impl ChainController {
    pub fn new() -> Self {
        Self {
            playlist: Vec::new(),
            active: None,
            auto_advance: false,
            playback: Playback::new(),
        }
    }

    pub fn with_playlist(playlist: Vec<Sequence>) -> Self {
        Self {
            playlist,
            active: None,
            auto_advance: false,
            playback: Playback::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.playlist.len()
    }

    pub fn is_empty(&self) -> bool {
        self.playlist.is_empty()
    }

    pub fn active(&self) -> Option<usize> {
        self.active
    }

    pub fn is_running(&self) -> bool {
        self.playback.is_running()
    }

    pub fn auto_advance(&self) -> bool {
        self.auto_advance
    }

    pub fn set_auto_advance(&mut self, enabled: bool) {
        self.auto_advance = enabled;
    }

    pub fn sequences(&self) -> &[Sequence] {
        &self.playlist
    }

    pub fn sequence(&self, index: usize) -> Option<&Sequence> {
        self.playlist.get(index)
    }

    pub fn sequence_mut(&mut self, index: usize) -> Option<&mut Sequence> {
        self.playlist.get_mut(index)
    }

    pub fn push(&mut self, seq: Sequence) {
        self.playlist.push(seq);
    }

    /// The interval the engine should pace ticks at, when running.
    pub fn tick_interval(&self) -> Option<Duration> {
        if self.playback.is_running() {
            Some(self.playback.interval())
        } else {
            None
        }
    }

    /// Stop whatever is active, then start `index`. The stop lands on the
    /// sink strictly before the first command of the new entry.
    pub fn activate(&mut self, index: usize, session: &mut DeviceSession) -> Result<(), ChainError> {
        if index >= self.playlist.len() {
            return Err(ChainError::IndexOutOfRange {
                index,
                len: self.playlist.len(),
            });
        }
        self.playback.stop(session);
        self.playback.start(&self.playlist[index], session);
        self.active = Some(index);
        info!(
            "chain: entry {} active ({} steps @ {}ms)",
            index,
            self.playlist[index].len(),
            self.playlist[index].step_duration_ms()
        );
        Ok(())
    }

    /// Stop playback entirely. The active entry is deselected.
    pub fn stop(&mut self, session: &mut DeviceSession) {
        self.playback.stop(session);
        self.active = None;
    }

    /// Drive the active playback one step. On loop completion, applies the
    /// auto-advance policy: advance to the next entry, or stop after the
    /// last one (no wraparound).
    pub fn tick(&mut self, session: &mut DeviceSession) -> Option<TickOutcome> {
        let index = self.active?;
        let report = self.playback.tick(&self.playlist[index], session)?;

        let transition = if report.loop_complete {
            self.on_loop_complete(index, session)
        } else {
            None
        };

        Some(TickOutcome {
            index,
            report,
            transition,
        })
    }

    fn on_loop_complete(
        &mut self,
        index: usize,
        session: &mut DeviceSession,
    ) -> Option<ChainTransition> {
        if !self.auto_advance {
            return None;
        }
        if index + 1 < self.playlist.len() {
            // activate() cannot fail here; the bound was just checked.
            let _ = self.activate(index + 1, session);
            Some(ChainTransition::Advanced {
                from: index,
                to: index + 1,
            })
        } else {
            info!("chain: last entry completed, stopping");
            self.stop(session);
            Some(ChainTransition::Finished)
        }
    }

    /// Remove a playlist entry, stopping playback first if it is the active
    /// one. Entries after it shift down by one.
    pub fn remove(&mut self, index: usize, session: &mut DeviceSession) -> Result<(), ChainError> {
        if index >= self.playlist.len() {
            return Err(ChainError::IndexOutOfRange {
                index,
                len: self.playlist.len(),
            });
        }
        if self.active == Some(index) {
            self.stop(session);
        }
        self.playlist.remove(index);
        if let Some(a) = self.active {
            if a > index {
                self.active = Some(a - 1);
            }
        }
        Ok(())
    }
}

impl Default for ChainController {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{MemorySink, SinkLog};

    fn session_with_log() -> (DeviceSession, SinkLog) {
        let sink = MemorySink::new();
        let log = sink.log();
        (DeviceSession::open("test", Box::new(sink)), log)
    }

    fn chain_of(count: usize, steps: usize) -> ChainController {
        ChainController::with_playlist((0..count).map(|_| Sequence::new(steps)).collect())
    }

    /// Tick until a transition fires, with a safety bound.
    fn tick_until_transition(
        chain: &mut ChainController,
        session: &mut DeviceSession,
    ) -> ChainTransition {
        for _ in 0..100 {
            if let Some(outcome) = chain.tick(session) {
                if let Some(t) = outcome.transition {
                    return t;
                }
            }
        }
        panic!("no transition within 100 ticks");
    }

    #[test]
    fn test_activate_out_of_range() {
        let (mut session, _log) = session_with_log();
        let mut chain = chain_of(2, 4);
        let err = chain.activate(5, &mut session).unwrap_err();
        assert_eq!(err, ChainError::IndexOutOfRange { index: 5, len: 2 });
        assert_eq!(chain.active(), None);
    }

    #[test]
    fn test_auto_advance_walks_the_playlist() {
        let (mut session, _log) = session_with_log();
        let mut chain = chain_of(3, 4);
        chain.set_auto_advance(true);
        chain.activate(0, &mut session).unwrap();

        assert_eq!(
            tick_until_transition(&mut chain, &mut session),
            ChainTransition::Advanced { from: 0, to: 1 }
        );
        assert_eq!(chain.active(), Some(1));

        assert_eq!(
            tick_until_transition(&mut chain, &mut session),
            ChainTransition::Advanced { from: 1, to: 2 }
        );
        assert_eq!(chain.active(), Some(2));
    }

    #[test]
    fn test_last_entry_stops_without_wraparound() {
        let (mut session, log) = session_with_log();
        let mut chain = chain_of(3, 4);
        chain.set_auto_advance(true);
        chain.activate(2, &mut session).unwrap();

        assert_eq!(
            tick_until_transition(&mut chain, &mut session),
            ChainTransition::Finished
        );
        assert_eq!(chain.active(), None);
        assert!(!chain.is_running());
        assert_eq!(log.last().unwrap().magnitude(), 0.0);

        // Fully stopped: further ticks do nothing.
        assert!(chain.tick(&mut session).is_none());
    }

    #[test]
    fn test_no_auto_advance_keeps_looping() {
        let (mut session, _log) = session_with_log();
        let mut chain = chain_of(2, 4);
        chain.activate(0, &mut session).unwrap();

        let mut wraps = 0;
        for _ in 0..12 {
            let outcome = chain.tick(&mut session).unwrap();
            assert!(outcome.transition.is_none());
            if outcome.report.loop_complete {
                wraps += 1;
            }
        }
        assert_eq!(wraps, 3, "three full cycles of a 4-step sequence");
        assert_eq!(chain.active(), Some(0));
    }

    #[test]
    fn test_hand_off_is_stop_then_start() {
        let (mut session, log) = session_with_log();
        let mut chain = chain_of(2, 2);
        // Distinct levels so commands are attributable.
        chain.sequence_mut(0).unwrap().set_level(0, 9).unwrap();
        chain.sequence_mut(0).unwrap().set_level(1, 9).unwrap();
        chain.activate(0, &mut session).unwrap();
        chain.tick(&mut session);

        chain.activate(1, &mut session).unwrap();
        let commands = log.commands();
        // tick(1.0), then stop(0.0) from the hand-off
        assert_eq!(commands.last().unwrap().magnitude(), 0.0);
    }

    #[test]
    fn test_remove_active_entry_stops_playback() {
        let (mut session, log) = session_with_log();
        let mut chain = chain_of(3, 4);
        chain.activate(1, &mut session).unwrap();
        chain.tick(&mut session);

        chain.remove(1, &mut session).unwrap();
        assert_eq!(chain.len(), 2);
        assert_eq!(chain.active(), None);
        assert!(!chain.is_running());
        assert_eq!(log.last().unwrap().magnitude(), 0.0);
    }

    #[test]
    fn test_remove_before_active_reindexes() {
        let (mut session, _log) = session_with_log();
        let mut chain = chain_of(3, 4);
        chain.activate(2, &mut session).unwrap();

        chain.remove(0, &mut session).unwrap();
        assert_eq!(chain.active(), Some(1), "active index shifted down");
        assert!(chain.is_running());
    }

    #[test]
    fn test_remove_out_of_range() {
        let (mut session, _log) = session_with_log();
        let mut chain = chain_of(1, 4);
        let err = chain.remove(3, &mut session).unwrap_err();
        assert_eq!(err, ChainError::IndexOutOfRange { index: 3, len: 1 });
    }

    #[test]
    fn test_activate_while_stopped_sends_no_spurious_zero() {
        let (mut session, log) = session_with_log();
        let mut chain = chain_of(1, 4);
        chain.activate(0, &mut session).unwrap();
        // Nothing was running before, so no stop command was emitted.
        assert!(log.is_empty());
    }
}

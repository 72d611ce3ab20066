use crate::patterns::{self, PatternMode};
use crate::types::*;
use thiserror::Error;

/// Edit rejections. The sequence is left unchanged when these are returned.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SequenceError {
    #[error("step index {index} out of range (sequence has {len} steps)")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("level {value} out of range (grid has {rows} rows)")]
    LevelOutOfRange { value: u32, rows: u32 },
}

/// One pattern on the timeline: an ordered run of intensity levels plus the
/// time between steps. Levels are row indices in `[0, rows-1]`; playback
/// normalizes them to `[0, 1]` by dividing by `rows - 1`.
///
/// The length invariant (`levels.len()` == step count) is maintained by
/// construction: resizes truncate or zero-pad, edits are bounds-checked, and
/// generator runs always produce exactly the requested number of steps.
#[derive(Debug, Clone, PartialEq)]
pub struct Sequence {
    rows: u32,
    levels: Vec<u32>,
    step_duration_ms: u64,
}

impl Sequence {
    /// A silent (all-zero) sequence of `steps` steps at the default duration.
    pub fn new(steps: usize) -> Self {
        Self {
            rows: DEFAULT_ROWS,
            levels: vec![0; steps.max(1)],
            step_duration_ms: DEFAULT_STEP_DURATION_MS,
        }
    }

    /// Build from explicit levels. Levels are clamped into `[0, rows-1]` and
    /// the duration is clamped like [`Sequence::set_step_duration`].
    pub fn from_levels(rows: u32, levels: Vec<u32>, step_duration_ms: u64) -> Self {
        let rows = rows.max(2);
        let mut seq = Self {
            rows,
            levels: levels.into_iter().map(|v| v.min(rows - 1)).collect(),
            step_duration_ms: DEFAULT_STEP_DURATION_MS,
        };
        if seq.levels.is_empty() {
            seq.levels.push(0);
        }
        seq.set_step_duration(step_duration_ms);
        seq
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn levels(&self) -> &[u32] {
        &self.levels
    }

    pub fn level(&self, step: usize) -> Option<u32> {
        self.levels.get(step).copied()
    }

    pub fn step_duration_ms(&self) -> u64 {
        self.step_duration_ms
    }

    /// Level at `step` normalized to `[0, 1]`.
    pub fn intensity(&self, step: usize) -> f64 {
        match self.levels.get(step) {
            Some(&v) => v as f64 / (self.rows - 1) as f64,
            None => 0.0,
        }
    }

    /// Single-cell edit. Rejected (state unchanged) when the step index or
    /// the value is out of range.
    pub fn set_level(&mut self, step: usize, value: u32) -> Result<(), SequenceError> {
        if step >= self.levels.len() {
            return Err(SequenceError::IndexOutOfRange {
                index: step,
                len: self.levels.len(),
            });
        }
        if value >= self.rows {
            return Err(SequenceError::LevelOutOfRange {
                value,
                rows: self.rows,
            });
        }
        self.levels[step] = value;
        Ok(())
    }

    /// Change the step count, preserving the prefix: growing zero-pads,
    /// shrinking truncates.
    pub fn resize(&mut self, steps: usize) {
        self.levels.resize(steps.max(1), 0);
    }

    /// Set the time between steps, silently clamped to the supported range.
    pub fn set_step_duration(&mut self, ms: u64) {
        self.step_duration_ms = ms.clamp(STEP_DURATION_MIN_MS, STEP_DURATION_MAX_MS);
    }

    /// Full replacement of the levels by a generator run. The current levels
    /// are handed to the generator so pass-through modes can preserve them.
    pub fn regenerate(&mut self, mode: PatternMode, steps: usize, seed: Option<f64>) {
        self.levels = patterns::generate(mode, self.rows, steps.max(1), seed, &self.levels);
    }
}

impl Default for Sequence {
    fn default() -> Self {
        Self::new(DEFAULT_STEPS)
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

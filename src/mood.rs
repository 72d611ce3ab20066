use crate::sequence::Sequence;
use log::warn;
use std::f64::consts::PI;
use thiserror::Error;

/// Sampling grid for rendered mood curves.
pub const MOOD_STEP_MS: u64 = 100;

/// Parameter bundle describing a mood curve. Values are expected in roughly
/// `[0, 1.5]`; anything outside is clamped before rendering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoodParams {
    /// Baseline intensity offset.
    pub intensity: f64,
    /// Cycles per second of the primary oscillation.
    pub frequency: f64,
    /// High smoothness suppresses the secondary 1 Hz swell.
    pub smoothness: f64,
    /// Amplitude of the primary oscillation.
    pub variation: f64,
}

impl MoodParams {
    fn clamped(self) -> Self {
        Self {
            intensity: self.intensity.clamp(0.0, 1.5),
            frequency: self.frequency.clamp(0.0, 1.5),
            smoothness: self.smoothness.clamp(0.0, 1.5),
            variation: self.variation.clamp(0.0, 1.5),
        }
    }
}

#[derive(Debug, Error)]
pub enum MoodError {
    #[error("mood source unavailable: {0}")]
    Unavailable(String),
    #[error("malformed mood response: {0}")]
    Malformed(String),
}

/// Something that turns free-form text into mood parameters. The production
/// implementation talks to an external language model; the engine only sees
/// this trait, and any failure is absorbed locally by the fallback curve.
pub trait MoodSource {
    fn interpret(&mut self, text: &str) -> Result<MoodParams, MoodError>;
}

/// Offline word-matching source. Good enough for the CLI demo and as a
/// deterministic stand-in where no external mapper is wired up.
pub struct KeywordMoodSource;

impl MoodSource for KeywordMoodSource {
    fn interpret(&mut self, text: &str) -> Result<MoodParams, MoodError> {
        let lower = text.to_ascii_lowercase();
        let mut params = MoodParams {
            intensity: 0.5,
            frequency: 0.5,
            smoothness: 0.5,
            variation: 0.5,
        };
        for word in lower.split_whitespace() {
            match word.trim_matches(|c: char| !c.is_alphanumeric()) {
                "calm" | "gentle" | "soft" | "slow" => {
                    params.intensity -= 0.2;
                    params.frequency -= 0.2;
                    params.smoothness += 0.3;
                }
                "intense" | "hard" | "strong" => {
                    params.intensity += 0.4;
                    params.variation += 0.2;
                }
                "fast" | "quick" | "rapid" => {
                    params.frequency += 0.4;
                }
                "wave" | "rolling" | "swell" => {
                    params.variation += 0.3;
                    params.smoothness -= 0.2;
                }
                "pulse" | "throb" | "beat" => {
                    params.frequency += 0.2;
                    params.variation += 0.4;
                    params.smoothness -= 0.3;
                }
                "steady" | "constant" | "flat" => {
                    params.variation -= 0.4;
                    params.smoothness += 0.4;
                }
                _ => {}
            }
        }
        Ok(params.clamped())
    }
}

/// Sample the mood curve on the 100 ms grid:
/// `value(t) = clamp(intensity + sin(2πt·frequency)·variation
///                   + sin(2πt)·(1 - smoothness), 0, 1)`.
pub fn render(params: MoodParams, duration_ms: u64) -> Vec<f64> {
    let params = params.clamped();
    let steps = (duration_ms / MOOD_STEP_MS).max(1) as usize;
    (0..steps)
        .map(|i| {
            let t = (i as u64 * MOOD_STEP_MS) as f64 / 1000.0;
            let value = params.intensity
                + (2.0 * PI * t * params.frequency).sin() * params.variation
                + (2.0 * PI * t).sin() * (1.0 - params.smoothness);
            value.clamp(0.0, 1.0)
        })
        .collect()
}

/// The recovery curve: constant half intensity for the same step count.
pub fn fallback(duration_ms: u64) -> Vec<f64> {
    let steps = (duration_ms / MOOD_STEP_MS).max(1) as usize;
    vec![0.5; steps]
}

/// Build a playable sequence from free-form text. Source failures are
/// logged and absorbed — the caller always gets a sequence. Note the step
/// duration of the resulting sequence is subject to the usual clamp, so the
/// 100 ms sampling grid plays back at the minimum supported step duration.
pub fn sequence_from_text<S: MoodSource>(
    source: &mut S,
    text: &str,
    duration_ms: u64,
    rows: u32,
) -> Sequence {
    let curve = match source.interpret(text) {
        Ok(params) => render(params, duration_ms),
        Err(e) => {
            warn!("mood source failed ({}), using fallback curve", e);
            fallback(duration_ms)
        }
    };
    let rows = rows.max(2);
    let levels: Vec<u32> = curve
        .iter()
        .map(|v| ((v * (rows - 1) as f64).round() as u32).min(rows - 1))
        .collect();
    Sequence::from_levels(rows, levels, MOOD_STEP_MS)
}

// ─── Tests ──────────────────────────────────────────────────────────────────

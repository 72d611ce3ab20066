use log::debug;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use std::f64::consts::PI;
use std::fmt;

/// Pattern generation strategy. One pure function per tag; dispatch is a
/// plain match, no trait objects needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternMode {
    Sine,
    Square,
    Triangle,
    Sawtooth,
    Random,
    Brownian,
    LifeLike,
    Perlin,
    Automaton,
    Genetic,
    Markov,
    Neural,
    Drift,
    /// Pass-through: keep the caller's existing levels, padded or truncated
    /// to the requested length. Unknown mode names resolve here.
    Keep,
}

impl PatternMode {
    /// Total parse: unknown names fall back to `Keep` rather than erroring.
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "sine" => PatternMode::Sine,
            "square" => PatternMode::Square,
            "triangle" => PatternMode::Triangle,
            "sawtooth" | "saw" => PatternMode::Sawtooth,
            "random" => PatternMode::Random,
            "brownian" => PatternMode::Brownian,
            "lifelike" | "life" => PatternMode::LifeLike,
            "perlin" => PatternMode::Perlin,
            "automaton" => PatternMode::Automaton,
            "genetic" => PatternMode::Genetic,
            "markov" => PatternMode::Markov,
            "neural" => PatternMode::Neural,
            "drift" => PatternMode::Drift,
            other => {
                debug!("unknown pattern mode '{}', keeping existing levels", other);
                PatternMode::Keep
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PatternMode::Sine => "sine",
            PatternMode::Square => "square",
            PatternMode::Triangle => "triangle",
            PatternMode::Sawtooth => "sawtooth",
            PatternMode::Random => "random",
            PatternMode::Brownian => "brownian",
            PatternMode::LifeLike => "lifelike",
            PatternMode::Perlin => "perlin",
            PatternMode::Automaton => "automaton",
            PatternMode::Genetic => "genetic",
            PatternMode::Markov => "markov",
            PatternMode::Neural => "neural",
            PatternMode::Drift => "drift",
            PatternMode::Keep => "keep",
        }
    }

    /// All generating modes, in CLI help order.
    pub const ALL: [PatternMode; 13] = [
        PatternMode::Sine,
        PatternMode::Square,
        PatternMode::Triangle,
        PatternMode::Sawtooth,
        PatternMode::Random,
        PatternMode::Brownian,
        PatternMode::LifeLike,
        PatternMode::Perlin,
        PatternMode::Automaton,
        PatternMode::Genetic,
        PatternMode::Markov,
        PatternMode::Neural,
        PatternMode::Drift,
    ];
}

impl fmt::Display for PatternMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Generate a level run: length == `cols`, every value in `[0, rows-1]`.
/// Total — no error path. Deterministic modes ignore the RNG entirely;
/// stochastic modes are reproducible when `seed` is given.
///
/// `existing` is only consulted by `Keep`, which pads/truncates it.
pub fn generate(
    mode: PatternMode,
    rows: u32,
    cols: usize,
    seed: Option<f64>,
    existing: &[u32],
) -> Vec<u32> {
    let rows = rows.max(2);
    let cols = cols.max(1);
    let mut rng = seeded_rng(seed);

    let out = match mode {
        PatternMode::Sine => waveform(rows, cols, |t| ((2.0 * PI * t).sin() + 1.0) / 2.0),
        PatternMode::Square => waveform(rows, cols, |t| if t < 0.5 { 1.0 } else { 0.0 }),
        PatternMode::Triangle => waveform(rows, cols, |t| 1.0 - (2.0 * t - 1.0).abs()),
        PatternMode::Sawtooth => waveform(rows, cols, |t| t),
        PatternMode::Random => uniform_random(rows, cols, &mut rng),
        PatternMode::Brownian => brownian(rows, cols, &mut rng),
        PatternMode::LifeLike => life_like(rows, cols, &mut rng),
        PatternMode::Perlin => value_noise(rows, cols, &mut rng),
        PatternMode::Automaton => automaton(rows, cols, seed),
        PatternMode::Genetic => genetic(rows, cols, &mut rng),
        PatternMode::Markov => markov(rows, cols, seed, &mut rng),
        PatternMode::Neural => neural(rows, cols, &mut rng),
        PatternMode::Drift => drift(rows, cols, &mut rng),
        PatternMode::Keep => keep(rows, cols, existing),
    };

    debug_assert_eq!(out.len(), cols);
    debug_assert!(out.iter().all(|&v| v < rows));
    out
}

fn seeded_rng(seed: Option<f64>) -> ChaCha8Rng {
    match seed {
        Some(s) => ChaCha8Rng::seed_from_u64(s.to_bits()),
        None => ChaCha8Rng::from_os_rng(),
    }
}

/// Level derived from a seed float in [0,1). Out-of-range seeds wrap.
fn seed_level(seed: f64, rows: u32) -> u32 {
    let frac = seed.rem_euclid(1.0);
    ((frac * rows as f64) as u32).min(rows - 1)
}

fn clamp_level(v: i64, rows: u32) -> u32 {
    v.clamp(0, (rows - 1) as i64) as u32
}

// ─── Deterministic waveforms ────────────────────────────────────────────────

/// Sample a normalized waveform (`[0,1] → [0,1]`) across the column axis.
/// Phase is `i / cols`, so the pattern is periodic over exactly one run.
fn waveform<F: Fn(f64) -> f64>(rows: u32, cols: usize, wave: F) -> Vec<u32> {
    (0..cols)
        .map(|i| {
            let t = i as f64 / cols as f64;
            let norm = wave(t).clamp(0.0, 1.0);
            ((norm * (rows - 1) as f64).floor() as u32).min(rows - 1)
        })
        .collect()
}

// ─── Stochastic walks ───────────────────────────────────────────────────────

fn uniform_random(rows: u32, cols: usize, rng: &mut ChaCha8Rng) -> Vec<u32> {
    (0..cols)
        .map(|_| ((rng.random::<f64>() * rows as f64) as u32).min(rows - 1))
        .collect()
}

/// Bounded random walk: ±1 with combined probability 0.7, ±2 with 0.3.
fn brownian(rows: u32, cols: usize, rng: &mut ChaCha8Rng) -> Vec<u32> {
    let mut v = ((rng.random::<f64>() * rows as f64) as u32).min(rows - 1);
    let mut out = Vec::with_capacity(cols);
    for _ in 0..cols {
        out.push(v);
        let u = rng.random::<f64>();
        let step: i64 = if u < 0.35 {
            -1
        } else if u < 0.70 {
            1
        } else if u < 0.85 {
            -2
        } else {
            2
        };
        v = clamp_level(v as i64 + step, rows);
    }
    out
}

/// Weighted walk with a bias toward staying put, plus an anti-sticking rule:
/// the walk never sits at either boundary two steps in a row.
fn life_like(rows: u32, cols: usize, rng: &mut ChaCha8Rng) -> Vec<u32> {
    const STEPS: [i64; 5] = [-2, -1, 0, 1, 2];
    const WEIGHTS: [f64; 5] = [0.1, 0.2, 0.4, 0.2, 0.1];
    let top = rows - 1;

    let mut v = ((rng.random::<f64>() * rows as f64) as u32).min(top);
    let mut out = Vec::with_capacity(cols);
    for _ in 0..cols {
        out.push(v);
        let u = rng.random::<f64>();
        let mut cdf = 0.0;
        let mut step = 0i64;
        for (s, w) in STEPS.iter().zip(WEIGHTS.iter()) {
            cdf += w;
            if u < cdf {
                step = *s;
                break;
            }
        }
        let mut next = clamp_level(v as i64 + step, rows);
        // Anti-sticking: a second consecutive step at a boundary is forced
        // one level inward.
        if next == 0 && v == 0 {
            next = 1;
        } else if next == top && v == top {
            next = top - 1;
        }
        v = next;
    }
    out
}

/// Start anywhere, then change by at most one level per step.
fn drift(rows: u32, cols: usize, rng: &mut ChaCha8Rng) -> Vec<u32> {
    let mut v = ((rng.random::<f64>() * rows as f64) as u32).min(rows - 1);
    let mut out = Vec::with_capacity(cols);
    for _ in 0..cols {
        out.push(v);
        let step = rng.random_range(-1..=1i64);
        v = clamp_level(v as i64 + step, rows);
    }
    out
}

// ─── Smoothed fractal noise ─────────────────────────────────────────────────

const NOISE_OCTAVES: u32 = 4;

/// Multi-octave value noise: random lattice values interpolated with a
/// smoothstep, amplitude halving and frequency doubling per octave. The sum
/// is normalized back to [-1,1], then mapped to rows via `(n+1)/2`.
fn value_noise(rows: u32, cols: usize, rng: &mut ChaCha8Rng) -> Vec<u32> {
    // One lattice per octave. Octave o has 2^(o+1) cells over the run.
    let lattices: Vec<Vec<f64>> = (0..NOISE_OCTAVES)
        .map(|o| {
            let cells = 1usize << (o + 1);
            (0..=cells).map(|_| rng.random::<f64>() * 2.0 - 1.0).collect()
        })
        .collect();

    let max_amplitude: f64 = (0..NOISE_OCTAVES).map(|o| 0.5f64.powi(o as i32)).sum();

    (0..cols)
        .map(|i| {
            let t = i as f64 / cols as f64;
            let mut n = 0.0;
            let mut amplitude = 1.0;
            for lattice in &lattices {
                let cells = lattice.len() - 1;
                let x = t * cells as f64;
                let i0 = (x as usize).min(cells - 1);
                let frac = x - i0 as f64;
                let s = frac * frac * (3.0 - 2.0 * frac);
                n += amplitude * (lattice[i0] * (1.0 - s) + lattice[i0 + 1] * s);
                amplitude *= 0.5;
            }
            let norm = (n / max_amplitude + 1.0) / 2.0;
            ((norm.clamp(0.0, 1.0) * (rows - 1) as f64).round() as u32).min(rows - 1)
        })
        .collect()
}

// ─── Automaton ──────────────────────────────────────────────────────────────

/// Randomized local update from the previous value. The seed picks a rule
/// index and the first level; the walk itself draws from an unseeded RNG, so
/// repeated runs with the same seed share only their starting point.
fn automaton(rows: u32, cols: usize, seed: Option<f64>) -> Vec<u32> {
    let mut rng = ChaCha8Rng::from_os_rng();
    let rule = seed.map(|s| (s.rem_euclid(1.0) * 255.0) as u8).unwrap_or(0);
    debug!("automaton rule {}", rule);

    let mut v = match seed {
        Some(s) => seed_level(s, rows),
        None => ((rng.random::<f64>() * rows as f64) as u32).min(rows - 1),
    };
    let mut out = Vec::with_capacity(cols);
    for _ in 0..cols {
        out.push(v);
        // Local neighborhood update with an occasional jump to a fresh cell.
        let next = if rng.random::<f64>() < 0.1 {
            rng.random_range(0..rows as i64)
        } else {
            v as i64 + rng.random_range(-2..=2i64)
        };
        v = clamp_level(next, rows);
    }
    out
}

// ─── Population search ──────────────────────────────────────────────────────

const POPULATION: usize = 10;
const SURVIVORS: usize = 5;
const GENERATIONS: usize = 5;
const MUTATION_RATE: f64 = 0.1;

/// Smoothness fitness: adjacent pairs score `1 - |Δ| / rows`, summed.
fn fitness(levels: &[u32], rows: u32) -> f64 {
    levels
        .windows(2)
        .map(|w| 1.0 - (w[1] as f64 - w[0] as f64).abs() / rows as f64)
        .sum()
}

/// One generation: sort by descending fitness, keep the top half, refill by
/// uniform crossover of two random survivors with per-gene mutation.
fn evolve(population: &mut Vec<Vec<u32>>, rows: u32, rng: &mut ChaCha8Rng) {
    population.sort_by(|a, b| {
        fitness(b, rows)
            .partial_cmp(&fitness(a, rows))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    population.truncate(SURVIVORS);
    while population.len() < POPULATION {
        let p1 = &population[rng.random_range(0..SURVIVORS)];
        let p2 = &population[rng.random_range(0..SURVIVORS)];
        let child: Vec<u32> = p1
            .iter()
            .zip(p2.iter())
            .map(|(&a, &b)| {
                if rng.random::<f64>() < MUTATION_RATE {
                    ((rng.random::<f64>() * rows as f64) as u32).min(rows - 1)
                } else if rng.random::<bool>() {
                    a
                } else {
                    b
                }
            })
            .collect();
        population.push(child);
    }
}

fn genetic(rows: u32, cols: usize, rng: &mut ChaCha8Rng) -> Vec<u32> {
    let mut population: Vec<Vec<u32>> =
        (0..POPULATION).map(|_| uniform_random(rows, cols, rng)).collect();
    for _ in 0..GENERATIONS {
        evolve(&mut population, rows, rng);
    }
    population
        .into_iter()
        .max_by(|a, b| {
            fitness(a, rows)
                .partial_cmp(&fitness(b, rows))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .unwrap_or_else(|| vec![0; cols])
}

// ─── Markov chain ───────────────────────────────────────────────────────────

/// Build a row-stochastic transition matrix from uniform draws, then walk it
/// by inverse-CDF sampling.
fn markov(rows: u32, cols: usize, seed: Option<f64>, rng: &mut ChaCha8Rng) -> Vec<u32> {
    let n = rows as usize;
    let matrix: Vec<Vec<f64>> = (0..n)
        .map(|_| {
            let weights: Vec<f64> = (0..n).map(|_| rng.random::<f64>()).collect();
            let total: f64 = weights.iter().sum();
            weights.iter().map(|w| w / total.max(f64::MIN_POSITIVE)).collect()
        })
        .collect();

    let mut state = match seed {
        Some(s) => seed_level(s, rows) as usize,
        None => rng.random_range(0..n),
    };
    let mut out = Vec::with_capacity(cols);
    for _ in 0..cols {
        out.push(state as u32);
        let u = rng.random::<f64>();
        let mut cdf = 0.0;
        let mut next = n - 1;
        for (j, p) in matrix[state].iter().enumerate() {
            cdf += p;
            if cdf >= u {
                next = j;
                break;
            }
        }
        state = next;
    }
    out
}

// ─── Feed-forward network sampling ──────────────────────────────────────────

const NET_INPUTS: usize = 5;
const NET_HIDDEN: usize = 16;

/// A 5→16→rows network with random weights maps a sliding window of recent
/// random inputs to an output vector; the chosen level is the argmax. After
/// each step the window shifts by one, appending a fresh random input.
fn neural(rows: u32, cols: usize, rng: &mut ChaCha8Rng) -> Vec<u32> {
    let n_out = rows as usize;
    let w1: Vec<[f64; NET_INPUTS]> = (0..NET_HIDDEN)
        .map(|_| std::array::from_fn(|_| rng.random::<f64>() * 2.0 - 1.0))
        .collect();
    let b1: Vec<f64> = (0..NET_HIDDEN).map(|_| rng.random::<f64>() * 2.0 - 1.0).collect();
    let w2: Vec<Vec<f64>> = (0..n_out)
        .map(|_| (0..NET_HIDDEN).map(|_| rng.random::<f64>() * 2.0 - 1.0).collect())
        .collect();
    let b2: Vec<f64> = (0..n_out).map(|_| rng.random::<f64>() * 2.0 - 1.0).collect();

    let mut window: [f64; NET_INPUTS] = std::array::from_fn(|_| rng.random::<f64>());
    let mut out = Vec::with_capacity(cols);
    for _ in 0..cols {
        let hidden: Vec<f64> = (0..NET_HIDDEN)
            .map(|h| {
                let sum: f64 = window.iter().zip(w1[h].iter()).map(|(x, w)| x * w).sum();
                (sum + b1[h]).tanh()
            })
            .collect();
        let mut best = 0usize;
        let mut best_act = f64::NEG_INFINITY;
        for (j, (weights, bias)) in w2.iter().zip(b2.iter()).enumerate() {
            let act: f64 = hidden.iter().zip(weights.iter()).map(|(h, w)| h * w).sum::<f64>() + bias;
            if act > best_act {
                best_act = act;
                best = j;
            }
        }
        out.push(best as u32);
        window.rotate_left(1);
        window[NET_INPUTS - 1] = rng.random::<f64>();
    }
    out
}

// ─── Pass-through ───────────────────────────────────────────────────────────

/// Keep the caller's levels, truncated or zero-padded to `cols` and clamped
/// into the grid.
fn keep(rows: u32, cols: usize, existing: &[u32]) -> Vec<u32> {
    let mut out: Vec<u32> = existing.iter().take(cols).map(|&v| v.min(rows - 1)).collect();
    out.resize(cols, 0);
    out
}

// ─── Tests ──────────────────────────────────────────────────────────────────

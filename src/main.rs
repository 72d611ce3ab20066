use pulseweave::chain::ChainController;
use pulseweave::engine::{Engine, EngineHandle};
use pulseweave::mood::{self, KeywordMoodSource};
use pulseweave::patterns::PatternMode;
use pulseweave::sequence::Sequence;
use pulseweave::session::DeviceSession;
use pulseweave::sink::{ActuatorSink, ConsoleSink, OscSink};
use pulseweave::store;
use pulseweave::types::*;

use clap::Parser;
use crossbeam_channel::{bounded, unbounded};
use log::{error, info};
use std::path::PathBuf;
use std::thread;

#[derive(Parser)]
#[command(name = "pulseweave")]
#[command(about = "Haptic pattern generation and playback scheduling engine")]
struct Cli {
    /// Pattern modes to generate, comma separated (e.g. "sine,brownian,perlin").
    /// Unknown names keep whatever levels the sequence already has.
    #[arg(long, default_value = "sine")]
    modes: String,

    /// Intensity rows of the grid (levels run 0..rows-1)
    #[arg(long, default_value_t = DEFAULT_ROWS)]
    rows: u32,

    /// Steps per sequence
    #[arg(long, default_value_t = DEFAULT_STEPS)]
    steps: usize,

    /// Time between steps in milliseconds (clamped to 250-3000)
    #[arg(long, default_value_t = DEFAULT_STEP_DURATION_MS)]
    step_ms: u64,

    /// Seed in [0,1) for reproducible stochastic patterns
    #[arg(long)]
    seed: Option<f64>,

    /// Load the playlist from a JSON file instead of generating
    #[arg(long)]
    playlist: Option<PathBuf>,

    /// Save the assembled playlist to a JSON file before playing
    #[arg(long)]
    save: Option<PathBuf>,

    /// Advance through the playlist automatically on each completed loop
    #[arg(long)]
    auto_advance: bool,

    /// Append a sequence rendered from free-form mood text
    #[arg(long)]
    text: Option<String>,

    /// Duration of the mood sequence in milliseconds
    #[arg(long, default_value_t = 5000)]
    text_duration_ms: u64,

    /// Send commands as OSC over UDP instead of logging them
    #[arg(long)]
    osc: bool,

    /// OSC target address
    #[arg(long, default_value = "127.0.0.1:9000")]
    osc_target: String,

    /// Stop after this many completed loops (0 = run until Ctrl+C)
    #[arg(long, default_value_t = 0)]
    loops: u32,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    // ─── Assemble the playlist ──────────────────────────────────────
    let mut playlist: Vec<Sequence> = match &cli.playlist {
        Some(path) => match store::load_playlist(path) {
            Ok(seqs) => seqs,
            Err(e) => {
                error!("failed to load playlist: {}", e);
                std::process::exit(1);
            }
        },
        None => cli
            .modes
            .split(',')
            .map(|name| {
                let mode = PatternMode::from_name(name.trim());
                let mut seq = Sequence::from_levels(cli.rows, vec![0; cli.steps], cli.step_ms);
                seq.regenerate(mode, cli.steps, cli.seed);
                info!("generated '{}' sequence: {:?}", mode, seq.levels());
                seq
            })
            .collect(),
    };

    if let Some(text) = &cli.text {
        let seq = mood::sequence_from_text(
            &mut KeywordMoodSource,
            text,
            cli.text_duration_ms,
            cli.rows,
        );
        info!("mood sequence from {:?}: {:?}", text, seq.levels());
        playlist.push(seq);
    }

    if playlist.is_empty() {
        error!("nothing to play");
        std::process::exit(1);
    }

    if let Some(path) = &cli.save {
        if let Err(e) = store::save_playlist(path, &playlist) {
            error!("failed to save playlist: {}", e);
        }
    }

    // ─── Device session ─────────────────────────────────────────────
    let sink: Box<dyn ActuatorSink> = if cli.osc {
        match OscSink::bind(&cli.osc_target) {
            Ok(s) => Box::new(s),
            Err(e) => {
                error!("failed to bind OSC sink: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        Box::new(ConsoleSink)
    };
    let session = DeviceSession::open(if cli.osc { &cli.osc_target } else { "console" }, sink);

    info!("═══════════════════════════════════════════════");
    info!("  PULSEWEAVE v{}", env!("CARGO_PKG_VERSION"));
    info!("  Playlist: {} sequences", playlist.len());
    info!("  Auto-advance: {}", if cli.auto_advance { "ON" } else { "OFF" });
    info!("  Sink: {}", if cli.osc { &cli.osc_target } else { "console" });
    info!("═══════════════════════════════════════════════");

    // ─── Engine thread ──────────────────────────────────────────────
    let (cmd_tx, cmd_rx) = bounded::<EngineCmd>(256);
    let (event_tx, event_rx) = unbounded::<EngineEvent>();

    let mut controller = ChainController::with_playlist(playlist);
    controller.set_auto_advance(cli.auto_advance);

    let engine_handle = thread::Builder::new()
        .name("engine".into())
        .spawn(move || {
            Engine::new(cmd_rx, vec![event_tx], controller, session).run();
        })
        .unwrap();

    let handle = EngineHandle::new(cmd_tx);
    handle.activate(0);

    // ─── Event loop ─────────────────────────────────────────────────
    let mut completed_loops = 0u32;
    for event in event_rx.iter() {
        match event {
            EngineEvent::Step {
                index,
                cursor,
                intensity,
            } => {
                info!("entry {} step {} → {:.2}", index, cursor, intensity);
            }
            EngineEvent::LoopComplete(index) => {
                completed_loops += 1;
                info!("entry {} loop complete ({} total)", index, completed_loops);
                if cli.loops > 0 && completed_loops >= cli.loops {
                    handle.stop();
                    handle.shutdown();
                    break;
                }
            }
            EngineEvent::Advanced { from, to } => {
                info!("auto-advance {} → {}", from, to);
            }
            EngineEvent::Finished => {
                info!("playlist finished");
                handle.shutdown();
                break;
            }
            EngineEvent::Stopped => {
                info!("playback stopped");
            }
        }
    }

    let _ = engine_handle.join();
}

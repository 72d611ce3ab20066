//! End-to-end tests for the pulseweave engine.
//!
//! These exercise the full control flow:
//!   EngineHandle → command channel → Engine thread → ChainController →
//!   Playback → ActuatorSink, with EngineEvents flowing back out.
//!
//! The engine self-paces ticks at the sequence step duration, so these tests
//! run with the minimum step duration (250 ms) and small step counts.

use crossbeam_channel::{bounded, unbounded, Receiver};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use pulseweave::chain::ChainController;
use pulseweave::engine::{Engine, EngineHandle};
use pulseweave::sequence::Sequence;
use pulseweave::session::DeviceSession;
use pulseweave::sink::{MemorySink, SinkLog};
use pulseweave::types::*;

// ─── Helpers ───────────────────────────────────────────────────────────────

/// A short sequence with non-zero levels so sink commands are observable.
fn test_sequence(steps: usize) -> Sequence {
    let levels: Vec<u32> = (0..steps as u32).map(|i| (i % 9) + 1).collect();
    Sequence::from_levels(DEFAULT_ROWS, levels, 250)
}

struct Rig {
    handle: EngineHandle,
    events: Receiver<EngineEvent>,
    log: SinkLog,
    join: JoinHandle<()>,
}

/// Spawn an engine thread around the given playlist and a MemorySink.
fn spawn_engine(playlist: Vec<Sequence>, auto_advance: bool) -> Rig {
    spawn_engine_with_sink(playlist, auto_advance, MemorySink::new())
}

fn spawn_engine_with_sink(playlist: Vec<Sequence>, auto_advance: bool, sink: MemorySink) -> Rig {
    let log = sink.log();
    let session = DeviceSession::open("test-device", Box::new(sink));

    let mut controller = ChainController::with_playlist(playlist);
    controller.set_auto_advance(auto_advance);

    let (cmd_tx, cmd_rx) = bounded::<EngineCmd>(64);
    let (event_tx, event_rx) = unbounded::<EngineEvent>();

    let join = thread::Builder::new()
        .name("test-engine".into())
        .spawn(move || {
            Engine::new(cmd_rx, vec![event_tx], controller, session).run();
        })
        .unwrap();

    Rig {
        handle: EngineHandle::new(cmd_tx),
        events: event_rx,
        log,
        join,
    }
}

/// Collect events until `stop_on` matches one, or panic after `timeout`.
fn collect_until<F: FnMut(&EngineEvent) -> bool>(
    rx: &Receiver<EngineEvent>,
    mut stop_on: F,
    timeout: Duration,
) -> Vec<EngineEvent> {
    let mut events = Vec::new();
    loop {
        match rx.recv_timeout(timeout) {
            Ok(ev) => {
                let done = stop_on(&ev);
                events.push(ev);
                if done {
                    return events;
                }
            }
            Err(_) => panic!(
                "timed out waiting for terminal event; saw {} events: {:?}",
                events.len(),
                events
            ),
        }
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────

#[test]
fn test_auto_advance_walks_playlist_and_finishes() {
    let rig = spawn_engine(vec![test_sequence(2), test_sequence(2)], true);
    rig.handle.activate(0);

    let events = collect_until(
        &rig.events,
        |e| matches!(e, EngineEvent::Finished),
        Duration::from_secs(5),
    );

    // Both entries completed exactly one loop, with one hand-off between.
    let loops: Vec<usize> = events
        .iter()
        .filter_map(|e| match e {
            EngineEvent::LoopComplete(i) => Some(*i),
            _ => None,
        })
        .collect();
    assert_eq!(loops, vec![0, 1]);

    let advances: Vec<(usize, usize)> = events
        .iter()
        .filter_map(|e| match e {
            EngineEvent::Advanced { from, to } => Some((*from, *to)),
            _ => None,
        })
        .collect();
    assert_eq!(advances, vec![(0, 1)]);

    rig.handle.shutdown();
    let _ = rig.join.join();

    // The chain stopped itself after the last loop, so the final command on
    // the wire is the park/zero.
    let commands = rig.log.commands();
    assert!(!commands.is_empty());
    assert_eq!(commands.last().unwrap().magnitude(), 0.0);
}

#[test]
fn test_loop_complete_once_per_cycle() {
    let rig = spawn_engine(vec![test_sequence(3)], false);
    rig.handle.activate(0);

    // Two full cycles: 3 steps each, the wrap step carries loop-complete.
    let events = collect_until(
        &rig.events,
        {
            let mut wraps = 0;
            move |e| {
                if matches!(e, EngineEvent::LoopComplete(_)) {
                    wraps += 1;
                }
                wraps == 2
            }
        },
        Duration::from_secs(5),
    );

    let mut steps_since_wrap = 0;
    for ev in &events {
        match ev {
            EngineEvent::Step { .. } => steps_since_wrap += 1,
            EngineEvent::LoopComplete(0) => {
                assert_eq!(
                    steps_since_wrap, 3,
                    "exactly one loop-complete per 3-step cycle"
                );
                steps_since_wrap = 0;
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    rig.handle.shutdown();
    let _ = rig.join.join();
}

#[test]
fn test_stop_is_synchronous_and_final() {
    let rig = spawn_engine(vec![test_sequence(4)], false);
    rig.handle.activate(0);

    // Let at least one tick land.
    let _ = collect_until(
        &rig.events,
        |e| matches!(e, EngineEvent::Step { .. }),
        Duration::from_secs(2),
    );

    rig.handle.stop();
    // stop() has returned, so the zero command is already on the wire.
    let after_stop = rig.log.commands();
    assert_eq!(after_stop.last().unwrap().magnitude(), 0.0);

    // No tick may race past the stop: the log must not grow.
    thread::sleep(Duration::from_millis(700));
    assert_eq!(
        rig.log.len(),
        after_stop.len(),
        "commands appeared after a synchronous stop"
    );

    rig.handle.shutdown();
    let _ = rig.join.join();
}

#[test]
fn test_cursor_order_on_the_wire() {
    let rig = spawn_engine(vec![test_sequence(4)], false);
    rig.handle.activate(0);

    let events = collect_until(
        &rig.events,
        |e| matches!(e, EngineEvent::LoopComplete(_)),
        Duration::from_secs(5),
    );

    let cursors: Vec<usize> = events
        .iter()
        .filter_map(|e| match e {
            EngineEvent::Step { cursor, .. } => Some(*cursor),
            _ => None,
        })
        .collect();
    assert_eq!(cursors, vec![1, 2, 3, 0], "pre-increment step order");

    rig.handle.shutdown();
    let _ = rig.join.join();
}

#[test]
fn test_capability_less_sink_plays_silently() {
    let sink = MemorySink::with_capabilities(false, false);
    let rig = spawn_engine_with_sink(vec![test_sequence(2)], false, sink);
    rig.handle.activate(0);

    // Playback proceeds (events flow) without any device commands.
    let _ = collect_until(
        &rig.events,
        |e| matches!(e, EngineEvent::LoopComplete(_)),
        Duration::from_secs(3),
    );
    assert!(rig.log.is_empty(), "no commands for a capability-less sink");

    rig.handle.shutdown();
    let _ = rig.join.join();
}

#[test]
fn test_push_and_activate_new_entry() {
    let rig = spawn_engine(vec![test_sequence(2)], false);
    rig.handle.push(test_sequence(3));
    rig.handle.activate(1);

    let events = collect_until(
        &rig.events,
        |e| matches!(e, EngineEvent::LoopComplete(_)),
        Duration::from_secs(5),
    );

    // Three steps to the first wrap proves entry 1 (3 steps) is playing.
    let steps = events
        .iter()
        .filter(|e| matches!(e, EngineEvent::Step { .. }))
        .count();
    assert_eq!(steps, 3);
    assert!(matches!(
        events.last().unwrap(),
        EngineEvent::LoopComplete(1)
    ));

    rig.handle.shutdown();
    let _ = rig.join.join();
}

#[test]
fn test_remove_active_entry_stops_playback() {
    let rig = spawn_engine(vec![test_sequence(4), test_sequence(4)], false);
    rig.handle.activate(0);

    let _ = collect_until(
        &rig.events,
        |e| matches!(e, EngineEvent::Step { .. }),
        Duration::from_secs(2),
    );

    rig.handle.remove(0);
    // Force a synchronization point so the removal has been processed.
    rig.handle.stop();

    let commands = rig.log.commands();
    assert_eq!(commands.last().unwrap().magnitude(), 0.0);

    // Removing the active entry parked the device; no more steps arrive.
    thread::sleep(Duration::from_millis(700));
    assert_eq!(rig.log.len(), commands.len());

    rig.handle.shutdown();
    let _ = rig.join.join();
}

#[test]
fn test_shutdown_parks_and_exits() {
    let rig = spawn_engine(vec![test_sequence(4)], false);
    rig.handle.activate(0);

    let _ = collect_until(
        &rig.events,
        |e| matches!(e, EngineEvent::Step { .. }),
        Duration::from_secs(2),
    );

    rig.handle.shutdown();
    rig.join.join().unwrap();

    let commands = rig.log.commands();
    assert_eq!(
        commands.last().unwrap().magnitude(),
        0.0,
        "shutdown parks the actuator"
    );
}

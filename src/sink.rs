use crate::types::ActuatorCommand;
use log::info;
use rosc::{OscMessage, OscPacket, OscType};
use std::error::Error;
use std::net::UdpSocket;
use std::sync::{Arc, Mutex};

/// The device side of playback. The scheduler does not know the transport;
/// it only needs the capability flags and the two command shapes.
///
/// Implementations must tolerate fire-and-forget use: a send error is logged
/// by the caller and playback continues.
pub trait ActuatorSink: Send {
    fn supports_linear(&self) -> bool;
    fn supports_vibrate(&self) -> bool;
    /// Move to `position` in `[0, 1]` over `duration_ms`.
    fn send_linear(&mut self, position: f64, duration_ms: u64) -> Result<(), Box<dyn Error>>;
    /// Vibrate at `intensity` in `[0, 1]`.
    fn send_vibrate(&mut self, intensity: f64) -> Result<(), Box<dyn Error>>;
}

// ─── OSC sink ───────────────────────────────────────────────────────────────

/// Sends commands as OSC floats over UDP — a demo transport for patching the
/// engine into external rigs. `/pulse/linear` carries position then duration
/// in ms; `/pulse/vibrate` carries intensity.
pub struct OscSink {
    socket: UdpSocket,
    target: String,
    linear: bool,
    vibrate: bool,
}

impl OscSink {
    pub fn bind(target: &str) -> Result<Self, Box<dyn Error>> {
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        info!("OSC sink → {}", target);
        Ok(Self {
            socket,
            target: target.to_string(),
            linear: true,
            vibrate: true,
        })
    }

    /// Restrict the advertised capabilities (both are on by default).
    pub fn with_capabilities(mut self, linear: bool, vibrate: bool) -> Self {
        self.linear = linear;
        self.vibrate = vibrate;
        self
    }

    fn send(&self, addr: &str, args: Vec<OscType>) -> Result<(), Box<dyn Error>> {
        let msg = OscPacket::Message(OscMessage {
            addr: addr.to_string(),
            args,
        });
        let buf = rosc::encoder::encode(&msg)?;
        self.socket.send_to(&buf, &self.target)?;
        Ok(())
    }
}

impl ActuatorSink for OscSink {
    fn supports_linear(&self) -> bool {
        self.linear
    }

    fn supports_vibrate(&self) -> bool {
        self.vibrate
    }

    fn send_linear(&mut self, position: f64, duration_ms: u64) -> Result<(), Box<dyn Error>> {
        self.send(
            "/pulse/linear",
            vec![
                OscType::Float(position as f32),
                OscType::Int(duration_ms as i32),
            ],
        )
    }

    fn send_vibrate(&mut self, intensity: f64) -> Result<(), Box<dyn Error>> {
        self.send("/pulse/vibrate", vec![OscType::Float(intensity as f32)])
    }
}

// ─── Console sink ───────────────────────────────────────────────────────────

/// Logs every command instead of sending it anywhere. The default sink for
/// headless runs without an OSC target.
pub struct ConsoleSink;

impl ActuatorSink for ConsoleSink {
    fn supports_linear(&self) -> bool {
        true
    }

    fn supports_vibrate(&self) -> bool {
        true
    }

    fn send_linear(&mut self, position: f64, duration_ms: u64) -> Result<(), Box<dyn Error>> {
        info!("⇒ linear pos={:.3} dur={}ms", position, duration_ms);
        Ok(())
    }

    fn send_vibrate(&mut self, intensity: f64) -> Result<(), Box<dyn Error>> {
        info!("⇒ vibrate {:.3}", intensity);
        Ok(())
    }
}

// ─── Memory sink ────────────────────────────────────────────────────────────

/// Records every command it receives. Used by tests to assert on command
/// order and by the engine integration tests as a stand-in device.
///
/// The log lives behind an `Arc` so a test can keep a [`SinkLog`] handle
/// while the sink itself is boxed away inside a session.
pub struct MemorySink {
    log: SinkLog,
    linear: bool,
    vibrate: bool,
}

/// Shared view of the commands a [`MemorySink`] has observed.
#[derive(Clone, Default)]
pub struct SinkLog(Arc<Mutex<Vec<ActuatorCommand>>>);

impl SinkLog {
    pub fn commands(&self) -> Vec<ActuatorCommand> {
        self.0.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<ActuatorCommand> {
        self.0.lock().unwrap().last().copied()
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MemorySink {
    /// A sink advertising both capabilities.
    pub fn new() -> Self {
        Self::with_capabilities(true, true)
    }

    pub fn with_capabilities(linear: bool, vibrate: bool) -> Self {
        Self {
            log: SinkLog::default(),
            linear,
            vibrate,
        }
    }

    pub fn log(&self) -> SinkLog {
        self.log.clone()
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl ActuatorSink for MemorySink {
    fn supports_linear(&self) -> bool {
        self.linear
    }

    fn supports_vibrate(&self) -> bool {
        self.vibrate
    }

    fn send_linear(&mut self, position: f64, duration_ms: u64) -> Result<(), Box<dyn Error>> {
        self.log.0.lock().unwrap().push(ActuatorCommand::Linear {
            position,
            duration_ms,
        });
        Ok(())
    }

    fn send_vibrate(&mut self, intensity: f64) -> Result<(), Box<dyn Error>> {
        self.log
            .0
            .lock()
            .unwrap()
            .push(ActuatorCommand::Vibrate { intensity });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_records_in_order() {
        let mut sink = MemorySink::new();
        let log = sink.log();
        sink.send_linear(0.5, 300).unwrap();
        sink.send_vibrate(0.25).unwrap();
        assert_eq!(
            log.commands(),
            vec![
                ActuatorCommand::Linear {
                    position: 0.5,
                    duration_ms: 300
                },
                ActuatorCommand::Vibrate { intensity: 0.25 },
            ]
        );
    }

    #[test]
    fn test_capability_flags() {
        let sink = MemorySink::with_capabilities(false, true);
        assert!(!sink.supports_linear());
        assert!(sink.supports_vibrate());
    }
}

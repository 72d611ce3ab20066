use crate::sink::ActuatorSink;
use log::{debug, info};

/// Explicitly owned connection to one actuator. Constructed open around a
/// sink and passed to the engine; closing drops the sink after parking the
/// actuator at zero. A closed session swallows all further commands.
///
/// Holding device access in a value with a visible lifecycle (rather than a
/// process-wide connection lookup) is what lets tests substitute a
/// `MemorySink` and assert on exactly what the device saw.
pub struct DeviceSession {
    name: String,
    sink: Option<Box<dyn ActuatorSink>>,
}

impl DeviceSession {
    pub fn open(name: &str, sink: Box<dyn ActuatorSink>) -> Self {
        info!("session '{}' open", name);
        Self {
            name: name.to_string(),
            sink: Some(sink),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_open(&self) -> bool {
        self.sink.is_some()
    }

    pub fn sink_ref(&self) -> Option<&dyn ActuatorSink> {
        self.sink.as_deref()
    }

    pub fn sink_mut(&mut self) -> Option<&mut (dyn ActuatorSink + 'static)> {
        self.sink.as_deref_mut()
    }

    /// Park the actuator and release the sink. Idempotent.
    pub fn close(&mut self) {
        if let Some(mut sink) = self.sink.take() {
            let result = if sink.supports_linear() {
                sink.send_linear(0.0, 0)
            } else if sink.supports_vibrate() {
                sink.send_vibrate(0.0)
            } else {
                Ok(())
            };
            if let Err(e) = result {
                debug!("session '{}': park command failed: {}", self.name, e);
            }
            info!("session '{}' closed", self.name);
        }
    }
}

impl Drop for DeviceSession {
    fn drop(&mut self) {
        self.close();
    }
}

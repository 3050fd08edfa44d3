/// Diagnostic sink traits
///
/// The device model does not log through a global logger. Each device gets a
/// sink at construction time and reports everything through it. This module
/// provides the trait and three implementations: one forwarding to the `log`
/// facade, one discarding everything and one keeping entries in memory.
use parking_lot::Mutex;
use std::sync::Arc;

use crate::core::logs::{DiagnosticBuffer, DiagnosticEntry, DiagnosticEvent, DiagnosticLevel};

/// Receiver of per-device diagnostics
pub trait DiagnosticSink: Send + Sync {
    fn record(&self, entry: DiagnosticEntry);

    /// Cheap pre-check so callers can skip formatting noisy messages.
    fn enabled(&self, _level: DiagnosticLevel) -> bool {
        true
    }
}

/// No-op sink that drops every entry (useful for testing)
pub struct NoOpSink;

impl DiagnosticSink for NoOpSink {
    fn record(&self, _entry: DiagnosticEntry) {}

    fn enabled(&self, _level: DiagnosticLevel) -> bool {
        false
    }
}

/// Sink forwarding entries to the `log` facade
pub struct LoggingSink;

impl LoggingSink {
    fn level(level: DiagnosticLevel) -> log::Level {
        match level {
            DiagnosticLevel::Debug => log::Level::Debug,
            DiagnosticLevel::Info => log::Level::Info,
            DiagnosticLevel::Warning => log::Level::Warn,
            DiagnosticLevel::Error => log::Level::Error,
        }
    }
}

impl DiagnosticSink for LoggingSink {
    fn record(&self, entry: DiagnosticEntry) {
        log::log!(
            target: "neptun::device",
            Self::level(entry.level),
            "[{}] {}",
            entry.device,
            entry.message
        );
    }

    fn enabled(&self, level: DiagnosticLevel) -> bool {
        log::log_enabled!(target: "neptun::device", Self::level(level))
    }
}

/// Sink keeping the most recent entries in memory
#[derive(Clone, Default)]
pub struct MemorySink {
    buffer: Arc<Mutex<DiagnosticBuffer>>,
}

impl MemorySink {
    pub fn new(max_entries: usize) -> Self {
        Self {
            buffer: Arc::new(Mutex::new(DiagnosticBuffer::new(max_entries))),
        }
    }

    pub fn entries(&self) -> Vec<DiagnosticEntry> {
        self.buffer.lock().entries().to_vec()
    }

    pub fn events(&self) -> Vec<DiagnosticEvent> {
        self.buffer
            .lock()
            .entries()
            .iter()
            .filter_map(|entry| entry.event.clone())
            .collect()
    }

    pub fn clear(&self) {
        self.buffer.lock().clear();
    }
}

impl DiagnosticSink for MemorySink {
    fn record(&self, entry: DiagnosticEntry) {
        self.buffer.lock().push(entry);
    }
}

/// Device-scoped front end of a sink.
#[derive(Clone)]
pub struct Diagnostics {
    device: String,
    sink: Arc<dyn DiagnosticSink>,
}

impl Diagnostics {
    pub fn new(device: &str, sink: Arc<dyn DiagnosticSink>) -> Self {
        Self {
            device: device.to_string(),
            sink,
        }
    }

    pub fn emit(&self, level: DiagnosticLevel, message: String, event: Option<DiagnosticEvent>) {
        if !self.sink.enabled(level) {
            return;
        }
        let entry = DiagnosticEntry::new(&self.device, level, message);
        self.sink.record(match event {
            Some(event) => entry.with_event(event),
            None => entry,
        });
    }

    pub fn info(&self, message: impl Into<String>) {
        self.emit(DiagnosticLevel::Info, message.into(), None);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.emit(DiagnosticLevel::Warning, message.into(), None);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.emit(DiagnosticLevel::Error, message.into(), None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::logs::LifecyclePhase;

    #[test]
    fn test_memory_sink_collects_device_entries() {
        let sink = MemorySink::new(10);
        let diagnostics = Diagnostics::new("bathroom", Arc::new(sink.clone()));
        diagnostics.info("hello");
        diagnostics.emit(
            DiagnosticLevel::Warning,
            "lost".to_string(),
            Some(DiagnosticEvent::Lifecycle {
                phase: LifecyclePhase::Disconnected,
            }),
        );

        let entries = sink.entries();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|entry| entry.device == "bathroom"));
        assert_eq!(
            sink.events(),
            vec![DiagnosticEvent::Lifecycle {
                phase: LifecyclePhase::Disconnected
            }]
        );
    }

    #[test]
    fn test_noop_sink_skips_everything() {
        let diagnostics = Diagnostics::new("bathroom", Arc::new(NoOpSink));
        diagnostics.error("ignored");
    }
}

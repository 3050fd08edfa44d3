/// Diagnostic records produced by the device model.
///
/// Entries carry the device name so a single sink can serve several devices.
/// Formatting is left to the sink implementation.
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::protocol::fault::FaultClass;

/// A diagnostic entry with timestamp and message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticEntry {
    pub timestamp: DateTime<Local>,
    pub device: String,
    pub level: DiagnosticLevel,
    pub message: String,
    pub event: Option<DiagnosticEvent>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DiagnosticLevel {
    Debug,
    Info,
    Warning,
    Error,
}

/// Structured payload attached to an entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DiagnosticEvent {
    /// Session lifecycle change
    Lifecycle { phase: LifecyclePhase },
    /// A single transaction failed
    Fault {
        class: FaultClass,
        direction: Direction,
        address: Option<u16>,
    },
    /// The device reports a different number of paired sensors than it did
    /// at discovery time
    SensorCountChanged { discovered: usize, reported: u16 },
    /// A register write went out
    RegisterWritten { address: u16, value: u16 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecyclePhase {
    Connected,
    Disconnected,
    Discovered,
    CycleAborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Read,
    Write,
    Connect,
}

impl DiagnosticEntry {
    pub fn new(device: &str, level: DiagnosticLevel, message: String) -> Self {
        Self {
            timestamp: Local::now(),
            device: device.to_string(),
            level,
            message,
            event: None,
        }
    }

    pub fn with_event(mut self, event: DiagnosticEvent) -> Self {
        self.event = Some(event);
        self
    }
}

/// Bounded buffer keeping the most recent entries
pub struct DiagnosticBuffer {
    entries: Vec<DiagnosticEntry>,
    max_entries: usize,
}

impl DiagnosticBuffer {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Vec::new(),
            max_entries,
        }
    }

    pub fn push(&mut self, entry: DiagnosticEntry) {
        self.entries.push(entry);

        // Trim oldest entries if we exceed the max
        if self.entries.len() > self.max_entries {
            let excess = self.entries.len() - self.max_entries;
            self.entries.drain(0..excess);
        }
    }

    pub fn entries(&self) -> &[DiagnosticEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for DiagnosticBuffer {
    fn default() -> Self {
        Self::new(1000)
    }
}

use crate::types::snapshot::{Any, ChangeDescription};
use std::fmt;

/// Opaque payload the engine wants stored under `key` in the raw map.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEntry {
    pub key: String,
    pub value: Any,
}

impl RawEntry {
    pub fn new(key: impl Into<String>, type_url: impl Into<String>, value: Vec<u8>) -> Self {
        Self {
            key: key.into(),
            value: Any {
                type_url: type_url.into(),
                value,
            },
        }
    }
}

/// Result of migrating one or more workspace objects.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppliedChange {
    pub raw: Vec<RawEntry>,
    /// Each description is stored under its own `key`.
    pub descriptions: Vec<ChangeDescription>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => f.write_str("error"),
            Severity::Warning => f.write_str("warning"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub summary: String,
    pub detail: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.severity, self.summary)?;
        if !self.detail.is_empty() {
            write!(f, " ({})", self.detail)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MigrationEvent {
    AppliedChange(AppliedChange),
    Diagnostic(Diagnostic),
}

/// One item read off the engine's event stream.
///
/// `Unrecognized` carries the tag of an event this crate does not understand;
/// `Complete` is the engine's explicit end-of-stream marker.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamFrame {
    Event(MigrationEvent),
    Unrecognized { kind: String },
    Complete,
}

impl From<MigrationEvent> for StreamFrame {
    fn from(event: MigrationEvent) -> Self {
        StreamFrame::Event(event)
    }
}

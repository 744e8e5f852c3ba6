//! Append-only event log
//!
//! An ordered record of every significant transition in a rollback cycle.
//! Entries are never mutated or deleted; insertion order is the only index.
//! The log is single-writer by construction: one orchestrator instance per
//! deployment target owns one log per cycle.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use chrono::Utc;
use tracing::debug;

use crate::error::Result;
use crate::types::{DeploymentState, EventLogEntry, EventType};

/// In-memory append-only log with optional JSON-Lines persistence
#[derive(Debug, Default)]
pub struct EventLog {
    entries: Vec<EventLogEntry>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one entry, stamped now, carrying the cycle's before/after
    /// image references.
    pub fn append(
        &mut self,
        event_type: EventType,
        details: impl Into<String>,
        state: &DeploymentState,
    ) {
        let entry = EventLogEntry {
            timestamp: Utc::now(),
            event_type,
            details: details.into(),
            original_image: state.original_image.clone(),
            rollback_image: state.rollback_image.clone(),
        };
        debug!(event = ?entry.event_type, details = %entry.details, "event appended");
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[EventLogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append the whole run to a JSON-Lines file. Write-once-per-run: called
    /// exactly once, at cycle end.
    pub fn persist(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        for entry in &self.entries {
            let line = serde_json::to_string(entry)?;
            writeln!(file, "{}", line)?;
        }
        Ok(())
    }
}

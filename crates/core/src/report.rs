//! End-of-run report generation
//!
//! A pure function over one cycle's final state and event trail: identical
//! inputs produce identical reports, with no clock reads beyond the
//! timestamps already captured in the inputs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{CycleState, DeploymentState, EventLogEntry};

/// Immutable summary of one rollback cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollbackReport {
    pub cycle_id: Uuid,
    pub terminal_state: CycleState,
    pub reason: String,
    pub original_image: String,
    pub rollback_image: Option<String>,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// `finished_at - started_at`, in whole seconds
    pub duration_secs: Option<i64>,
    pub events: Vec<EventLogEntry>,
}

/// Renders a [`RollbackReport`] from final cycle state and its events
pub struct ReportGenerator;

impl ReportGenerator {
    /// Pure: same `(state, events)` inputs always produce the same report.
    pub fn generate(state: &DeploymentState, events: &[EventLogEntry]) -> RollbackReport {
        RollbackReport {
            cycle_id: state.cycle_id,
            // The orchestrator sets the terminal state before generating; a
            // missing value can only mean the cycle was cut short.
            terminal_state: state.terminal_state.unwrap_or(CycleState::Failed),
            reason: state.reason.clone(),
            original_image: state.original_image.clone(),
            rollback_image: state.rollback_image.clone(),
            dry_run: state.dry_run,
            started_at: state.started_at,
            finished_at: state.finished_at,
            duration_secs: state
                .finished_at
                .map(|end| end.signed_duration_since(state.started_at).num_seconds()),
            events: events.to_vec(),
        }
    }
}

impl RollbackReport {
    /// Human-readable rendering of the report.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str("=== Rollback Report ===\n");
        out.push_str(&format!("cycle:          {}\n", self.cycle_id));
        out.push_str(&format!(
            "terminal state: {}\n",
            self.terminal_state.as_str()
        ));
        out.push_str(&format!("reason:         {}\n", self.reason));
        out.push_str(&format!("original image: {}\n", self.original_image));
        out.push_str(&format!(
            "rollback image: {}\n",
            self.rollback_image.as_deref().unwrap_or("(none)")
        ));
        if self.dry_run {
            out.push_str("mode:           dry run (no mutating action performed)\n");
        }
        out.push_str(&format!(
            "started:        {}\n",
            self.started_at.to_rfc3339()
        ));
        if let Some(finished) = self.finished_at {
            out.push_str(&format!("finished:       {}\n", finished.to_rfc3339()));
        }
        if let Some(secs) = self.duration_secs {
            out.push_str(&format!("duration:       {}s\n", secs));
        }
        out.push_str(&format!("events:         {}\n", self.events.len()));
        for event in &self.events {
            out.push_str(&format!(
                "  {} [{}] {}\n",
                event.timestamp.to_rfc3339(),
                serde_json::to_value(event.event_type)
                    .map(|v| v.as_str().unwrap_or("event").to_string())
                    .unwrap_or_else(|_| "event".to_string()),
                event.details
            ));
        }
        out
    }
}

//! Core data model for the rollback orchestrator
//!
//! Everything here is plain data: serializable records that flow between the
//! health monitor, the target resolver, the executor and the report
//! generator. Mutable deployment state is carried explicitly as a
//! [`DeploymentState`] value rather than as process-wide globals.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Classification of the most recent health probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeStatus {
    /// The endpoint was unreachable or returned no parseable status
    Unknown,
    /// The endpoint responded but did not report itself healthy
    Degraded,
    /// The endpoint reported `status == "healthy"`
    Healthy,
}

/// Result of a single health probe
///
/// A probe failure is routine input, not an exceptional condition, so
/// network and timeout errors surface as `reachable == false` rather than as
/// an `Err`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeResult {
    /// Whether the endpoint answered at all
    pub reachable: bool,
    /// The `status` field of the JSON body; `"unknown"` when absent or malformed
    pub status_field: String,
    /// Informational scalar fields sampled from the body (never drives logic)
    #[serde(default)]
    pub metrics: BTreeMap<String, String>,
}

impl ProbeResult {
    /// A probe that never reached the endpoint.
    pub fn unreachable() -> Self {
        Self {
            reachable: false,
            status_field: "unknown".to_string(),
            metrics: BTreeMap::new(),
        }
    }

    /// Whether this single probe counts as healthy.
    pub fn is_healthy(&self) -> bool {
        self.reachable && self.status_field == "healthy"
    }

    /// Classify this probe into a [`ProbeStatus`].
    pub fn status(&self) -> ProbeStatus {
        if self.is_healthy() {
            ProbeStatus::Healthy
        } else if self.reachable {
            ProbeStatus::Degraded
        } else {
            ProbeStatus::Unknown
        }
    }
}

/// Verdict of a bounded-retry health check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthVerdict {
    /// Whether the last attempt succeeded
    pub healthy: bool,
    /// Attempts actually made (`1..=max_retries`); an early success
    /// short-circuits the remaining attempts
    pub attempts: u32,
    /// Classification of the last probe
    pub last_status: ProbeStatus,
    /// Informational metrics from the last probe
    #[serde(default)]
    pub sampled_metrics: BTreeMap<String, String>,
}

/// Which strategy of the fallback chain produced a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateSource {
    /// `base:stable` already present in the local image cache
    StableTag,
    /// A configured fallback version tag pulled from the registry
    VersionList,
    /// Most recent locally cached image sharing the base repository
    LocalFallback,
}

/// One entry considered by the target resolver
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackCandidate {
    /// Fully qualified image reference
    pub image_ref: String,
    /// Strategy that produced this candidate
    pub source: CandidateSource,
    /// Whether the candidate was confirmed resolvable
    pub available: bool,
}

/// Event classification for the append-only audit log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// A rollback cycle began
    CycleStarted,
    /// The orchestrator moved from one state to another
    Transition,
    /// The fallback chain selected a rollback target
    TargetResolved,
    /// The fallback chain was exhausted without a candidate
    ResolutionFailed,
    /// A configuration snapshot was taken before mutation
    BackupCreated,
    /// The deployment was stopped, re-imaged and restarted
    RollbackPerformed,
    /// A non-fatal problem (failed backup, failed pull, failed notification)
    Warning,
    /// A configuration lint finding (e.g. duplicated fallback tags)
    Lint,
    /// A step that was simulated because dry-run mode is active
    DryRun,
}

/// Append-only audit record
///
/// Entries are never mutated or deleted once appended; insertion order is
/// causal order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub timestamp: DateTime<Utc>,
    pub event_type: EventType,
    pub details: String,
    pub original_image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rollback_image: Option<String>,
}

/// States of the orchestrator's linear state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleState {
    Idle,
    Checking,
    Healthy,
    RollingBack,
    Verifying,
    Succeeded,
    Failed,
}

impl CycleState {
    /// Whether the cycle is done.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CycleState::Healthy | CycleState::Succeeded | CycleState::Failed
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CycleState::Idle => "Idle",
            CycleState::Checking => "Checking",
            CycleState::Healthy => "Healthy",
            CycleState::RollingBack => "RollingBack",
            CycleState::Verifying => "Verifying",
            CycleState::Succeeded => "Succeeded",
            CycleState::Failed => "Failed",
        }
    }
}

/// Authoritative record of one deployment rollback cycle
///
/// Created at the start of a cycle and discarded at its end; persisted only
/// through the event log and the final report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentState {
    /// Unique id for this cycle
    pub cycle_id: Uuid,
    /// Image reference in effect when the cycle started; immutable afterwards
    pub original_image: String,
    /// Image reference being rolled back to; set once resolution succeeds
    pub rollback_image: Option<String>,
    /// Human-readable trigger description
    pub reason: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// If true, no mutating action is performed; steps are simulated and logged
    pub dry_run: bool,
    /// Terminal state, set exactly once when the cycle ends
    pub terminal_state: Option<CycleState>,
}

impl DeploymentState {
    pub fn new(original_image: impl Into<String>, reason: impl Into<String>, dry_run: bool) -> Self {
        Self {
            cycle_id: Uuid::new_v4(),
            original_image: original_image.into(),
            rollback_image: None,
            reason: reason.into(),
            started_at: Utc::now(),
            finished_at: None,
            dry_run,
            terminal_state: None,
        }
    }
}

/// Outcome of a rollback execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub succeeded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionResult {
    pub fn success() -> Self {
        Self {
            succeeded: true,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            error: Some(error.into()),
        }
    }
}

/// Severity of a notification payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Success,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Success => "success",
        }
    }
}

/// Split an image reference into its base repository and optional tag.
///
/// Only a `:` after the last `/` separates a tag; a registry port
/// (`registry:5000/app`) is part of the base. A reference with no explicit
/// tag yields `(whole_reference, None)`.
pub fn split_image_ref(image: &str) -> (&str, Option<&str>) {
    let name_start = image.rfind('/').map_or(0, |i| i + 1);
    match image[name_start..].rfind(':') {
        Some(i) => {
            let idx = name_start + i;
            (&image[..idx], Some(&image[idx + 1..]))
        }
        None => (image, None),
    }
}

/// Build the `:stable` candidate for an image reference.
///
/// When the reference has no explicit tag, the stable tag is appended to the
/// whole reference.
pub fn stable_candidate(image: &str, stable_tag: &str) -> String {
    let (base, _) = split_image_ref(image);
    format!("{}:{}", base, stable_tag)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_image_ref_with_tag() {
        assert_eq!(split_image_ref("myapp:v1.2.3"), ("myapp", Some("v1.2.3")));
        assert_eq!(
            split_image_ref("registry.local/team/myapp:latest"),
            ("registry.local/team/myapp", Some("latest"))
        );
    }

    #[test]
    fn test_split_image_ref_without_tag() {
        assert_eq!(split_image_ref("myapp"), ("myapp", None));
        assert_eq!(
            split_image_ref("registry.local/team/myapp"),
            ("registry.local/team/myapp", None)
        );
    }

    #[test]
    fn test_split_image_ref_registry_port_is_not_a_tag() {
        assert_eq!(
            split_image_ref("registry.local:5000/myapp"),
            ("registry.local:5000/myapp", None)
        );
        assert_eq!(
            split_image_ref("registry.local:5000/myapp:v2"),
            ("registry.local:5000/myapp", Some("v2"))
        );
    }

    #[test]
    fn test_stable_candidate() {
        assert_eq!(stable_candidate("myapp:v1.2.3", "stable"), "myapp:stable");
        assert_eq!(stable_candidate("myapp", "stable"), "myapp:stable");
        assert_eq!(
            stable_candidate("registry.local:5000/myapp:v2", "stable"),
            "registry.local:5000/myapp:stable"
        );
    }

    #[test]
    fn test_probe_result_classification() {
        assert_eq!(ProbeResult::unreachable().status(), ProbeStatus::Unknown);

        let degraded = ProbeResult {
            reachable: true,
            status_field: "degraded".to_string(),
            metrics: BTreeMap::new(),
        };
        assert_eq!(degraded.status(), ProbeStatus::Degraded);
        assert!(!degraded.is_healthy());

        let healthy = ProbeResult {
            reachable: true,
            status_field: "healthy".to_string(),
            metrics: BTreeMap::new(),
        };
        assert_eq!(healthy.status(), ProbeStatus::Healthy);
        assert!(healthy.is_healthy());
    }

    #[test]
    fn test_cycle_state_terminality() {
        assert!(CycleState::Healthy.is_terminal());
        assert!(CycleState::Succeeded.is_terminal());
        assert!(CycleState::Failed.is_terminal());
        assert!(!CycleState::Checking.is_terminal());
        assert!(!CycleState::RollingBack.is_terminal());
        assert!(!CycleState::Verifying.is_terminal());
    }

    #[test]
    fn test_deployment_state_serialization() {
        let state = DeploymentState::new("myapp:v1", "health check failure", false);
        let json = serde_json::to_string(&state).unwrap();
        let back: DeploymentState = serde_json::from_str(&json).unwrap();
        assert_eq!(back.original_image, "myapp:v1");
        assert_eq!(back.rollback_image, None);
        assert!(!back.dry_run);
    }
}

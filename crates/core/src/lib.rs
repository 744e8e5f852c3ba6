//! deploy-sentinel core
//!
//! Automated health-monitoring and rollback orchestration: a bounded-retry
//! health monitor decides whether a deployment needs to be rolled back, an
//! ordered fallback chain resolves the rollback target, an executor performs
//! the swap exactly once through a pluggable deployment driver, and the same
//! monitor verifies recovery before the cycle declares success. Every
//! transition lands in an append-only event log that feeds the end-of-run
//! report and the notifier.
//!
//! The core never executes processes or talks to a registry itself; those
//! concerns live behind the [`traits::DeploymentDriver`],
//! [`traits::ImageStore`] and [`traits::Notifier`] collaborator traits.

pub mod config;
pub mod error;
pub mod event_log;
pub mod executor;
pub mod monitor;
pub mod orchestrator;
pub mod probe;
pub mod report;
pub mod resolver;
pub mod traits;
pub mod types;

pub use config::SentinelConfig;
pub use error::{DriverError, DriverResult, Result, SentinelError};
pub use event_log::EventLog;
pub use executor::RollbackExecutor;
pub use monitor::HealthMonitor;
pub use orchestrator::{RollbackOrchestrator, StatusSummary, Trigger};
pub use probe::HttpHealthProbe;
pub use report::{ReportGenerator, RollbackReport};
pub use resolver::{Resolution, RollbackTargetResolver};
pub use traits::{DeploymentDriver, HealthProbe, ImageStore, Notifier};
pub use types::{
    CandidateSource, CycleState, DeploymentState, EventLogEntry, EventType, ExecutionResult,
    HealthVerdict, ProbeResult, ProbeStatus, RollbackCandidate, Severity,
};

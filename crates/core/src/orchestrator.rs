//! Top-level rollback orchestration
//!
//! A linear state machine: `Idle -> Checking -> (Healthy | RollingBack) ->
//! Verifying -> (Succeeded | Failed)`. The orchestrator decides whether a
//! rollback is needed, resolves a target, executes it exactly once, and
//! re-verifies health before declaring success. Every transition appends one
//! event-log entry; no state is entered twice within a cycle.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::config::SentinelConfig;
use crate::error::{Result, SentinelError};
use crate::event_log::EventLog;
use crate::executor::RollbackExecutor;
use crate::monitor::HealthMonitor;
use crate::report::{ReportGenerator, RollbackReport};
use crate::resolver::RollbackTargetResolver;
use crate::traits::{DeploymentDriver, HealthProbe, ImageStore, Notifier};
use crate::types::{
    CycleState, DeploymentState, EventType, HealthVerdict, ProbeStatus, Severity,
};

/// What started a cycle
#[derive(Debug, Clone)]
pub enum Trigger {
    /// Scheduled or manual health-check invocation; rolls back only if the
    /// pre-check fails
    HealthCheck,
    /// Manual request that bypasses the pre-check, optionally naming an
    /// explicit target
    ForceRollback { target: Option<String> },
}

/// Snapshot rendered by the `--status` surface
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusSummary {
    pub current_image: String,
    pub healthy: bool,
    pub last_status: ProbeStatus,
    #[serde(default)]
    pub sampled_metrics: std::collections::BTreeMap<String, String>,
}

/// The top-level state machine
pub struct RollbackOrchestrator {
    monitor: HealthMonitor,
    resolver: RollbackTargetResolver,
    executor: RollbackExecutor,
    driver: Arc<dyn DeploymentDriver>,
    notifier: Arc<dyn Notifier>,
    config: SentinelConfig,
}

impl RollbackOrchestrator {
    pub fn new(
        config: SentinelConfig,
        probe: Arc<dyn HealthProbe>,
        driver: Arc<dyn DeploymentDriver>,
        store: Arc<dyn ImageStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            monitor: HealthMonitor::new(probe),
            resolver: RollbackTargetResolver::new(store, config.resolver.clone()),
            executor: RollbackExecutor::new(driver.clone(), config.executor.clone()),
            driver,
            notifier,
            config,
        }
    }

    /// Run a pre-check and roll back only if the service is unhealthy.
    pub async fn check_and_maybe_rollback(&self, dry_run: bool) -> Result<RollbackReport> {
        self.run(Trigger::HealthCheck, dry_run).await
    }

    /// Run one full rollback cycle from trigger to terminal state.
    ///
    /// A cycle that ends in `Failed` is a normal outcome and returns
    /// `Ok(report)`; `Err` is reserved for faults that prevent the cycle
    /// from running at all (e.g. the current image cannot be determined).
    pub async fn run(&self, trigger: Trigger, dry_run: bool) -> Result<RollbackReport> {
        let current_image = self
            .driver
            .current_image()
            .await
            .map_err(|e| SentinelError::driver("current_image", e))?;

        let initial_reason = match &trigger {
            Trigger::HealthCheck => "scheduled health check",
            Trigger::ForceRollback { .. } => "manual request",
        };
        let mut state = DeploymentState::new(current_image.clone(), initial_reason, dry_run);
        let mut log = EventLog::new();
        let mut cycle = CycleState::Idle;

        log.append(
            EventType::CycleStarted,
            format!(
                "cycle {} started ({}{})",
                state.cycle_id,
                initial_reason,
                if dry_run { ", dry run" } else { "" }
            ),
            &state,
        );
        for finding in self.config.lint() {
            warn!(finding = %finding, "configuration lint");
            log.append(EventType::Lint, finding, &state);
        }

        // Decide: pre-check (unless forced).
        let explicit_target = match trigger {
            Trigger::HealthCheck => {
                transition(
                    &mut cycle,
                    CycleState::Checking,
                    "pre-rollback health check",
                    &mut log,
                    &state,
                );
                let verdict = self
                    .monitor
                    .check_health(
                        &self.config.health.endpoint,
                        self.config.health.pre_check.max_retries,
                        self.config.health.pre_check.delay(),
                    )
                    .await;

                if verdict.healthy {
                    transition(
                        &mut cycle,
                        CycleState::Healthy,
                        format!("service healthy on attempt {}", verdict.attempts),
                        &mut log,
                        &state,
                    );
                    self.notifier
                        .notify(
                            "Health check passed",
                            &format!(
                                "{} is healthy (attempt {}); no rollback needed",
                                current_image, verdict.attempts
                            ),
                            Severity::Info,
                        )
                        .await;
                    return self.finish(state, cycle, log);
                }

                state.reason = "health check failure".to_string();
                transition(
                    &mut cycle,
                    CycleState::RollingBack,
                    format!(
                        "pre-check failed after {} attempts (last status: {:?})",
                        verdict.attempts, verdict.last_status
                    ),
                    &mut log,
                    &state,
                );
                None
            }
            Trigger::ForceRollback { target } => {
                transition(
                    &mut cycle,
                    CycleState::RollingBack,
                    "force rollback requested; pre-check bypassed",
                    &mut log,
                    &state,
                );
                target
            }
        };

        // Resolve: explicit target, or the fallback chain.
        let target = match explicit_target {
            Some(target) => {
                info!(image = %target, "using operator-provided rollback target");
                state.rollback_image = Some(target.clone());
                log.append(
                    EventType::TargetResolved,
                    format!("operator-provided target: {}", target),
                    &state,
                );
                target
            }
            None => {
                let resolution = self.resolver.resolve(&current_image, dry_run).await;
                match resolution.target {
                    Some(candidate) => {
                        state.rollback_image = Some(candidate.image_ref.clone());
                        log.append(
                            EventType::TargetResolved,
                            format!(
                                "resolved via {:?}: {} ({} candidates considered)",
                                candidate.source,
                                candidate.image_ref,
                                resolution.considered.len()
                            ),
                            &state,
                        );
                        candidate.image_ref
                    }
                    None if dry_run => {
                        // Dry-run resolution is a simulation surface only:
                        // it never selects a target, so the cycle ends here.
                        state.reason = "dry run: no rollback performed".to_string();
                        log.append(
                            EventType::DryRun,
                            format!(
                                "resolution simulated ({} candidates narrated); no action taken",
                                resolution.considered.len()
                            ),
                            &state,
                        );
                        transition(
                            &mut cycle,
                            CycleState::Failed,
                            "dry run ended before execution",
                            &mut log,
                            &state,
                        );
                        self.notifier
                            .notify(
                                "Dry-run rollback",
                                &format!(
                                    "{} is unhealthy; dry run simulated the rollback plan without acting",
                                    current_image
                                ),
                                Severity::Info,
                            )
                            .await;
                        return self.finish(state, cycle, log);
                    }
                    None => {
                        state.reason = "no rollback target".to_string();
                        log.append(
                            EventType::ResolutionFailed,
                            format!(
                                "fallback chain exhausted ({} candidates considered)",
                                resolution.considered.len()
                            ),
                            &state,
                        );
                        transition(
                            &mut cycle,
                            CycleState::Failed,
                            "no rollback target",
                            &mut log,
                            &state,
                        );
                        self.notifier
                            .notify(
                                "Rollback impossible",
                                &format!(
                                    "{} is unhealthy and no rollback target could be resolved",
                                    current_image
                                ),
                                Severity::Error,
                            )
                            .await;
                        return self.finish(state, cycle, log);
                    }
                }
            }
        };

        // Execute.
        let execution = self.executor.execute(&target, &state, &mut log).await;
        if !execution.succeeded {
            let detail = execution
                .error
                .unwrap_or_else(|| "unknown execution error".to_string());
            state.reason = format!("rollback execution failed: {}", detail);
            transition(
                &mut cycle,
                CycleState::Failed,
                format!("execution failed: {}", detail),
                &mut log,
                &state,
            );
            self.notifier
                .notify(
                    "Rollback failed",
                    &format!("rollback of {} to {} failed: {}", current_image, target, detail),
                    Severity::Error,
                )
                .await;
            return self.finish(state, cycle, log);
        }

        if dry_run {
            // Simulated execution only narrates the plan; the cycle cannot
            // claim success because nothing was actually recovered.
            state.reason = "dry run: no rollback performed".to_string();
            transition(
                &mut cycle,
                CycleState::Failed,
                "dry run ended after simulated execution",
                &mut log,
                &state,
            );
            self.notifier
                .notify(
                    "Dry-run rollback",
                    &format!(
                        "dry run simulated rollback of {} to {}; no action taken",
                        current_image, target
                    ),
                    Severity::Info,
                )
                .await;
            return self.finish(state, cycle, log);
        }

        // Verify.
        transition(
            &mut cycle,
            CycleState::Verifying,
            "post-rollback health verification",
            &mut log,
            &state,
        );
        let verdict = self
            .monitor
            .check_health(
                &self.config.health.endpoint,
                self.config.health.post_check.max_retries,
                self.config.health.post_check.delay(),
            )
            .await;

        if verdict.healthy {
            transition(
                &mut cycle,
                CycleState::Succeeded,
                format!("service verified healthy on attempt {}", verdict.attempts),
                &mut log,
                &state,
            );
            self.notifier
                .notify(
                    "Rollback succeeded",
                    &format!(
                        "rolled back {} to {}; service verified healthy",
                        current_image, target
                    ),
                    Severity::Success,
                )
                .await;
        } else {
            // The most severe failure mode: we touched the deployment and it
            // is still broken.
            state.reason = format!(
                "verification failed after rollback: still unhealthy after {} attempts",
                verdict.attempts
            );
            transition(
                &mut cycle,
                CycleState::Failed,
                format!(
                    "post-rollback verification failed after {} attempts (last status: {:?})",
                    verdict.attempts, verdict.last_status
                ),
                &mut log,
                &state,
            );
            self.notifier
                .notify(
                    "Rollback did not recover the service",
                    &format!(
                        "rollback of {} to {} executed but the service is still unhealthy",
                        current_image, target
                    ),
                    Severity::Error,
                )
                .await;
        }

        self.finish(state, cycle, log)
    }

    /// One-shot status surface: the current image plus a single bounded
    /// probe of the health endpoint.
    pub async fn status(&self) -> Result<StatusSummary> {
        let current_image = self
            .driver
            .current_image()
            .await
            .map_err(|e| SentinelError::driver("current_image", e))?;

        let verdict: HealthVerdict = self
            .monitor
            .check_health(&self.config.health.endpoint, 1, std::time::Duration::ZERO)
            .await;

        Ok(StatusSummary {
            current_image,
            healthy: verdict.healthy,
            last_status: verdict.last_status,
            sampled_metrics: verdict.sampled_metrics,
        })
    }

    /// Seal the cycle, persist audit artifacts and generate the report.
    fn finish(
        &self,
        mut state: DeploymentState,
        terminal: CycleState,
        log: EventLog,
    ) -> Result<RollbackReport> {
        debug_assert!(terminal.is_terminal());
        state.terminal_state = Some(terminal);
        state.finished_at = Some(Utc::now());

        let report = ReportGenerator::generate(&state, log.entries());

        if let Some(path) = &self.config.reporting.event_log_path {
            if let Err(e) = log.persist(path) {
                // The cycle outcome stands on its own; a persistence fault
                // must not mask it.
                error!(path = %path.display(), error = %e, "failed to persist event log");
            }
        }
        if let Some(path) = &self.config.reporting.report_path {
            if let Err(e) = std::fs::write(path, report.render()) {
                error!(path = %path.display(), error = %e, "failed to write report");
            }
        }

        info!(
            terminal = terminal.as_str(),
            reason = %state.reason,
            "rollback cycle finished"
        );
        Ok(report)
    }
}

/// Advance the state machine, appending exactly one entry per transition.
fn transition(
    cycle: &mut CycleState,
    to: CycleState,
    details: impl Into<String>,
    log: &mut EventLog,
    state: &DeploymentState,
) {
    debug_assert_ne!(*cycle, to, "state machine must never re-enter a state");
    let details = details.into();
    info!(from = cycle.as_str(), to = to.as_str(), %details, "state transition");
    log.append(
        EventType::Transition,
        format!("{} -> {}: {}", cycle.as_str(), to.as_str(), details),
        state,
    );
    *cycle = to;
}

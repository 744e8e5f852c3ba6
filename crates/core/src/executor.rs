//! Rollback execution
//!
//! Orchestrates the destructive part of a cycle: best-effort backup,
//! two-phase stop (graceful then forced), image swap, best-effort pull and
//! restart. Stop, set-image and start failures are fatal to the cycle;
//! backup and pull failures are warnings only, since a previously run image
//! may already be cached and the backup is an audit aid, not a precondition.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{info, warn};

use crate::config::ExecutorConfig;
use crate::event_log::EventLog;
use crate::traits::DeploymentDriver;
use crate::types::{DeploymentState, EventType, ExecutionResult};

/// Executes a resolved rollback against a [`DeploymentDriver`]
pub struct RollbackExecutor {
    driver: Arc<dyn DeploymentDriver>,
    config: ExecutorConfig,
}

impl RollbackExecutor {
    pub fn new(driver: Arc<dyn DeploymentDriver>, config: ExecutorConfig) -> Self {
        Self { driver, config }
    }

    /// Roll the deployment back to `target`.
    ///
    /// In dry-run mode no driver method is called; every step is logged as
    /// simulated and the result reports success for narration purposes.
    pub async fn execute(
        &self,
        target: &str,
        state: &DeploymentState,
        log: &mut EventLog,
    ) -> ExecutionResult {
        if state.dry_run {
            return self.simulate(target, state, log);
        }

        // Step 1: best-effort configuration backup.
        if self.config.enable_backup {
            match self.driver.snapshot().await {
                Ok(backup_id) => {
                    info!(backup = %backup_id, "deployment configuration backed up");
                    log.append(
                        EventType::BackupCreated,
                        format!("configuration backed up: {}", backup_id),
                        state,
                    );
                }
                Err(e) => {
                    warn!(error = %e, "configuration backup failed; continuing");
                    log.append(
                        EventType::Warning,
                        format!("backup failed (continuing): {}", e),
                        state,
                    );
                }
            }
        }

        // Step 2: two-phase stop, graceful first, forced if the graceful
        // phase errors or exceeds its timeout. Never the reverse.
        let stop_timeout = Duration::from_secs(self.config.stop_timeout_secs);
        let graceful = timeout(stop_timeout, self.driver.stop(true)).await;
        let needs_force = match graceful {
            Ok(Ok(())) => {
                info!("deployment stopped gracefully");
                false
            }
            Ok(Err(e)) => {
                warn!(error = %e, "graceful stop failed; forcing");
                true
            }
            Err(_) => {
                warn!(timeout = ?stop_timeout, "graceful stop timed out; forcing");
                true
            }
        };
        if needs_force {
            if let Err(e) = self.driver.stop(false).await {
                return ExecutionResult::failure(format!("forced stop failed: {}", e));
            }
            info!("deployment force-stopped");
        }

        // Step 3: swap the image reference. Fatal on error.
        if let Err(e) = self.driver.set_image(target).await {
            return ExecutionResult::failure(format!("image update failed: {}", e));
        }
        info!(image = %target, "deployment image updated");

        // Step 4: best-effort pull; a cached copy may already satisfy the
        // start.
        if let Err(e) = self.driver.pull(target).await {
            warn!(image = %target, error = %e, "pull failed; starting from local cache");
            log.append(
                EventType::Warning,
                format!("pull of {} failed (continuing): {}", target, e),
                state,
            );
        }

        // Step 5: start with the new reference. Fatal on error.
        if let Err(e) = self.driver.start().await {
            return ExecutionResult::failure(format!("start failed: {}", e));
        }
        info!(image = %target, "deployment started with rollback image");

        log.append(
            EventType::RollbackPerformed,
            format!("rolled back from {} to {}", state.original_image, target),
            state,
        );

        ExecutionResult::success()
    }

    fn simulate(
        &self,
        target: &str,
        state: &DeploymentState,
        log: &mut EventLog,
    ) -> ExecutionResult {
        for step in [
            "snapshot deployment configuration".to_string(),
            format!(
                "stop deployment (graceful, {}s timeout, then forced)",
                self.config.stop_timeout_secs
            ),
            format!("set image to {}", target),
            format!("pull {}", target),
            "start deployment".to_string(),
        ] {
            info!(step = %step, "[dry-run] would execute");
            log.append(EventType::DryRun, format!("would {}", step), state);
        }
        ExecutionResult::success()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DriverError, DriverResult};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Driver that records calls and fails on request.
    #[derive(Default)]
    struct MockDriver {
        fail_snapshot: bool,
        fail_graceful_stop: bool,
        fail_forced_stop: bool,
        fail_set_image: bool,
        fail_pull: bool,
        fail_start: bool,
        calls: Mutex<Vec<String>>,
    }

    impl MockDriver {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: impl Into<String>) {
            self.calls.lock().unwrap().push(call.into());
        }

        fn fail_if(&self, flag: bool, what: &str) -> DriverResult<()> {
            if flag {
                Err(DriverError::CommandFailed(format!("{} failed", what)))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl DeploymentDriver for MockDriver {
        async fn current_image(&self) -> DriverResult<String> {
            self.record("current_image");
            Ok("myapp:v1.0.40".to_string())
        }

        async fn snapshot(&self) -> DriverResult<String> {
            self.record("snapshot");
            self.fail_if(self.fail_snapshot, "snapshot")?;
            Ok("backup-1".to_string())
        }

        async fn stop(&self, graceful: bool) -> DriverResult<()> {
            self.record(format!("stop graceful={}", graceful));
            if graceful {
                self.fail_if(self.fail_graceful_stop, "graceful stop")
            } else {
                self.fail_if(self.fail_forced_stop, "forced stop")
            }
        }

        async fn set_image(&self, image: &str) -> DriverResult<()> {
            self.record(format!("set_image {}", image));
            self.fail_if(self.fail_set_image, "set_image")
        }

        async fn pull(&self, image: &str) -> DriverResult<()> {
            self.record(format!("pull {}", image));
            self.fail_if(self.fail_pull, "pull")
        }

        async fn start(&self) -> DriverResult<()> {
            self.record("start");
            self.fail_if(self.fail_start, "start")
        }
    }

    fn executor(driver: MockDriver) -> (Arc<MockDriver>, RollbackExecutor) {
        let driver = Arc::new(driver);
        let executor = RollbackExecutor::new(driver.clone(), ExecutorConfig::default());
        (driver, executor)
    }

    fn state(dry_run: bool) -> DeploymentState {
        DeploymentState::new("myapp:v1.0.40", "test", dry_run)
    }

    #[tokio::test]
    async fn test_happy_path_records_rollback_performed() {
        let (driver, executor) = executor(MockDriver::default());
        let state = state(false);
        let mut log = EventLog::new();

        let result = executor.execute("myapp:stable", &state, &mut log).await;

        assert!(result.succeeded);
        assert_eq!(
            driver.calls(),
            vec![
                "snapshot",
                "stop graceful=true",
                "set_image myapp:stable",
                "pull myapp:stable",
                "start",
            ]
        );
        assert!(log
            .entries()
            .iter()
            .any(|e| e.event_type == EventType::RollbackPerformed));
    }

    #[tokio::test]
    async fn test_graceful_stop_failure_triggers_forced_stop() {
        let (driver, executor) = executor(MockDriver {
            fail_graceful_stop: true,
            ..Default::default()
        });
        let state = state(false);
        let mut log = EventLog::new();

        let result = executor.execute("myapp:stable", &state, &mut log).await;

        assert!(result.succeeded);
        let calls = driver.calls();
        assert!(calls.contains(&"stop graceful=true".to_string()));
        assert!(calls.contains(&"stop graceful=false".to_string()));
    }

    #[tokio::test]
    async fn test_forced_stop_failure_is_fatal() {
        let (driver, executor) = executor(MockDriver {
            fail_graceful_stop: true,
            fail_forced_stop: true,
            ..Default::default()
        });
        let state = state(false);
        let mut log = EventLog::new();

        let result = executor.execute("myapp:stable", &state, &mut log).await;

        assert!(!result.succeeded);
        assert!(result.error.unwrap().contains("forced stop"));
        // Nothing after the stop phase ran.
        assert!(!driver.calls().iter().any(|c| c.starts_with("set_image")));
    }

    #[tokio::test]
    async fn test_backup_failure_is_a_warning_only() {
        let (_, executor) = executor(MockDriver {
            fail_snapshot: true,
            ..Default::default()
        });
        let state = state(false);
        let mut log = EventLog::new();

        let result = executor.execute("myapp:stable", &state, &mut log).await;

        assert!(result.succeeded);
        assert!(log
            .entries()
            .iter()
            .any(|e| e.event_type == EventType::Warning && e.details.contains("backup")));
    }

    #[tokio::test]
    async fn test_pull_failure_is_a_warning_only() {
        let (driver, executor) = executor(MockDriver {
            fail_pull: true,
            ..Default::default()
        });
        let state = state(false);
        let mut log = EventLog::new();

        let result = executor.execute("myapp:stable", &state, &mut log).await;

        assert!(result.succeeded);
        assert!(driver.calls().contains(&"start".to_string()));
        assert!(log
            .entries()
            .iter()
            .any(|e| e.event_type == EventType::Warning && e.details.contains("pull")));
    }

    #[tokio::test]
    async fn test_set_image_failure_is_fatal() {
        let (driver, executor) = executor(MockDriver {
            fail_set_image: true,
            ..Default::default()
        });
        let state = state(false);
        let mut log = EventLog::new();

        let result = executor.execute("myapp:stable", &state, &mut log).await;

        assert!(!result.succeeded);
        assert!(!driver.calls().contains(&"start".to_string()));
    }

    #[tokio::test]
    async fn test_start_failure_is_fatal() {
        let (_, executor) = executor(MockDriver {
            fail_start: true,
            ..Default::default()
        });
        let state = state(false);
        let mut log = EventLog::new();

        let result = executor.execute("myapp:stable", &state, &mut log).await;

        assert!(!result.succeeded);
        assert!(result.error.unwrap().contains("start"));
        assert!(!log
            .entries()
            .iter()
            .any(|e| e.event_type == EventType::RollbackPerformed));
    }

    #[tokio::test]
    async fn test_dry_run_makes_no_driver_calls() {
        let (driver, executor) = executor(MockDriver::default());
        let state = state(true);
        let mut log = EventLog::new();

        let result = executor.execute("myapp:stable", &state, &mut log).await;

        assert!(result.succeeded);
        assert!(driver.calls().is_empty());
        assert_eq!(
            log.entries()
                .iter()
                .filter(|e| e.event_type == EventType::DryRun)
                .count(),
            5
        );
    }

    #[tokio::test]
    async fn test_backup_disabled_skips_snapshot() {
        let driver = Arc::new(MockDriver::default());
        let executor = RollbackExecutor::new(
            driver.clone(),
            ExecutorConfig {
                enable_backup: false,
                ..Default::default()
            },
        );
        let state = state(false);
        let mut log = EventLog::new();

        let result = executor.execute("myapp:stable", &state, &mut log).await;

        assert!(result.succeeded);
        assert!(!driver.calls().contains(&"snapshot".to_string()));
    }
}

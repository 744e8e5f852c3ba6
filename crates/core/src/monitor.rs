//! Bounded-retry health monitor
//!
//! Repeatedly invokes a [`HealthProbe`] with a fixed delay to produce a
//! single healthy/unhealthy verdict. The same loop runs twice per rollback
//! cycle with different tuning: a cheaper pre-check to decide whether to roll
//! back, and a more patient post-check to verify the rollback worked. A fixed
//! delay (rather than exponential backoff) fits a freshly restarted container
//! that becomes ready within a roughly linear warm-up window.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::traits::HealthProbe;
use crate::types::{HealthVerdict, ProbeStatus};

/// Retry loop over a single-shot [`HealthProbe`]
pub struct HealthMonitor {
    probe: Arc<dyn HealthProbe>,
}

impl HealthMonitor {
    pub fn new(probe: Arc<dyn HealthProbe>) -> Self {
        Self { probe }
    }

    /// Probe `endpoint` up to `max_retries` times with a fixed `delay`
    /// between attempts. Short-circuits on the first healthy probe; the
    /// verdict is healthy only when its last attempt succeeded.
    pub async fn check_health(
        &self,
        endpoint: &str,
        max_retries: u32,
        delay: Duration,
    ) -> HealthVerdict {
        debug_assert!(max_retries >= 1);
        let max_retries = max_retries.max(1);
        let mut last_status = ProbeStatus::Unknown;

        for attempt in 1..=max_retries {
            let result = self.probe.probe(endpoint).await;
            last_status = result.status();

            if result.is_healthy() {
                info!(attempt, max_retries, "health check passed");
                return HealthVerdict {
                    healthy: true,
                    attempts: attempt,
                    last_status: ProbeStatus::Healthy,
                    sampled_metrics: result.metrics,
                };
            }

            debug!(
                attempt,
                max_retries,
                reachable = result.reachable,
                status = %result.status_field,
                "health probe not healthy"
            );

            if attempt < max_retries {
                sleep(delay).await;
            }
        }

        warn!(max_retries, last_status = ?last_status, "health check failed");
        HealthVerdict {
            healthy: false,
            attempts: max_retries,
            last_status,
            sampled_metrics: Default::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ProbeResult;
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Probe that replays a fixed script of results, repeating the last one.
    struct ScriptedProbe {
        script: Vec<ProbeResult>,
        calls: AtomicUsize,
    }

    impl ScriptedProbe {
        fn new(script: Vec<ProbeResult>) -> Self {
            Self {
                script,
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl HealthProbe for ScriptedProbe {
        async fn probe(&self, _endpoint: &str) -> ProbeResult {
            let idx = self.calls.fetch_add(1, Ordering::SeqCst);
            self.script
                .get(idx)
                .or_else(|| self.script.last())
                .cloned()
                .unwrap_or_else(ProbeResult::unreachable)
        }
    }

    fn healthy_probe() -> ProbeResult {
        let mut metrics = BTreeMap::new();
        metrics.insert("total_records".to_string(), "1234".to_string());
        ProbeResult {
            reachable: true,
            status_field: "healthy".to_string(),
            metrics,
        }
    }

    fn degraded_probe() -> ProbeResult {
        ProbeResult {
            reachable: true,
            status_field: "degraded".to_string(),
            metrics: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn test_short_circuits_on_first_healthy_probe() {
        let probe = Arc::new(ScriptedProbe::new(vec![healthy_probe()]));
        let monitor = HealthMonitor::new(probe.clone());

        let verdict = monitor
            .check_health("http://svc", 10, Duration::from_millis(1))
            .await;

        assert!(verdict.healthy);
        assert_eq!(verdict.attempts, 1);
        assert_eq!(verdict.last_status, ProbeStatus::Healthy);
        assert_eq!(probe.calls(), 1);
        assert_eq!(
            verdict.sampled_metrics.get("total_records").map(String::as_str),
            Some("1234")
        );
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failures() {
        let probe = Arc::new(ScriptedProbe::new(vec![
            ProbeResult::unreachable(),
            degraded_probe(),
            healthy_probe(),
        ]));
        let monitor = HealthMonitor::new(probe.clone());

        let verdict = monitor
            .check_health("http://svc", 5, Duration::from_millis(1))
            .await;

        assert!(verdict.healthy);
        assert_eq!(verdict.attempts, 3);
        assert_eq!(probe.calls(), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_reports_degraded_when_reachable() {
        let probe = Arc::new(ScriptedProbe::new(vec![degraded_probe()]));
        let monitor = HealthMonitor::new(probe);

        let verdict = monitor
            .check_health("http://svc", 3, Duration::from_millis(1))
            .await;

        assert!(!verdict.healthy);
        assert_eq!(verdict.attempts, 3);
        assert_eq!(verdict.last_status, ProbeStatus::Degraded);
    }

    #[tokio::test]
    async fn test_exhaustion_reports_unknown_when_unreachable() {
        let probe = Arc::new(ScriptedProbe::new(vec![ProbeResult::unreachable()]));
        let monitor = HealthMonitor::new(probe);

        let verdict = monitor
            .check_health("http://svc", 2, Duration::from_millis(1))
            .await;

        assert!(!verdict.healthy);
        assert_eq!(verdict.attempts, 2);
        assert_eq!(verdict.last_status, ProbeStatus::Unknown);
    }

    #[tokio::test]
    async fn test_verdict_attempts_never_exceed_max_retries() {
        let probe = Arc::new(ScriptedProbe::new(vec![degraded_probe()]));
        let monitor = HealthMonitor::new(probe.clone());

        let verdict = monitor
            .check_health("http://svc", 4, Duration::from_millis(1))
            .await;

        assert_eq!(verdict.attempts, 4);
        assert_eq!(probe.calls(), 4);
    }
}

//! Sentinel configuration
//!
//! Typed configuration with defaults mirroring the production tuning:
//! a cheap, fast pre-check and a more patient post-rollback check. Loaded
//! from an optional YAML file merged with `SENTINEL_`-prefixed environment
//! variables.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SentinelError};

/// Retry tuning for one health-check phase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum probe attempts
    pub max_retries: u32,
    /// Fixed delay between attempts, in seconds
    pub delay_secs: u64,
}

impl RetryConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_secs)
    }
}

/// Health-check configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    /// Base URL of the service; the probe targets `{endpoint}/health`
    pub endpoint: String,
    /// Timeout for a single probe, in seconds
    pub probe_timeout_secs: u64,
    /// Tuning for the pre-rollback decision check
    pub pre_check: RetryConfig,
    /// Tuning for the post-rollback verification check
    pub post_check: RetryConfig,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:2542".to_string(),
            probe_timeout_secs: 10,
            pre_check: RetryConfig {
                max_retries: 10,
                delay_secs: 5,
            },
            post_check: RetryConfig {
                max_retries: 8,
                delay_secs: 15,
            },
        }
    }
}

/// Target-resolution configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Tag tried first against the local image cache
    pub stable_tag: String,
    /// Ordered fallback version tags tried against the registry.
    /// Duplicates are attempted once and flagged by [`SentinelConfig::lint`].
    pub fallback_versions: Vec<String>,
    /// Timeout for a single registry pull, in seconds
    pub pull_timeout_secs: u64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            stable_tag: "stable".to_string(),
            // The inherited list really does repeat v1.0.37; resolution
            // deduplicates the attempts and lint() surfaces the repeat.
            fallback_versions: vec![
                "v1.0.37".to_string(),
                "v1.0.37".to_string(),
                "latest-stable".to_string(),
                "previous".to_string(),
            ],
            pull_timeout_secs: 60,
        }
    }
}

/// Rollback-execution configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Timeout for the graceful stop phase, in seconds
    pub stop_timeout_secs: u64,
    /// Whether to snapshot the deployment configuration before mutating it
    pub enable_backup: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            stop_timeout_secs: 30,
            enable_backup: true,
        }
    }
}

/// Audit artifact configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportingConfig {
    /// Where to append the JSON-Lines event log; `None` keeps it in memory
    pub event_log_path: Option<PathBuf>,
    /// Where to write the end-of-run report; `None` prints only
    pub report_path: Option<PathBuf>,
}

/// Notification configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Webhook URL for alert delivery; `None` logs alerts locally
    pub webhook_url: Option<String>,
}

/// Complete sentinel configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SentinelConfig {
    pub health: HealthConfig,
    pub resolver: ResolverConfig,
    pub executor: ExecutorConfig,
    pub reporting: ReportingConfig,
    pub notifications: NotificationConfig,
}

impl SentinelConfig {
    /// Load configuration from an optional YAML file merged with
    /// `SENTINEL_`-prefixed environment variables.
    pub fn load(config_path: Option<PathBuf>) -> Result<Self> {
        let mut figment = Figment::new();

        if let Some(path) = config_path {
            figment = figment.merge(Yaml::file(path));
        }

        figment = figment.merge(Env::prefixed("SENTINEL_").split("__"));

        let config: SentinelConfig = figment
            .extract()
            .map_err(|e| SentinelError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the orchestrator cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.health.endpoint.trim().is_empty() {
            return Err(SentinelError::Config(
                "health endpoint must not be empty".to_string(),
            ));
        }
        if self.health.pre_check.max_retries == 0 || self.health.post_check.max_retries == 0 {
            return Err(SentinelError::Config(
                "health check max_retries must be at least 1".to_string(),
            ));
        }
        if self.health.probe_timeout_secs == 0 {
            return Err(SentinelError::Config(
                "probe timeout must be at least 1 second".to_string(),
            ));
        }
        if self.resolver.stable_tag.trim().is_empty() {
            return Err(SentinelError::Config(
                "resolver stable_tag must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Non-fatal configuration findings, e.g. repeated fallback tags.
    pub fn lint(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        let mut seen: Vec<&str> = Vec::new();
        for tag in &self.resolver.fallback_versions {
            if seen.contains(&tag.as_str()) {
                warnings.push(format!(
                    "fallback_versions contains duplicate tag '{}'; it will be attempted once",
                    tag
                ));
            } else {
                seen.push(tag);
            }
        }
        if self.resolver.fallback_versions.is_empty() {
            warnings.push("fallback_versions is empty; only the stable tag and local cache will be considered".to_string());
        }
        warnings
    }
}

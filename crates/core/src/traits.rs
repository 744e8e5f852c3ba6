//! Collaborator traits
//!
//! The core never shells out or talks to a registry directly: everything
//! side-effecting sits behind these traits so the orchestration logic is
//! testable with mock collaborators and zero real process execution.

use async_trait::async_trait;

use crate::error::DriverResult;
use crate::types::{ProbeResult, Severity};

/// Issues a single health check against a service endpoint.
///
/// Implementations must never retry internally; retries belong to the
/// [`HealthMonitor`](crate::monitor::HealthMonitor).
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// Perform one bounded-time probe. Network and timeout failures are
    /// routine outcomes and map to `ProbeResult::unreachable()`, never `Err`.
    async fn probe(&self, endpoint: &str) -> ProbeResult;
}

/// Controls the deployment under management.
///
/// `stop`, `set_image`, `pull` and `start` are the mutating operations; in
/// dry-run mode the core never calls any of them. `snapshot` is best-effort
/// backup, consumed for audit purposes only.
#[async_trait]
pub trait DeploymentDriver: Send + Sync {
    /// Image reference currently configured for the deployment.
    async fn current_image(&self) -> DriverResult<String>;

    /// Back up the current deployment configuration; returns an identifier
    /// for the backup (e.g. a file path).
    async fn snapshot(&self) -> DriverResult<String>;

    /// Stop the deployment. `graceful == false` is the forced second phase
    /// of a two-phase stop.
    async fn stop(&self, graceful: bool) -> DriverResult<()>;

    /// Point the deployment at a different image reference.
    async fn set_image(&self, image: &str) -> DriverResult<()>;

    /// Fetch the image artifact for `image`.
    async fn pull(&self, image: &str) -> DriverResult<()>;

    /// Start the deployment with its currently configured image.
    async fn start(&self) -> DriverResult<()>;
}

/// Read-mostly view of the image cache and registry used by target
/// resolution. Kept separate from [`DeploymentDriver`] so a failed
/// resolution leaves the deployment driver untouched.
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Whether an image with this exact reference exists in the local cache.
    async fn tag_exists(&self, image: &str) -> DriverResult<bool>;

    /// Attempt to fetch `image` from the remote registry under a bounded
    /// timeout.
    async fn pull(&self, image: &str) -> DriverResult<()>;

    /// All locally cached image references sharing `base`, most recent
    /// first.
    async fn list_repo_images(&self, base: &str) -> DriverResult<Vec<String>>;
}

/// Delivers human-readable alerts.
///
/// Fire-and-forget: implementations log delivery failures themselves; a
/// failed notification must never fail the rollback cycle.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, title: &str, message: &str, severity: Severity);
}

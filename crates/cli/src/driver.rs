//! Docker Compose deployment driver and image store
//!
//! Reference implementations of the core collaborator traits on top of the
//! `docker` CLI. Every external call is bounded by a timeout; command
//! failures surface as [`DriverError`] values for the core to classify.

use std::path::PathBuf;
use std::process::Output;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use deploy_sentinel_core::{DeploymentDriver, DriverError, DriverResult, ImageStore};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info};

/// Default bound on any single docker invocation
const COMMAND_TIMEOUT: Duration = Duration::from_secs(120);

async fn run_command(program: &str, args: &[&str], operation: &str) -> DriverResult<String> {
    debug!(program, ?args, "running command");
    let output: Output = timeout(COMMAND_TIMEOUT, Command::new(program).args(args).output())
        .await
        .map_err(|_| DriverError::Timeout {
            operation: operation.to_string(),
            timeout: COMMAND_TIMEOUT,
        })??;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(DriverError::CommandFailed(format!(
            "{}: {}",
            operation,
            stderr.trim()
        )))
    }
}

/// Find the `image:` value for `service` in a compose file.
///
/// Line-based on purpose: the sentinel must not reformat an operator's
/// compose file, so reads and writes both work on raw lines.
pub fn find_compose_image(content: &str, service: &str) -> Option<String> {
    let mut in_service = false;
    for line in content.lines() {
        let trimmed = line.trim_end();
        let indent = trimmed.len() - trimmed.trim_start().len();
        let body = trimmed.trim_start();

        if indent == 2 && body.ends_with(':') {
            in_service = body.trim_end_matches(':') == service;
            continue;
        }
        if in_service && indent >= 4 {
            if let Some(value) = body.strip_prefix("image:") {
                return Some(value.trim().trim_matches('"').trim_matches('\'').to_string());
            }
        }
    }
    None
}

/// Rewrite the `image:` line for `service`, preserving surrounding content.
pub fn replace_compose_image(content: &str, service: &str, new_image: &str) -> Option<String> {
    let mut in_service = false;
    let mut replaced = false;
    let mut out = Vec::new();

    for line in content.lines() {
        let trimmed = line.trim_end();
        let indent = trimmed.len() - trimmed.trim_start().len();
        let body = trimmed.trim_start();

        if indent == 2 && body.ends_with(':') {
            in_service = body.trim_end_matches(':') == service;
        } else if in_service && !replaced && indent >= 4 && body.starts_with("image:") {
            out.push(format!("{}image: {}", " ".repeat(indent), new_image));
            replaced = true;
            continue;
        }
        out.push(line.to_string());
    }

    if replaced {
        let mut result = out.join("\n");
        if content.ends_with('\n') {
            result.push('\n');
        }
        Some(result)
    } else {
        None
    }
}

/// Deployment driver backed by `docker compose`
pub struct DockerComposeDriver {
    compose_file: PathBuf,
    service: String,
    stop_grace_secs: u64,
}

impl DockerComposeDriver {
    pub fn new(
        compose_file: impl Into<PathBuf>,
        service: impl Into<String>,
        stop_grace_secs: u64,
    ) -> Self {
        Self {
            compose_file: compose_file.into(),
            service: service.into(),
            stop_grace_secs,
        }
    }

    fn compose_path(&self) -> &str {
        self.compose_file.to_str().unwrap_or("docker-compose.yml")
    }

    async fn read_compose(&self) -> DriverResult<String> {
        Ok(tokio::fs::read_to_string(&self.compose_file).await?)
    }
}

#[async_trait]
impl DeploymentDriver for DockerComposeDriver {
    async fn current_image(&self) -> DriverResult<String> {
        let content = self.read_compose().await?;
        find_compose_image(&content, &self.service).ok_or_else(|| {
            DriverError::StateUnavailable(format!(
                "no image entry for service '{}' in {}",
                self.service,
                self.compose_file.display()
            ))
        })
    }

    async fn snapshot(&self) -> DriverResult<String> {
        let stamp = Utc::now().format("%Y%m%d%H%M%S");
        let backup = self
            .compose_file
            .with_extension(format!("yml.backup.{}", stamp));
        tokio::fs::copy(&self.compose_file, &backup).await?;
        info!(backup = %backup.display(), "compose file backed up");
        Ok(backup.display().to_string())
    }

    async fn stop(&self, graceful: bool) -> DriverResult<()> {
        if graceful {
            let grace = self.stop_grace_secs.to_string();
            run_command(
                "docker",
                &[
                    "compose",
                    "-f",
                    self.compose_path(),
                    "stop",
                    "-t",
                    &grace,
                    &self.service,
                ],
                "graceful stop",
            )
            .await?;
        } else {
            run_command(
                "docker",
                &["compose", "-f", self.compose_path(), "kill", &self.service],
                "forced stop",
            )
            .await?;
        }
        Ok(())
    }

    async fn set_image(&self, image: &str) -> DriverResult<()> {
        let content = self.read_compose().await?;
        let updated = replace_compose_image(&content, &self.service, image).ok_or_else(|| {
            DriverError::StateUnavailable(format!(
                "no image entry for service '{}' in {}",
                self.service,
                self.compose_file.display()
            ))
        })?;
        tokio::fs::write(&self.compose_file, updated).await?;
        info!(image, service = %self.service, "compose image updated");
        Ok(())
    }

    async fn pull(&self, image: &str) -> DriverResult<()> {
        run_command("docker", &["pull", image], "pull").await?;
        Ok(())
    }

    async fn start(&self) -> DriverResult<()> {
        run_command(
            "docker",
            &["compose", "-f", self.compose_path(), "up", "-d", &self.service],
            "start",
        )
        .await?;
        Ok(())
    }
}

/// Image cache and registry view backed by the `docker` CLI
#[derive(Default)]
pub struct DockerImageStore;

#[async_trait]
impl ImageStore for DockerImageStore {
    async fn tag_exists(&self, image: &str) -> DriverResult<bool> {
        match run_command("docker", &["image", "inspect", image], "image inspect").await {
            Ok(_) => Ok(true),
            Err(DriverError::CommandFailed(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn pull(&self, image: &str) -> DriverResult<()> {
        run_command("docker", &["pull", image], "pull").await?;
        Ok(())
    }

    async fn list_repo_images(&self, base: &str) -> DriverResult<Vec<String>> {
        // `docker images` lists most recently created first, which is the
        // order the local fallback wants.
        let output = run_command(
            "docker",
            &["images", "--format", "{{.Repository}}:{{.Tag}}"],
            "image list",
        )
        .await?;

        let prefix = format!("{}:", base);
        Ok(output
            .lines()
            .filter(|line| line.starts_with(&prefix) && !line.ends_with(":<none>"))
            .map(str::to_string)
            .collect())
    }
}

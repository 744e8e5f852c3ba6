//! deploy-sentinel CLI
//!
//! Thin command surface over the rollback orchestrator: check health and
//! roll back if needed, force a rollback (optionally to an explicit image),
//! or print the current deployment status. Exit code 0 means healthy,
//! recovered, or nothing to do; non-zero means the cycle ended in `Failed`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use deploy_sentinel_core::{
    CycleState, HttpHealthProbe, Notifier, RollbackOrchestrator, SentinelConfig, Trigger,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod driver;
mod notify;

use driver::{DockerComposeDriver, DockerImageStore};
use notify::{LogNotifier, WebhookNotifier};

#[derive(Parser)]
#[command(
    name = "deploy-sentinel",
    version,
    about = "Automated health monitoring and rollback for container deployments"
)]
struct Cli {
    /// Check service health and roll back if it is unhealthy (default action)
    #[arg(long)]
    check_health: bool,

    /// Roll back immediately, bypassing the health pre-check
    #[arg(long)]
    force_rollback: bool,

    /// Explicit rollback target image (implies --force-rollback)
    #[arg(long, value_name = "IMAGE")]
    rollback_to: Option<String>,

    /// Print current image and a one-shot health verdict
    #[arg(long)]
    status: bool,

    /// Simulate every step without performing any mutating action
    #[arg(long)]
    dry_run: bool,

    /// Path to the sentinel configuration file
    #[arg(short, long, env = "SENTINEL_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Compose file driving the deployment
    #[arg(long, env = "SENTINEL_COMPOSE_FILE", default_value = "docker-compose.yml")]
    compose_file: PathBuf,

    /// Service name within the compose file
    #[arg(long, env = "SENTINEL_SERVICE", default_value = "app")]
    service: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    match run().await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    }
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = SentinelConfig::load(cli.config.clone())?;
    for finding in config.lint() {
        eprintln!("{} {}", "warning:".yellow().bold(), finding);
    }

    let probe = Arc::new(HttpHealthProbe::new(Duration::from_secs(
        config.health.probe_timeout_secs,
    )));
    let driver = Arc::new(DockerComposeDriver::new(
        cli.compose_file.clone(),
        cli.service.clone(),
        config.executor.stop_timeout_secs,
    ));
    let store = Arc::new(DockerImageStore);
    let notifier: Arc<dyn Notifier> = match &config.notifications.webhook_url {
        Some(url) => Arc::new(WebhookNotifier::new(url.clone())),
        None => Arc::new(LogNotifier),
    };

    let orchestrator = RollbackOrchestrator::new(config, probe, driver, store, notifier);

    if cli.status {
        let status = orchestrator.status().await?;
        let verdict = if status.healthy {
            "healthy".green().bold()
        } else {
            "unhealthy".red().bold()
        };
        println!("image:  {}", status.current_image);
        println!("health: {} ({:?})", verdict, status.last_status);
        for (key, value) in &status.sampled_metrics {
            println!("  {}: {}", key, value);
        }
        return Ok(if status.healthy { 0 } else { 1 });
    }

    let trigger = if cli.force_rollback || cli.rollback_to.is_some() {
        Trigger::ForceRollback {
            target: cli.rollback_to.clone(),
        }
    } else {
        Trigger::HealthCheck
    };

    let report = orchestrator.run(trigger, cli.dry_run).await?;

    let state_line = match report.terminal_state {
        CycleState::Healthy => "Healthy".green().bold(),
        CycleState::Succeeded => "Succeeded".green().bold(),
        CycleState::Failed if report.dry_run => "Failed (dry run)".yellow().bold(),
        CycleState::Failed => "Failed".red().bold(),
        other => other.as_str().normal(),
    };
    println!("{}", report.render());
    println!("terminal state: {}", state_line);

    // Dry-run cycles end in Failed by construction (nothing was recovered)
    // but a simulation is not an operational failure.
    let failed = report.terminal_state == CycleState::Failed && !report.dry_run;
    Ok(if failed { 1 } else { 0 })
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        tracing_subscriber::EnvFilter::new(
            "deploy_sentinel_core=debug,deploy_sentinel_cli=debug,info",
        )
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

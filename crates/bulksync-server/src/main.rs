use anyhow::Context;
use bulksync_server::bootstrap;
use bulksync_server::config::loader::{DEFAULT_CONFIG_PATH, load_config};
use bulksync_server::{ConfigOverrides, SchedulerHandle, StartupError};
use clap::Parser;

#[derive(Debug, Parser)]
#[command(
    name = "bulksync",
    version,
    about = "Keeps the desired state store in sync with the application registry"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, env = "BULKSYNC_CONFIG")]
    config: Option<String>,

    /// Base URL of the registry, e.g. http://cc.service.internal:9022
    #[arg(long)]
    registry_url: Option<String>,

    /// Username for the registry's internal API
    #[arg(long)]
    registry_username: Option<String>,

    /// Password for the registry's internal API
    #[arg(long, env = "BULKSYNC_REGISTRY_PASSWORD", hide_env_values = true)]
    registry_password: Option<String>,

    /// Number of apps requested per registry page
    #[arg(long)]
    batch_size: Option<u32>,

    /// Timeout for a single registry page fetch, in milliseconds
    #[arg(long)]
    fetch_timeout_ms: Option<u64>,

    /// Skip TLS certificate verification for the registry
    #[arg(long)]
    skip_cert_verify: bool,

    /// Comma-separated etcd member addresses
    #[arg(long)]
    store_cluster: Option<String>,

    /// Interval between cycles, in milliseconds
    #[arg(long)]
    polling_interval_ms: Option<u64>,

    /// Address workload health callbacks are routed to, relative to the executor
    #[arg(long)]
    health_callback_addr: Option<String>,

    /// JSON object mapping stacks to lifecycle bundles,
    /// e.g. '{"cflinuxfs2": "cflinuxfs2/lifecycle.tgz"}'
    #[arg(long)]
    lifecycle_bundles: Option<String>,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() {
    // Load .env file if present (before anything else)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist - it's optional
        if !matches!(e, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            eprintln!("Warning: Failed to load .env file: {e}");
        }
    }

    // Initialize tracing early with the default level
    bulksync_server::observability::init_tracing();

    let cli = Cli::parse();
    let overrides = ConfigOverrides {
        registry_base_url: cli.registry_url,
        registry_username: cli.registry_username,
        registry_password: cli.registry_password,
        batch_size: cli.batch_size,
        fetch_timeout_ms: cli.fetch_timeout_ms,
        skip_cert_verify: cli.skip_cert_verify.then_some(true),
        store_cluster: cli.store_cluster,
        polling_interval_ms: cli.polling_interval_ms,
        health_callback_addr: cli.health_callback_addr,
        lifecycle_bundles: cli.lifecycle_bundles,
        log_level: cli.log_level,
    };

    let cfg = match load_config(cli.config.as_deref(), &overrides).map_err(StartupError::Config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(e.exit_code());
        }
    };

    tracing::info!(
        path = cli.config.as_deref().unwrap_or(DEFAULT_CONFIG_PATH),
        "Configuration loaded"
    );
    bulksync_server::observability::apply_logging_level(&cfg.logging.level);

    let scheduler = match bootstrap::build_scheduler(&cfg).await {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "startup failed");
            std::process::exit(e.exit_code());
        }
    };

    let handle = scheduler.start();
    shutdown_signal().await;

    if let Err(e) = stop(handle).await {
        tracing::error!(error = %e, "shutdown failed");
        std::process::exit(1);
    }
}

async fn stop(handle: SchedulerHandle) -> anyhow::Result<()> {
    handle
        .shutdown()
        .await
        .context("sync scheduler task failed")
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    tracing::info!("shutdown signal received");
}

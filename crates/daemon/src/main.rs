use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use flowline_core::{
    build_recipes, create_audit_system, load_config, validate_config, AuditEvent, AuditStore,
    DiscoveryRegistry, LoggingConfig, Orchestrator, ProcessorRegistry, SqliteAuditStore,
};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        // The subscriber is only installed once the configuration has
        // loaded, so the fatal path writes straight to stderr.
        eprintln!("Fatal error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Determine config path
    let config_path = std::env::var("FLOWLINE_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load and validate configuration
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    validate_config(&config).context("Configuration validation failed")?;

    init_logging(&config.logging);
    info!("Loaded configuration from {:?}", config_path);
    info!(
        recipes = config.recipes.len(),
        var_dir = ?config.daemon.var_dir,
        poll_interval_secs = config.daemon.poll_interval_secs,
        "Configuration valid"
    );

    // var_dir holds the ledgers, the execution lock, and the audit journal
    fs::create_dir_all(&config.daemon.var_dir)
        .with_context(|| format!("Failed to create var dir {:?}", config.daemon.var_dir))?;

    // Compute config hash for audit
    let config_json = serde_json::to_string(&config).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    let config_hash_short = &config_hash[..16];

    // Create SQLite audit store
    let audit_store: Arc<dyn AuditStore> = Arc::new(
        SqliteAuditStore::new(&config.daemon.audit_db_path())
            .context("Failed to open audit journal")?,
    );

    // Create audit system and spawn the writer task
    let (audit_handle, audit_writer) =
        create_audit_system(Arc::clone(&audit_store), config.daemon.audit_buffer);
    let writer_handle = tokio::spawn(audit_writer.run());

    audit_handle
        .emit(AuditEvent::ServiceStarted {
            version: VERSION.to_string(),
            config_hash: config_hash_short.to_string(),
        })
        .await;

    // Registries of built-in providers and processors
    let discoveries = DiscoveryRegistry::with_defaults();
    let processors = ProcessorRegistry::with_defaults();
    info!(
        providers = ?discoveries.names(),
        processors = ?processors.names(),
        "Registries initialized"
    );

    // Assemble recipes from configuration
    let recipes = build_recipes(&config, &discoveries, &processors, Some(&audit_handle))
        .context("Failed to assemble recipes")?;
    for recipe in &recipes {
        info!(
            recipe = recipe.name(),
            description = recipe.description(),
            storages = recipe.storages().names().len(),
            providers = recipe.providers().len(),
            steps = recipe.steps().len(),
            "Recipe assembled"
        );
    }

    let orchestrator = Orchestrator::new(&config.daemon, recipes, Some(audit_handle.clone()));

    let reason = if config.daemon.run_once {
        info!("Running a single cycle (run_once)");
        let outcome = orchestrator.run_cycle().await.context("Cycle failed")?;
        info!(
            skipped = outcome.was_skipped(),
            runs_processed = outcome.processed(),
            runs_failed = outcome.failed(),
            "Single cycle finished"
        );
        "run_once_complete"
    } else {
        orchestrator.start();
        info!("Daemon started, waiting for shutdown signal");
        shutdown_signal().await;
        info!("Shutdown signal received");
        orchestrator.stop().await;
        "graceful_shutdown"
    };

    audit_handle
        .emit(AuditEvent::ServiceStopped {
            reason: reason.to_string(),
        })
        .await;

    // Drop every AuditHandle holder so the writer's channel closes. The
    // orchestrator owns clones through its recipes. Order matters: the
    // final event is emitted BEFORE the handles go.
    drop(orchestrator);
    drop(audit_handle);

    // Wait for the writer to flush remaining events
    let _ = writer_handle.await;
    info!("Audit writer stopped");

    Ok(())
}

fn init_logging(config: &LoggingConfig) {
    // RUST_LOG wins over the configured filter when set
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.filter.clone().into());
    let registry = tracing_subscriber::registry().with(filter);
    if config.json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

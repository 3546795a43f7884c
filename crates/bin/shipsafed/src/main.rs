use std::sync::Arc;

use anyhow::Context;
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

use shipsafe_adapter_storage_sqlite_sqlx::{Config as StorageConfig, SqliteAuditSink};
use shipsafe_adapter_subsystems::SimulatedPlant;
use shipsafe_app::audit_trail::TracingAuditSink;
use shipsafed::config::Config;
use shipsafed::ingress;
use shipsafed::system::System;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("failed to load configuration")?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.logging.filter))
        .init();

    let registry = config.registry().context("failed to build zone topology")?;
    let plant = Arc::new(SimulatedPlant::new());

    let system = match config.database_url() {
        Some(url) => {
            let db = StorageConfig {
                database_url: url.to_string(),
            }
            .build()
            .await
            .context("failed to open audit database")?;
            tracing::info!(url, "audit log persisted to sqlite");
            System::start(&config, &registry, plant, SqliteAuditSink::new(db.pool().clone()))
        }
        None => {
            tracing::info!("audit log goes to tracing output only");
            System::start(&config, &registry, plant, TracingAuditSink)
        }
    };

    let input = async {
        let stats = ingress::pump(BufReader::new(tokio::io::stdin()), &system).await;
        tracing::info!(
            signals = stats.signals,
            acknowledgments = stats.acknowledgments,
            rejected = stats.rejected,
            "input closed"
        );
        std::future::pending::<()>().await;
    };
    tokio::select! {
        () = input => {}
        result = tokio::signal::ctrl_c() => {
            result.context("failed to listen for shutdown signal")?;
            tracing::info!("shutdown requested");
        }
    }

    let report = system.shutdown().await.context("a task failed during shutdown")?;
    for (subsystem, stats) in &report.runners {
        tracing::info!(
            %subsystem,
            events = stats.events,
            malformed = stats.malformed,
            commands = stats.commands,
            "adapter summary"
        );
    }
    for (standard, status) in &report.compliance {
        tracing::info!(?standard, ?status, "compliance summary");
    }
    tracing::info!(
        version = report.snapshot.version,
        overall = %report.snapshot.overall_state(),
        open_incidents = report.snapshot.incidents.len(),
        violations = report.violations.len(),
        audit_written = report.audit.written,
        audit_abandoned = report.audit.abandoned,
        "shipsafed stopped"
    );
    Ok(())
}

use anyhow::{Context, Result};
use dotenvy::dotenv;
use document_api::{bootstrap, config::Config, create_app, AppState};
use shared::telemetry::{self, TelemetryConfig};
use tokio::signal;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let telemetry_config = TelemetryConfig::from_env("document-api");
    telemetry::init_telemetry(telemetry_config)?;

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return Err(e.into());
        }
    };

    info!(
        "Starting Document API on {} (database '{}')",
        config.bind_address(),
        config.cloudant.db_name
    );

    let addr = config.bind_address();
    let state = AppState::new(config)?;

    // Requests still report their own errors when the store is unreachable.
    match bootstrap::prepare_database(&state).await {
        Ok(report) => info!(
            "Database bootstrap complete: {:?}, seeded: {:?}",
            report.database, report.seeded_document
        ),
        Err(e) => error!("Database bootstrap failed: {}", e),
    }

    let app = create_app(state);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("HTTP server listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server stopped")?;

    info!("Document API stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, draining connections");
}

use std::path::PathBuf;

use roster::config::Configuration;
use roster::{app, initialize_state, telemetry};
use tokio::net::TcpListener;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // initialize tracing.
    telemetry::setup_logging()?;
    let metrics = telemetry::setup_metrics_recorder()?;

    // read configuration file. let it in memory.
    let config = match std::env::var_os("CONFIG_PATH") {
        Some(path) => Configuration::default().path(PathBuf::from(path)),
        None => Configuration::default(),
    }
    .read()?;

    let listener = TcpListener::bind(&config.address).await?;
    let state = initialize_state(config, Some(metrics)).await?;

    tracing::info!(address = %listener.local_addr()?, "roster is listening");

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("roster stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(err) => {
                tracing::error!(error = %err, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}

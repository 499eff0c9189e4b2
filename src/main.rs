// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::Result;
use clap::Parser;
use kube::Client;
use std::sync::Arc;
use steward::{
    config::{OperatorArgs, OperatorConfig},
    constants::TOKIO_WORKER_THREADS,
    controller,
    server::{self, ServerState},
};
use tracing::{debug, error, info};

fn main() -> Result<()> {
    let config = OperatorConfig::try_from(OperatorArgs::parse())?;

    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("steward-controller")
        .enable_all()
        .build()?;

    runtime.block_on(async_main(config))
}

async fn async_main(config: OperatorConfig) -> Result<()> {
    // Respects RUST_LOG if set, otherwise defaults to INFO level
    // RUST_LOG_FORMAT=json switches to JSON output
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }

    info!("Starting Steward ManagedService Operator");
    debug!(?config, "Loaded configuration");

    debug!("Initializing Kubernetes client");
    let client = Client::try_default().await?;

    let state = Arc::new(ServerState::default());
    let metrics_addr = config.metrics_bind_address;
    let server_state = state.clone();
    tokio::spawn(async move {
        if let Err(e) = server::serve(metrics_addr, server_state).await {
            error!(error = %e, "Metrics server exited");
        }
    });

    let result = controller::run(client, config, state.clone(), shutdown_signal()).await;
    state.set_ready(false);

    if let Err(e) = &result {
        error!(error = ?e, "CRITICAL: controller exited with an error");
    }
    result
}

/// Completes on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl-C"),
        () = terminate => info!("Received SIGTERM"),
    }
}

//! The `schedula` binary: parses CLI flags, wires the Repository,
//! Executor, and Dispatcher together, and serves the admission API,
//! health, and metrics routes until asked to shut down.

mod config;

use std::future::ready;
use std::process::ExitCode;
use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use clap::Parser;

use config::Cli;
use health::HealthRegistry;
use schedula_dispatcher::{Dispatcher, DispatcherConfig};
use schedula_executor::HttpExecutor;
use schedula_repository::{InMemoryRepository, Repository};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let repository: Arc<dyn Repository> = match cli.repo_type.as_str() {
        "in-memory" => Arc::new(InMemoryRepository::new()),
        other => {
            tracing::error!(repo_type = other, "unsupported repository backend");
            return ExitCode::FAILURE;
        }
    };

    if cli.sched_type != "ticker" {
        tracing::error!(sched_type = %cli.sched_type, "unsupported scheduler backend");
        return ExitCode::FAILURE;
    }

    let executor = Arc::new(HttpExecutor::new(cli.timeout.0));

    let liveness = HealthRegistry::new("liveness");
    let dispatcher_liveness = liveness
        .register("dispatcher".to_string(), time::Duration::seconds(60))
        .await;

    let dispatcher_config = DispatcherConfig {
        workers_per_host: cli.workers_per_host,
        request_timeout: cli.timeout.0,
        ..Default::default()
    };

    let dispatcher = Arc::new(Dispatcher::new(
        repository.clone(),
        executor,
        dispatcher_config,
        dispatcher_liveness,
    ));

    if let Err(e) = dispatcher.start().await {
        tracing::error!(error = %e, "failed to start dispatcher");
        return ExitCode::FAILURE;
    }

    let readiness = liveness.clone();
    let router = Router::new()
        .merge(schedula_api::routes(repository))
        .route("/_readiness", get(move || ready(readiness.get_status())))
        .route("/_liveness", get(move || ready(liveness.get_status())));
    let router = schedula_common::metrics::setup_metrics_router().merge(router);

    let bind = cli.bind();
    let listener = match tokio::net::TcpListener::bind(&bind).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(bind, error = %e, "failed to bind admission API listener");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(bind, "schedula listening");

    let serve = axum::serve(listener, router).with_graceful_shutdown(shutdown_signal());
    if let Err(e) = serve.await {
        tracing::error!(error = %e, "admission API server error");
        return ExitCode::FAILURE;
    }

    if let Err(e) = dispatcher.stop().await {
        tracing::error!(error = %e, "failed to stop dispatcher cleanly");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
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

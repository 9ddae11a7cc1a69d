use std::{process, sync::Arc, time::Duration};

use rubrika::{
    application::{categories::CategoryService, error::AppError},
    cache::CategoryCache,
    config,
    infra::{
        db::PostgresCategories,
        error::InfraError,
        http::{ApiState, build_router},
        telemetry,
    },
};
use tokio::signal;
use tokio::sync::oneshot;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (_cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    telemetry::init(&settings.logging)?;

    let database_url = settings.database.url.as_deref().ok_or_else(|| {
        InfraError::configuration("database.url is required (RUBRIKA__DATABASE__URL or --database-url)")
    })?;

    let pool = PostgresCategories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| InfraError::database(format!("failed to connect: {err}")))?;
    PostgresCategories::run_migrations(&pool)
        .await
        .map_err(|err| InfraError::database(format!("failed to run migrations: {err}")))?;

    let db = Arc::new(PostgresCategories::new(pool));
    let cache = Arc::new(CategoryCache::new(&settings.cache));
    let categories = Arc::new(CategoryService::new(db.clone(), cache, settings.fetch));

    let router = build_router(ApiState {
        categories,
        db: Some(db),
    });

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(InfraError::from)?;
    info!(addr = %settings.server.addr, "listening");

    let (signaled_tx, signaled_rx) = oneshot::channel();
    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        shutdown_signal().await;
        let _ = signaled_tx.send(());
    });

    // Drain in-flight connections after the signal, but only for the
    // configured window; stragglers are dropped when it elapses.
    tokio::select! {
        result = server => {
            result.map_err(InfraError::from)?;
            info!("shutdown complete");
        }
        _ = drain_deadline(signaled_rx, settings.server.graceful_shutdown) => {
            warn!(
                timeout_secs = settings.server.graceful_shutdown.as_secs(),
                "drain timeout elapsed; closing remaining connections"
            );
        }
    }
    Ok(())
}

async fn drain_deadline(signaled: oneshot::Receiver<()>, drain: Duration) {
    let _ = signaled.await;
    tokio::time::sleep(drain).await;
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(error) => error!(error = %error, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}

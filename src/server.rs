//! Server initialization and startup logic for Aide.

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use aide_config::{Config, ConfigLoader, ConfigValidator, LoggingConfig};
use aide_daemon::{DaemonSignal, HealthChecker, LivenessCheck, PidFile, SignalHandler};
use aide_delivery::{
    DedupHandler, DeliveryHealthCheck, DeliveryStatus, LifecycleController, WebhookState,
    status_router, webhook_router,
};
use aide_protocols::{HealthStatus, UpdateHandler, UpdateSource};
use aide_source_telegram::TelegramClient;

use crate::handler::EventFanout;

/// Events buffered for slow in-process subscribers.
const FANOUT_CAPACITY: usize = 256;

/// Get the ~/.aide directory path.
pub(crate) fn aide_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".aide"))
        .unwrap_or_else(|| PathBuf::from(".aide"))
}

/// Initialize tracing with console and file output.
///
/// Log files are written to `[logging].dir` (default ~/.aide/logs) with daily rotation.
pub(crate) fn init_tracing(logging: &LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
    let log_dir = logging
        .dir
        .as_ref()
        .map(|dir| PathBuf::from(ConfigLoader::expand_path(&dir.to_string_lossy())))
        .unwrap_or_else(|| aide_dir().join("logs"));
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("aide")
        .filename_suffix("log")
        .max_log_files(14)
        .build(&log_dir)?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // The guard flushes the file writer on drop; keep it for the whole process.
    static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
        std::sync::OnceLock::new();
    let _ = GUARD.set(guard);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_ansi(true))
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    Ok(())
}

/// Build the HTTP surface: the push endpoint, `/status` and `/health`.
pub(crate) fn build_router(
    config: &Config,
    handler: Arc<dyn UpdateHandler>,
    status: Arc<DeliveryStatus>,
    health: Arc<HealthChecker>,
) -> Router {
    let webhook_state = WebhookState::new(handler, status.clone())
        .with_secret(config.delivery.secret_token.clone());

    Router::new()
        .route("/health", get(health_check))
        .with_state(health)
        .merge(webhook_router(&config.delivery.webhook_path, webhook_state))
        .merge(status_router(status))
}

/// GET /health
async fn health_check(State(health): State<Arc<HealthChecker>>) -> impl IntoResponse {
    let result = health.check().await;
    let code = if result.status == HealthStatus::Unhealthy {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    (code, Json(result))
}

/// Run the server in foreground until a signal arrives or delivery stops on its own.
pub(crate) async fn run_server(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    info!("Starting Aide v{}", env!("CARGO_PKG_VERSION"));

    let validation = ConfigValidator::validate(&config);
    for warning in &validation.warnings {
        warn!("Config: {}", warning);
    }
    if !validation.is_valid() {
        for err in &validation.errors {
            error!("Config: {}", err);
        }
        return Err(format!("configuration has {} error(s)", validation.errors.len()).into());
    }

    let pid_path = PathBuf::from(ConfigLoader::expand_path(
        &config.daemon.pid_file.to_string_lossy(),
    ));
    if let Some(parent) = pid_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut pid_file = PidFile::acquire(&pid_path)?;

    let signals = SignalHandler::new();
    signals.setup_os_signals()?;
    let shutdown = signals.shutdown_token();
    let mut signal_rx = signals.subscribe();

    let source: Arc<dyn UpdateSource> = Arc::new(
        TelegramClient::new(&config.telegram)?
            .with_poll_limit(config.delivery.poll_limit)
            .with_allowed_updates(config.delivery.allowed_updates.clone()),
    );
    let status = Arc::new(DeliveryStatus::new());
    let fanout = Arc::new(EventFanout::new(FANOUT_CAPACITY));
    let handler: Arc<dyn UpdateHandler> = Arc::new(
        DedupHandler::new(fanout, config.delivery.dedup_window).with_status(status.clone()),
    );
    let controller = Arc::new(LifecycleController::with_status(
        source.clone(),
        handler.clone(),
        config.delivery.clone(),
        status.clone(),
    )
    .with_shutdown(&shutdown));

    let health = Arc::new(HealthChecker::new(config.daemon.health_check_interval()));
    health.register(Arc::new(LivenessCheck)).await;
    health
        .register(Arc::new(
            DeliveryHealthCheck::new(status.clone(), config.delivery.poll_timeout())
                .with_source(source),
        ))
        .await;
    let health_task = tokio::spawn(health.clone().start_loop(shutdown.clone()));

    // The push endpoint must be reachable before registration makes the platform call it.
    let app = build_router(&config, handler, status, health);
    let listener = TcpListener::bind((config.server.host.as_str(), config.server.port)).await?;
    info!("Listening on http://{}", listener.local_addr()?);

    let server_token = CancellationToken::new();
    let server_shutdown = server_token.clone();
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { server_shutdown.cancelled().await })
            .await
    });

    let outcome: Result<(), Box<dyn std::error::Error>> = match controller.start().await {
        Ok(mode) => {
            info!(%mode, "Aide ready");
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Shutdown requested");
                    Ok(())
                }
                result = controller.wait() => result.map_err(|e| {
                    error!("Delivery stopped: {}", e);
                    Box::new(e) as Box<dyn std::error::Error>
                }),
            }
        }
        Err(_) if shutdown.is_cancelled() => {
            info!("Shutdown requested during startup");
            Ok(())
        }
        Err(e) => {
            error!("Delivery failed to start: {}", e);
            Err(e.into())
        }
    };

    let timeout = config.daemon.shutdown_timeout();
    tokio::select! {
        result = tokio::time::timeout(timeout, controller.stop()) => match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Delivery stopped with error: {}", e),
            Err(_) => warn!("Delivery did not stop within {:?}", timeout),
        },
        _ = wait_for_terminate(&mut signal_rx) => {
            warn!("Terminating without waiting for delivery to stop");
        }
    }

    server_token.cancel();
    match server.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("HTTP server error: {}", e),
        Err(e) => error!("HTTP server task failed: {}", e),
    }

    shutdown.cancel();
    if let Err(e) = health_task.await {
        warn!("Health loop task failed: {}", e);
    }

    pid_file.release()?;
    info!("Aide stopped");
    outcome
}

async fn wait_for_terminate(rx: &mut broadcast::Receiver<DaemonSignal>) {
    loop {
        match rx.recv().await {
            Ok(DaemonSignal::Terminate) => return,
            Ok(DaemonSignal::Shutdown) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => std::future::pending::<()>().await,
        }
    }
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;

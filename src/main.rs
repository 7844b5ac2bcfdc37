use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::info;

use glamtips::config::Config;
use glamtips::engine::Engine;
use glamtips::http::{self, AppState};
use glamtips::notify::{CalendarRelay, EmailRelay, LogNotifier, Notifier, NotifyHub};

/// How long shutdown waits for queued notices to go out.
const NOTIFY_DRAIN: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "glamtips=info,tower_http=info".into()),
        )
        .init();

    let config = Config::from_env()?;
    glamtips::observability::init(config.metrics_port)?;

    // Ensure data directory exists
    std::fs::create_dir_all(&config.data_dir)?;

    let client = reqwest::Client::builder().timeout(config.notify_timeout).build()?;
    let mut notifiers: Vec<Arc<dyn Notifier>> = vec![Arc::new(LogNotifier)];
    if let Some(url) = &config.email_relay_url {
        notifiers.push(Arc::new(EmailRelay::new(client.clone(), url.clone(), config.salon.clone())));
    }
    if let Some(url) = &config.calendar_relay_url {
        notifiers.push(Arc::new(CalendarRelay::new(
            client.clone(),
            url.clone(),
            config.salon.clone(),
            config.time_zone.clone(),
        )));
    }
    let notifier_names: Vec<&str> = notifiers.iter().map(|n| n.name()).collect();
    info!("  notifiers: {}", notifier_names.join(", "));
    let hub = NotifyHub::start(notifiers, config.notify_timeout, config.notify_queue);

    let engine = Arc::new(Engine::new(config.wal_path(), config.grid.clone(), hub.clone())?);
    tokio::spawn(glamtips::compactor::run_compactor(engine.clone(), config.compact_threshold));

    let app = http::router(
        AppState { engine: engine.clone() },
        http::cors_layer(&config.cors_origins),
    );

    let addr = format!("{}:{}", config.bind, config.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("glamtips listening on {addr}");
    info!("  data_dir: {}", config.data_dir.display());
    info!("  slots: {} per day", config.grid.len());
    info!("  metrics: {}", config.metrics_port.map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics")));

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("draining notifications...");
    if !hub.flush(NOTIFY_DRAIN).await {
        tracing::warn!("notification queue not drained before timeout");
    }
    engine.close().await?;

    info!("glamtips stopped");
    Ok(())
}

/// Resolves on ctrl-c or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                tracing::warn!("failed to register SIGTERM handler: {e}");
                ctrl_c.await.ok();
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
    }
    info!("shutdown signal received, stopping server");
}

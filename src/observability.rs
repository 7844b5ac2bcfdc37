use std::net::SocketAddr;
use std::time::Instant;

use axum::extract::{MatchedPath, Request};
use axum::middleware::Next;
use axum::response::Response;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: HTTP requests served. Labels: method, route, status.
pub const HTTP_REQUESTS_TOTAL: &str = "glamtips_http_requests_total";

/// Histogram: HTTP request latency in seconds. Labels: method, route.
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "glamtips_http_request_duration_seconds";

// ── Domain metrics ──────────────────────────────────────────────

/// Counter: booking attempts. Labels: outcome (booked, conflict, invalid, error).
pub const BOOKINGS_TOTAL: &str = "glamtips_bookings_total";

/// Counter: notifier invocations. Labels: notifier, kind, outcome (ok, failed, timeout).
pub const NOTIFICATIONS_TOTAL: &str = "glamtips_notifications_total";

/// Counter: notices dropped because the dispatch queue was full or closed.
pub const NOTIFICATIONS_DROPPED_TOTAL: &str = "glamtips_notifications_dropped_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "glamtips_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "glamtips_wal_flush_batch_size";

/// Counter: WAL compactions performed.
pub const WAL_COMPACTIONS_TOTAL: &str = "glamtips_wal_compactions_total";

/// Install the Prometheus exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), metrics_exporter_prometheus::BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Router middleware recording request count and latency per matched route.
pub async fn track_requests(req: Request, next: Next) -> Response {
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".to_owned());
    let method = req.method().to_string();

    let start = Instant::now();
    let response = next.run(req).await;
    let elapsed = start.elapsed().as_secs_f64();

    let status = response.status().as_u16().to_string();
    metrics::counter!(HTTP_REQUESTS_TOTAL, "method" => method.clone(), "route" => route.clone(), "status" => status)
        .increment(1);
    metrics::histogram!(HTTP_REQUEST_DURATION_SECONDS, "method" => method, "route" => route)
        .record(elapsed);
    response
}

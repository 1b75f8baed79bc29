use std::future::Future;

use axum::{routing::get, Router};
use lazy_static::lazy_static;
use prometheus::{Counter, Encoder, Gauge, Histogram, HistogramOpts, TextEncoder};
use tokio::net::TcpListener;
use tracing::info;

lazy_static! {
    pub static ref SHARES_SUBMITTED: Counter = Counter::new(
        "pool_shares_submitted_total",
        "Total number of solutions submitted"
    ).unwrap();

    pub static ref SHARES_ACCEPTED: Counter = Counter::new(
        "pool_shares_accepted_total",
        "Total number of shares accepted"
    ).unwrap();

    pub static ref SHARES_REJECTED: Counter = Counter::new(
        "pool_shares_rejected_total",
        "Total number of shares rejected as invalid"
    ).unwrap();

    pub static ref WORK_NOT_FOUND: Counter = Counter::new(
        "pool_work_not_found_total",
        "Solutions submitted for unknown or stale work"
    ).unwrap();

    pub static ref BLOCKS_FOUND: Counter = Counter::new(
        "pool_blocks_found_total",
        "Total number of full block solutions"
    ).unwrap();

    pub static ref OUTSTANDING_WORK: Gauge = Gauge::new(
        "pool_outstanding_work",
        "Work units currently tracked by the registry"
    ).unwrap();

    pub static ref CLAIMS_SUBMITTED: Counter = Counter::new(
        "pool_claims_submitted_total",
        "Claims confirmed on chain"
    ).unwrap();

    pub static ref CLAIM_FAILURES: Counter = Counter::new(
        "pool_claim_failures_total",
        "Claim cycles that failed to submit or verify"
    ).unwrap();

    pub static ref TX_CONFIRMATION_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "pool_tx_confirmation_seconds",
            "Time until a ledger transaction is mined"
        )
            .buckets(vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0])
    ).unwrap();
}

pub fn register_metrics() -> prometheus::Result<()> {
    prometheus::register(Box::new(SHARES_SUBMITTED.clone()))?;
    prometheus::register(Box::new(SHARES_ACCEPTED.clone()))?;
    prometheus::register(Box::new(SHARES_REJECTED.clone()))?;
    prometheus::register(Box::new(WORK_NOT_FOUND.clone()))?;
    prometheus::register(Box::new(BLOCKS_FOUND.clone()))?;
    prometheus::register(Box::new(OUTSTANDING_WORK.clone()))?;
    prometheus::register(Box::new(CLAIMS_SUBMITTED.clone()))?;
    prometheus::register(Box::new(CLAIM_FAILURES.clone()))?;
    prometheus::register(Box::new(TX_CONFIRMATION_SECONDS.clone()))?;
    Ok(())
}

pub fn render_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Serves `GET /metrics` on `listener` until `shutdown` resolves.
pub async fn serve_metrics<F>(listener: TcpListener, shutdown: F) -> crate::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = Router::new().route("/metrics", get(|| async { render_metrics() }));
    info!("Prometheus metrics on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

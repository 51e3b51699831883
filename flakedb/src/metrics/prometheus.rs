//! Prometheus-backed metrics and HTTP exporter.
//!
//! This module defines a [`MetricsRegistry`] that owns a Prometheus
//! registry and a set of strongly-typed ledger metrics, and an async HTTP
//! exporter that serves `/metrics` using `hyper`.

use std::{convert::Infallible, net::SocketAddr, sync::Arc};

use bytes::Bytes;
use http_body_util::Full;
use hyper::{
    Method, Request, Response, StatusCode, body::Incoming, header, server::conn::http1,
    service::service_fn,
};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

use prometheus::{
    self, Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Opts, Registry, TextEncoder,
};

/// Transaction-pipeline Prometheus metrics.
///
/// These are registered into a [`Registry`] and can be updated from the
/// transactor and novelty code.
#[derive(Clone)]
pub struct LedgerMetrics {
    /// End-to-end latency of one transaction (parse through persist), in
    /// seconds.
    pub txn_seconds: Histogram,
    /// Total transactions processed, accepted or rejected.
    pub txns_total: IntCounter,
    /// Transactions rejected by validation.
    pub txns_rejected_total: IntCounter,
    /// Blocks sealed and persisted.
    pub blocks_total: IntCounter,
    /// Current novelty size estimate in bytes.
    pub novelty_bytes: IntGauge,
}

impl LedgerMetrics {
    /// Registers ledger metrics into the given `Registry`.
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let txn_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "ledger_txn_seconds",
                "End-to-end transaction latency in seconds",
            )
            .buckets(vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
            ]),
        )?;
        registry.register(Box::new(txn_seconds.clone()))?;

        let txns_total = IntCounter::with_opts(Opts::new(
            "ledger_txns_total",
            "Total transactions processed (accepted + rejected)",
        ))?;
        registry.register(Box::new(txns_total.clone()))?;

        let txns_rejected_total = IntCounter::with_opts(Opts::new(
            "ledger_txns_rejected_total",
            "Transactions rejected by validation",
        ))?;
        registry.register(Box::new(txns_rejected_total.clone()))?;

        let blocks_total = IntCounter::with_opts(Opts::new(
            "ledger_blocks_total",
            "Blocks sealed and persisted",
        ))?;
        registry.register(Box::new(blocks_total.clone()))?;

        let novelty_bytes = IntGauge::with_opts(Opts::new(
            "ledger_novelty_bytes",
            "Current novelty size estimate in bytes",
        ))?;
        registry.register(Box::new(novelty_bytes.clone()))?;

        Ok(Self {
            txn_seconds,
            txns_total,
            txns_rejected_total,
            blocks_total,
            novelty_bytes,
        })
    }
}

/// Wrapper around a Prometheus registry and the ledger metrics.
///
/// This is the main handle you pass around in the node. It can be wrapped
/// in an [`Arc`] and shared across threads/tasks.
#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Registry,
    pub ledger: LedgerMetrics,
}

impl MetricsRegistry {
    /// Creates a new `MetricsRegistry` with a fresh underlying `Registry`
    /// and registers the ledger metrics.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("flakedb".to_string()), None)?;
        let ledger = LedgerMetrics::register(&registry)?;
        Ok(Self { registry, ledger })
    }

    /// Encodes all metrics in this registry into the Prometheus text format.
    pub fn gather_text(&self) -> String {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            tracing::warn!("failed to encode Prometheus metrics: {e}");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

/// Runs an HTTP server that exposes Prometheus metrics.
///
/// The server listens on `addr` and serves `GET /metrics` with the
/// Prometheus text exposition format. All other paths return 404. Intended
/// to be spawned onto a Tokio runtime.
pub async fn run_prometheus_http_server(
    metrics: Arc<MetricsRegistry>,
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;

    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let metrics = metrics.clone();

        tokio::spawn(async move {
            let svc = service_fn(move |req| {
                let metrics = metrics.clone();
                handle_request(req, metrics)
            });

            if let Err(err) = http1::Builder::new().serve_connection(io, svc).await {
                tracing::warn!("prometheus HTTP server error: {err}");
            }
        });
    }
}

async fn handle_request(
    req: Request<Incoming>,
    metrics: Arc<MetricsRegistry>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    match (req.method(), req.uri().path()) {
        (&Method::GET, "/metrics") => {
            let body = metrics.gather_text();
            Ok(Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "text/plain; version=0.0.4")
                .body(Full::new(Bytes::from(body)))
                .unwrap())
        }
        _ => Ok(Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Full::new(Bytes::from("not found")))
            .unwrap()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::Registry;

    #[test]
    fn ledger_metrics_register_and_record() {
        let registry = Registry::new();
        let metrics = LedgerMetrics::register(&registry).expect("register metrics");

        metrics.txn_seconds.observe(0.042);
        metrics.txns_total.inc();
        metrics.txns_rejected_total.inc();
        metrics.blocks_total.inc();
        metrics.novelty_bytes.set(4096);

        let metric_families = registry.gather();
        assert!(!metric_families.is_empty());
    }

    #[test]
    fn metrics_registry_gather_text_works() {
        let registry = MetricsRegistry::new().expect("create metrics registry");
        registry.ledger.txn_seconds.observe(0.01);
        let text = registry.gather_text();
        assert!(text.contains("ledger_txn_seconds"));
    }
}

// src/metrics.rs
use std::net::SocketAddr;

use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series show up before the first send).
pub fn ensure_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("indexer_sent_total", "URLs published and recorded.");
        describe_counter!(
            "indexer_skipped_total",
            "URLs skipped as already indexed or already sent."
        );
        describe_counter!(
            "indexer_failed_total",
            "Publish calls that errored or returned a non-200 status."
        );
        describe_counter!(
            "indexer_unrecorded_total",
            "URLs published successfully but not written to the sent log."
        );
        describe_counter!("indexer_pauses_total", "Day-long pauses on exhausted quota.");
        describe_counter!(
            "indexer_sitemap_urls_total",
            "URLs parsed from the sitemap."
        );
        describe_gauge!(
            "indexer_budget_left",
            "Sends left before the next day pause."
        );
        describe_histogram!("indexer_publish_ms", "Publish call latency in milliseconds.");
        describe_histogram!(
            "indexer_sitemap_parse_ms",
            "Sitemap parse time in milliseconds."
        );
    });
}

/// Serve Prometheus exposition on `addr`. Must run inside the tokio runtime.
pub fn install_exporter(addr: SocketAddr) -> anyhow::Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("prometheus exporter on {addr}: {e}"))?;
    ensure_described();
    tracing::info!(%addr, "metrics exporter listening");
    Ok(())
}

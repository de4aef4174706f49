//! sitemap-indexer binary entrypoint.
//! Loads config, submits new sitemap URLs within quota, reports the total sent.

use anyhow::Context;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sitemap_indexer::notify::google::GoogleIndexingNotifier;
use sitemap_indexer::IndexerConfig;

/// Compact logs by default; `LOG_FORMAT=json` for structured output.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("sitemap_indexer=info,info"));
    let json = std::env::var("LOG_FORMAT")
        .ok()
        .is_some_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().with_target(false).compact()).init();
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cfg = IndexerConfig::load().context("loading configuration")?;
    init_tracing();

    tracing::info!(
        sitemap = %cfg.sitemap_location,
        indexed = %cfg.indexed_path.display(),
        sent = %cfg.sent_path.display(),
        daily_limit = cfg.daily_limit,
        per_minute_limit = cfg.per_minute_limit,
        notification_type = %cfg.notification_type,
        "starting"
    );

    if let Some(addr) = cfg.metrics_addr {
        sitemap_indexer::metrics::install_exporter(addr)?;
    }

    let credentials = cfg.require_credentials()?;
    let notifier = GoogleIndexingNotifier::from_key_file(
        credentials,
        &cfg.indexing_endpoint,
        cfg.notification_type,
    )
    .context("building indexing client")?;

    let summary = sitemap_indexer::run_with(&cfg, &notifier)
        .await
        .context("preparing run")?;

    println!(
        "Finish. Sent {} URLs to Google Index API",
        summary.total_published()
    );
    Ok(())
}

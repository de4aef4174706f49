//! Dry run: print the URLs the next run would submit, without calling the API.

use anyhow::Context;
use sitemap_indexer::IndexerConfig;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_target(false).init();
    let cfg = IndexerConfig::load().context("loading configuration")?;
    let prepared = sitemap_indexer::prepare(&cfg)
        .await
        .context("loading sitemap and ledger")?;

    let pending = prepared.pending_urls();
    for url in &pending {
        println!("{url}");
    }

    let interval = prepared.quota.per_minute_interval();
    println!(
        "pending={} remaining_today={} interval_ms={}",
        pending.len(),
        prepared.quota.budget_left(),
        interval.as_millis()
    );
    let overflow = prepared.over_budget();
    if overflow > 0 {
        println!("note: {overflow} URLs exceed today's quota and would wait for a day pause");
    }
    Ok(())
}

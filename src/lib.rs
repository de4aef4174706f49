// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod ledger;
pub mod metrics;
pub mod notify;
pub mod quota;
pub mod sitemap;

// ---- Re-exports for stable public API ----
pub use crate::config::IndexerConfig;
pub use crate::dispatch::{Dispatcher, RunSummary, UrlState};
pub use crate::error::{IndexerError, Result};
pub use crate::ledger::Ledger;
pub use crate::notify::{NotificationType, Notifier, PublishResponse};
pub use crate::quota::{Decision, QuotaTracker};

use std::collections::HashSet;

use crate::sitemap::SitemapSource;

/// Everything loaded at startup, before any URL is sent.
pub struct Prepared {
    pub urls: Vec<String>,
    pub ledger: Ledger,
    pub quota: QuotaTracker,
}

impl Prepared {
    /// Sitemap URLs the next run would publish: unknown to the ledger,
    /// first occurrence only, in document order.
    pub fn pending_urls(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.urls
            .iter()
            .map(String::as_str)
            .filter(|url| !self.ledger.is_known(url) && seen.insert(*url))
            .collect()
    }

    /// How many pending URLs would have to wait for a day pause.
    pub fn over_budget(&self) -> usize {
        self.pending_urls()
            .len()
            .saturating_sub(self.quota.budget_left() as usize)
    }
}

/// Read the sitemap, load the ledger and derive today's quota.
/// Any failure here is fatal; nothing has been published yet.
pub async fn prepare(cfg: &IndexerConfig) -> Result<Prepared> {
    let source = SitemapSource::from_location(&cfg.sitemap_location);
    let urls = source.fetch_urls().await?;
    tracing::info!(sitemap = %source.describe(), urls = urls.len(), "sitemap parsed");

    let ledger = Ledger::load(&cfg.indexed_path, &cfg.sent_path)?;
    let today = chrono::Local::now().date_naive();
    let quota = QuotaTracker::init(
        cfg.daily_limit,
        cfg.per_minute_limit,
        ledger.sent_log(),
        today,
    )?;
    Ok(Prepared { urls, ledger, quota })
}

/// Full run against an explicit notifier.
pub async fn run_with<N: Notifier + ?Sized>(cfg: &IndexerConfig, notifier: &N) -> Result<RunSummary> {
    let Prepared {
        urls,
        mut ledger,
        quota,
    } = prepare(cfg).await?;
    let mut dispatcher = Dispatcher::new(&mut ledger, quota, notifier);
    Ok(dispatcher.run(&urls).await)
}

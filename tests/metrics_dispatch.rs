// tests/metrics_dispatch.rs
#![cfg(feature = "strict-metrics")]
use std::fs;

use metrics_exporter_prometheus::PrometheusBuilder;
use sitemap_indexer::ledger::Ledger;
use sitemap_indexer::notify::mock::ScriptedNotifier;
use sitemap_indexer::{Dispatcher, QuotaTracker};

#[tokio::test(start_paused = true)]
async fn counters_exposed_after_dispatch() {
    let handle = PrometheusBuilder::new().install_recorder().expect("recorder");

    let dir = tempfile::tempdir().unwrap();
    let ip = dir.path().join("indexed.csv");
    let sp = dir.path().join("sent.csv");
    fs::write(&ip, "https://example.com/known\n").unwrap();
    let mut ledger = Ledger::load(&ip, &sp).unwrap();
    let quota = QuotaTracker::init(10, 60, ledger.sent_log(), chrono::Local::now().date_naive())
        .unwrap();
    let notifier = ScriptedNotifier::new().with_status("https://example.com/bad", 500);

    let urls = vec![
        "https://example.com/known".to_string(),
        "https://example.com/bad".to_string(),
        "https://example.com/good".to_string(),
    ];
    Dispatcher::new(&mut ledger, quota, &notifier).run(&urls).await;

    let out = handle.render();
    assert!(out.contains("indexer_sent_total"));
    assert!(out.contains("indexer_skipped_total"));
    assert!(out.contains("indexer_failed_total"));
    assert!(out.contains("indexer_budget_left"));
}

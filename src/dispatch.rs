// src/dispatch.rs
//! Sequential dispatcher: dedup, quota, publish, record. One URL at a time.

use std::collections::HashSet;

use chrono::{DateTime, Local};
use metrics::{counter, gauge};

use crate::ledger::Ledger;
use crate::notify::Notifier;
use crate::quota::{Decision, QuotaTracker, DAY_PAUSE};

/// Per-URL state transitions, in the order they happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlState {
    /// Already indexed, already sent, or already attempted this run.
    Skip,
    /// Quota exhausted; a day pause followed and the URL was re-evaluated.
    Blocked,
    Sent,
    /// Published but the sent log append failed.
    SentUnrecorded,
    Failed,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub sent: usize,
    pub unrecorded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub pauses: usize,
    pub transitions: Vec<(String, UrlState)>,
}

impl RunSummary {
    /// Successful publishes over the whole run, pauses included.
    pub fn total_published(&self) -> usize {
        self.sent + self.unrecorded
    }

    fn note(&mut self, url: &str, state: UrlState) {
        match state {
            UrlState::Skip => self.skipped += 1,
            UrlState::Blocked => self.pauses += 1,
            UrlState::Sent => self.sent += 1,
            UrlState::SentUnrecorded => self.unrecorded += 1,
            UrlState::Failed => self.failed += 1,
        }
        self.transitions.push((url.to_string(), state));
    }
}

pub struct Dispatcher<'a, N: Notifier + ?Sized> {
    ledger: &'a mut Ledger,
    quota: QuotaTracker,
    notifier: &'a N,
    clock: fn() -> DateTime<Local>,
    attempted: HashSet<String>,
}

impl<'a, N: Notifier + ?Sized> Dispatcher<'a, N> {
    pub fn new(ledger: &'a mut Ledger, quota: QuotaTracker, notifier: &'a N) -> Self {
        Self {
            ledger,
            quota,
            notifier,
            clock: Local::now,
            attempted: HashSet::new(),
        }
    }

    /// Override the wall clock used for sent-log timestamps.
    pub fn with_clock(mut self, clock: fn() -> DateTime<Local>) -> Self {
        self.clock = clock;
        self
    }

    pub fn quota(&self) -> &QuotaTracker {
        &self.quota
    }

    /// Process `urls` in order. Never fails: per-URL problems are logged and
    /// counted, and the run moves on.
    pub async fn run(&mut self, urls: &[String]) -> RunSummary {
        crate::metrics::ensure_described();
        let mut summary = RunSummary::default();
        for url in urls {
            self.dispatch_one(url, &mut summary).await;
        }
        tracing::info!(
            sent = summary.sent,
            unrecorded = summary.unrecorded,
            skipped = summary.skipped,
            failed = summary.failed,
            pauses = summary.pauses,
            "dispatch finished"
        );
        summary
    }

    async fn dispatch_one(&mut self, url: &str, summary: &mut RunSummary) {
        if self.ledger.is_known(url) || self.attempted.contains(url) {
            tracing::debug!(%url, "skipping known url");
            counter!("indexer_skipped_total").increment(1);
            summary.note(url, UrlState::Skip);
            return;
        }

        while self.quota.before_each_send() == Decision::PauseOneDay {
            tracing::warn!(
                %url,
                sent_this_run = self.quota.sent_this_run(),
                remaining_today = self.quota.remaining_today(),
                "daily quota exhausted, sleeping for 24 hours"
            );
            counter!("indexer_pauses_total").increment(1);
            summary.note(url, UrlState::Blocked);
            tokio::time::sleep(DAY_PAUSE).await;
            self.quota.reset_after_pause();
            tracing::info!(remaining_today = self.quota.remaining_today(), "quota reset after pause");
        }

        self.attempted.insert(url.to_string());
        tracing::info!(%url, notifier = self.notifier.name(), "publishing url");
        let response = match self.notifier.publish(url).await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(%url, error = %e, "publish failed");
                counter!("indexer_failed_total").increment(1);
                summary.note(url, UrlState::Failed);
                return;
            }
        };
        if !response.is_success() {
            tracing::warn!(%url, status = response.status, "publish rejected");
            counter!("indexer_failed_total").increment(1);
            summary.note(url, UrlState::Failed);
            return;
        }

        match self.ledger.record_sent(url, (self.clock)()) {
            Ok(()) => {
                counter!("indexer_sent_total").increment(1);
                summary.note(url, UrlState::Sent);
            }
            Err(e) => {
                tracing::error!(%url, error = %e, "url published but not recorded in sent log");
                counter!("indexer_unrecorded_total").increment(1);
                summary.note(url, UrlState::SentUnrecorded);
            }
        }

        // The remote side counted this call either way.
        self.quota.after_each_send();
        gauge!("indexer_budget_left").set(self.quota.budget_left() as f64);
        tokio::time::sleep(self.quota.per_minute_interval()).await;
    }
}

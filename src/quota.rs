// src/quota.rs
use std::time::Duration;

use chrono::NaiveDate;

use crate::error::{IndexerError, Result};
use crate::ledger::SentLog;

/// Added to the per-minute spacing so clock jitter never lands a send on the boundary.
pub const PACING_MARGIN: Duration = Duration::from_millis(100);
/// Fixed wait once today's budget is spent.
pub const DAY_PAUSE: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Proceed,
    PauseOneDay,
}

/// Daily budget and per-minute pacing for one run.
///
/// `remaining_today` is derived from the sent log once at startup and then
/// tracked in memory. After a day pause it is reset to the full limit rather
/// than recounted from the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaTracker {
    daily_limit: u32,
    per_minute_interval: Duration,
    remaining_today: u32,
    sent_this_run: u32,
}

impl QuotaTracker {
    pub fn init(
        daily_limit: u32,
        per_minute_limit: u32,
        sent: &SentLog,
        today: NaiveDate,
    ) -> Result<Self> {
        if daily_limit == 0 {
            return Err(IndexerError::Config("daily limit must be >= 1".into()));
        }
        if per_minute_limit == 0 {
            return Err(IndexerError::Config("per-minute limit must be >= 1".into()));
        }
        let used = u32::try_from(sent.count_on(today)).unwrap_or(u32::MAX);
        let remaining_today = daily_limit.saturating_sub(used);
        let per_minute_interval = Duration::from_secs(60) / per_minute_limit + PACING_MARGIN;

        tracing::info!(
            daily_limit,
            used_today = used,
            remaining_today,
            interval_ms = per_minute_interval.as_millis() as u64,
            "quota initialised"
        );
        Ok(Self {
            daily_limit,
            per_minute_interval,
            remaining_today,
            sent_this_run: 0,
        })
    }

    /// Pause once the next send would go past today's remaining budget. Does NOT mutate.
    pub fn before_each_send(&self) -> Decision {
        if self.sent_this_run >= self.remaining_today {
            Decision::PauseOneDay
        } else {
            Decision::Proceed
        }
    }

    pub fn after_each_send(&mut self) {
        self.sent_this_run = self.sent_this_run.saturating_add(1);
    }

    /// Call after sleeping [`DAY_PAUSE`]: a full fresh budget, run counter back to zero.
    pub fn reset_after_pause(&mut self) {
        self.sent_this_run = 0;
        self.remaining_today = self.daily_limit;
    }

    pub fn per_minute_interval(&self) -> Duration {
        self.per_minute_interval
    }

    pub fn remaining_today(&self) -> u32 {
        self.remaining_today
    }

    pub fn sent_this_run(&self) -> u32 {
        self.sent_this_run
    }

    /// Sends still allowed before the next pause.
    pub fn budget_left(&self) -> u32 {
        self.remaining_today.saturating_sub(self.sent_this_run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::Ledger;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, 5).unwrap()
    }

    fn log_with(rows: &str) -> (tempfile::TempDir, Ledger) {
        let dir = tempfile::tempdir().unwrap();
        let ip = dir.path().join("indexed.csv");
        let sp = dir.path().join("sent.csv");
        std::fs::write(&ip, "").unwrap();
        std::fs::write(&sp, rows).unwrap();
        let ledger = Ledger::load(&ip, &sp).unwrap();
        (dir, ledger)
    }

    #[test]
    fn interval_is_sixty_over_limit_plus_margin() {
        let q = QuotaTracker::init(200, 60, &SentLog::default(), today()).unwrap();
        assert_eq!(q.per_minute_interval(), Duration::from_millis(1_100));
        let q = QuotaTracker::init(200, 600, &SentLog::default(), today()).unwrap();
        assert_eq!(q.per_minute_interval(), Duration::from_millis(200));
    }

    #[test]
    fn zero_limits_are_config_errors() {
        assert!(matches!(
            QuotaTracker::init(200, 0, &SentLog::default(), today()),
            Err(IndexerError::Config(_))
        ));
        assert!(matches!(
            QuotaTracker::init(0, 60, &SentLog::default(), today()),
            Err(IndexerError::Config(_))
        ));
    }

    #[test]
    fn only_todays_entries_reduce_budget() {
        let (_d, ledger) = log_with(
            "https://a.test/1,2024-04-04T10:00:00+02:00\n\
             https://a.test/2,2024-04-05T10:00:00+02:00\n\
             https://a.test/3,2024-04-05T11:00:00+02:00\n",
        );
        let q = QuotaTracker::init(5, 60, ledger.sent_log(), today()).unwrap();
        assert_eq!(q.remaining_today(), 3);
    }

    #[test]
    fn overspent_day_saturates_at_zero_and_pauses() {
        let (_d, ledger) = log_with(
            "https://a.test/1,2024-04-05T10:00:00+02:00\n\
             https://a.test/2,2024-04-05T10:01:00+02:00\n",
        );
        let q = QuotaTracker::init(1, 60, ledger.sent_log(), today()).unwrap();
        assert_eq!(q.remaining_today(), 0);
        assert_eq!(q.before_each_send(), Decision::PauseOneDay);
    }

    #[test]
    fn pauses_after_budget_then_resets() {
        let mut q = QuotaTracker::init(2, 60, &SentLog::default(), today()).unwrap();
        assert_eq!(q.before_each_send(), Decision::Proceed);
        q.after_each_send();
        assert_eq!(q.before_each_send(), Decision::Proceed);
        q.after_each_send();
        assert_eq!(q.budget_left(), 0);
        assert_eq!(q.before_each_send(), Decision::PauseOneDay);

        q.reset_after_pause();
        assert_eq!(q.sent_this_run(), 0);
        assert_eq!(q.remaining_today(), 2);
        assert_eq!(q.before_each_send(), Decision::Proceed);
    }

    #[test]
    fn reset_ignores_partial_usage_from_log() {
        let (_d, ledger) = log_with("https://a.test/1,2024-04-05T10:00:00+02:00\n");
        let mut q = QuotaTracker::init(3, 60, ledger.sent_log(), today()).unwrap();
        assert_eq!(q.remaining_today(), 2);
        q.reset_after_pause();
        assert_eq!(q.remaining_today(), 3);
    }
}

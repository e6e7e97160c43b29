//! Per-run counters shared by the pipeline threads, and the summary built
//! from them once the run is done.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::NaiveDate;
use posrank_core::types::Exchange;

/// Lock-free counters updated by the fetcher, normalizer and writer threads.
#[derive(Debug, Default)]
pub struct RunStats {
    pub days_requested: AtomicU64,
    pub payloads_fetched: AtomicU64,
    pub payloads_normalized: AtomicU64,
    pub payloads_failed: AtomicU64,
    pub records_emitted: AtomicU64,
    pub records_written: AtomicU64,
    pub records_failed: AtomicU64,
}

impl RunStats {
    #[inline]
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }
}

/// Final report of one exchange pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub exchange: Exchange,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Day whose request exhausted its retries and stopped the fetcher.
    pub halted_on: Option<NaiveDate>,
    pub days_requested: u64,
    pub payloads_fetched: u64,
    pub payloads_normalized: u64,
    pub payloads_failed: u64,
    pub records_emitted: u64,
    pub records_written: u64,
    pub records_failed: u64,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn from_stats(
        exchange: Exchange,
        start_date: NaiveDate,
        end_date: NaiveDate,
        halted_on: Option<NaiveDate>,
        stats: &RunStats,
        elapsed: Duration,
    ) -> Self {
        Self {
            exchange,
            start_date,
            end_date,
            halted_on,
            days_requested: RunStats::get(&stats.days_requested),
            payloads_fetched: RunStats::get(&stats.payloads_fetched),
            payloads_normalized: RunStats::get(&stats.payloads_normalized),
            payloads_failed: RunStats::get(&stats.payloads_failed),
            records_emitted: RunStats::get(&stats.records_emitted),
            records_written: RunStats::get(&stats.records_written),
            records_failed: RunStats::get(&stats.records_failed),
            elapsed,
        }
    }

    /// `true` when every fetched payload and every emitted record made it
    /// to the store and the fetcher reached the end date.
    pub fn is_clean(&self) -> bool {
        self.halted_on.is_none() && self.payloads_failed == 0 && self.records_failed == 0
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}..={}: days={} payloads={}/{} (failed {}) records={}/{} (failed {}) elapsed={:.1}s",
            self.exchange,
            self.start_date,
            self.end_date,
            self.days_requested,
            self.payloads_normalized,
            self.payloads_fetched,
            self.payloads_failed,
            self.records_written,
            self.records_emitted,
            self.records_failed,
            self.elapsed.as_secs_f64()
        )?;
        if let Some(day) = self.halted_on {
            write!(f, " halted_on={day}")?;
        }
        Ok(())
    }
}

//! Fetcher loop: walks the calendar from the cursor to the end date and
//! enqueues every payload the adapter retrieves.
//!
//! The cursor advances exactly one calendar day per iteration whether or not
//! that day produced data. Saturdays and Sundays are never requested.

use chrono::NaiveDate;
use posrank_core::queue::WorkQueue;
use posrank_core::time_util::is_business_day;
use posrank_core::types::{Cursor, ExhaustionPolicy, RawPayload};
use tracing::{debug, error, info, warn};

use crate::stats::RunStats;
use crate::{DayFetch, ExchangeAdapter, FetchContext};

/// Run the fetcher on the calling thread until `end` (inclusive) or until a
/// request exhausts its retries under [`ExhaustionPolicy::AbortRun`].
///
/// Returns the day the fetcher halted on, if it halted early.
pub fn run_fetcher(
    adapter: &dyn ExchangeAdapter,
    ctx: FetchContext<'_>,
    mut cursor: Cursor,
    end: NaiveDate,
    out: &WorkQueue<RawPayload>,
    stats: &RunStats,
) -> Option<NaiveDate> {
    let label = format!("{}-fetch", adapter.exchange());
    let policy = adapter.on_retry_exhausted();
    info!("[{label}] fetching {} ..= {end} (on exhaustion: {policy:?})", cursor.next_date());

    while cursor.next_date() <= end {
        let date = cursor.next_date();
        if is_business_day(date) {
            RunStats::bump(&stats.days_requested);
            let DayFetch { payloads, exhausted } = adapter.fetch_day(ctx, date);
            debug!("[{label}] {date}: {} payload(s)", payloads.len());
            RunStats::add(&stats.payloads_fetched, payloads.len() as u64);
            for payload in payloads {
                out.put(payload);
            }

            if let Some(e) = exhausted {
                match policy {
                    ExhaustionPolicy::AbortRun => {
                        error!("[{label}] {date}: {e}; halting run");
                        return Some(date);
                    }
                    ExhaustionPolicy::SkipDay => {
                        warn!("[{label}] {date}: {e}; skipping day");
                    }
                }
            }
        }

        cursor.advance();
        if cursor.next_date() == date {
            break;
        }
    }

    info!("[{label}] reached {end}");
    None
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use chrono::Datelike;
    use posrank_core::error::RankError;
    use posrank_core::time_util::ymd;
    use posrank_core::types::{Exchange, PayloadBody, RankingRecord};

    use super::*;
    use crate::http_helper::{HttpResponse, RetryPolicy};
    use crate::testing::ScriptedTransport;

    /// Requests `day/{yyyymmdd}` once per day; a 200 response becomes a payload.
    struct DailyAdapter {
        policy: ExhaustionPolicy,
    }

    impl ExchangeAdapter for DailyAdapter {
        fn exchange(&self) -> Exchange {
            Exchange::Shfe
        }

        fn epoch(&self) -> NaiveDate {
            ymd(2002, 1, 7)
        }

        fn on_retry_exhausted(&self) -> ExhaustionPolicy {
            self.policy
        }

        fn fetch_day(&self, ctx: FetchContext<'_>, date: NaiveDate) -> DayFetch {
            let url = format!("day/{}", date.format("%Y%m%d"));
            match ctx.retry.run(&url, |_| ctx.http.get(&url, &[])) {
                Ok(resp) if resp.is_ok() => DayFetch {
                    payloads: vec![RawPayload::new(Exchange::Shfe, date, PayloadBody::Markup(resp.text()))],
                    exhausted: None,
                },
                Ok(_) => DayFetch::empty(),
                Err(e) => DayFetch { payloads: Vec::new(), exhausted: Some(e) },
            }
        }

        fn normalize(&self, _payload: &RawPayload) -> Result<Vec<RankingRecord>> {
            Ok(Vec::new())
        }
    }

    fn run(
        adapter: &DailyAdapter,
        http: &ScriptedTransport,
        start: NaiveDate,
        end: NaiveDate,
    ) -> (Option<NaiveDate>, Vec<NaiveDate>, RunStats) {
        let retry = RetryPolicy::new(3);
        let queue = WorkQueue::new();
        let stats = RunStats::default();
        let ctx = FetchContext { http, retry: &retry };
        let halted = run_fetcher(adapter, ctx, Cursor::new(Exchange::Shfe, start), end, &queue, &stats);
        let mut dates = Vec::new();
        while let Ok(p) = queue.recv_timeout(std::time::Duration::from_millis(5)) {
            dates.push(p.date);
        }
        (halted, dates, stats)
    }

    #[test]
    fn weekends_are_never_requested() {
        let http = ScriptedTransport::new(|_| Ok(HttpResponse::new(200, "x")));
        let adapter = DailyAdapter { policy: ExhaustionPolicy::AbortRun };
        // Thursday 2020-10-08 through Tuesday 2020-10-13.
        let (halted, dates, stats) = run(&adapter, &http, ymd(2020, 10, 8), ymd(2020, 10, 13));
        assert_eq!(halted, None);
        assert_eq!(dates, vec![ymd(2020, 10, 8), ymd(2020, 10, 9), ymd(2020, 10, 12), ymd(2020, 10, 13)]);
        for url in http.requests() {
            let d = NaiveDate::parse_from_str(url.trim_start_matches("day/"), "%Y%m%d").unwrap();
            assert!(d.weekday().number_from_monday() <= 5, "weekend request {url}");
        }
        assert_eq!(stats.days_requested.load(std::sync::atomic::Ordering::Relaxed), 4);
    }

    #[test]
    fn sub_threshold_days_are_skipped_silently() {
        let http = ScriptedTransport::new(|url| {
            let status = if url.ends_with("20201009") { 404 } else { 200 };
            Ok(HttpResponse::new(status, "x"))
        });
        let adapter = DailyAdapter { policy: ExhaustionPolicy::AbortRun };
        let (halted, dates, _) = run(&adapter, &http, ymd(2020, 10, 8), ymd(2020, 10, 12));
        assert_eq!(halted, None);
        assert_eq!(dates, vec![ymd(2020, 10, 8), ymd(2020, 10, 12)]);
    }

    #[test]
    fn exhaustion_halts_date_progression() {
        let http = ScriptedTransport::new(|url| {
            if url.ends_with("20201009") {
                Err(RankError::Transport("connection reset".into()))
            } else {
                Ok(HttpResponse::new(200, "x"))
            }
        });
        let adapter = DailyAdapter { policy: ExhaustionPolicy::AbortRun };
        let (halted, dates, _) = run(&adapter, &http, ymd(2020, 10, 8), ymd(2020, 10, 16));
        assert_eq!(halted, Some(ymd(2020, 10, 9)));
        assert_eq!(dates, vec![ymd(2020, 10, 8)]);
        // One request for the 8th, exactly three attempts for the 9th, nothing after.
        let requests = http.requests();
        assert_eq!(requests.len(), 4);
        assert_eq!(requests.iter().filter(|u| u.ends_with("20201009")).count(), 3);
    }

    #[test]
    fn skip_day_policy_continues() {
        let http = ScriptedTransport::new(|url| {
            if url.ends_with("20201009") {
                Err(RankError::Transport("timeout".into()))
            } else {
                Ok(HttpResponse::new(200, "x"))
            }
        });
        let adapter = DailyAdapter { policy: ExhaustionPolicy::SkipDay };
        let (halted, dates, _) = run(&adapter, &http, ymd(2020, 10, 8), ymd(2020, 10, 12));
        assert_eq!(halted, None);
        assert_eq!(dates, vec![ymd(2020, 10, 8), ymd(2020, 10, 12)]);
    }

    #[test]
    fn start_after_end_fetches_nothing() {
        let http = ScriptedTransport::new(|_| Ok(HttpResponse::new(200, "x")));
        let adapter = DailyAdapter { policy: ExhaustionPolicy::AbortRun };
        let (halted, dates, _) = run(&adapter, &http, ymd(2020, 10, 13), ymd(2020, 10, 12));
        assert_eq!(halted, None);
        assert!(dates.is_empty());
        assert!(http.requests().is_empty());
    }
}

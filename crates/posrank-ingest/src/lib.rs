//! # posrank-ingest
//!
//! Per-exchange ingestion of futures position rankings.
//!
//! ## Architecture
//!
//! Each exchange provides an [`ExchangeAdapter`]: how to fetch one trading
//! day's raw reports and how to turn one raw report into canonical
//! [`RankingRecord`]s. The generic [`pipeline::Pipeline`] engine handles the
//! cursor, the fetcher/normalizer/writer threads, queue wiring and the
//! staged shutdown automatically.
//!
//! ## Shared infrastructure
//!
//! - [`pipeline`]: coordinator and its drain-then-stop state machine
//! - [`cursor`]: resume-date resolution from stored collections
//! - [`fetcher`]: business-day iteration and exhaustion policy
//! - [`workers`]: normalizer and writer loops
//! - [`http_helper`]: transport trait, reqwest implementation, bounded retry
//! - [`text_util`]: numeric cell parsing shared by the adapters

pub mod cffex;
pub mod cursor;
pub mod czce;
pub mod dce;
pub mod fetcher;
pub mod http_helper;
pub mod pipeline;
pub mod registry;
pub mod shfe;
pub mod stats;
pub mod text_util;
pub mod workers;

#[cfg(test)]
pub(crate) mod testing;

use anyhow::Result;
use chrono::NaiveDate;
use posrank_core::error::RankError;
use posrank_core::types::{Exchange, ExhaustionPolicy, RankingRecord, RawPayload};

use crate::http_helper::{HttpTransport, RetryPolicy};

/// Everything an adapter needs to issue one day's requests.
#[derive(Clone, Copy)]
pub struct FetchContext<'a> {
    pub http: &'a dyn HttpTransport,
    pub retry: &'a RetryPolicy,
}

/// Outcome of fetching one trading day.
///
/// Payloads fetched before a request ran out of retries are still delivered;
/// `exhausted` tells the fetcher to apply the adapter's exhaustion policy.
#[derive(Debug, Default)]
pub struct DayFetch {
    pub payloads: Vec<RawPayload>,
    pub exhausted: Option<RankError>,
}

impl DayFetch {
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Trait implemented by all exchange adapters.
///
/// `Sync` is required because the fetcher and every normalizer thread share
/// one adapter by reference.
pub trait ExchangeAdapter: Send + Sync {
    fn exchange(&self) -> Exchange;

    /// First trading day ingested when the store holds nothing for this exchange.
    fn epoch(&self) -> NaiveDate;

    /// Number of concurrent normalizer threads.
    fn normalizer_workers(&self) -> usize {
        1
    }

    fn on_retry_exhausted(&self) -> ExhaustionPolicy {
        ExhaustionPolicy::AbortRun
    }

    /// Issue every request for `date`. Sub-threshold responses mean "no
    /// trading that day" and yield no payload.
    fn fetch_day(&self, ctx: FetchContext<'_>, date: NaiveDate) -> DayFetch;

    /// Expand one payload into zero or more records. Any error drops the
    /// whole payload.
    fn normalize(&self, payload: &RawPayload) -> Result<Vec<RankingRecord>>;
}

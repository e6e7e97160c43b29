//! Generic ingestion pipeline engine.
//!
//! Provides [`Pipeline`]: one run of fetch → normalize → write for a single
//! exchange, driven by its [`ExchangeAdapter`]. The engine owns every queue
//! and both stop tokens and shuts the stages down strictly in order:
//!
//! ```text
//! Running              fetcher thread ──► raw queue ──► N normalizer threads ──► 3 kind queues ──► 3 writer threads
//!   │ fetcher joined AND raw queue drained
//! DrainingNormalizer   normalizer_stop set, normalizers joined
//!   │ all three kind queues drained
//! DrainingWriters      writer_stop set, writers joined
//!   │
//! Done
//! ```
//!
//! No stage is told to stop while its input can still receive work. Each
//! writer is the only consumer of its kind queue, so a writer that dies stops
//! the wait on that queue alone; normalizers share the raw queue and are
//! waited on until the last one exits.

use std::sync::Arc;
use std::thread::{self, ScopedJoinHandle};
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;
use posrank_core::logging::banner;
use posrank_core::queue::{StopToken, WorkQueue};
use posrank_core::store::{RankCollection, RankStore};
use posrank_core::time_util;
use posrank_core::types::{Exchange, RankKind, RawPayload};
use tracing::{error, info};

use crate::http_helper::{HttpTransport, RetryPolicy};
use crate::stats::{RunStats, RunSummary};
use crate::workers::{self, KindQueues};
use crate::{ExchangeAdapter, FetchContext, cursor, fetcher};

/// Coordinator state, advanced only by [`Pipeline::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Running,
    DrainingNormalizer,
    DrainingWriters,
    Done,
}

/// Tunables that do not come from the adapter.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Queue poll interval for normalizer and writer loops.
    pub poll_interval: Duration,
    /// Last day to fetch (inclusive). `None` means today in exchange-local time.
    pub end_date: Option<NaiveDate>,
    pub retry: RetryPolicy,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self { poll_interval: Duration::from_secs(1), end_date: None, retry: RetryPolicy::default() }
    }
}

/// One exchange's ingestion run.
pub struct Pipeline {
    adapter: Box<dyn ExchangeAdapter>,
    store: Arc<dyn RankStore>,
    http: Box<dyn HttpTransport>,
    settings: PipelineSettings,
    state: PipelineState,
}

impl Pipeline {
    pub fn new(
        adapter: Box<dyn ExchangeAdapter>,
        store: Arc<dyn RankStore>,
        http: Box<dyn HttpTransport>,
        settings: PipelineSettings,
    ) -> Self {
        Self { adapter, store, http, settings, state: PipelineState::Idle }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Run to completion on the calling thread (which only coordinates; the
    /// stages get their own named threads).
    ///
    /// Fails before any thread starts if a collection cannot be opened or the
    /// cursor cannot be resolved. A panicking stage thread is reported as an
    /// error after the remaining stages have been drained and stopped.
    pub fn run(&mut self) -> Result<RunSummary> {
        let started = Instant::now();
        let Self { adapter, store, http, settings, state } = self;
        let adapter: &dyn ExchangeAdapter = &**adapter;
        let exchange = adapter.exchange();
        info!("[{exchange}] {}", banner("start"));

        // 1. Open one collection per writer; they double as the cursor source.
        let collections: Vec<Box<dyn RankCollection>> = RankKind::ALL
            .iter()
            .map(|kind| store.open(*kind).with_context(|| format!("[{exchange}] open {kind} collection")))
            .collect::<Result<_>>()?;

        // 2. Resolve where to resume.
        let cursor = cursor::resolve_cursor(&collections, exchange, adapter.epoch())
            .with_context(|| format!("[{exchange}] resolve cursor"))?;
        let start = cursor.next_date();
        let end = settings.end_date.unwrap_or_else(time_util::today);
        info!("[{exchange}] cursor at {start}, ingesting through {end}");

        let raw_q: WorkQueue<RawPayload> = WorkQueue::new();
        let kind_qs = KindQueues::new();
        let normalizer_stop = StopToken::new();
        let writer_stop = StopToken::new();
        let stats = RunStats::default();
        let poll = settings.poll_interval;
        let ctx = FetchContext { http: &**http, retry: &settings.retry };
        let mut failures: Vec<anyhow::Error> = Vec::new();
        let mut halted_on = None;

        transition(state, exchange, PipelineState::Running);

        thread::scope(|s| {
            // 3. Writers first, so nothing routed to a kind queue waits on a consumer.
            let mut writers = Vec::new();
            for coll in collections {
                let kind = coll.kind();
                let name = format!("{exchange}-write-{kind}");
                let (queue, stop, stats) = (kind_qs.for_kind(kind), &writer_stop, &stats);
                let label = name.clone();
                match thread::Builder::new()
                    .name(name.clone())
                    .spawn_scoped(s, move || workers::run_writer_loop(&label, coll, queue, stop, poll, stats))
                {
                    Ok(h) => writers.push((kind, name, h)),
                    Err(e) => failures.push(anyhow!("spawn {name}: {e}")),
                }
            }

            // 4. Normalizers.
            let mut normalizers = Vec::new();
            for i in 0..adapter.normalizer_workers().max(1) {
                let name = format!("{exchange}-norm-{i}");
                let (raw_q, kind_qs, stop, stats) = (&raw_q, &kind_qs, &normalizer_stop, &stats);
                let label = name.clone();
                match thread::Builder::new().name(name.clone()).spawn_scoped(s, move || {
                    workers::run_normalizer_loop(&label, adapter, raw_q, kind_qs, stop, poll, stats)
                }) {
                    Ok(h) => normalizers.push((name, h)),
                    Err(e) => failures.push(anyhow!("spawn {name}: {e}")),
                }
            }

            // 5. Fetcher, unless a stage failed to start.
            if failures.is_empty() {
                let name = format!("{exchange}-fetch");
                let (raw_q, stats) = (&raw_q, &stats);
                match thread::Builder::new()
                    .name(name.clone())
                    .spawn_scoped(s, move || fetcher::run_fetcher(adapter, ctx, cursor, end, raw_q, stats))
                {
                    Ok(h) => match h.join() {
                        Ok(day) => halted_on = day,
                        Err(_) => failures.push(anyhow!("{name} thread panicked")),
                    },
                    Err(e) => failures.push(anyhow!("spawn {name}: {e}")),
                }
            }

            // 6. Fetcher gone and raw queue drained: stop normalizers.
            wait_drained(
                exchange,
                "raw",
                |t| raw_q.join_timeout(t),
                || normalizers.iter().any(|(_, h)| !h.is_finished()),
                poll,
            );
            transition(state, exchange, PipelineState::DrainingNormalizer);
            normalizer_stop.stop();
            join_all(normalizers, &mut failures);

            // 7. Normalizers gone and every kind queue drained by its writer: stop writers.
            for (kind, _, h) in &writers {
                let queue = kind_qs.for_kind(*kind);
                wait_drained(exchange, kind.as_str(), |t| queue.join_timeout(t), || !h.is_finished(), poll);
            }
            transition(state, exchange, PipelineState::DrainingWriters);
            writer_stop.stop();
            join_all(writers.into_iter().map(|(_, name, h)| (name, h)), &mut failures);
        });

        transition(state, exchange, PipelineState::Done);

        let summary = RunSummary::from_stats(exchange, start, end, halted_on, &stats, started.elapsed());
        info!("[{exchange}] {summary}");
        info!("[{exchange}] {}", banner("end"));

        match failures.into_iter().next() {
            Some(e) => Err(e.context(format!("[{exchange}] pipeline failed"))),
            None => Ok(summary),
        }
    }
}

fn transition(state: &mut PipelineState, exchange: Exchange, next: PipelineState) {
    info!("[{exchange}] {state:?} -> {next:?}");
    *state = next;
}

/// Block until `drained` reports true, or until `consumers_alive` reports
/// false: a queue whose consumers have all exited can never drain.
fn wait_drained(
    exchange: Exchange,
    queue: &str,
    drained: impl Fn(Duration) -> bool,
    consumers_alive: impl Fn() -> bool,
    poll: Duration,
) {
    while !drained(poll) {
        if !consumers_alive() {
            error!("[{exchange}] {queue} queue consumers exited with work still queued");
            return;
        }
    }
}

fn join_all<'scope, T>(
    handles: impl IntoIterator<Item = (String, ScopedJoinHandle<'scope, T>)>,
    failures: &mut Vec<anyhow::Error>,
) {
    for (name, handle) in handles {
        if handle.join().is_err() {
            failures.push(anyhow!("{name} thread panicked"));
        }
    }
}

//! Normalizer and writer loops, each run on a dedicated thread.
//!
//! Both loops poll their input queue with a bounded wait and only consult
//! their stop token when the wait times out, so a stop signal never discards
//! an item that is already queued. Items are acknowledged when their
//! [`Delivery`](posrank_core::queue::Delivery) drops: for the normalizer that
//! happens after every record produced from the payload has been routed to a
//! kind queue, which is what lets the coordinator drain stage by stage.

use std::time::Duration;

use crossbeam_channel::RecvTimeoutError;
use posrank_core::queue::{StopToken, WorkQueue};
use posrank_core::store::RankCollection;
use posrank_core::types::{RankKind, RankingRecord, RawPayload};
use tracing::{debug, error, info};

use crate::ExchangeAdapter;
use crate::stats::RunStats;

// ---------------------------------------------------------------------------
// KindQueues
// ---------------------------------------------------------------------------

/// One record queue per ranking kind.
#[derive(Clone, Default)]
pub struct KindQueues {
    pub trade: WorkQueue<RankingRecord>,
    pub long: WorkQueue<RankingRecord>,
    pub short: WorkQueue<RankingRecord>,
}

impl KindQueues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_kind(&self, kind: RankKind) -> &WorkQueue<RankingRecord> {
        match kind {
            RankKind::Trade => &self.trade,
            RankKind::Long => &self.long,
            RankKind::Short => &self.short,
        }
    }

    pub fn route(&self, record: RankingRecord) {
        self.for_kind(record.kind()).put(record);
    }

    /// Unacknowledged records across all three queues.
    #[cfg(test)]
    fn pending(&self) -> usize {
        self.trade.pending() + self.long.pending() + self.short.pending()
    }
}

// ---------------------------------------------------------------------------
// Normalizer
// ---------------------------------------------------------------------------

/// Run a normalizer loop on the calling thread.
///
/// A payload that fails to normalize is dropped whole (no partial record set
/// is routed) and logged with its exchange and date.
pub fn run_normalizer_loop(
    label: &str,
    adapter: &dyn ExchangeAdapter,
    input: &WorkQueue<RawPayload>,
    output: &KindQueues,
    stop: &StopToken,
    poll: Duration,
    stats: &RunStats,
) {
    info!("[{label}] normalizer loop started");

    loop {
        match input.recv_timeout(poll) {
            Ok(payload) => match adapter.normalize(&payload) {
                Ok(records) => {
                    debug!("[{label}] {} -> {} record(s)", payload.describe(), records.len());
                    RunStats::bump(&stats.payloads_normalized);
                    RunStats::add(&stats.records_emitted, records.len() as u64);
                    for record in records {
                        output.route(record);
                    }
                }
                Err(e) => {
                    RunStats::bump(&stats.payloads_failed);
                    error!("[{label}] dropped payload {}: {e:#}", payload.describe());
                }
            },
            Err(RecvTimeoutError::Timeout) => {
                if stop.is_stopped() {
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    info!("[{label}] normalizer loop stopped");
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// Run a writer loop on the calling thread, upserting into `collection`,
/// which this loop owns for its whole lifetime.
///
/// A rejected write is logged with the full record and the loop moves on.
pub fn run_writer_loop(
    label: &str,
    mut collection: Box<dyn RankCollection>,
    input: &WorkQueue<RankingRecord>,
    stop: &StopToken,
    poll: Duration,
    stats: &RunStats,
) {
    info!("[{label}] writer loop started on {}", collection.name());

    loop {
        match input.recv_timeout(poll) {
            Ok(record) => match collection.upsert(&record) {
                Ok(()) => {
                    RunStats::bump(&stats.records_written);
                    debug!("[{label}] upserted {} {}", record.date(), record.symbol());
                }
                Err(e) => {
                    RunStats::bump(&stats.records_failed);
                    let doc = serde_json::to_string(&*record).unwrap_or_else(|_| format!("{:?}", *record));
                    error!("[{label}] upsert failed: {e}; record={doc}");
                }
            },
            Err(RecvTimeoutError::Timeout) => {
                if stop.is_stopped() {
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    info!("[{label}] writer loop stopped");
}

//! Resume-date resolution.
//!
//! The cursor is never persisted on its own; it is derived at pipeline start
//! from the latest stored date per kind collection. Taking the minimum across
//! the three kinds means a run interrupted after writing only some kinds for
//! a day re-fetches that day rather than leaving it half-written.

use chrono::NaiveDate;
use posrank_core::error::RankError;
use posrank_core::store::RankCollection;
use posrank_core::types::{Cursor, Exchange};
use tracing::debug;

/// First date still requiring ingestion for `exchange`.
///
/// A collection with no document for `exchange` contributes `epoch`, so the
/// result is never earlier than `epoch` and never later than the latest date
/// in any one collection. Any store error is returned as-is; there is no
/// partial result.
pub fn resolve(
    collections: &[Box<dyn RankCollection>],
    exchange: Exchange,
    epoch: NaiveDate,
) -> Result<NaiveDate, RankError> {
    let mut earliest: Option<NaiveDate> = None;
    for coll in collections {
        let latest = coll.latest_date(exchange)?;
        debug!("[{exchange}] {} latest date: {latest:?}", coll.name());
        let date = latest.unwrap_or(epoch);
        earliest = Some(earliest.map_or(date, |e| e.min(date)));
    }
    Ok(earliest.unwrap_or(epoch).max(epoch))
}

/// [`resolve`] wrapped as a [`Cursor`].
pub fn resolve_cursor(
    collections: &[Box<dyn RankCollection>],
    exchange: Exchange,
    epoch: NaiveDate,
) -> Result<Cursor, RankError> {
    resolve(collections, exchange, epoch).map(|date| Cursor::new(exchange, date))
}

//! Canonical ranking records: the only shape that crosses the
//! normalizer → writer boundary.
//!
//! A [`RankingRecord`] is built once per (date, symbol, kind) and never mutated
//! afterwards; its fields are private so the invariants checked in
//! [`RankingRecord::new`] hold for every value in the system:
//!
//! - entries are ordered by ascending rank with no duplicate ranks,
//! - placeholder participant names (`""`, `"-"`) are filtered out,
//! - `total_volume` / `total_volume_delta` are taken from the exchange's own
//!   aggregate and are **not** recomputed from the (possibly truncated) entries.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::contract::{commodity_of, contract_symbol};
use super::enums::{Exchange, RankKind};
use crate::error::RankError;

// ---------------------------------------------------------------------------
// RankingEntry
// ---------------------------------------------------------------------------

/// One participant's volume (or open interest) at one rank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingEntry {
    pub rank: u32,
    pub participant_name: String,
    pub volume: i64,
    pub volume_delta: i64,
}

impl RankingEntry {
    pub fn new(rank: u32, participant_name: impl Into<String>, volume: i64, volume_delta: i64) -> Self {
        Self { rank, participant_name: participant_name.into(), volume, volume_delta }
    }

    /// Exchanges pad short rankings with `-` or blank names.
    pub fn is_placeholder_name(name: &str) -> bool {
        let name = name.trim();
        name.is_empty() || name == "-"
    }
}

/// Sum of entry volumes and deltas, for reports that carry no aggregate row.
pub fn sum_entries(entries: &[RankingEntry]) -> (i64, i64) {
    entries.iter().fold((0, 0), |(v, d), e| (v + e.volume, d + e.volume_delta))
}

// ---------------------------------------------------------------------------
// ContractKey
// ---------------------------------------------------------------------------

/// Identifies the contract and trading day a table of rankings belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContractKey {
    pub exchange: Exchange,
    /// Contract id as published (`"IF2010"`, `"cu1905"`).
    pub contract: String,
    pub date: NaiveDate,
}

impl ContractKey {
    pub fn new(exchange: Exchange, contract: impl Into<String>, date: NaiveDate) -> Self {
        Self { exchange, contract: contract.into().trim().to_string(), date }
    }
}

// ---------------------------------------------------------------------------
// RankingRecord
// ---------------------------------------------------------------------------

/// The canonical persisted unit, keyed by (date, symbol) within its kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingRecord {
    exchange: Exchange,
    commodity: String,
    symbol: String,
    date: NaiveDate,
    kind: RankKind,
    total_volume: i64,
    total_volume_delta: i64,
    entries: Vec<RankingEntry>,
}

impl RankingRecord {
    /// Build a record, enforcing the entry invariants.
    ///
    /// Placeholder names are dropped silently; a missing commodity prefix, a
    /// zero rank or a duplicated rank is a shape error.
    pub fn new(
        key: &ContractKey,
        kind: RankKind,
        total_volume: i64,
        total_volume_delta: i64,
        entries: Vec<RankingEntry>,
    ) -> Result<Self, RankError> {
        let commodity = commodity_of(&key.contract)
            .ok_or_else(|| RankError::Parse(format!("contract {:?} has no commodity prefix", key.contract)))?;

        let mut entries: Vec<RankingEntry> = entries
            .into_iter()
            .filter(|e| !RankingEntry::is_placeholder_name(&e.participant_name))
            .map(|mut e| {
                e.participant_name = e.participant_name.trim().to_string();
                e
            })
            .collect();
        entries.sort_by_key(|e| e.rank);

        if entries.first().is_some_and(|e| e.rank == 0) {
            return Err(RankError::Parse(format!("{} {kind}: rank 0 in entry list", key.contract)));
        }
        if let Some(dup) = entries.windows(2).find(|w| w[0].rank == w[1].rank) {
            return Err(RankError::Parse(format!("{} {kind}: duplicate rank {}", key.contract, dup[0].rank)));
        }

        Ok(Self {
            exchange: key.exchange,
            commodity,
            symbol: contract_symbol(key.exchange, &key.contract),
            date: key.date,
            kind,
            total_volume,
            total_volume_delta,
            entries,
        })
    }

    pub fn exchange(&self) -> Exchange {
        self.exchange
    }

    pub fn commodity(&self) -> &str {
        &self.commodity
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn kind(&self) -> RankKind {
        self.kind
    }

    pub fn total_volume(&self) -> i64 {
        self.total_volume
    }

    pub fn total_volume_delta(&self) -> i64 {
        self.total_volume_delta
    }

    pub fn entries(&self) -> &[RankingEntry] {
        &self.entries
    }
}

// ---------------------------------------------------------------------------
// Cursor
// ---------------------------------------------------------------------------

/// Next calendar day an exchange still needs ingesting.
///
/// Only moves forward: [`Cursor::advance`] steps exactly one calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub exchange: Exchange,
    next_date: NaiveDate,
}

impl Cursor {
    pub fn new(exchange: Exchange, next_date: NaiveDate) -> Self {
        Self { exchange, next_date }
    }

    pub fn next_date(&self) -> NaiveDate {
        self.next_date
    }

    /// Step to the following calendar day. Saturates at `NaiveDate::MAX`.
    pub fn advance(&mut self) {
        if let Some(next) = self.next_date.succ_opt() {
            self.next_date = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> ContractKey {
        ContractKey::new(Exchange::Cffex, "IF2010", NaiveDate::from_ymd_opt(2020, 10, 9).unwrap())
    }

    #[test]
    fn entries_sorted_and_placeholders_dropped() {
        let entries = vec![
            RankingEntry::new(3, "国泰君安", 30, -1),
            RankingEntry::new(1, "中信期货", 100, 5),
            RankingEntry::new(2, "-", 0, 0),
            RankingEntry::new(4, "  ", 0, 0),
        ];
        let rec = RankingRecord::new(&key(), RankKind::Trade, 500, 9, entries).unwrap();
        let ranks: Vec<u32> = rec.entries().iter().map(|e| e.rank).collect();
        assert_eq!(ranks, vec![1, 3]);
        assert_eq!(rec.symbol(), "cffex_if2010");
        assert_eq!(rec.commodity(), "IF");
        // The aggregate is kept as given, not the entry sum.
        assert_eq!(rec.total_volume(), 500);
    }

    #[test]
    fn duplicate_rank_rejected() {
        let entries = vec![RankingEntry::new(1, "A", 1, 0), RankingEntry::new(1, "B", 2, 0)];
        assert!(RankingRecord::new(&key(), RankKind::Long, 3, 0, entries).is_err());
    }

    #[test]
    fn zero_rank_rejected() {
        let entries = vec![RankingEntry::new(0, "A", 1, 0)];
        assert!(RankingRecord::new(&key(), RankKind::Long, 1, 0, entries).is_err());
    }

    #[test]
    fn document_field_names() {
        let rec = RankingRecord::new(&key(), RankKind::Short, 7, -2, vec![RankingEntry::new(1, "A", 7, -2)]).unwrap();
        let v = serde_json::to_value(&rec).unwrap();
        assert_eq!(v["exchange"], "cffex");
        assert_eq!(v["kind"], "SHORT");
        assert_eq!(v["date"], "2020-10-09");
        assert_eq!(v["totalVolume"], 7);
        assert_eq!(v["totalVolumeDelta"], -2);
        assert_eq!(v["entries"][0]["participantName"], "A");
        assert_eq!(v["entries"][0]["volumeDelta"], -2);
    }

    #[test]
    fn entry_sums() {
        let entries = vec![RankingEntry::new(1, "A", 10, 1), RankingEntry::new(2, "B", 5, -3)];
        assert_eq!(sum_entries(&entries), (15, -2));
    }

    #[test]
    fn cursor_advances_one_day() {
        let mut c = Cursor::new(Exchange::Dce, NaiveDate::from_ymd_opt(2020, 2, 28).unwrap());
        c.advance();
        assert_eq!(c.next_date(), NaiveDate::from_ymd_opt(2020, 2, 29).unwrap());
        c.advance();
        assert_eq!(c.next_date(), NaiveDate::from_ymd_opt(2020, 3, 1).unwrap());
    }
}

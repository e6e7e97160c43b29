//! In-process store. Handles opened from the same [`MemoryStore`] share data.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::NaiveDate;
use parking_lot::Mutex;

use super::{RankCollection, RankStore, check_kind};
use crate::error::RankError;
use crate::types::{Exchange, RankKind, RankingRecord};

type Documents = BTreeMap<(NaiveDate, String), RankingRecord>;

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    collections: Arc<Mutex<HashMap<RankKind, Documents>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of one collection in (date, symbol) order.
    pub fn records(&self, kind: RankKind) -> Vec<RankingRecord> {
        self.collections.lock().get(&kind).map(|docs| docs.values().cloned().collect()).unwrap_or_default()
    }
}

impl RankStore for MemoryStore {
    fn open(&self, kind: RankKind) -> Result<Box<dyn RankCollection>, RankError> {
        self.collections.lock().entry(kind).or_default();
        Ok(Box::new(MemoryCollection { collections: Arc::clone(&self.collections), kind }))
    }
}

struct MemoryCollection {
    collections: Arc<Mutex<HashMap<RankKind, Documents>>>,
    kind: RankKind,
}

impl RankCollection for MemoryCollection {
    fn kind(&self) -> RankKind {
        self.kind
    }

    fn name(&self) -> &str {
        self.kind.as_str()
    }

    fn latest_date(&self, exchange: Exchange) -> Result<Option<NaiveDate>, RankError> {
        let guard = self.collections.lock();
        Ok(guard
            .get(&self.kind)
            .and_then(|docs| docs.values().rev().find(|r| r.exchange() == exchange).map(|r| r.date())))
    }

    fn upsert(&mut self, record: &RankingRecord) -> Result<(), RankError> {
        check_kind(self.kind, record)?;
        self.collections
            .lock()
            .entry(self.kind)
            .or_default()
            .insert((record.date(), record.symbol().to_string()), record.clone());
        Ok(())
    }

    fn find(&self, date: NaiveDate, symbol: &str) -> Result<Option<RankingRecord>, RankError> {
        let guard = self.collections.lock();
        Ok(guard.get(&self.kind).and_then(|docs| docs.get(&(date, symbol.to_string())).cloned()))
    }

    fn count(&self) -> Result<u64, RankError> {
        Ok(self.collections.lock().get(&self.kind).map_or(0, |docs| docs.len() as u64))
    }
}

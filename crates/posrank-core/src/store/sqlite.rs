//! SQLite-backed document store.
//!
//! Each collection is a table of JSON documents with the key columns pulled
//! out for indexing:
//!
//! ```sql
//! CREATE TABLE future_trade_rank (date TEXT, symbol TEXT, exchange TEXT, document TEXT);
//! CREATE UNIQUE INDEX future_trade_rank_date_symbol ON future_trade_rank (date ASC, symbol ASC);
//! ```
//!
//! Dates are stored as ISO `YYYY-MM-DD` text, so lexical `MAX(date)` is the
//! latest date. Every [`SqliteStore::open`] creates its own connection; WAL
//! mode plus a busy timeout lets several pipelines write the same file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::debug;

use super::{RankCollection, RankStore, check_kind};
use crate::config::CollectionNames;
use crate::error::RankError;
use crate::types::{Exchange, RankKind, RankingRecord};

const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

/// Store rooted at one SQLite database file.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    path: PathBuf,
    names: CollectionNames,
}

impl SqliteStore {
    /// Creates the parent directory if needed; the file itself is created on
    /// first [`open`](RankStore::open).
    pub fn new(path: impl Into<PathBuf>, names: CollectionNames) -> Result<Self, RankError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| RankError::Store(format!("create {}: {e}", parent.display())))?;
        }
        Ok(Self { path, names })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RankStore for SqliteStore {
    fn open(&self, kind: RankKind) -> Result<Box<dyn RankCollection>, RankError> {
        let name = self.names.name_for(kind).to_string();
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        // Table names cannot be bound as parameters; config validation
        // guarantees `name` is a plain identifier.
        conn.execute_batch(&format!(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             CREATE TABLE IF NOT EXISTS {name} (
                 date TEXT NOT NULL,
                 symbol TEXT NOT NULL,
                 exchange TEXT NOT NULL,
                 document TEXT NOT NULL
             );
             CREATE UNIQUE INDEX IF NOT EXISTS {name}_date_symbol ON {name} (date ASC, symbol ASC);
             CREATE INDEX IF NOT EXISTS {name}_exchange_date ON {name} (exchange, date DESC);"
        ))?;
        debug!("opened collection {name} at {}", self.path.display());
        Ok(Box::new(SqliteCollection { conn, kind, name }))
    }
}

struct SqliteCollection {
    conn: Connection,
    kind: RankKind,
    name: String,
}

impl RankCollection for SqliteCollection {
    fn kind(&self) -> RankKind {
        self.kind
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn latest_date(&self, exchange: Exchange) -> Result<Option<NaiveDate>, RankError> {
        let latest: Option<String> = self.conn.query_row(
            &format!("SELECT MAX(date) FROM {} WHERE exchange = ?1", self.name),
            params![exchange.as_str()],
            |row| row.get(0),
        )?;
        latest
            .map(|s| {
                NaiveDate::parse_from_str(&s, "%Y-%m-%d")
                    .map_err(|e| RankError::Store(format!("{}: bad stored date {s:?}: {e}", self.name)))
            })
            .transpose()
    }

    fn upsert(&mut self, record: &RankingRecord) -> Result<(), RankError> {
        check_kind(self.kind, record)?;
        let document = serde_json::to_string(record).map_err(|e| RankError::Store(e.to_string()))?;
        self.conn.execute(
            &format!(
                "INSERT INTO {} (date, symbol, exchange, document) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(date, symbol) DO UPDATE SET exchange = excluded.exchange, document = excluded.document",
                self.name
            ),
            params![record.date().format("%Y-%m-%d").to_string(), record.symbol(), record.exchange().as_str(), document],
        )?;
        Ok(())
    }

    fn find(&self, date: NaiveDate, symbol: &str) -> Result<Option<RankingRecord>, RankError> {
        let document: Option<String> = self
            .conn
            .query_row(
                &format!("SELECT document FROM {} WHERE date = ?1 AND symbol = ?2", self.name),
                params![date.format("%Y-%m-%d").to_string(), symbol],
                |row| row.get(0),
            )
            .optional()?;
        document
            .map(|d| serde_json::from_str(&d).map_err(|e| RankError::Store(format!("{}: {e}", self.name))))
            .transpose()
    }

    fn count(&self) -> Result<u64, RankError> {
        let n: i64 = self.conn.query_row(&format!("SELECT COUNT(*) FROM {}", self.name), [], |row| row.get(0))?;
        Ok(n.max(0) as u64)
    }
}

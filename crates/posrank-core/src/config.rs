//! Configuration parsing for the position-ranking ingester.
//!
//! Everything is read from a single JSON file. Every field is optional; the
//! `effective_*` accessors supply defaults, and exchange-specific defaults
//! (endpoint, epoch, worker count, size threshold) live with each adapter.
//!
//! # Example config
//!
//! ```json
//! {
//!   "module": { "module_name": "posrank", "log_path": "./logs", "log_level": "info" },
//!   "store": {
//!     "path": "./data/future_rank.db",
//!     "collections": { "trade": "future_trade_rank", "long": "future_long_rank", "short": "future_short_rank" }
//!   },
//!   "temp": { "download_dir": "./temp/download", "extract_dir": "./temp/extract" },
//!   "http": { "timeout_sec": 30, "retry": 3 },
//!   "exchanges": [
//!     { "exchange": "cffex", "commodities": ["IF", "IH", "IC"] },
//!     { "exchange": "dce", "normalizer_workers": 3, "on_retry_exhausted": "abort_run" },
//!     { "exchange": "shfe", "enabled": false }
//!   ]
//! }
//! ```

use ahash::AHashSet;
use std::path::PathBuf;

use chrono::NaiveDate;
use serde::Deserialize;

use crate::error::RankError;
use crate::types::{Exchange, ExhaustionPolicy, RankKind};

/// Top-level application config, deserialized from a JSON file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Module metadata (name, log path, level).
    pub module: Option<ModuleMeta>,

    /// Document store location and collection names.
    #[serde(default)]
    pub store: StoreConfig,

    /// Scratch directories for archive downloads and extraction.
    pub temp: Option<TempConfig>,

    /// Transport timeout and retry budget.
    pub http: Option<HttpConfig>,

    /// Per-exchange overrides. Empty means "all four exchanges, defaults".
    #[serde(default)]
    pub exchanges: Vec<ExchangeConfig>,
}

/// Module metadata block.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModuleMeta {
    pub module_name: Option<String>,
    pub log_path: Option<String>,
    pub log_level: Option<String>,
}

/// Document store configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreConfig {
    /// SQLite database file (default: `./data/future_rank.db`).
    pub path: Option<String>,
    pub collections: Option<CollectionNames>,
}

/// One collection per ranking kind, shared by all exchanges.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CollectionNames {
    pub trade: String,
    pub long: String,
    pub short: String,
}

impl Default for CollectionNames {
    fn default() -> Self {
        Self {
            trade: "future_trade_rank".into(),
            long: "future_long_rank".into(),
            short: "future_short_rank".into(),
        }
    }
}

impl CollectionNames {
    pub fn name_for(&self, kind: RankKind) -> &str {
        match kind {
            RankKind::Trade => &self.trade,
            RankKind::Long => &self.long,
            RankKind::Short => &self.short,
        }
    }
}

/// Scratch directories.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TempConfig {
    pub download_dir: Option<String>,
    pub extract_dir: Option<String>,
}

/// Transport configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HttpConfig {
    /// Per-request timeout in seconds (default: 30).
    pub timeout_sec: Option<u64>,
    /// Attempts per request before giving up (default: 3).
    pub retry: Option<u32>,
    pub user_agent: Option<String>,
}

/// Per-exchange overrides.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExchangeConfig {
    /// Exchange identifier: `"cffex"`, `"czce"`, `"dce"`, `"shfe"`.
    pub exchange: String,

    /// Whether to run this exchange (default: true).
    pub enabled: Option<bool>,

    /// Endpoint override (format placeholders are exchange-specific).
    pub url: Option<String>,

    /// First trading day to ingest when the store holds nothing.
    pub epoch: Option<NaiveDate>,

    /// Number of concurrent normalizer threads.
    pub normalizer_workers: Option<usize>,

    /// Commodity codes requested per day (CFFEX only).
    pub commodities: Option<Vec<String>>,

    /// A response body must be longer than this to count as a report
    /// (CFFEX, CZCE and DCE; SHFE decides by status and JSON shape).
    pub min_body_len: Option<usize>,

    /// Behavior once a request exhausts its retries.
    pub on_retry_exhausted: Option<ExhaustionPolicy>,
}

impl ExchangeConfig {
    /// Default-valued config for `exchange`.
    pub fn for_exchange(exchange: Exchange) -> Self {
        Self { exchange: exchange.to_string(), ..Default::default() }
    }

    pub fn exchange_id(&self) -> Result<Exchange, RankError> {
        self.exchange.parse()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }
}

impl AppConfig {
    pub fn module_name(&self) -> String {
        self.module.as_ref().and_then(|m| m.module_name.clone()).unwrap_or_else(|| "posrank".into())
    }

    pub fn log_path(&self) -> Option<String> {
        self.module.as_ref().and_then(|m| m.log_path.clone())
    }

    pub fn log_level(&self) -> Option<String> {
        self.module.as_ref().and_then(|m| m.log_level.clone())
    }

    pub fn store_path(&self) -> PathBuf {
        PathBuf::from(self.store.path.clone().unwrap_or_else(|| "./data/future_rank.db".into()))
    }

    pub fn collection_names(&self) -> CollectionNames {
        self.store.collections.clone().unwrap_or_default()
    }

    pub fn download_dir(&self) -> PathBuf {
        PathBuf::from(
            self.temp.as_ref().and_then(|t| t.download_dir.clone()).unwrap_or_else(|| "./temp/download".into()),
        )
    }

    pub fn extract_dir(&self) -> PathBuf {
        PathBuf::from(
            self.temp.as_ref().and_then(|t| t.extract_dir.clone()).unwrap_or_else(|| "./temp/extract".into()),
        )
    }

    pub fn http_timeout_sec(&self) -> u64 {
        self.http.as_ref().and_then(|h| h.timeout_sec).unwrap_or(30)
    }

    pub fn retry_attempts(&self) -> u32 {
        self.http.as_ref().and_then(|h| h.retry).unwrap_or(3)
    }

    pub fn user_agent(&self) -> Option<String> {
        self.http.as_ref().and_then(|h| h.user_agent.clone())
    }

    /// Enabled exchange configs; all four with defaults when none are listed.
    pub fn effective_exchanges(&self) -> Vec<ExchangeConfig> {
        if self.exchanges.is_empty() {
            return Exchange::ALL.iter().map(|e| ExchangeConfig::for_exchange(*e)).collect();
        }
        self.exchanges.iter().filter(|c| c.is_enabled()).cloned().collect()
    }

    /// Reject configs that would fail later in a less obvious place.
    pub fn validate(&self) -> Result<(), RankError> {
        let names = self.collection_names();
        for kind in RankKind::ALL {
            let name = names.name_for(kind);
            if !is_identifier(name) {
                return Err(RankError::Config(format!("collection name {name:?} is not a valid identifier")));
            }
        }
        if names.trade == names.long || names.trade == names.short || names.long == names.short {
            return Err(RankError::Config("collection names must be distinct".into()));
        }

        if self.retry_attempts() == 0 {
            return Err(RankError::Config("http.retry must be at least 1".into()));
        }

        let mut seen = AHashSet::new();
        for ex in &self.exchanges {
            let id = ex.exchange_id()?;
            if !seen.insert(id) {
                return Err(RankError::Config(format!("exchange {id} configured twice")));
            }
            if ex.normalizer_workers == Some(0) {
                return Err(RankError::Config(format!("{id}: normalizer_workers must be at least 1")));
            }
            if id == Exchange::Shfe && ex.min_body_len.is_some() {
                return Err(RankError::Config(format!("{id}: min_body_len is not supported")));
            }
            if id != Exchange::Cffex && ex.commodities.is_some() {
                return Err(RankError::Config(format!("{id}: commodities is only supported for cffex")));
            }
        }
        Ok(())
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Load, parse and validate a JSON config file.
pub fn load_config(path: &std::path::Path) -> anyhow::Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = serde_json::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_all_exchanges() {
        let cfg = AppConfig::default();
        let ids: Vec<Exchange> = cfg.effective_exchanges().iter().map(|c| c.exchange_id().unwrap()).collect();
        assert_eq!(ids, Exchange::ALL.to_vec());
        assert_eq!(cfg.retry_attempts(), 3);
        assert_eq!(cfg.collection_names().name_for(RankKind::Long), "future_long_rank");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn parse_full_config() {
        let json = r#"{
            "module": {"module_name": "rank", "log_path": "/tmp/log"},
            "store": {"path": "/tmp/r.db"},
            "http": {"timeout_sec": 5, "retry": 4},
            "exchanges": [
                {"exchange": "cffex", "commodities": ["IF", "IM"], "epoch": "2015-04-16"},
                {"exchange": "shfe", "enabled": false},
                {"exchange": "dce", "on_retry_exhausted": "skip_day"}
            ]
        }"#;
        let cfg: AppConfig = serde_json::from_str(json).unwrap();
        cfg.validate().unwrap();
        assert_eq!(cfg.module_name(), "rank");
        assert_eq!(cfg.http_timeout_sec(), 5);
        assert_eq!(cfg.retry_attempts(), 4);
        let enabled = cfg.effective_exchanges();
        assert_eq!(enabled.len(), 2);
        assert_eq!(enabled[0].epoch, NaiveDate::from_ymd_opt(2015, 4, 16));
        assert_eq!(enabled[1].on_retry_exhausted, Some(ExhaustionPolicy::SkipDay));
    }

    #[test]
    fn rejects_bad_collection_name() {
        let json = r#"{"store": {"collections": {"trade": "t; DROP", "long": "l", "short": "s"}}}"#;
        let cfg: AppConfig = serde_json::from_str(json).unwrap();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_duplicate_and_unknown_exchange() {
        let dup: AppConfig = serde_json::from_str(r#"{"exchanges": [{"exchange": "dce"}, {"exchange": "DCE"}]}"#).unwrap();
        assert!(dup.validate().is_err());
        let unknown: AppConfig = serde_json::from_str(r#"{"exchanges": [{"exchange": "ine"}]}"#).unwrap();
        assert!(unknown.validate().is_err());
    }

    #[test]
    fn rejects_settings_the_exchange_ignores() {
        let shfe: AppConfig =
            serde_json::from_str(r#"{"exchanges": [{"exchange": "shfe", "min_body_len": 100}]}"#).unwrap();
        assert!(shfe.validate().is_err());
        let dce: AppConfig =
            serde_json::from_str(r#"{"exchanges": [{"exchange": "dce", "commodities": ["a"]}]}"#).unwrap();
        assert!(dce.validate().is_err());
        let czce: AppConfig =
            serde_json::from_str(r#"{"exchanges": [{"exchange": "czce", "min_body_len": 100}]}"#).unwrap();
        assert!(czce.validate().is_ok());
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"http": {"retry": 0}}"#).unwrap();
        assert!(load_config(&path).is_err());
        std::fs::write(&path, r#"{"http": {"retry": 2}}"#).unwrap();
        assert_eq!(load_config(&path).unwrap().retry_attempts(), 2);
    }
}

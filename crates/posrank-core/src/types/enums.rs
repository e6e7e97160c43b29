//! Enumerations used throughout the position-ranking system.
//!
//! The serialized forms are part of the stored document schema: exchanges are
//! persisted lowercase (`"cffex"`) and ranking kinds uppercase (`"TRADE"`), so
//! renaming a variant is a data migration, not a refactor.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RankError;

// ---------------------------------------------------------------------------
// Exchange identifiers
// ---------------------------------------------------------------------------

/// Supported futures exchanges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Exchange {
    /// China Financial Futures Exchange: XML reports.
    Cffex,
    /// Zhengzhou Commodity Exchange: HTML reports.
    Czce,
    /// Dalian Commodity Exchange: zipped text reports.
    Dce,
    /// Shanghai Futures Exchange: JSON cursor reports.
    Shfe,
}

impl Exchange {
    pub const ALL: [Exchange; 4] = [Self::Cffex, Self::Czce, Self::Dce, Self::Shfe];

    /// Lowercase identifier used in symbols, logs and stored documents.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cffex => "cffex",
            Self::Czce => "czce",
            Self::Dce => "dce",
            Self::Shfe => "shfe",
        }
    }
}

impl std::fmt::Display for Exchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Exchange {
    type Err = RankError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cffex" => Ok(Self::Cffex),
            "czce" => Ok(Self::Czce),
            "dce" => Ok(Self::Dce),
            "shfe" => Ok(Self::Shfe),
            other => Err(RankError::Config(format!("unknown exchange: {other}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Ranking kinds
// ---------------------------------------------------------------------------

/// Which participant ranking a record carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RankKind {
    /// Traded-volume ranking.
    Trade,
    /// Long open-interest ranking.
    Long,
    /// Short open-interest ranking.
    Short,
}

impl RankKind {
    pub const ALL: [RankKind; 3] = [Self::Trade, Self::Long, Self::Short];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trade => "TRADE",
            Self::Long => "LONG",
            Self::Short => "SHORT",
        }
    }

    /// Map a 1-based column-family index (1 = trade, 2 = long, 3 = short).
    pub fn from_family_index(index: usize) -> Option<Self> {
        match index {
            1 => Some(Self::Trade),
            2 => Some(Self::Long),
            3 => Some(Self::Short),
            _ => None,
        }
    }
}

impl std::fmt::Display for RankKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Fetch policy
// ---------------------------------------------------------------------------

/// What the fetcher does once a request has spent its retry budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExhaustionPolicy {
    /// Stop advancing the cursor and end the run.
    #[default]
    AbortRun,
    /// Drop the failing day and continue with the next one.
    SkipDay,
}

//! Raw payloads handed from the fetcher to the normalizer.
//!
//! The body is opaque to every stage except the owning exchange adapter; the
//! envelope always carries the source exchange and the trading day the request
//! was made for, so errors can be reported with identifying context even when
//! the body itself cannot be parsed.

use std::path::PathBuf;

use chrono::NaiveDate;

use super::enums::Exchange;

/// One fetched report, tagged with where and when it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPayload {
    pub exchange: Exchange,
    /// Trading day the request was issued for.
    pub date: NaiveDate,
    pub body: PayloadBody,
}

/// Exchange-specific report body.
#[derive(Debug, Clone, PartialEq)]
pub enum PayloadBody {
    /// XML document (CFFEX).
    Xml(String),
    /// HTML markup (CZCE).
    Markup(String),
    /// Path of a downloaded archive of delimited text files (DCE).
    ///
    /// The normalizer owns the file and removes it once consumed.
    Archive(PathBuf),
    /// JSON cursor object (SHFE).
    Cursor(serde_json::Value),
}

impl RawPayload {
    pub fn new(exchange: Exchange, date: NaiveDate, body: PayloadBody) -> Self {
        Self { exchange, date, body }
    }

    /// Short label for logs: `"cffex 2020-10-09 xml"`.
    pub fn describe(&self) -> String {
        let kind = match &self.body {
            PayloadBody::Xml(_) => "xml".to_string(),
            PayloadBody::Markup(_) => "markup".to_string(),
            PayloadBody::Archive(path) => format!("archive {}", path.display()),
            PayloadBody::Cursor(_) => "cursor".to_string(),
        };
        format!("{} {} {kind}", self.exchange, self.date)
    }
}

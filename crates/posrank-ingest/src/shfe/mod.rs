//! Shanghai Futures Exchange: one JSON document per day.
//!
//! A 404 means the exchange published nothing for the day. Any other
//! response must decode as JSON; a body that does not is treated like a
//! transport failure and uses up one retry attempt.

pub mod json_parser;

use anyhow::{Result, bail};
use chrono::NaiveDate;
use posrank_core::config::ExchangeConfig;
use posrank_core::error::RankError;
use posrank_core::time_util::ymd;
use posrank_core::types::{Exchange, ExhaustionPolicy, PayloadBody, RankingRecord, RawPayload};
use serde_json::Value;
use tracing::debug;

use crate::{DayFetch, ExchangeAdapter, FetchContext};

const SHFE_URL: &str = "http://www.shfe.com.cn/data/dailydata/kx/pm{date}.dat";
const BROWSER_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/73.0.3683.103 Safari/537.36";
const REFERER: &str = "http://www.shfe.com.cn/statements/dataview.html?paramid=delaymarket_all";

pub struct ShfeAdapter {
    url_template: String,
    epoch: NaiveDate,
    workers: usize,
    policy: ExhaustionPolicy,
}

impl ShfeAdapter {
    pub fn from_config(cfg: &ExchangeConfig) -> Self {
        Self {
            url_template: cfg.url.clone().unwrap_or_else(|| SHFE_URL.into()),
            epoch: cfg.epoch.unwrap_or_else(|| ymd(2002, 1, 7)),
            workers: cfg.normalizer_workers.unwrap_or(2),
            policy: cfg.on_retry_exhausted.unwrap_or_default(),
        }
    }

    pub fn report_url(&self, date: NaiveDate) -> String {
        self.url_template.replace("{date}", &date.format("%Y%m%d").to_string())
    }

    /// One attempt: `None` for a 404, the decoded document otherwise.
    fn fetch_document(ctx: FetchContext<'_>, url: &str) -> Result<Option<Value>, RankError> {
        let resp = ctx.http.get(url, &[("User-Agent", BROWSER_UA), ("Referer", REFERER)])?;
        if resp.status == 404 {
            return Ok(None);
        }
        serde_json::from_str(&resp.text())
            .map(Some)
            .map_err(|e| RankError::Parse(format!("GET {url} (status {}): {e}", resp.status)))
    }
}

impl ExchangeAdapter for ShfeAdapter {
    fn exchange(&self) -> Exchange {
        Exchange::Shfe
    }

    fn epoch(&self) -> NaiveDate {
        self.epoch
    }

    fn normalizer_workers(&self) -> usize {
        self.workers
    }

    fn on_retry_exhausted(&self) -> ExhaustionPolicy {
        self.policy
    }

    fn fetch_day(&self, ctx: FetchContext<'_>, date: NaiveDate) -> DayFetch {
        let url = self.report_url(date);
        let label = format!("shfe {date}");
        let mut doc = match ctx.retry.run(&label, |_| Self::fetch_document(ctx, &url)) {
            Ok(Some(doc)) => doc,
            Ok(None) => {
                debug!("[{label}] no data (404)");
                return DayFetch::empty();
            }
            Err(e) => return DayFetch { payloads: Vec::new(), exhausted: Some(e) },
        };

        if let Some(obj) = doc.as_object_mut() {
            obj.entry("report_date").or_insert_with(|| Value::String(date.format("%Y%m%d").to_string()));
        }
        if !json_parser::has_rows(&doc) {
            debug!("[{label}] empty o_cursor");
            return DayFetch::empty();
        }
        DayFetch { payloads: vec![RawPayload::new(Exchange::Shfe, date, PayloadBody::Cursor(doc))], exhausted: None }
    }

    fn normalize(&self, payload: &RawPayload) -> Result<Vec<RankingRecord>> {
        let PayloadBody::Cursor(doc) = &payload.body else {
            bail!("shfe: unexpected payload {}", payload.describe());
        };
        json_parser::parse_document(doc, payload.date)
    }
}

//! China Financial Futures Exchange: one XML report per commodity per day.
//!
//! `GET {base}/{YYYYMM}/{DD}/{commodity}.xml` for each configured commodity
//! (IF, IH, IC by default). A response is a real report only when it is a 200
//! with a body larger than the placeholder page the exchange serves on
//! non-trading days.

pub mod xml_parser;

use anyhow::{Result, bail};
use chrono::NaiveDate;
use posrank_core::config::ExchangeConfig;
use posrank_core::time_util::ymd;
use posrank_core::types::{Exchange, ExhaustionPolicy, PayloadBody, RankingRecord, RawPayload};
use tracing::debug;

use crate::{DayFetch, ExchangeAdapter, FetchContext};

const CFFEX_URL: &str = "http://www.cffex.com.cn/sj/ccpm/{year_month}/{day}/{commodity}.xml";
const DEFAULT_COMMODITIES: [&str; 3] = ["IF", "IH", "IC"];
const MIN_BODY_LEN: usize = 3000;

pub struct CffexAdapter {
    url_template: String,
    epoch: NaiveDate,
    commodities: Vec<String>,
    min_body_len: usize,
    workers: usize,
    policy: ExhaustionPolicy,
}

impl CffexAdapter {
    pub fn from_config(cfg: &ExchangeConfig) -> Self {
        Self {
            url_template: cfg.url.clone().unwrap_or_else(|| CFFEX_URL.into()),
            epoch: cfg.epoch.unwrap_or_else(|| ymd(2010, 4, 16)),
            commodities: cfg
                .commodities
                .clone()
                .unwrap_or_else(|| DEFAULT_COMMODITIES.iter().map(|c| c.to_string()).collect()),
            min_body_len: cfg.min_body_len.unwrap_or(MIN_BODY_LEN),
            workers: cfg.normalizer_workers.unwrap_or(1),
            policy: cfg.on_retry_exhausted.unwrap_or_default(),
        }
    }

    pub fn report_url(&self, date: NaiveDate, commodity: &str) -> String {
        self.url_template
            .replace("{year_month}", &date.format("%Y%m").to_string())
            .replace("{day}", &date.format("%d").to_string())
            .replace("{commodity}", commodity)
    }
}

impl ExchangeAdapter for CffexAdapter {
    fn exchange(&self) -> Exchange {
        Exchange::Cffex
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
        let mut fetched = DayFetch::empty();
        for commodity in &self.commodities {
            let url = self.report_url(date, commodity);
            let label = format!("cffex {date} {commodity}");
            match ctx.retry.run(&label, |_| ctx.http.get(&url, &[])) {
                Ok(resp) if resp.is_ok() && resp.body.len() > self.min_body_len => {
                    fetched.payloads.push(RawPayload::new(Exchange::Cffex, date, PayloadBody::Xml(resp.text())));
                }
                Ok(resp) => debug!("[{label}] no data (status {}, {} bytes)", resp.status, resp.body.len()),
                Err(e) => {
                    fetched.exhausted = Some(e);
                    break;
                }
            }
        }
        fetched
    }

    fn normalize(&self, payload: &RawPayload) -> Result<Vec<RankingRecord>> {
        let PayloadBody::Xml(xml) = &payload.body else {
            bail!("cffex: unexpected payload {}", payload.describe());
        };
        xml_parser::parse_report(xml, payload.date)
    }
}

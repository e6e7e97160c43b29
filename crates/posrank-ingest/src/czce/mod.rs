//! Zhengzhou Commodity Exchange: one form POST per day returning an HTML page.
//!
//! The page layout changed twice; [`html_parser`] picks the parser from the
//! request date and every layout funnels into the fixed-width
//! [`reshape`] step.

pub mod html_parser;
pub mod reshape;

use anyhow::{Result, bail};
use chrono::NaiveDate;
use posrank_core::config::ExchangeConfig;
use posrank_core::time_util::ymd;
use posrank_core::types::{Exchange, ExhaustionPolicy, PayloadBody, RankingRecord, RawPayload};
use tracing::debug;

use crate::{DayFetch, ExchangeAdapter, FetchContext};

const CZCE_URL: &str = "http://app.czce.com.cn/cms/cmsface/czce/newcms/calendarnewAll.jsp";
const CURPATH: &str = "/cn/jysj/ccpm/H770304index_1.htm";

pub struct CzceAdapter {
    url: String,
    epoch: NaiveDate,
    min_body_len: usize,
    workers: usize,
    policy: ExhaustionPolicy,
}

impl CzceAdapter {
    pub fn from_config(cfg: &ExchangeConfig) -> Self {
        Self {
            url: cfg.url.clone().unwrap_or_else(|| CZCE_URL.into()),
            epoch: cfg.epoch.unwrap_or_else(|| ymd(2005, 5, 9)),
            min_body_len: cfg.min_body_len.unwrap_or(0),
            workers: cfg.normalizer_workers.unwrap_or(2),
            policy: cfg.on_retry_exhausted.unwrap_or_default(),
        }
    }

    /// Query form for one publication date.
    pub fn form(date: NaiveDate) -> Vec<(&'static str, String)> {
        vec![
            ("channelCode", String::new()),
            ("pubDate", date.format("%Y-%m-%d").to_string()),
            ("curpath", CURPATH.into()),
            ("curpath1", String::new()),
            ("radio", "future".into()),
            ("sub", "查询".into()),
        ]
    }
}

impl ExchangeAdapter for CzceAdapter {
    fn exchange(&self) -> Exchange {
        Exchange::Czce
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
        let form = Self::form(date);
        let label = format!("czce {date}");
        match ctx.retry.run(&label, |_| ctx.http.post_form(&self.url, &form)) {
            Ok(resp) if resp.is_ok() && resp.body.len() > self.min_body_len => DayFetch {
                payloads: vec![RawPayload::new(Exchange::Czce, date, PayloadBody::Markup(resp.text()))],
                exhausted: None,
            },
            Ok(resp) => {
                debug!("[{label}] no data (status {}, {} bytes)", resp.status, resp.body.len());
                DayFetch::empty()
            }
            Err(e) => DayFetch { payloads: Vec::new(), exhausted: Some(e) },
        }
    }

    fn normalize(&self, payload: &RawPayload) -> Result<Vec<RankingRecord>> {
        let PayloadBody::Markup(html) = &payload.body else {
            bail!("czce: unexpected payload {}", payload.describe());
        };
        html_parser::parse_page(html, payload.date)
    }
}

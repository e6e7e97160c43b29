//! Dalian Commodity Exchange: one zip of per-contract text files per day.
//!
//! The batch export is requested with a form POST whose month is zero-based.
//! The fetcher writes the archive to disk and hands its path downstream; the
//! normalizer owns the file from then on.

pub mod archive;
pub mod text_parser;

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use chrono::{Datelike, NaiveDate};
use posrank_core::config::ExchangeConfig;
use posrank_core::time_util::ymd;
use posrank_core::types::{Exchange, ExhaustionPolicy, PayloadBody, RankingRecord, RawPayload};
use tracing::{debug, error};

use crate::{DayFetch, ExchangeAdapter, FetchContext};

const DCE_URL: &str = "http://www.dce.com.cn/publicweb/quotesdata/exportMemberDealPosiQuotesBatchData.html";
const MIN_BODY_LEN: usize = 800;

pub struct DceAdapter {
    url: String,
    epoch: NaiveDate,
    min_body_len: usize,
    workers: usize,
    policy: ExhaustionPolicy,
    download_dir: PathBuf,
    extract_dir: PathBuf,
}

impl DceAdapter {
    pub fn from_config(cfg: &ExchangeConfig, download_dir: PathBuf, extract_dir: PathBuf) -> Self {
        Self {
            url: cfg.url.clone().unwrap_or_else(|| DCE_URL.into()),
            epoch: cfg.epoch.unwrap_or_else(|| ymd(2004, 1, 5)),
            min_body_len: cfg.min_body_len.unwrap_or(MIN_BODY_LEN),
            workers: cfg.normalizer_workers.unwrap_or(3),
            policy: cfg.on_retry_exhausted.unwrap_or_default(),
            download_dir,
            extract_dir,
        }
    }

    /// Batch-export form for one trading day.
    pub fn form(date: NaiveDate) -> Vec<(&'static str, String)> {
        vec![
            ("memberDealPosiQuotes.trade_type", "0".into()),
            ("contract.contract_id", "all".into()),
            ("year", date.year().to_string()),
            ("month", date.month0().to_string()),
            ("day", date.day().to_string()),
            ("batchExportFlag", "batch".into()),
        ]
    }
}

impl ExchangeAdapter for DceAdapter {
    fn exchange(&self) -> Exchange {
        Exchange::Dce
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
        let label = format!("dce {date}");
        let resp = match ctx.retry.run(&label, |_| ctx.http.post_form(&self.url, &form)) {
            Ok(resp) => resp,
            Err(e) => return DayFetch { payloads: Vec::new(), exhausted: Some(e) },
        };
        if !resp.is_ok() || resp.body.len() <= self.min_body_len {
            debug!("[{label}] no data (status {}, {} bytes)", resp.status, resp.body.len());
            return DayFetch::empty();
        }
        match archive::save(&self.download_dir, date, &resp.body) {
            Ok(path) => DayFetch {
                payloads: vec![RawPayload::new(Exchange::Dce, date, PayloadBody::Archive(path))],
                exhausted: None,
            },
            Err(e) => {
                // A local disk failure will repeat for every later day.
                error!("[{label}] {e}");
                DayFetch { payloads: Vec::new(), exhausted: Some(e) }
            }
        }
    }

    fn normalize(&self, payload: &RawPayload) -> Result<Vec<RankingRecord>> {
        let PayloadBody::Archive(path) = &payload.body else {
            bail!("dce: unexpected payload {}", payload.describe());
        };
        let (_scratch, files) = archive::Scratch::extract(path, &self.extract_dir)?;

        let mut records = Vec::new();
        for file in &files {
            let bytes = fs::read(file).with_context(|| format!("read {}", file.display()))?;
            records.extend(text_parser::parse_file(file, &bytes)?);
        }
        debug!("[dce] {} files -> {} records for {}", files.len(), records.len(), payload.date);
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use posrank_core::error::RankError;
    use posrank_core::types::RankKind;

    use super::*;
    use crate::http_helper::{HttpResponse, RetryPolicy};
    use crate::testing::{ScriptedTransport, zip_bytes};

    fn adapter(root: &std::path::Path) -> DceAdapter {
        DceAdapter::from_config(
            &ExchangeConfig::for_exchange(Exchange::Dce),
            root.join("download"),
            root.join("extract"),
        )
    }

    const LONG_FILE: &str = "大连商品交易所会员持仓排名\n\
        合约代码：a2101\tDate：2020-10-09\n\
        名次\t会员简称\t持买单量\t增减\n\
        1\t中信期货\t12,345\t-120\n\
        2\t国泰君安\t9,876\t45\n\
        总计\t30,000\t-50\n";

    #[test]
    fn form_month_is_zero_based() {
        let form = DceAdapter::form(ymd(2020, 1, 9));
        assert!(form.contains(&("month", "0".to_string())));
        assert!(form.contains(&("day", "9".to_string())));
        assert!(form.contains(&("year", "2020".to_string())));
        assert!(form.contains(&("batchExportFlag", "batch".to_string())));
    }

    #[test]
    fn small_body_is_no_data() {
        let tmp = tempfile::tempdir().unwrap();
        let http = ScriptedTransport::new(|_| Ok(HttpResponse::new(200, vec![0u8; MIN_BODY_LEN])));
        let retry = RetryPolicy::default();
        let fetched = adapter(tmp.path()).fetch_day(FetchContext { http: &http, retry: &retry }, ymd(2020, 10, 9));
        assert!(fetched.payloads.is_empty());
        assert!(fetched.exhausted.is_none());
        assert!(!tmp.path().join("download").join("20201009_DCE_DPL.zip").exists());
    }

    #[test]
    fn fetched_archive_normalizes_and_cleans_up() {
        let tmp = tempfile::tempdir().unwrap();
        let mut files = vec![("20201009_a2101.txt", LONG_FILE.as_bytes().to_vec())];
        // Pad past the size threshold with a second, header-only file.
        files.push(("20201009_b2101.txt", format!("title\n{}", " \n".repeat(MIN_BODY_LEN)).into_bytes()));
        let body = zip_bytes(&files);
        assert!(body.len() > MIN_BODY_LEN);

        let http = ScriptedTransport::new(move |_| Ok(HttpResponse::new(200, body.clone())));
        let retry = RetryPolicy::default();
        let a = adapter(tmp.path());
        let fetched = a.fetch_day(FetchContext { http: &http, retry: &retry }, ymd(2020, 10, 9));
        assert_eq!(fetched.payloads.len(), 1);
        let PayloadBody::Archive(path) = &fetched.payloads[0].body else { panic!("expected archive") };
        assert!(path.exists());

        let records = a.normalize(&fetched.payloads[0]).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind(), RankKind::Long);
        assert_eq!(records[0].total_volume(), 30000);

        assert!(!path.exists());
        assert!(!tmp.path().join("extract").join("20201009_DCE_DPL.zip").exists());
    }

    #[test]
    fn bad_file_drops_payload_but_still_cleans_up() {
        let tmp = tempfile::tempdir().unwrap();
        let a = adapter(tmp.path());
        let body = zip_bytes(&[("20201009_a2101.txt", "title\n名次\t会员简称\t成交量\t增减\n1\tX\tmany\t1\n".into())]);
        let path = archive::save(&tmp.path().join("download"), ymd(2020, 10, 9), &body).unwrap();
        let payload = RawPayload::new(Exchange::Dce, ymd(2020, 10, 9), PayloadBody::Archive(path.clone()));
        assert!(a.normalize(&payload).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn exhausted_post() {
        let tmp = tempfile::tempdir().unwrap();
        let http = ScriptedTransport::new(|_| Err(RankError::Transport("timeout".into())));
        let retry = RetryPolicy::default();
        let fetched = adapter(tmp.path()).fetch_day(FetchContext { http: &http, retry: &retry }, ymd(2020, 10, 9));
        assert!(fetched.exhausted.is_some());
        assert_eq!(http.requests().len(), 3);
    }
}

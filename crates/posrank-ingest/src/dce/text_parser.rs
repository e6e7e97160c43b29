//! Line-oriented parser for one file of a DCE batch export.
//!
//! After normalization (thousands separators removed, column runs collapsed
//! to `,`) a file reads:
//!
//! ```text
//! 大连商品交易所会员成交及持仓排名表          <- title, dropped
//! 合约代码：a2101,Date：2020-10-09
//! 名次,会员简称,成交量,增减
//! 1,中信期货,12345,-120
//! 2,国泰君安,9876,45
//! 总计,22221,-75
//! 名次,会员简称,持买单量,增减
//! ...
//! ```
//!
//! Older exports omit the `合约代码` line, so the contract and date start out
//! as whatever the file name says (`20201009_a2101.txt`).

use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result, anyhow, bail};
use chrono::NaiveDate;
use posrank_core::time_util::parse_report_date;
use posrank_core::types::{ContractKey, Exchange, RankKind, RankingEntry, RankingRecord, sum_entries};
use regex::Regex;

use super::archive::TextEncoding;
use crate::text_util::{parse_int, parse_rank};

static FILE_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{8})_([a-zA-Z]+\d+)").expect("static file name regex"));
static CONTRACT_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"合约代码[:：](.+),Date[:：](.+)").expect("static contract line regex"));
static TABS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\t+").expect("static tab regex"));
static SPACES_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r" +").expect("static space regex"));

/// Contract and date encoded in an export file name.
pub fn contract_from_file_name(path: &Path) -> Result<(String, NaiveDate)> {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    let caps = FILE_NAME_RE.captures(name).ok_or_else(|| anyhow!("file name {name:?} has no date_contract"))?;
    let date = parse_report_date(&caps[1]).ok_or_else(|| anyhow!("file name {name:?}: bad date"))?;
    Ok((caps[2].to_string(), date))
}

/// Strip thousands separators, collapse the column separator and drop the
/// title line and blank lines.
pub fn normalize_lines(text: &str, encoding: TextEncoding) -> Vec<String> {
    let separator = match encoding {
        TextEncoding::Utf8 => &*TABS_RE,
        TextEncoding::Gbk => &*SPACES_RE,
    };
    text.lines()
        .map(|line| separator.replace_all(line.replace(',', "").trim(), ",").into_owned())
        .filter(|line| !line.is_empty())
        .skip(1)
        .collect()
}

fn kind_for_header(line: &str) -> Option<RankKind> {
    if line.contains("成交量") {
        Some(RankKind::Trade)
    } else if line.contains("持买单量") {
        Some(RankKind::Long)
    } else if line.contains("持卖单量") {
        Some(RankKind::Short)
    } else {
        None
    }
}

fn entry_from(fields: &[&str]) -> Result<RankingEntry> {
    let rank = parse_rank(fields[0]).ok_or_else(|| anyhow!("bad rank in {fields:?}"))?;
    let volume = parse_int(fields[2]).ok_or_else(|| anyhow!("bad volume in {fields:?}"))?;
    let delta = parse_int(fields[3]).ok_or_else(|| anyhow!("bad delta in {fields:?}"))?;
    Ok(RankingEntry::new(rank, fields[1], volume, delta))
}

/// Walk the normalized lines of one file, starting from the contract and
/// date taken from its name.
pub fn parse_lines(lines: &[String], mut contract: String, mut date: NaiveDate) -> Result<Vec<RankingRecord>> {
    let mut records = Vec::new();
    let mut kind: Option<RankKind> = None;
    let mut buffer: Vec<RankingEntry> = Vec::new();

    for line in lines {
        if line.contains("合约代码") {
            let caps = CONTRACT_LINE_RE.captures(line).ok_or_else(|| anyhow!("malformed contract line {line:?}"))?;
            contract = caps[1].trim().to_string();
            date = parse_report_date(&caps[2]).ok_or_else(|| anyhow!("bad date in {line:?}"))?;
            continue;
        }
        if line.contains("期货公司会员") || line.contains("会员类别") {
            continue;
        }
        if line.contains("名次") {
            buffer.clear();
            kind = kind_for_header(line);
            continue;
        }
        if line.contains("总计") {
            if buffer.is_empty() {
                continue;
            }
            let Some(k) = kind else {
                bail!("{contract} {date}: total line before any ranking header");
            };
            let fields: Vec<&str> = line.split(',').collect();
            let totals = match (fields.get(1).and_then(|f| parse_int(f)), fields.get(2).and_then(|f| parse_int(f))) {
                (Some(volume), Some(delta)) => (volume, delta),
                _ => sum_entries(&buffer),
            };
            let key = ContractKey::new(Exchange::Dce, contract.as_str(), date);
            records.push(RankingRecord::new(&key, k, totals.0, totals.1, std::mem::take(&mut buffer))?);
            continue;
        }

        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() == 4 {
            buffer.push(entry_from(&fields).with_context(|| format!("{contract} {date}"))?);
        }
    }
    Ok(records)
}

/// Parse one extracted file.
pub fn parse_file(path: &Path, bytes: &[u8]) -> Result<Vec<RankingRecord>> {
    let (contract, date) = contract_from_file_name(path)?;
    let (text, encoding) = super::archive::decode(bytes).with_context(|| path.display().to_string())?;
    parse_lines(&normalize_lines(&text, encoding), contract, date).with_context(|| path.display().to_string())
}

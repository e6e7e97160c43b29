//! CZCE ranking pages, one parser per historical layout.
//!
//! | Era | Report dates             | Layout                                                        |
//! |-----|--------------------------|---------------------------------------------------------------|
//! | 1   | ..= 2010-08-24           | one `<table>` per contract after a bold `合约代码…日期:…` caption |
//! | 2   | 2010-08-25 ..= 2017-12-27 | flat `table.table` rows; bold rows are `合约：…日期：…` headers   |
//! | 3   | 2017-12-28 ..            | like era 2 over every table, with a `名次` column-name row      |
//!
//! Cutover dates are inclusive upper bounds of the earlier era. Cells are read
//! as the direct text children of each `<td>`, with thousands separators
//! removed, so a cell whose text sits inside a nested tag contributes nothing.

use std::sync::LazyLock;

use anyhow::{Context, Result, anyhow, bail};
use chrono::{Datelike, NaiveDate};
use posrank_core::time_util::{date_key, parse_report_date};
use posrank_core::types::{ContractKey, Exchange, RankingRecord, resolve_contract_year, split_contract};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use super::reshape;

static ERA1_CAPTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"合约代码[:：]?(.+?)日期[:：]?(\d{8})").expect("static caption regex"));
static HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"合约[:：](.+?)日期[:：](.+)").expect("static header regex"));

/// Last report date of era 1.
pub const ERA1_LAST: u32 = 20100824;
/// Last report date of era 2.
pub const ERA2_LAST: u32 = 20171227;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Era {
    One,
    Two,
    Three,
}

/// Layout in effect for a report dated `date`.
pub fn era_for(date: NaiveDate) -> Era {
    match date_key(date) {
        k if k <= ERA1_LAST => Era::One,
        k if k <= ERA2_LAST => Era::Two,
        _ => Era::Three,
    }
}

/// Parse one day's page. `date` is the date the page was requested for.
pub fn parse_page(html: &str, date: NaiveDate) -> Result<Vec<RankingRecord>> {
    let doc = Html::parse_document(html);
    match era_for(date) {
        Era::One => parse_captioned_tables(&doc),
        Era::Two => parse_flat_rows(&doc, "table.table tr", Era::Two),
        Era::Three => parse_flat_rows(&doc, "table tr", Era::Three),
    }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("bad selector {css:?}: {e}"))
}

/// Text as the exchange intends it: all whitespace removed.
fn squash(text: &str) -> String {
    text.split_whitespace().collect()
}

/// Direct text children of each direct `<td>` child of `row`.
fn cells(row: ElementRef<'_>) -> Vec<String> {
    row.children()
        .filter_map(ElementRef::wrap)
        .filter(|td| td.value().name() == "td")
        .flat_map(|td| td.children().filter_map(|n| n.value().as_text().map(|t| t.replace(',', "").trim().to_string())))
        .collect()
}

/// Full contract id with a two-digit year.
///
/// Three-digit numbers (`SR101`) carry only the last digit of the year,
/// which is recovered from the report year; four-digit numbers are kept.
fn full_contract(raw: &str, report_year: i32) -> Result<(String, String)> {
    let (goods, num) = split_contract(raw).ok_or_else(|| anyhow!("no contract code in {raw:?}"))?;
    let num = match num.len() {
        3 => {
            let digit = num[..1].parse::<u32>().context("year digit")?;
            let year = resolve_contract_year(digit, report_year)
                .ok_or_else(|| anyhow!("no contract year near {report_year} for {raw:?}"))?;
            format!("{:02}{}", year % 100, &num[1..])
        }
        4 => num.to_string(),
        _ => bail!("unexpected contract number in {raw:?}"),
    };
    Ok((goods.to_string(), num))
}

fn contract_key(raw_contract: &str, date: NaiveDate) -> Result<ContractKey> {
    let (goods, num) = full_contract(raw_contract, date.year())?;
    Ok(ContractKey::new(Exchange::Czce, format!("{goods}{num}"), date))
}

// ---------------------------------------------------------------------------
// Era 1
// ---------------------------------------------------------------------------

fn parse_captioned_tables(doc: &Html) -> Result<Vec<RankingRecord>> {
    let caption_sel = selector("div[align=left] > b > font")?;
    let row_sel = selector("tr")?;
    let mut records = Vec::new();

    for font in doc.select(&caption_sel) {
        let caption = squash(&font.text().collect::<String>());
        if caption.contains("品种") || caption.contains("品種") || !caption.contains("合约代码") {
            continue;
        }
        let caps = ERA1_CAPTION_RE.captures(&caption).ok_or_else(|| anyhow!("caption mismatch: {caption}"))?;
        let date = NaiveDate::parse_from_str(&caps[2], "%Y%m%d").with_context(|| format!("caption date: {caption}"))?;
        let key = contract_key(&caps[1], date)?;

        let div = font
            .parent()
            .and_then(|b| b.parent())
            .ok_or_else(|| anyhow!("caption {caption} has no enclosing div"))?;
        let table = div
            .next_siblings()
            .filter_map(ElementRef::wrap)
            .next()
            .filter(|e| e.value().name() == "table")
            .ok_or_else(|| anyhow!("caption {caption} is not followed by a table"))?;

        // The aggregate row is published without its opening `<tr>`. The HTML
        // parser wraps those stray cells in an implied row, so the aggregate is
        // still the last non-empty row.
        let rows: Vec<Vec<String>> =
            table.select(&row_sel).skip(1).map(cells).filter(|c| !c.is_empty()).collect();
        debug!("czce {} {}: {} row(s)", key.date, key.contract, rows.len());
        records.extend(reshape::reshape(&key, rows)?);
    }
    Ok(records)
}

// ---------------------------------------------------------------------------
// Eras 2 and 3
// ---------------------------------------------------------------------------

/// Rows belonging to the contract named by the most recent header.
struct Section {
    key: ContractKey,
    rows: Vec<Vec<String>>,
}

fn parse_flat_rows(doc: &Html, row_css: &str, era: Era) -> Result<Vec<RankingRecord>> {
    let row_sel = selector(row_css)?;
    let bold_sel = selector("b")?;
    let mut records = Vec::new();
    let mut current: Option<Section> = None;

    for row in doc.select(&row_sel) {
        let title = row
            .select(&bold_sel)
            .flat_map(|b| b.text())
            .map(squash)
            .find(|t| !t.is_empty());

        if let Some(title) = title {
            if let Some(done) = current.take() {
                records.extend(reshape::reshape(&done.key, done.rows)?);
            }
            // Commodity-level summaries: stop recording until the next contract.
            if title.contains("品种") {
                continue;
            }
            let caps = HEADER_RE.captures(&title).ok_or_else(|| anyhow!("header mismatch: {title}"))?;
            let date = parse_report_date(&caps[2]).ok_or_else(|| anyhow!("header date: {title}"))?;
            current = Some(Section { key: contract_key(&caps[1], date)?, rows: Vec::new() });
            continue;
        }

        let Some(section) = current.as_mut() else {
            continue;
        };
        if era == Era::Two && row.value().attr("class").is_some() {
            continue;
        }
        let cells = cells(row);
        if era == Era::Three && cells.iter().any(|c| c == "名次") {
            continue;
        }
        section.rows.push(cells);
    }

    if let Some(done) = current {
        records.extend(reshape::reshape(&done.key, done.rows)?);
    }
    Ok(records)
}

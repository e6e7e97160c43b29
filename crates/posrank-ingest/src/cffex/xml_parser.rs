//! CFFEX `positionRank` XML reports.
//!
//! ```xml
//! <positionRank>
//!   <data Value="0" Text="成交量">
//!     <tradingday>20201009</tradingday>
//!     <instrumentid>IF2010</instrumentid>
//!     <rank>1</rank>
//!     <shortname>中信期货</shortname>
//!     <volume>23,456</volume>
//!     <varVolume>-120</varVolume>
//!   </data>
//!   ...
//! </positionRank>
//! ```
//!
//! `Value` is the kind discriminator: 0 traded volume, 1 long, 2 short. Tag
//! case varies between report years, so child names match case-insensitively.
//! This format has no aggregate row; totals are the sum of the listed entries.

use std::collections::BTreeMap;

use anyhow::{Context, Result, anyhow, bail};
use chrono::NaiveDate;
use posrank_core::types::{ContractKey, Exchange, RankKind, RankingEntry, RankingRecord, sum_entries};
use roxmltree::{Document, Node};

use crate::text_util::{parse_int, parse_rank};

/// Kind for a `data@Value` discriminator.
fn kind_for(value: &str) -> Option<RankKind> {
    match value.trim() {
        "0" => Some(RankKind::Trade),
        "1" => Some(RankKind::Long),
        "2" => Some(RankKind::Short),
        _ => None,
    }
}

/// Text of the first child element named `name` (ASCII case-insensitive).
fn child_text<'a>(node: Node<'a, '_>, name: &str) -> Option<&'a str> {
    node.children()
        .find(|c| c.is_element() && c.tag_name().name().eq_ignore_ascii_case(name))
        .and_then(|c| c.text())
        .map(str::trim)
}

fn required<'a>(node: Node<'a, '_>, name: &str) -> Result<&'a str> {
    child_text(node, name).ok_or_else(|| anyhow!("row {} has no <{name}>", node.range().start))
}

/// Parse one commodity's report. `fallback_date` is used only if no row
/// carries a `tradingday`.
pub fn parse_report(xml: &str, fallback_date: NaiveDate) -> Result<Vec<RankingRecord>> {
    let doc = Document::parse(xml).context("cffex xml")?;
    let root = doc.root_element();
    if !root.tag_name().name().eq_ignore_ascii_case("positionRank") {
        bail!("unexpected root element <{}>", root.tag_name().name());
    }

    let rows: Vec<Node<'_, '_>> =
        root.children().filter(|n| n.is_element() && n.tag_name().name().eq_ignore_ascii_case("data")).collect();

    let date = match rows.first().and_then(|r| child_text(*r, "tradingday")) {
        Some(day) => NaiveDate::parse_from_str(day, "%Y%m%d").with_context(|| format!("tradingday {day:?}"))?,
        None => fallback_date,
    };

    // (kind, contract) -> entries, in contract order per kind.
    let mut groups: BTreeMap<(RankKind, String), Vec<RankingEntry>> = BTreeMap::new();
    for row in rows {
        let Some(kind) = row.attribute("Value").and_then(kind_for) else {
            continue;
        };
        let contract = required(row, "instrumentid")?.to_string();
        let rank_text = required(row, "rank")?;
        let rank = parse_rank(rank_text).ok_or_else(|| anyhow!("{contract}: bad rank {rank_text:?}"))?;
        let name = child_text(row, "shortname").unwrap_or_default();
        let volume = parse_int(required(row, "volume")?).ok_or_else(|| anyhow!("{contract}: bad volume"))?;
        let delta = parse_int(required(row, "varVolume")?).ok_or_else(|| anyhow!("{contract}: bad varVolume"))?;
        groups.entry((kind, contract)).or_default().push(RankingEntry::new(rank, name, volume, delta));
    }

    let mut records = Vec::with_capacity(groups.len());
    for ((kind, contract), entries) in groups {
        let (total, total_delta) = sum_entries(&entries);
        let key = ContractKey::new(Exchange::Cffex, contract, date);
        records.push(RankingRecord::new(&key, kind, total, total_delta, entries)?);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use posrank_core::time_util::ymd;

    use super::*;

    const REPORT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<positionRank>
  <data Value="0" Text="成交量">
    <tradingday>20201009</tradingday><productid>IF</productid><instrumentid>IF2010 </instrumentid>
    <rank>2</rank><shortname>国泰君安</shortname><volume>8,000</volume><varVolume>-150</varVolume>
  </data>
  <data Value="0" Text="成交量">
    <tradingday>20201009</tradingday><productid>IF</productid><instrumentid>IF2010</instrumentid>
    <rank>1</rank><shortname>中信期货</shortname><volume>12,000</volume><varVolume>300</varVolume>
  </data>
  <data Value="1" Text="持买单量">
    <tradingday>20201009</tradingday><productid>IF</productid><instrumentId>IF2010</instrumentId>
    <rank>1</rank><shortname>中信期货</shortname><volume>20000</volume><varvolume>45</varvolume>
  </data>
  <data Value="2" Text="持卖单量">
    <tradingday>20201009</tradingday><productid>IF</productid><instrumentid>IF2012</instrumentid>
    <rank>1</rank><shortname>海通期货</shortname><volume>9000</volume><varVolume>-7</varVolume>
  </data>
</positionRank>"#;

    #[test]
    fn groups_by_kind_and_contract() {
        let records = parse_report(REPORT, ymd(2000, 1, 1)).unwrap();
        assert_eq!(records.len(), 3);

        let trade = records.iter().find(|r| r.kind() == RankKind::Trade).unwrap();
        assert_eq!(trade.symbol(), "cffex_if2010");
        assert_eq!(trade.commodity(), "IF");
        assert_eq!(trade.date(), ymd(2020, 10, 9));
        assert_eq!(trade.total_volume(), 20000);
        assert_eq!(trade.total_volume_delta(), 150);
        let ranks: Vec<u32> = trade.entries().iter().map(|e| e.rank).collect();
        assert_eq!(ranks, vec![1, 2]);

        let long = records.iter().find(|r| r.kind() == RankKind::Long).unwrap();
        assert_eq!(long.total_volume_delta(), 45);

        let short = records.iter().find(|r| r.kind() == RankKind::Short).unwrap();
        assert_eq!(short.symbol(), "cffex_if2012");
    }

    #[test]
    fn empty_report_uses_fallback_date() {
        let records = parse_report("<positionRank></positionRank>", ymd(2020, 10, 9)).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn missing_volume_fails_the_report() {
        let xml = r#"<positionRank><data Value="0"><tradingday>20201009</tradingday>
            <instrumentid>IF2010</instrumentid><rank>1</rank><shortname>A</shortname></data></positionRank>"#;
        assert!(parse_report(xml, ymd(2020, 10, 9)).is_err());
    }

    #[test]
    fn wrong_root_is_rejected() {
        assert!(parse_report("<html></html>", ymd(2020, 10, 9)).is_err());
    }
}

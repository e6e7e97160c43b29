//! SHFE daily `pm{YYYYMMDD}.dat` documents.
//!
//! The body is a JSON object whose `o_cursor` array holds one row per
//! (contract, rank) with three side-by-side column families:
//!
//! | family | name               | volume | delta      |
//! |--------|--------------------|--------|------------|
//! | 1 trade| `PARTICIPANTABBR1` | `CJ1`  | `CJ1_CHG`  |
//! | 2 long | `PARTICIPANTABBR2` | `CJ2`  | `CJ2_CHG`  |
//! | 3 short| `PARTICIPANTABBR3` | `CJ3`  | `CJ3_CHG`  |
//!
//! Rank -1 and 0 rows are commodity-level summaries and are ignored. Rank 999
//! is the contract aggregate; a blank aggregate volume means the contract has
//! no ranking of that kind. A contract without an aggregate row fails the
//! whole document.

use ahash::AHashMap;
use anyhow::{Result, anyhow, bail};
use chrono::NaiveDate;
use posrank_core::time_util::parse_report_date;
use posrank_core::types::{ContractKey, Exchange, RankKind, RankingEntry, RankingRecord};
use serde_json::Value;

use crate::text_util::{json_i64, json_is_blank, json_string};

const AGGREGATE_RANK: i64 = 999;

/// Date the document reports on: its `report_date`, else `fallback`.
pub fn report_date(doc: &Value, fallback: NaiveDate) -> Result<NaiveDate> {
    match json_string(doc.get("report_date")) {
        Some(s) => parse_report_date(&s).ok_or_else(|| anyhow!("bad report_date {s:?}")),
        None => Ok(fallback),
    }
}

/// `true` when the document carries at least one cursor row.
pub fn has_rows(doc: &Value) -> bool {
    doc.get("o_cursor").and_then(Value::as_array).is_some_and(|rows| !rows.is_empty())
}

fn family_entries(rows: &[&Value], family: usize) -> Result<Vec<RankingEntry>> {
    let name_key = format!("PARTICIPANTABBR{family}");
    let volume_key = format!("CJ{family}");
    let delta_key = format!("CJ{family}_CHG");

    let mut entries = Vec::with_capacity(rows.len());
    for row in rows {
        let name = json_string(row.get(&name_key)).unwrap_or_default();
        if name.is_empty() {
            continue;
        }
        let rank = json_i64(row.get("RANK")).and_then(|r| u32::try_from(r).ok()).ok_or_else(|| anyhow!("bad RANK"))?;
        let volume = json_i64(row.get(&volume_key)).ok_or_else(|| anyhow!("{name}: bad {volume_key}"))?;
        let delta = json_i64(row.get(&delta_key)).ok_or_else(|| anyhow!("{name}: bad {delta_key}"))?;
        entries.push(RankingEntry::new(rank, name, volume, delta));
    }
    Ok(entries)
}

/// Expand one document into per-(contract, kind) records.
pub fn parse_document(doc: &Value, fallback_date: NaiveDate) -> Result<Vec<RankingRecord>> {
    let date = report_date(doc, fallback_date)?;
    let rows = doc.get("o_cursor").and_then(Value::as_array).ok_or_else(|| anyhow!("{date}: no o_cursor array"))?;

    let mut by_contract: AHashMap<String, Vec<&Value>> = AHashMap::new();
    for row in rows {
        let rank = json_i64(row.get("RANK")).ok_or_else(|| anyhow!("{date}: row without RANK: {row}"))?;
        if rank == -1 || rank == 0 {
            continue;
        }
        let contract = json_string(row.get("INSTRUMENTID")).ok_or_else(|| anyhow!("{date}: row without INSTRUMENTID"))?;
        by_contract.entry(contract).or_default().push(row);
    }

    let mut contracts: Vec<_> = by_contract.into_iter().collect();
    contracts.sort_by(|a, b| a.0.cmp(&b.0));

    let mut records = Vec::new();
    for (contract, group) in contracts {
        let (aggregate, ranked): (Vec<&Value>, Vec<&Value>) =
            group.into_iter().partition(|row| json_i64(row.get("RANK")) == Some(AGGREGATE_RANK));
        let Some(aggregate) = aggregate.first() else {
            bail!("{date} {contract}: no aggregate (RANK 999) row");
        };
        let key = ContractKey::new(Exchange::Shfe, contract.as_str(), date);

        for family in 1..=3 {
            let Some(kind) = RankKind::from_family_index(family) else { continue };
            if json_is_blank(aggregate.get(format!("CJ{family}"))) {
                continue;
            }
            let total = json_i64(aggregate.get(format!("CJ{family}")))
                .ok_or_else(|| anyhow!("{date} {contract}: bad aggregate CJ{family}"))?;
            let total_delta = json_i64(aggregate.get(format!("CJ{family}_CHG")))
                .ok_or_else(|| anyhow!("{date} {contract}: bad aggregate CJ{family}_CHG"))?;
            let entries = family_entries(&ranked, family).map_err(|e| anyhow!("{date} {contract} {kind}: {e}"))?;
            records.push(RankingRecord::new(&key, kind, total, total_delta, entries)?);
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use posrank_core::time_util::ymd;
    use serde_json::json;

    use super::*;

    fn row(contract: &str, rank: i64, cols: [(&str, Value, Value); 3]) -> Value {
        let mut v = json!({ "INSTRUMENTID": contract, "RANK": rank });
        for (i, (name, volume, delta)) in cols.into_iter().enumerate() {
            let f = i + 1;
            v[format!("PARTICIPANTABBR{f}")] = json!(name);
            v[format!("CJ{f}")] = volume;
            v[format!("CJ{f}_CHG")] = delta;
        }
        v
    }

    fn document() -> Value {
        json!({
            "report_date": "20191009",
            "o_cursor": [
                row("cu1911  ", 2, [("永安期货  ", json!(800), json!(-5)), ("", json!(""), json!("")), ("中信期货", json!(700), json!(3))]),
                row("cu1911  ", 1, [("中信期货", json!(1000), json!(10)), ("国泰君安", json!(1200), json!(-20)), ("银河期货", json!(900), json!(7))]),
                row("cu1911  ", 999, [("", json!(5000), json!(5)), ("", json!(1200), json!(-20)), ("", json!(1600), json!(10))]),
                row("cu1912", 1, [("中信期货", json!(10), json!(1)), ("", json!(""), json!("")), ("", json!(""), json!(""))]),
                row("cu1912", 999, [("", json!(10), json!(1)), ("", json!(""), json!("")), ("", json!(""), json!(""))]),
                row("cu", -1, [("", json!(99999), json!(0)), ("", json!(0), json!(0)), ("", json!(0), json!(0))]),
                row("cu", 0, [("", json!(99999), json!(0)), ("", json!(0), json!(0)), ("", json!(0), json!(0))]),
            ]
        })
    }

    #[test]
    fn builds_one_record_per_family_with_aggregate() {
        let records = parse_document(&document(), ymd(2000, 1, 1)).unwrap();
        // cu1911: all three kinds; cu1912: trade only.
        assert_eq!(records.len(), 4);

        let trade = &records[0];
        assert_eq!(trade.symbol(), "shfe_cu1911");
        assert_eq!(trade.commodity(), "CU");
        assert_eq!(trade.date(), ymd(2019, 10, 9));
        assert_eq!(trade.kind(), RankKind::Trade);
        assert_eq!(trade.total_volume(), 5000);
        let ranks: Vec<u32> = trade.entries().iter().map(|e| e.rank).collect();
        assert_eq!(ranks, vec![1, 2]);
        assert_eq!(trade.entries()[1].participant_name, "永安期货");

        let long = &records[1];
        assert_eq!(long.kind(), RankKind::Long);
        assert_eq!(long.entries().len(), 1);

        assert_eq!(records[3].symbol(), "shfe_cu1912");
        assert_eq!(records[3].kind(), RankKind::Trade);
    }

    #[test]
    fn missing_report_date_uses_fallback() {
        let doc = json!({ "o_cursor": [] });
        assert_eq!(report_date(&doc, ymd(2019, 10, 9)).unwrap(), ymd(2019, 10, 9));
        assert!(parse_document(&doc, ymd(2019, 10, 9)).unwrap().is_empty());
        assert!(!has_rows(&doc));
        assert!(has_rows(&document()));
    }

    #[test]
    fn contract_without_aggregate_fails_the_document() {
        let doc = json!({
            "report_date": "20191009",
            "o_cursor": [row("al1911", 1, [("A", json!(1), json!(1)), ("B", json!(2), json!(2)), ("C", json!(3), json!(3))])]
        });
        let err = parse_document(&doc, ymd(2019, 10, 9)).unwrap_err();
        assert!(err.to_string().contains("al1911"));
    }

    #[test]
    fn non_numeric_volume_fails_the_document() {
        let doc = json!({
            "report_date": "20191009",
            "o_cursor": [
                row("al1911", 1, [("A", json!("n/a"), json!(1)), ("", json!(""), json!("")), ("", json!(""), json!(""))]),
                row("al1911", 999, [("", json!(1), json!(1)), ("", json!(""), json!("")), ("", json!(""), json!(""))]),
            ]
        });
        assert!(parse_document(&doc, ymd(2019, 10, 9)).is_err());
    }
}

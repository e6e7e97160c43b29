//! Fixed-width reshape of a CZCE ranking table into three kind records.
//!
//! Every era's table has the same ten data columns:
//!
//! ```text
//! 0     1     2      3       4     5     6      7     8      9
//! rank  name  trade  tradeΔ  name  long  longΔ  name  short  shortΔ
//! ```
//!
//! The final row is the exchange's aggregate. Historically it was published
//! with some leading blank cells missing, and the missing cells must be put
//! back before reading totals from columns 2/3, 5/6 and 8/9:
//!
//! - 9 fields: one blank at position 0
//! - 6 fields: blanks at positions 0, 0, 4 and 7 (in that insertion order)

use anyhow::{Result, bail};
use posrank_core::types::{ContractKey, RankKind, RankingEntry, RankingRecord};
use tracing::debug;

use crate::text_util::{parse_int, parse_rank};

pub const COLUMNS: usize = 10;

/// Restore an aggregate row to the ten-column layout.
pub fn pad_aggregate(mut row: Vec<String>) -> Result<Vec<String>> {
    match row.len() {
        COLUMNS => {}
        9 => row.insert(0, String::new()),
        6 => {
            for at in [0, 0, 4, 7] {
                row.insert(at, String::new());
            }
        }
        n => bail!("aggregate row has {n} fields: {row:?}"),
    }
    Ok(row)
}

/// Column offset of the (name, volume, delta) family for `kind`.
fn family_offset(kind: RankKind) -> usize {
    match kind {
        RankKind::Trade => 1,
        RankKind::Long => 4,
        RankKind::Short => 7,
    }
}

/// Split one contract's rows into up to three records.
///
/// A table whose last row is an ordinary ranked row carries no aggregate and
/// yields nothing; so does a kind whose entries are all placeholders.
pub fn reshape(key: &ContractKey, mut rows: Vec<Vec<String>>) -> Result<Vec<RankingRecord>> {
    let Some(last) = rows.pop() else {
        return Ok(Vec::new());
    };
    let aggregate = pad_aggregate(last)?;
    if parse_rank(&aggregate[0]).is_some() {
        debug!("czce {} {}: table has no aggregate row, skipped", key.date, key.contract);
        return Ok(Vec::new());
    }

    if let Some(bad) = rows.iter().find(|r| r.len() != COLUMNS) {
        bail!("{} {}: data row has {} fields, expected {COLUMNS}: {bad:?}", key.date, key.contract, bad.len());
    }

    let mut records = Vec::with_capacity(3);
    for kind in RankKind::ALL {
        let at = family_offset(kind);
        let mut entries = Vec::with_capacity(rows.len());
        for row in &rows {
            let name = &row[at];
            if RankingEntry::is_placeholder_name(name) {
                continue;
            }
            let (Some(rank), Some(volume), Some(delta)) =
                (parse_rank(&row[0]), parse_int(&row[at + 1]), parse_int(&row[at + 2]))
            else {
                bail!("{} {} {kind}: unparseable row {row:?}", key.date, key.contract);
            };
            entries.push(RankingEntry::new(rank, name.as_str(), volume, delta));
        }
        if entries.is_empty() {
            continue;
        }

        let (Some(total), Some(total_delta)) = (parse_int(&aggregate[at + 1]), parse_int(&aggregate[at + 2])) else {
            bail!("{} {} {kind}: unparseable aggregate {aggregate:?}", key.date, key.contract);
        };
        records.push(RankingRecord::new(key, kind, total, total_delta, entries)?);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use posrank_core::time_util::ymd;
    use posrank_core::types::Exchange;

    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    fn key() -> ContractKey {
        ContractKey::new(Exchange::Czce, "SR1101", ymd(2010, 9, 1))
    }

    #[test]
    fn pads_nine_field_aggregate() {
        let padded = pad_aggregate(row(&["合计", "100", "5", "", "200", "-3", "", "150", "2"])).unwrap();
        assert_eq!(padded, row(&["", "合计", "100", "5", "", "200", "-3", "", "150", "2"]));
    }

    #[test]
    fn pads_six_field_aggregate() {
        let padded = pad_aggregate(row(&["100", "5", "200", "-3", "150", "2"])).unwrap();
        assert_eq!(padded, row(&["", "", "100", "5", "", "200", "-3", "", "150", "2"]));
    }

    #[test]
    fn rejects_other_aggregate_widths() {
        assert!(pad_aggregate(row(&["1", "2", "3"])).is_err());
    }

    #[test]
    fn splits_into_three_kinds() {
        let rows = vec![
            row(&["1", "华泰期货", "5000", "120", "永安期货", "3000", "-10", "中粮期货", "2800", "15"]),
            row(&["2", "海通期货", "4000", "-20", "-", "-", "-", "国投安信", "2500", "0"]),
            row(&["合计", "9000", "100", "", "3000", "-10", "", "5300", "15"]),
        ];
        let records = reshape(&key(), rows).unwrap();
        assert_eq!(records.len(), 3);

        let long = records.iter().find(|r| r.kind() == RankKind::Long).unwrap();
        assert_eq!(long.entries().len(), 1);
        assert_eq!(long.total_volume(), 3000);
        assert_eq!(long.total_volume_delta(), -10);

        let trade = records.iter().find(|r| r.kind() == RankKind::Trade).unwrap();
        assert_eq!(trade.total_volume(), 9000);
        assert_eq!(trade.entries()[1].participant_name, "海通期货");
        assert_eq!(trade.symbol(), "czce_sr1101");
    }

    #[test]
    fn kind_with_only_placeholders_is_not_emitted() {
        let rows = vec![
            row(&["1", "华泰期货", "5000", "120", "-", "-", "-", "-", "-", "-"]),
            row(&["100", "5", "0", "0", "0", "0"]),
        ];
        let records = reshape(&key(), rows).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind(), RankKind::Trade);
        assert_eq!(records[0].total_volume(), 100);
    }

    #[test]
    fn table_without_aggregate_yields_nothing() {
        let rows = vec![
            row(&["1", "A", "10", "1", "B", "20", "2", "C", "30", "3"]),
            row(&["2", "D", "9", "1", "E", "19", "2", "F", "29", "3"]),
            row(&["3", "G", "8", "1", "H", "18", "2", "I", "28", "3"]),
        ];
        assert!(reshape(&key(), rows).unwrap().is_empty());
    }

    #[test]
    fn short_data_row_is_a_shape_error() {
        let rows = vec![row(&["1", "A", "10", "1"]), row(&["合计", "10", "1", "", "0", "0", "", "0", "0"])];
        assert!(reshape(&key(), rows).is_err());
    }
}

//! Shared cell-parsing helpers used by all exchange modules.
//!
//! Exchange reports format numbers inconsistently: thousands separators
//! (`"12,345"`), surrounding whitespace, JSON strings instead of numbers, and
//! the occasional `"123.0"`. These helpers accept all of those.

/// Parse an integer cell, ignoring thousands separators and whitespace.
///
/// Whole-valued decimals (`"12.0"`) are accepted; empty cells are `None`.
pub fn parse_int(s: &str) -> Option<i64> {
    let cleaned: String = s.chars().filter(|c| *c != ',' && !c.is_whitespace()).collect();
    if cleaned.is_empty() {
        return None;
    }
    if let Ok(v) = cleaned.parse::<i64>() {
        return Some(v);
    }
    let f = cleaned.parse::<f64>().ok()?;
    (f.is_finite() && f.fract() == 0.0).then_some(f as i64)
}

/// Parse a positive rank cell.
pub fn parse_rank(s: &str) -> Option<u32> {
    parse_int(s).and_then(|v| u32::try_from(v).ok()).filter(|v| *v > 0)
}

/// `true` for empty or whitespace-only cells.
#[inline]
pub fn is_blank(s: &str) -> bool {
    s.trim().is_empty()
}

/// Parse a JSON value (string or number) as `i64`.
///
/// `null`, blank strings and non-numeric strings are `None`.
pub fn json_i64(v: Option<&serde_json::Value>) -> Option<i64> {
    let v = v?;
    if let Some(s) = v.as_str() {
        parse_int(s)
    } else if let Some(i) = v.as_i64() {
        Some(i)
    } else {
        v.as_f64().filter(|f| f.is_finite() && f.fract() == 0.0).map(|f| f as i64)
    }
}

/// A JSON string field, trimmed. Numbers are rendered; `null` is `None`.
pub fn json_string(v: Option<&serde_json::Value>) -> Option<String> {
    match v? {
        serde_json::Value::String(s) => Some(s.trim().to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// `true` when a JSON field is absent, `null` or a blank string.
pub fn json_is_blank(v: Option<&serde_json::Value>) -> bool {
    match v {
        None | Some(serde_json::Value::Null) => true,
        Some(serde_json::Value::String(s)) => is_blank(s),
        Some(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn int_cells() {
        assert_eq!(parse_int("12,345"), Some(12345));
        assert_eq!(parse_int(" -1,024 "), Some(-1024));
        assert_eq!(parse_int("37.0"), Some(37));
        assert_eq!(parse_int("37.5"), None);
        assert_eq!(parse_int(""), None);
        assert_eq!(parse_int("-"), None);
    }

    #[test]
    fn rank_cells() {
        assert_eq!(parse_rank("1"), Some(1));
        assert_eq!(parse_rank("0"), None);
        assert_eq!(parse_rank("名次"), None);
    }

    #[test]
    fn json_numbers_and_strings() {
        let row = json!({"a": 5, "b": " 7 ", "c": "", "d": null, "e": 3.0});
        assert_eq!(json_i64(row.get("a")), Some(5));
        assert_eq!(json_i64(row.get("b")), Some(7));
        assert_eq!(json_i64(row.get("c")), None);
        assert_eq!(json_i64(row.get("e")), Some(3));
        assert!(json_is_blank(row.get("c")));
        assert!(json_is_blank(row.get("d")));
        assert!(json_is_blank(row.get("missing")));
        assert!(!json_is_blank(row.get("a")));
        assert_eq!(json_string(row.get("b")).as_deref(), Some("7"));
    }
}

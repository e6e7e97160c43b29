//! Contract-code utilities shared by all exchange adapters.
//!
//! Exchanges publish contract ids in mixed case with trailing padding
//! (`"cu1905  "`, `"IF2010"`, `"SR101"`). The stored schema wants an uppercase
//! commodity code (`"CU"`) and an exchange-prefixed lowercase symbol
//! (`"shfe_cu1905"`); the helpers here do that conversion in one place.

use std::sync::LazyLock;

use regex::Regex;

use super::enums::Exchange;

static CONTRACT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Za-z]+)(\d+)").expect("static contract regex"));

/// Leading alphabetic prefix of a contract id, uppercased.
///
/// Returns `None` when the id does not start with a letter.
pub fn commodity_of(contract: &str) -> Option<String> {
    let prefix: String = contract.trim().chars().take_while(|c| c.is_ascii_alphabetic()).collect();
    if prefix.is_empty() { None } else { Some(prefix.to_ascii_uppercase()) }
}

/// Exchange-prefixed lowercase symbol, e.g. `cffex_if2010`.
pub fn contract_symbol(exchange: Exchange, contract: &str) -> String {
    format!("{exchange}_{}", contract.trim().to_lowercase())
}

/// Split the first `letters+digits` run of `text` into `(commodity, number)`.
///
/// `"合约代码SR101"` → `("SR", "101")`.
pub fn split_contract(text: &str) -> Option<(&str, &str)> {
    let caps = CONTRACT_RE.captures(text)?;
    Some((caps.get(1)?.as_str(), caps.get(2)?.as_str()))
}

/// Recover a full contract year from its final digit.
///
/// Candidates are `2000 + 10k + digit` for `k` in `0..10`; the first one within
/// three years of `report_year` wins. Returns `None` when no candidate is close
/// enough (or `digit` is not a single decimal digit).
pub fn resolve_contract_year(digit: u32, report_year: i32) -> Option<i32> {
    if digit > 9 {
        return None;
    }
    (0..10)
        .map(|k| 2000 + 10 * k + digit as i32)
        .find(|candidate| (candidate - report_year).abs() <= 3)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commodity_prefix() {
        assert_eq!(commodity_of("IF2010").as_deref(), Some("IF"));
        assert_eq!(commodity_of("cu1905  ").as_deref(), Some("CU"));
        assert_eq!(commodity_of("a1905").as_deref(), Some("A"));
        assert_eq!(commodity_of("1905"), None);
    }

    #[test]
    fn symbol_is_prefixed_and_lowercase() {
        assert_eq!(contract_symbol(Exchange::Cffex, "IF2010"), "cffex_if2010");
        assert_eq!(contract_symbol(Exchange::Shfe, " cu1905 "), "shfe_cu1905");
    }

    #[test]
    fn split_first_run() {
        assert_eq!(split_contract("SR101"), Some(("SR", "101")));
        assert_eq!(split_contract("合约代码:TA905"), Some(("TA", "905")));
        assert_eq!(split_contract("合约代码"), None);
    }

    #[test]
    fn year_nearest_candidate() {
        // 2009 is two years away; 2019 and 1999 are not candidates in range.
        assert_eq!(resolve_contract_year(9, 2011), Some(2009));
        assert_eq!(resolve_contract_year(1, 2010), Some(2011));
        assert_eq!(resolve_contract_year(0, 2019), Some(2020));
        assert_eq!(resolve_contract_year(5, 2024), Some(2025));
    }

    #[test]
    fn year_out_of_range() {
        assert_eq!(resolve_contract_year(5, 1990), None);
        assert_eq!(resolve_contract_year(12, 2011), None);
    }
}

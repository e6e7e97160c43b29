//! Calendar helpers for trading-day iteration.
//!
//! Report dates are plain calendar dates in exchange-local time (UTC+8); there
//! is no intraday component anywhere in the pipeline.

use chrono::{Datelike, FixedOffset, NaiveDate, Utc, Weekday};

/// Offset of China Standard Time from UTC, in seconds.
const CST_OFFSET_SECS: i32 = 8 * 3600;

/// Today's date in exchange-local time.
pub fn today() -> NaiveDate {
    match FixedOffset::east_opt(CST_OFFSET_SECS) {
        Some(tz) => Utc::now().with_timezone(&tz).date_naive(),
        None => Utc::now().date_naive(),
    }
}

/// Saturday and Sunday never have reports.
#[inline]
pub fn is_business_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Build a date from components known to be valid at the call site.
///
/// Falls back to `NaiveDate::MIN` rather than panicking on bad input.
pub fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or(NaiveDate::MIN)
}

/// `yyyymmdd` as an integer, for ordered comparison against date constants.
#[inline]
pub fn date_key(date: NaiveDate) -> u32 {
    date.year() as u32 * 10_000 + date.month() * 100 + date.day()
}

/// Parse a date in any of the formats exchanges publish:
/// `20201009`, `2020-10-09`, `2020/10/09`.
pub fn parse_report_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    ["%Y%m%d", "%Y-%m-%d", "%Y/%m/%d"].iter().find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weekends_are_not_business_days() {
        // 2020-10-10 is a Saturday.
        assert!(is_business_day(ymd(2020, 10, 9)));
        assert!(!is_business_day(ymd(2020, 10, 10)));
        assert!(!is_business_day(ymd(2020, 10, 11)));
        assert!(is_business_day(ymd(2020, 10, 12)));
    }

    #[test]
    fn date_key_orders_like_dates() {
        assert_eq!(date_key(ymd(2010, 8, 24)), 20100824);
        assert!(date_key(ymd(2010, 8, 25)) > date_key(ymd(2010, 8, 24)));
    }

    #[test]
    fn report_date_formats() {
        assert_eq!(parse_report_date("20201009"), Some(ymd(2020, 10, 9)));
        assert_eq!(parse_report_date(" 2020-10-09 "), Some(ymd(2020, 10, 9)));
        assert_eq!(parse_report_date("2020/10/09"), Some(ymd(2020, 10, 9)));
        assert_eq!(parse_report_date("2020.10.09"), None);
    }

    #[test]
    fn invalid_components_do_not_panic() {
        assert_eq!(ymd(2020, 2, 30), NaiveDate::MIN);
    }
}

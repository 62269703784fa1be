//! Trading-calendar clock. A-share sessions run on China Standard Time.

use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};

const CST_OFFSET_SECS: i32 = 8 * 3600;

fn cst() -> FixedOffset {
    // 8h is always within FixedOffset's +-24h range
    FixedOffset::east_opt(CST_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

/// Current instant in UTC+8.
pub fn china_now() -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&cst())
}

/// Today's calendar date in UTC+8.
pub fn china_today() -> NaiveDate {
    china_now().date_naive()
}

/// Compact `YYYYMMDD` form used by the Tushare and Eastmoney query strings.
pub fn compact(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compact_format() {
        let d = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        assert_eq!(compact(d), "20240105");
    }

    #[test]
    fn china_now_is_utc_plus_8() {
        assert_eq!(china_now().offset().local_minus_utc(), CST_OFFSET_SECS);
    }
}

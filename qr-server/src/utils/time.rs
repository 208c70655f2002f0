//! 时间工具函数 — 业务时区转换
//!
//! 所有日期→时间戳转换统一在 API handler / service 层完成，
//! repository 层只接收 `i64` Unix millis。

use chrono::NaiveDate;
use chrono_tz::Tz;

use super::{AppError, AppResult};

/// 解析日期字符串 (YYYY-MM-DD)
pub fn parse_date(date: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| AppError::validation(format!("Invalid date format: {}", date)))
}

/// 当前营业日 (业务时区的自然日)
pub fn current_business_date(tz: Tz) -> NaiveDate {
    chrono::Utc::now().with_timezone(&tz).date_naive()
}

/// 营业日字符串 "YYYY-MM-DD"，用于单号计数器
pub fn business_date_string(tz: Tz) -> String {
    current_business_date(tz).format("%Y-%m-%d").to_string()
}

/// 日期 + 时分秒 → Unix millis (业务时区)
///
/// DST gap fallback: 如果本地时间不存在 (夏令时跳跃)，fallback 到 UTC。
pub fn date_hms_to_millis(date: NaiveDate, hour: u32, min: u32, sec: u32, tz: Tz) -> i64 {
    let naive = date.and_hms_opt(hour, min, sec).unwrap();
    naive
        .and_local_timezone(tz)
        .latest()
        .map(|dt| dt.timestamp_millis())
        .unwrap_or_else(|| naive.and_utc().timestamp_millis())
}

/// 日期开始 (00:00:00) → Unix millis (业务时区)
pub fn day_start_millis(date: NaiveDate, tz: Tz) -> i64 {
    date_hms_to_millis(date, 0, 0, 0, tz)
}

/// 日期结束 → 次日 00:00:00 的 Unix millis (业务时区)
///
/// 返回次日零点时间戳，调用方使用 `< end` (不含) 语义。
pub fn day_end_millis(date: NaiveDate, tz: Tz) -> i64 {
    let next_day = date.succ_opt().unwrap_or(date);
    date_hms_to_millis(next_day, 0, 0, 0, tz)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date() {
        assert!(parse_date("2026-08-07").is_ok());
        assert!(parse_date("08/07/2026").is_err());
        assert!(parse_date("").is_err());
    }

    #[test]
    fn test_day_bounds_utc() {
        let date = parse_date("2026-08-07").unwrap();
        let start = day_start_millis(date, chrono_tz::UTC);
        let end = day_end_millis(date, chrono_tz::UTC);
        assert_eq!(end - start, 24 * 3600 * 1000);
    }
}

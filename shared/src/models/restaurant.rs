//! Restaurant Model (餐厅 / 租户根)

use chrono::{Datelike, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

/// Restaurant entity — tenant root. Every table / session / order
/// references exactly one restaurant; lookups are always scoped by it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Restaurant {
    pub id: i64,
    pub name: String,
    /// IANA 时区名，如 "America/Sao_Paulo"
    pub timezone: String,
    /// 地理围栏中心点（可选，缺失时跳过围栏校验）
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// 围栏半径（米）
    pub geofence_radius_m: f64,
    pub require_geofence: bool,
    /// 营业时间 JSON（宽松存储，读取时合并默认值）
    pub operating_hours: Option<String>,
    pub is_active: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Restaurant {
    /// 解析业务时区，无效值回退 UTC
    pub fn tz(&self) -> chrono_tz::Tz {
        self.timezone.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid timezone '{}', falling back to UTC", self.timezone);
            chrono_tz::UTC
        })
    }

    /// 解析营业时间配置，缺失字段合并默认值
    pub fn weekly_hours(&self) -> WeeklyHours {
        match &self.operating_hours {
            Some(raw) => WeeklyHours::from_json(raw),
            None => WeeklyHours::default(),
        }
    }
}

/// 单日营业时段
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayHours {
    /// "HH:MM"
    pub open: String,
    /// "HH:MM" — 小于 open 表示跨午夜（如 18:00–02:00）
    pub close: String,
    #[serde(default)]
    pub closed: bool,
}

impl Default for DayHours {
    fn default() -> Self {
        Self {
            open: "09:00".to_string(),
            close: "22:00".to_string(),
            closed: false,
        }
    }
}

impl DayHours {
    fn open_time(&self) -> NaiveTime {
        parse_hhmm(&self.open).unwrap_or(NaiveTime::MIN)
    }

    fn close_time(&self) -> NaiveTime {
        parse_hhmm(&self.close).unwrap_or(NaiveTime::MIN)
    }

    /// 是否跨午夜（close < open，如 18:00–02:00）
    pub fn is_overnight(&self) -> bool {
        !self.closed && self.close_time() < self.open_time()
    }
}

fn parse_hhmm(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M").ok()
}

/// 每周营业时间表
///
/// 存储为宽松 JSON（`{"mon": {"open": "11:00", ...}, ...}`），
/// 缺失的天合并 [`DayHours::default`]。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WeeklyHours {
    #[serde(default)]
    pub mon: DayHours,
    #[serde(default)]
    pub tue: DayHours,
    #[serde(default)]
    pub wed: DayHours,
    #[serde(default)]
    pub thu: DayHours,
    #[serde(default)]
    pub fri: DayHours,
    #[serde(default)]
    pub sat: DayHours,
    #[serde(default)]
    pub sun: DayHours,
}

/// 营业状态 — 返回给扫码端，用于 `can_join` 判定和提示文案
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum OperatingStatus {
    Open,
    /// 打烊中；`next_open` 是下一个开门时间的本地描述（找不到则为 None）
    Closed { next_open: Option<String> },
}

impl WeeklyHours {
    /// 宽松解析：整体或单天解析失败都回退默认值
    pub fn from_json(raw: &str) -> Self {
        serde_json::from_str(raw).unwrap_or_else(|e| {
            tracing::warn!("Failed to parse operating hours: {}, using defaults", e);
            Self::default()
        })
    }

    pub fn day(&self, weekday: Weekday) -> &DayHours {
        match weekday {
            Weekday::Mon => &self.mon,
            Weekday::Tue => &self.tue,
            Weekday::Wed => &self.wed,
            Weekday::Thu => &self.thu,
            Weekday::Fri => &self.fri,
            Weekday::Sat => &self.sat,
            Weekday::Sun => &self.sun,
        }
    }

    /// 判断本地时间 `local` 是否在营业时段内
    ///
    /// 跨午夜时段（close < open）归属开门那天：周五 18:00–02:00
    /// 意味着周六 01:00 仍在营业，即使周六当天标记 closed。
    /// open == close 视为 24 小时营业。
    pub fn is_open_at(&self, local: chrono::DateTime<chrono_tz::Tz>) -> bool {
        let t = local.time();
        let today = self.day(local.weekday());

        if !today.closed {
            let (open, close) = (today.open_time(), today.close_time());
            if open < close {
                if t >= open && t < close {
                    return true;
                }
            } else if open > close {
                // 跨午夜：今天 open 之后的部分
                if t >= open {
                    return true;
                }
            } else {
                // open == close → 24h
                return true;
            }
        }

        // 昨天的跨午夜时段溢出到今天凌晨
        let yesterday = self.day(local.weekday().pred());
        yesterday.is_overnight() && t < yesterday.close_time()
    }

    /// 当前营业状态，打烊时携带未来 7 天内的下一个开门时间
    pub fn status_at(&self, local: chrono::DateTime<chrono_tz::Tz>) -> OperatingStatus {
        if self.is_open_at(local) {
            return OperatingStatus::Open;
        }

        let mut next_open = None;
        for offset in 0..7 {
            let day = local.date_naive() + chrono::Duration::days(offset);
            let hours = self.day(day.weekday());
            if hours.closed {
                continue;
            }
            let open = hours.open_time();
            if offset == 0 && local.time() >= open {
                continue;
            }
            next_open = Some(format!("{} {}", day.format("%Y-%m-%d"), hours.open));
            break;
        }
        OperatingStatus::Closed { next_open }
    }
}

/// Create restaurant payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestaurantCreate {
    pub name: String,
    pub timezone: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub geofence_radius_m: Option<f64>,
    #[serde(default)]
    pub require_geofence: bool,
    pub operating_hours: Option<WeeklyHours>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::Tz;

    fn at(hours: &WeeklyHours, y: i32, m: u32, d: u32, hh: u32, mm: u32) -> bool {
        let tz: Tz = "America/Sao_Paulo".parse().unwrap();
        let local = tz.with_ymd_and_hms(y, m, d, hh, mm, 0).unwrap();
        hours.is_open_at(local)
    }

    #[test]
    fn test_regular_hours() {
        let hours = WeeklyHours::default(); // 09:00–22:00 every day
        // 2026-08-05 is a Wednesday
        assert!(at(&hours, 2026, 8, 5, 12, 0));
        assert!(at(&hours, 2026, 8, 5, 9, 0));
        assert!(!at(&hours, 2026, 8, 5, 22, 0));
        assert!(!at(&hours, 2026, 8, 5, 8, 59));
    }

    #[test]
    fn test_overnight_hours_cross_midnight() {
        let mut hours = WeeklyHours::default();
        hours.fri = DayHours {
            open: "18:00".to_string(),
            close: "02:00".to_string(),
            closed: false,
        };
        hours.sat = DayHours {
            open: "18:00".to_string(),
            close: "02:00".to_string(),
            closed: false,
        };
        // 2026-08-07 is a Friday
        assert!(at(&hours, 2026, 8, 7, 23, 30));
        // Saturday 01:00 — still Friday's overnight window
        assert!(at(&hours, 2026, 8, 8, 1, 0));
        // Saturday 03:00 — after Friday's close, before Saturday's open
        assert!(!at(&hours, 2026, 8, 8, 3, 0));
    }

    #[test]
    fn test_closed_day_with_previous_overnight_spill() {
        let mut hours = WeeklyHours::default();
        hours.fri = DayHours {
            open: "20:00".to_string(),
            close: "03:00".to_string(),
            closed: false,
        };
        hours.sat = DayHours {
            closed: true,
            ..DayHours::default()
        };
        // Saturday marked closed, but Friday's window spills into 02:00
        assert!(at(&hours, 2026, 8, 8, 2, 0));
        assert!(!at(&hours, 2026, 8, 8, 12, 0));
    }

    #[test]
    fn test_status_reports_next_open() {
        let hours = WeeklyHours::default();
        let tz: Tz = "America/Sao_Paulo".parse().unwrap();
        let late = tz.with_ymd_and_hms(2026, 8, 5, 23, 0, 0).unwrap();
        match hours.status_at(late) {
            OperatingStatus::Closed { next_open } => {
                assert_eq!(next_open.as_deref(), Some("2026-08-06 09:00"));
            }
            OperatingStatus::Open => panic!("expected closed"),
        }
    }

    #[test]
    fn test_merge_defaults_on_partial_json() {
        let hours = WeeklyHours::from_json(r#"{"mon": {"open": "11:00", "close": "15:00"}}"#);
        assert_eq!(hours.mon.open, "11:00");
        // 其余天回退默认
        assert_eq!(hours.tue.open, "09:00");
    }

    #[test]
    fn test_garbage_json_falls_back_to_defaults() {
        let hours = WeeklyHours::from_json("not json at all");
        assert_eq!(hours.sun.close, "22:00");
    }
}

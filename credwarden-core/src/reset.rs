//! Provider billing reset schedules.
//!
//! Maps a provider id to the cadence on which its quota resets and computes
//! the time remaining until the next reset. Schedules are static and never
//! persisted.

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::models::normalize_provider_id;

/// When a provider's quota resets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ResetSchedule {
    /// Every day at `utc_hour:00` UTC.
    #[serde(rename_all = "camelCase")]
    Daily {
        /// Hour of day (0-23).
        utc_hour: u32,
    },
    /// Every month on `day_of_month` at `utc_hour:00` UTC.
    #[serde(rename_all = "camelCase")]
    Monthly {
        /// Day of month (1-31), clamped to the month's length.
        day_of_month: u32,
        /// Hour of day (0-23).
        utc_hour: u32,
    },
    /// No known reset cadence.
    None,
}

/// Static provider table. Keys are normalized provider ids.
const RESET_TABLE: &[(&str, ResetSchedule)] = &[
    ("openrouter", ResetSchedule::Daily { utc_hour: 0 }),
    ("zai", ResetSchedule::Daily { utc_hour: 0 }),
    ("google", ResetSchedule::Daily { utc_hour: 8 }),
    ("gemini", ResetSchedule::Daily { utc_hour: 8 }),
    (
        "bifrost",
        ResetSchedule::Monthly {
            day_of_month: 1,
            utc_hour: 0,
        },
    ),
    (
        "github-copilot",
        ResetSchedule::Monthly {
            day_of_month: 1,
            utc_hour: 0,
        },
    ),
];

/// Looks up the reset schedule for a provider.
pub fn reset_schedule(provider: &str) -> ResetSchedule {
    let provider = normalize_provider_id(provider);
    RESET_TABLE
        .iter()
        .find(|(id, _)| *id == provider)
        .map_or(ResetSchedule::None, |(_, schedule)| *schedule)
}

impl ResetSchedule {
    /// Next reset strictly after `now`.
    pub fn next_reset_after(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match *self {
            Self::None => None,
            Self::Daily { utc_hour } => {
                let today = at_hour(now.date_naive(), utc_hour)?;
                if today > now {
                    Some(today)
                } else {
                    Some(today + Duration::days(1))
                }
            }
            Self::Monthly {
                day_of_month,
                utc_hour,
            } => {
                let this_month = monthly_occurrence(now.year(), now.month(), day_of_month, utc_hour)?;
                if this_month > now {
                    return Some(this_month);
                }
                let (year, month) = if now.month() == 12 {
                    (now.year() + 1, 1)
                } else {
                    (now.year(), now.month() + 1)
                };
                monthly_occurrence(year, month, day_of_month, utc_hour)
            }
        }
    }
}

fn at_hour(date: NaiveDate, utc_hour: u32) -> Option<DateTime<Utc>> {
    let naive = date.and_hms_opt(utc_hour.min(23), 0, 0)?;
    Some(Utc.from_utc_datetime(&naive))
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.pred_opt())
        .map_or(28, |last| last.day())
}

fn monthly_occurrence(
    year: i32,
    month: u32,
    day_of_month: u32,
    utc_hour: u32,
) -> Option<DateTime<Utc>> {
    let day = day_of_month.clamp(1, days_in_month(year, month));
    at_hour(NaiveDate::from_ymd_opt(year, month, day)?, utc_hour)
}

/// Milliseconds until the provider's next reset, or `None` without a schedule.
pub fn ms_until_reset(provider: &str, now: DateTime<Utc>) -> Option<i64> {
    reset_schedule(provider)
        .next_reset_after(now)
        .map(|next| (next - now).num_milliseconds())
}

/// Renders the time until reset, e.g. `"resets in 2d 3h"`.
pub fn format_reset_countdown(provider: &str, now: DateTime<Utc>) -> Option<String> {
    ms_until_reset(provider, now).map(format_countdown_ms)
}

fn format_countdown_ms(ms: i64) -> String {
    let total_minutes = (ms.max(0) + 59_999) / 60_000;
    let days = total_minutes / (24 * 60);
    let hours = (total_minutes % (24 * 60)) / 60;
    let minutes = total_minutes % 60;

    if total_minutes >= 24 * 60 {
        format!("resets in {days}d {hours}h")
    } else if total_minutes >= 60 {
        format!("resets in {hours}h {minutes}m")
    } else {
        format!("resets in {minutes}m")
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    #[test]
    fn test_unknown_provider_has_no_schedule() {
        let now = utc(2025, 6, 1, 12, 0, 0);
        assert_eq!(reset_schedule("mistral"), ResetSchedule::None);
        assert_eq!(ms_until_reset("mistral", now), None);
        assert_eq!(format_reset_countdown("mistral", now), None);
    }

    #[test]
    fn test_lookup_normalizes_provider() {
        assert_eq!(
            reset_schedule("  OpenRouter "),
            ResetSchedule::Daily { utc_hour: 0 }
        );
        assert_eq!(reset_schedule("Z.AI"), ResetSchedule::Daily { utc_hour: 0 });
    }

    #[test]
    fn test_daily_boundary_rolls_forward() {
        let midnight = utc(2025, 6, 1, 0, 0, 0);
        assert_eq!(ms_until_reset("openrouter", midnight), Some(24 * 3_600_000));
    }

    #[test]
    fn test_daily_later_same_day() {
        let now = utc(2025, 6, 1, 6, 30, 0);
        assert_eq!(ms_until_reset("gemini", now), Some(90 * 60_000));
    }

    #[test]
    fn test_daily_after_hour_rolls_to_tomorrow() {
        let now = utc(2025, 6, 1, 9, 0, 0);
        assert_eq!(ms_until_reset("google", now), Some(23 * 3_600_000));
    }

    #[test]
    fn test_monthly_rolls_over_year_end() {
        let now = utc(2025, 12, 15, 0, 0, 0);
        let next = reset_schedule("bifrost").next_reset_after(now).unwrap();
        assert_eq!(next, utc(2026, 1, 1, 0, 0, 0));
    }

    #[test]
    fn test_monthly_exact_boundary_rolls_forward() {
        let now = utc(2025, 3, 1, 0, 0, 0);
        let next = reset_schedule("bifrost").next_reset_after(now).unwrap();
        assert_eq!(next, utc(2025, 4, 1, 0, 0, 0));
    }

    #[test]
    fn test_monthly_clamps_short_months() {
        let schedule = ResetSchedule::Monthly {
            day_of_month: 31,
            utc_hour: 0,
        };
        assert_eq!(
            schedule.next_reset_after(utc(2025, 2, 10, 0, 0, 0)),
            Some(utc(2025, 2, 28, 0, 0, 0))
        );
        assert_eq!(
            schedule.next_reset_after(utc(2024, 2, 29, 1, 0, 0)),
            Some(utc(2024, 3, 31, 0, 0, 0))
        );
        assert_eq!(
            schedule.next_reset_after(utc(2025, 4, 30, 0, 0, 0)),
            Some(utc(2025, 5, 31, 0, 0, 0))
        );
    }

    #[test]
    fn test_countdown_formats() {
        assert_eq!(format_countdown_ms(30 * 60_000), "resets in 30m");
        assert_eq!(format_countdown_ms(30 * 60_000 + 1), "resets in 31m");
        assert_eq!(format_countdown_ms(90 * 60_000), "resets in 1h 30m");
        assert_eq!(format_countdown_ms(59 * 60_000 + 1), "resets in 1h 0m");
        assert_eq!(format_countdown_ms(26 * 3_600_000), "resets in 1d 2h");
    }

    #[test]
    fn test_format_reset_countdown_for_provider() {
        let now = utc(2025, 6, 1, 23, 15, 0);
        assert_eq!(
            format_reset_countdown("openrouter", now).as_deref(),
            Some("resets in 45m")
        );
    }

    #[test]
    fn test_schedule_serializes_with_kind_tag() {
        let json = serde_json::to_value(ResetSchedule::Monthly {
            day_of_month: 1,
            utc_hour: 0,
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({"kind": "monthly", "dayOfMonth": 1, "utcHour": 0})
        );
        let none = serde_json::to_value(ResetSchedule::None).unwrap();
        assert_eq!(none, serde_json::json!({"kind": "none"}));
    }
}

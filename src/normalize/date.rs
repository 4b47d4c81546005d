//! Relative and absolute post-date parsing.

use chrono::{Days, Months, NaiveDate, Utc};
use regex::Regex;
use std::sync::OnceLock;

/// Calendar units a relative phrase can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unit {
    Minutes,
    Hours,
    Days,
    Weeks,
    Months,
    Years,
}

fn relative_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // "N<unit> 전" (Korean) or "N <unit>(s) ago" (English).
        Regex::new(concat!(
            r"(?i)(\d+)\s*",
            r"(분|시간|일|주|개월|달|년|minutes?|mins?|hours?|days?|weeks?|months?|years?)",
            r"\s*(전|ago)",
        ))
        .expect("relative date regex")
    })
}

fn absolute_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d{4})-(\d{2})-(\d{2})").expect("absolute date regex"))
}

fn unit_from(text: &str) -> Option<Unit> {
    let t = text.to_lowercase();
    match t.as_str() {
        "분" => Some(Unit::Minutes),
        "시간" => Some(Unit::Hours),
        "일" => Some(Unit::Days),
        "주" => Some(Unit::Weeks),
        "개월" | "달" => Some(Unit::Months),
        "년" => Some(Unit::Years),
        _ if t.starts_with("min") => Some(Unit::Minutes),
        _ if t.starts_with("hour") => Some(Unit::Hours),
        _ if t.starts_with("day") => Some(Unit::Days),
        _ if t.starts_with("week") => Some(Unit::Weeks),
        _ if t.starts_with("month") => Some(Unit::Months),
        _ if t.starts_with("year") => Some(Unit::Years),
        _ => None,
    }
}

/// Parse relative ("3일 전", "2 weeks ago") or absolute ("2025-01-15")
/// date text into a calendar date, evaluated against today's UTC date.
///
/// The output deliberately has no time of day: relative inputs are only
/// precise to the unit the platform rendered, so the result is anchored
/// to the evaluation instant's date.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    parse_date_at(text, Utc::now().date_naive())
}

/// Same as [`parse_date`] with an explicit "today", for deterministic tests.
pub fn parse_date_at(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Some(caps) = relative_re().captures(trimmed) {
        let n: u64 = caps[1].parse().ok()?;
        let unit = unit_from(&caps[2])?;
        return match unit {
            // Sub-day offsets stay on today's date.
            Unit::Minutes | Unit::Hours => Some(today),
            Unit::Days => today.checked_sub_days(Days::new(n)),
            Unit::Weeks => today.checked_sub_days(Days::new(n * 7)),
            Unit::Months => today.checked_sub_months(Months::new(n as u32)),
            Unit::Years => today.checked_sub_months(Months::new(n as u32 * 12)),
        };
    }

    if let Some(caps) = absolute_re().captures(trimmed) {
        let year: i32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        let day: u32 = caps[3].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day);
    }

    None
}

/// UTC calendar date of a Unix timestamp in seconds. Used for SSR payloads
/// that carry `createTime` as epoch seconds.
pub fn date_from_epoch_secs(secs: i64) -> Option<NaiveDate> {
    chrono::DateTime::from_timestamp(secs, 0).map(|dt| dt.date_naive())
}

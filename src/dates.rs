//! Timestamp formatting for timeline rows.
//!
//! All inputs are epoch milliseconds. Calendar helpers take the time zone
//! explicitly so callers can render in local time and tests in UTC.

use chrono::{DateTime, NaiveDate, TimeZone};

/// Calendar day of `timestamp_ms` in `tz`.
pub fn day_of<Tz: TimeZone>(timestamp_ms: i64, tz: &Tz) -> Option<NaiveDate> {
    tz.timestamp_millis_opt(timestamp_ms)
        .single()
        .map(|dt| dt.date_naive())
}

/// Separator label such as "Tue Jan 27 2026".
pub fn day_label(day: NaiveDate) -> String {
    day.format("%a %b %d %Y").to_string()
}

/// Hour and minute of `timestamp_ms` in `tz`, or "--:--" when out of range.
pub fn clock_time<Tz: TimeZone>(timestamp_ms: i64, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    tz.timestamp_millis_opt(timestamp_ms)
        .single()
        .map(|dt: DateTime<Tz>| dt.format("%H:%M").to_string())
        .unwrap_or_else(|| "--:--".to_string())
}

/// Compact distance between two instants: "now", "5m ago", "in 2h".
pub fn format_relative_date(timestamp_ms: i64, now_ms: i64) -> String {
    if now_ms <= 0 || timestamp_ms <= 0 {
        return "-".to_string();
    }
    let timestamp = timestamp_ms / 1000;
    let now = now_ms / 1000;
    let (delta, future) = if timestamp > now {
        (timestamp - now, true)
    } else {
        (now - timestamp, false)
    };
    if delta < 10 {
        return "now".to_string();
    }
    if delta < 60 {
        return format_relative_unit(delta, "s", future);
    }
    let minutes = delta / 60;
    if minutes < 60 {
        return format_relative_unit(minutes, "m", future);
    }
    let hours = minutes / 60;
    if hours < 24 {
        return format_relative_unit(hours, "h", future);
    }
    let days = hours / 24;
    if days < 7 {
        return format_relative_unit(days, "d", future);
    }
    let weeks = days / 7;
    if weeks < 4 {
        return format_relative_unit(weeks, "w", future);
    }
    let months = days / 30;
    if months < 12 {
        return format_relative_unit(months, "mo", future);
    }
    format_relative_unit(days / 365, "y", future)
}

fn format_relative_unit(value: i64, unit: &str, future: bool) -> String {
    if future {
        format!("in {value}{unit}")
    } else {
        format!("{value}{unit} ago")
    }
}

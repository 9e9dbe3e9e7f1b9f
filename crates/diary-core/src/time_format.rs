//! Relative "time ago" labels for note timestamps.
//!
//! Elapsed time is measured in whole seconds (truncated). Anything a week or
//! older is rendered as an absolute `yyyy/MM/dd` date instead. Timestamps in
//! the future (clock skew between devices) are clamped to "Just now".

use std::fmt::Display;

use chrono::{DateTime, Local, TimeZone, Utc};

const MINUTE: i64 = 60;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;
const WEEK: i64 = 7 * DAY;

const ABSOLUTE_DATE_FORMAT: &str = "%Y/%m/%d";

/// Format `timestamp_ms` relative to `now_ms`, rendering absolute dates in
/// the local time zone.
pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    format_relative_time_in(timestamp_ms, now_ms, &Local)
}

/// Format `timestamp_ms` relative to the current wall clock.
pub fn format_relative_time_now(timestamp_ms: i64) -> String {
    format_relative_time(timestamp_ms, Utc::now().timestamp_millis())
}

/// Format `timestamp_ms` relative to `now_ms`, rendering absolute dates in
/// `tz`.
pub fn format_relative_time_in<Tz>(timestamp_ms: i64, now_ms: i64, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let elapsed = now_ms.saturating_sub(timestamp_ms) / 1000;

    if elapsed < 1 {
        "Just now".to_string()
    } else if elapsed < MINUTE {
        with_unit(elapsed, "second")
    } else if elapsed < HOUR {
        with_unit(elapsed / MINUTE, "minute")
    } else if elapsed < DAY {
        with_unit(elapsed / HOUR, "hour")
    } else if elapsed < WEEK {
        with_unit(elapsed / DAY, "day")
    } else {
        format_absolute_date(timestamp_ms, tz)
    }
}

fn with_unit(count: i64, unit: &str) -> String {
    if count == 1 {
        format!("{count} {unit} ago")
    } else {
        format!("{count} {unit}s ago")
    }
}

fn format_absolute_date<Tz>(timestamp_ms: i64, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |utc| {
            utc.with_timezone(tz)
                .format(ABSOLUTE_DATE_FORMAT)
                .to_string()
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const NOW: i64 = 1_700_000_000_000;

    fn ago(elapsed_ms: i64) -> String {
        format_relative_time_in(NOW - elapsed_ms, NOW, &Utc)
    }

    #[test]
    fn under_one_second_is_just_now() {
        assert_eq!(ago(0), "Just now");
        assert_eq!(ago(1), "Just now");
        assert_eq!(ago(999), "Just now");
    }

    #[test]
    fn future_timestamps_clamp_to_just_now() {
        assert_eq!(ago(-1), "Just now");
        assert_eq!(ago(-5 * 60 * 1000), "Just now");
    }

    #[test]
    fn seconds_bucket() {
        assert_eq!(ago(1_000), "1 second ago");
        assert_eq!(ago(1_999), "1 second ago");
        assert_eq!(ago(2_000), "2 seconds ago");
        assert_eq!(ago(59_999), "59 seconds ago");
    }

    #[test]
    fn minutes_bucket() {
        assert_eq!(ago(60_000), "1 minute ago");
        assert_eq!(ago(119_999), "1 minute ago");
        assert_eq!(ago(120_000), "2 minutes ago");
        assert_eq!(ago(3_599_999), "59 minutes ago");
    }

    #[test]
    fn minutes_follow_floor_of_elapsed() {
        for elapsed in (60_000..3_600_000).step_by(7_919) {
            let minutes = elapsed / 60_000;
            let expected = if minutes == 1 {
                "1 minute ago".to_string()
            } else {
                format!("{minutes} minutes ago")
            };
            assert_eq!(ago(elapsed), expected, "elapsed={elapsed}");
        }
    }

    #[test]
    fn hours_bucket() {
        assert_eq!(ago(3_600_000), "1 hour ago");
        assert_eq!(ago(2 * 3_600_000), "2 hours ago");
        assert_eq!(ago(86_399_999), "23 hours ago");
    }

    #[test]
    fn days_bucket() {
        assert_eq!(ago(86_400_000), "1 day ago");
        assert_eq!(ago(3 * 86_400_000 + 5), "3 days ago");
        assert_eq!(ago(604_799_999), "6 days ago");
    }

    #[test]
    fn a_week_or_more_renders_absolute_date() {
        assert_eq!(format_relative_time_in(0, 604_800_000, &Utc), "1970/01/01");
        assert_eq!(
            format_relative_time_in(1_699_999_999_000, NOW + 30 * 86_400_000, &Utc),
            "2023/11/14"
        );
    }

    #[test]
    fn absolute_date_respects_time_zone() {
        let offset = chrono::FixedOffset::east_opt(9 * 3600).unwrap();
        // 1970-01-01T20:00:00Z is already Jan 2nd at UTC+9.
        let timestamp = 20 * 3_600_000;
        assert_eq!(
            format_relative_time_in(timestamp, timestamp + 8 * 86_400_000, &offset),
            "1970/01/02"
        );
    }

    #[test]
    fn counts_are_non_decreasing_within_buckets() {
        let count = |label: &str| -> i64 {
            label
                .split_whitespace()
                .next()
                .and_then(|n| n.parse().ok())
                .unwrap_or(0)
        };
        let mut previous = 0;
        for elapsed in (60_000..3_600_000).step_by(1_000) {
            let current = count(&ago(elapsed));
            assert!(current >= previous, "elapsed={elapsed}");
            previous = current;
        }
    }
}

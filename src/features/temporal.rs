//! Temporal feature extraction
//!
//! Calendar features that capture daily and weekly traffic patterns. Everything
//! here is a pure function of the timestamp.

use chrono::{DateTime, Datelike, NaiveDateTime, Timelike};

use crate::{Result, TrafficError};

/// Timestamp layouts seen in hourly traffic exports, tried in order
const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%d-%m-%Y %H:%M:%S",
    "%d-%m-%Y %H:%M",
];

/// Parse a local timestamp. RFC 3339 input keeps its wall-clock time and
/// drops the offset.
pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime> {
    let trimmed = raw.trim();

    for format in TIMESTAMP_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(dt);
        }
    }

    DateTime::parse_from_rfc3339(trimmed)
        .map(|dt| dt.naive_local())
        .map_err(|_| TrafficError::MalformedTimestamp(raw.to_string()))
}

/// True for the morning (7-9) and evening (16-18) peaks, inclusive
pub fn is_rush_hour(hour: u32) -> bool {
    matches!(hour, 7..=9 | 16..=18)
}

/// Saturday (5) and Sunday (6)
pub fn is_weekend(day_of_week: u32) -> bool {
    day_of_week >= 5
}

/// Calendar context for one hourly observation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarFeatures {
    /// Hour of day (0-23)
    pub hour: u32,
    /// Day of week, 0 = Monday .. 6 = Sunday
    pub day_of_week: u32,
    /// Month (1-12)
    pub month: u32,
    pub is_weekend: bool,
    pub is_rush_hour: bool,
}

impl CalendarFeatures {
    pub fn from_datetime(dt: &NaiveDateTime) -> Self {
        let hour = dt.hour();
        let day_of_week = dt.weekday().num_days_from_monday();

        CalendarFeatures {
            hour,
            day_of_week,
            month: dt.month(),
            is_weekend: is_weekend(day_of_week),
            is_rush_hour: is_rush_hour(hour),
        }
    }

    /// Parse and derive in one step
    pub fn from_timestamp(raw: &str) -> Result<Self> {
        parse_timestamp(raw).map(|dt| Self::from_datetime(&dt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_common_formats() {
        let expected = NaiveDateTime::parse_from_str("2012-10-02 09:00:00", "%Y-%m-%d %H:%M:%S")
            .unwrap();

        for raw in [
            "2012-10-02 09:00:00",
            "2012-10-02T09:00:00",
            "2012-10-02 09:00",
            "02-10-2012 09:00",
            "02-10-2012 09:00:00",
            "  2012-10-02 09:00:00 ",
            "2012-10-02T09:00:00+02:00",
        ] {
            assert_eq!(parse_timestamp(raw).unwrap(), expected, "format {:?}", raw);
        }
    }

    #[test]
    fn test_malformed_timestamp() {
        for raw in ["", "yesterday", "2012-13-02 09:00:00", "2012-10-02 25:00:00"] {
            match parse_timestamp(raw) {
                Err(TrafficError::MalformedTimestamp(s)) => assert_eq!(s, raw),
                other => panic!("expected MalformedTimestamp for {:?}, got {:?}", raw, other),
            }
        }
    }

    #[test]
    fn test_day_of_week() {
        // 2012-10-06 is a Saturday, 2012-10-08 a Monday
        let saturday = CalendarFeatures::from_timestamp("2012-10-06 12:00:00").unwrap();
        assert_eq!(saturday.day_of_week, 5);
        assert!(saturday.is_weekend);

        let monday = CalendarFeatures::from_timestamp("2012-10-08 12:00:00").unwrap();
        assert_eq!(monday.day_of_week, 0);
        assert!(!monday.is_weekend);
    }

    #[test]
    fn test_weekend_rule_over_full_week() {
        // 2013-01-07 is a Monday
        for offset in 0..7u32 {
            let raw = format!("2013-01-{:02} 10:00:00", 7 + offset);
            let ctx = CalendarFeatures::from_timestamp(&raw).unwrap();
            assert_eq!(ctx.day_of_week, offset);
            assert_eq!(ctx.is_weekend, offset == 5 || offset == 6);
        }
    }

    #[test]
    fn test_rush_hour_rule_over_full_day() {
        for hour in 0..24u32 {
            let raw = format!("2013-01-07 {:02}:00:00", hour);
            let ctx = CalendarFeatures::from_timestamp(&raw).unwrap();
            assert_eq!(ctx.hour, hour);
            let expected = [7, 8, 9, 16, 17, 18].contains(&hour);
            assert_eq!(ctx.is_rush_hour, expected, "hour {}", hour);
        }
    }

    #[test]
    fn test_month() {
        let ctx = CalendarFeatures::from_timestamp("2016-12-31 23:00:00").unwrap();
        assert_eq!(ctx.month, 12);
        assert_eq!(ctx.hour, 23);
    }

    #[test]
    fn test_deterministic() {
        let a = CalendarFeatures::from_timestamp("2018-06-13 17:00:00").unwrap();
        let b = CalendarFeatures::from_timestamp("2018-06-13 17:00:00").unwrap();
        assert_eq!(a, b);
    }
}

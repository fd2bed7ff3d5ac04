//! Helpers shared by response parsers: sizes, relative dates, counters and ids.

use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

static SIZE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*([0-9][0-9.,]*)\s*([kmgtp]?i?b|bytes?)?\s*$").expect("valid size regex")
});

static TIME_AGO_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(sec|second|min|minute|h|hr|hour|d|day|w|wk|week|mo|month|y|yr|year)s?\b")
        .expect("valid time-ago regex")
});

static DIGITS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("valid digits regex"));

static IMDB_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:tt)?(\d{1,8})").expect("valid imdb regex"));

/// Parses a human-readable size such as `1.5 GB` into bytes (1024 based).
///
/// A bare number is taken as bytes.
pub fn parse_size(raw: &str) -> Option<u64> {
    let caps = SIZE_RE.captures(raw.trim())?;
    let number: f64 = caps.get(1)?.as_str().replace(',', "").parse().ok()?;
    let unit = caps
        .get(2)
        .map(|m| m.as_str().to_ascii_uppercase())
        .unwrap_or_default();
    let power = match unit.chars().next() {
        None | Some('B') => 0,
        Some('K') => 1,
        Some('M') => 2,
        Some('G') => 3,
        Some('T') => 4,
        Some('P') => 5,
        Some(_) => return None,
    };
    Some((number * 1024f64.powi(power)).round() as u64)
}

/// Resolves relative phrasing like `3 days, 4 hours ago` against `now`.
///
/// Months count as 30 days and years as 365. Returns `None` when no
/// recognizable unit is present or the age falls outside the representable
/// range.
pub fn from_time_ago(raw: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let text = raw.trim().to_lowercase();
    match text.as_str() {
        "now" | "just now" | "today" => return Some(now),
        "yesterday" => return now.checked_sub_signed(Duration::days(1)),
        _ => {}
    }

    let mut total = Duration::zero();
    let mut matched = false;
    for caps in TIME_AGO_RE.captures_iter(&text) {
        let value: f64 = match caps[1].parse() {
            Ok(v) => v,
            Err(_) => continue,
        };
        let seconds_per_unit: f64 = match &caps[2] {
            "sec" | "second" => 1.0,
            "min" | "minute" => 60.0,
            "h" | "hr" | "hour" => 3_600.0,
            "d" | "day" => 86_400.0,
            "w" | "wk" | "week" => 604_800.0,
            "mo" | "month" => 30.0 * 86_400.0,
            _ => 365.0 * 86_400.0,
        };
        let seconds = (value * seconds_per_unit).round();
        if !seconds.is_finite() || seconds >= i64::MAX as f64 {
            return None;
        }
        total = total.checked_add(&Duration::try_seconds(seconds as i64)?)?;
        matched = true;
    }

    if !matched {
        return None;
    }
    now.checked_sub_signed(total)
}

/// Parses RFC 822 / RFC 2822 feed dates, falling back to RFC 3339.
pub fn parse_feed_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%a, %d %b %Y %H:%M:%S %z", "%Y-%m-%d %H:%M:%S%z"] {
        if let Ok(dt) = DateTime::parse_from_str(raw, format) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    warn!(date = raw, "Failed to parse date");
    None
}

/// First run of digits in a cell such as `1,234 files`, ignoring separators.
pub fn coerce_int(raw: &str) -> Option<u32> {
    let cleaned = raw.replace([',', '.'], "");
    DIGITS_RE.find(&cleaned)?.as_str().parse().ok()
}

/// Numeric IMDb id from `tt0133093`, `133093` or a trailing URL segment.
pub fn parse_imdb_id(raw: &str) -> Option<u32> {
    let segment = raw
        .trim()
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default();
    let caps = IMDB_RE.captures(segment)?;
    caps[1].parse().ok().filter(|id: &u32| *id > 0)
}

/// Collapses whitespace runs into single spaces.
pub fn normalize_whitespace(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_parse_size_units() {
        assert_eq!(parse_size("1 KB"), Some(1024));
        assert_eq!(parse_size("1.5 GB"), Some(1_610_612_736));
        assert_eq!(parse_size("700MB"), Some(734_003_200));
        assert_eq!(parse_size("2 GiB"), Some(2_147_483_648));
        assert_eq!(parse_size("1,024 B"), Some(1024));
        assert_eq!(parse_size("512"), Some(512));
    }

    #[test]
    fn test_parse_size_rejects_garbage() {
        assert_eq!(parse_size("large"), None);
        assert_eq!(parse_size(""), None);
        assert_eq!(parse_size("5 XB"), None);
    }

    #[test]
    fn test_from_time_ago_simple() {
        assert_eq!(from_time_ago("5 minutes ago", now()), Some(now() - Duration::minutes(5)));
        assert_eq!(from_time_ago("1 hour", now()), Some(now() - Duration::hours(1)));
        assert_eq!(from_time_ago("2 weeks ago", now()), Some(now() - Duration::weeks(2)));
    }

    #[test]
    fn test_from_time_ago_combined() {
        assert_eq!(
            from_time_ago("3 days, 4 hours ago", now()),
            Some(now() - Duration::days(3) - Duration::hours(4))
        );
        assert_eq!(from_time_ago("1 year", now()), Some(now() - Duration::days(365)));
        assert_eq!(from_time_ago("2 months", now()), Some(now() - Duration::days(60)));
    }

    #[test]
    fn test_from_time_ago_keywords() {
        assert_eq!(from_time_ago("Today", now()), Some(now()));
        assert_eq!(from_time_ago("yesterday", now()), Some(now() - Duration::days(1)));
        assert_eq!(from_time_ago("whenever", now()), None);
    }

    #[test]
    fn test_from_time_ago_out_of_range() {
        assert_eq!(from_time_ago("1000000 years ago", now()), None);
        assert_eq!(from_time_ago("99999999999999999999 seconds ago", now()), None);
        assert_eq!(from_time_ago("300000 years, 300000 years ago", now()), None);
    }

    #[test]
    fn test_parse_feed_date() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
        assert_eq!(parse_feed_date("Mon, 15 Jan 2024 10:30:00 +0000"), Some(expected));
        assert_eq!(parse_feed_date("2024-01-15T10:30:00Z"), Some(expected));
        assert_eq!(parse_feed_date("not a date"), None);
    }

    #[test]
    fn test_coerce_int() {
        assert_eq!(coerce_int(" 42 "), Some(42));
        assert_eq!(coerce_int("1,234"), Some(1234));
        assert_eq!(coerce_int("12 files"), Some(12));
        assert_eq!(coerce_int("none"), None);
    }

    #[test]
    fn test_parse_imdb_id() {
        assert_eq!(parse_imdb_id("tt0133093"), Some(133093));
        assert_eq!(parse_imdb_id("https://www.imdb.com/title/tt0133093/"), Some(133093));
        assert_eq!(parse_imdb_id("133093"), Some(133093));
        assert_eq!(parse_imdb_id("tt0000000"), None);
        assert_eq!(parse_imdb_id("title"), None);
    }

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(normalize_whitespace("  a \n b\t c "), "a b c");
    }
}

use std::ops::Range;

use chrono::{Datelike, NaiveDate, NaiveDateTime};

/// One row of the device-column strategy table: which columns to look at and
/// how to read them. Rows are evaluated in order, columns in ascending index.
pub struct ColumnStrategy {
    pub columns: Range<usize>,
    pub parse: fn(&str) -> Option<ParsedColumn>,
}

/// A date read from a device column, with its time of day when the column had one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedColumn {
    pub date: NaiveDate,
    pub timestamp: Option<NaiveDateTime>,
}

/// Columns consulted while listing the device.
pub static SCAN_COLUMNS: &[ColumnStrategy] = &[ColumnStrategy {
    columns: 0..31,
    parse: parse_device_date,
}];

/// Columns consulted when stamping the copied file; the shell exposes more
/// detail columns there, so the range is wider.
pub static BACKWRITE_COLUMNS: &[ColumnStrategy] = &[ColumnStrategy {
    columns: 0..50,
    parse: parse_device_date,
}];

/// Full-string formats carrying a time of day, in priority order.
const DATETIME_FORMATS: &[&str] = &[
    "%m/%d/%Y %I:%M %p",
    "%m/%d/%Y %I:%M:%S %p",
    "%d/%m/%Y %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%Y:%m:%d %H:%M:%S",
    "%d-%b-%y %I:%M %p", // 30-Dec-25 7:27 PM
    "%d-%b-%Y %I:%M %p",
];

/// Date-only formats, tried on the whole string and then on its first token.
const DATE_FORMATS: &[&str] = &[
    "%m/%d/%Y", "%d/%m/%Y", "%Y/%m/%d", "%Y-%m-%d", "%d-%m-%Y", "%m-%d-%Y", "%Y%m%d",
];

/// Directional marks Windows inserts into localized date columns.
fn is_invisible_mark(c: char) -> bool {
    matches!(c, '\u{200e}' | '\u{200f}' | '\u{202a}'..='\u{202e}')
}

/// Whether a column value is worth trying as a date at all.
pub fn looks_like_date(value: &str) -> bool {
    value.chars().any(|c| c.is_ascii_digit()) && value.contains(['/', '-', ':'])
}

/// Parse a device column value against the known formats. First format wins.
pub fn parse_device_date(raw: &str) -> Option<ParsedColumn> {
    let cleaned: String = raw.chars().filter(|c| !is_invisible_mark(*c)).collect();
    let value = cleaned.trim();
    if value.is_empty() || !looks_like_date(value) {
        return None;
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            let dt = normalize_datetime(dt)?;
            return Some(ParsedColumn {
                date: dt.date(),
                timestamp: Some(dt),
            });
        }
    }

    // A time we could not read still leaves the date part usable
    let date_part = value.split_whitespace().next()?;
    for candidate in [value, date_part] {
        for fmt in DATE_FORMATS {
            if let Ok(d) = NaiveDate::parse_from_str(candidate, fmt) {
                return Some(ParsedColumn {
                    date: normalize_date(d)?,
                    timestamp: None,
                });
            }
        }
    }

    None
}

/// Two-digit years belong to the current century.
pub fn normalize_date(date: NaiveDate) -> Option<NaiveDate> {
    if date.year() < 100 {
        date.with_year(date.year() + 2000)
    } else {
        Some(date)
    }
}

pub fn normalize_datetime(dt: NaiveDateTime) -> Option<NaiveDateTime> {
    Some(normalize_date(dt.date())?.and_time(dt.time()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_us_shell_format_keeps_time() {
        let parsed = parse_device_date("1/15/2024 3:04 PM").unwrap();
        assert_eq!(parsed.date, ymd(2024, 1, 15));
        assert_eq!(
            parsed.timestamp,
            Some(ymd(2024, 1, 15).and_hms_opt(15, 4, 0).unwrap())
        );
    }

    #[test]
    fn test_known_formats_match_manual_parse() {
        let cases = [
            ("2023-07-09 08:15:00", ymd(2023, 7, 9)),
            ("2023/07/09 08:15:00", ymd(2023, 7, 9)),
            ("2023:07:09 08:15:00", ymd(2023, 7, 9)),
            ("25/12/2023 18:30", ymd(2023, 12, 25)),
            ("30-Dec-25 7:27 PM", ymd(2025, 12, 30)),
            ("2023-07-09", ymd(2023, 7, 9)),
            ("07/09/2023", ymd(2023, 7, 9)),
            ("31-12-2022", ymd(2022, 12, 31)),
        ];
        for (input, expected) in cases {
            assert_eq!(parse_device_date(input).map(|p| p.date), Some(expected), "{input}");
        }
    }

    #[test]
    fn test_unreadable_time_falls_back_to_date_token() {
        let parsed = parse_device_date("2023-07-09 25:99").unwrap();
        assert_eq!(parsed.date, ymd(2023, 7, 9));
        assert_eq!(parsed.timestamp, None);
    }

    #[test]
    fn test_iso_form() {
        let parsed = parse_device_date("2024-01-15T10:00:00").unwrap();
        assert_eq!(parsed.date, ymd(2024, 1, 15));
        assert_eq!(parsed.timestamp, ymd(2024, 1, 15).and_hms_opt(10, 0, 0));
    }

    #[test]
    fn test_invisible_marks_stripped() {
        let parsed = parse_device_date("\u{200e}1/\u{200e}15/\u{200e}2024 \u{200f}\u{200e}3:04 PM");
        assert_eq!(parsed.map(|p| p.date), Some(ymd(2024, 1, 15)));
    }

    #[test]
    fn test_two_digit_year_normalized() {
        let parsed = parse_device_date("03/04/24").unwrap();
        assert_eq!(parsed.date, ymd(2024, 3, 4));
    }

    #[test]
    fn test_non_dates_rejected() {
        assert_eq!(parse_device_date("IMG_0001.JPG"), None);
        assert_eq!(parse_device_date("2.4 MB"), None);
        assert_eq!(parse_device_date("JPEG image"), None);
        assert_eq!(parse_device_date("13/45/2024"), None);
        assert_eq!(parse_device_date(""), None);
    }
}

//! Wall-clock timestamps for printed lines.

use std::fmt::Display;

use chrono::{DateTime, Local, TimeZone};

/// `DD.MM.YYYY HH:MM:SS,mmm`
pub const TIMESTAMP_FORMAT: &str = "%d.%m.%Y %H:%M:%S,%3f";

/// Format a point in time.
pub fn format_timestamp<Tz>(at: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Current local time, formatted.
pub fn now() -> String {
    format_timestamp(&Local::now())
}

/// Prefix a decoded line with a timestamp.
pub fn render_line(timestamp: &str, line: &str) -> String {
    let mut out = String::with_capacity(timestamp.len() + 1 + line.len());
    out.push_str(timestamp);
    out.push(' ');
    out.push_str(line);
    out
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32, ms: u32) -> DateTime<Utc> {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_milli_opt(h, mi, s, ms)
            .unwrap()
            .and_utc()
    }

    #[test]
    fn test_format_zero_pads_every_field() {
        let at = utc(2024, 3, 5, 7, 8, 9, 4);
        assert_eq!(format_timestamp(&at), "05.03.2024 07:08:09,004");
    }

    #[test]
    fn test_format_two_digit_millis() {
        let at = utc(2023, 12, 31, 23, 59, 58, 45);
        assert_eq!(format_timestamp(&at), "31.12.2023 23:59:58,045");
    }

    #[test]
    fn test_format_full_millis() {
        let at = utc(2025, 10, 18, 12, 0, 0, 999);
        assert_eq!(format_timestamp(&at), "18.10.2025 12:00:00,999");
    }

    #[test]
    fn test_now_has_fixed_width() {
        assert_eq!(now().len(), "DD.MM.YYYY HH:MM:SS,mmm".len());
    }

    #[test]
    fn test_render_line() {
        assert_eq!(
            render_line("05.03.2024 07:08:09,004", "boot ok"),
            "05.03.2024 07:08:09,004 boot ok"
        );
        assert_eq!(render_line("ts", ""), "ts ");
    }
}

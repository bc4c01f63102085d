//! Pure helpers that turn scraped text into clean values.
//!
//! None of these functions fail: unparseable input yields an empty string,
//! `None`, or a documented default, and callers decide what "unknown" means.

use std::sync::LazyLock;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeZone};
use chrono_tz::Tz;
use regex::Regex;

/// Enclosure length used when a page does not state the attachment size.
/// Not a real size: published feeds have always carried this placeholder.
pub const DEFAULT_ENCLOSURE_LENGTH: u64 = 3000;

pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

static SIZE_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:^|[^\d.,])(\d+(?:[.,]\d+)*)\s*(?:([kmgtpe])i?b|b(?:ytes?)?)\b")
        .expect("size token regex is valid")
});

/// Collapse runs of whitespace (spaces, tabs, newlines) into single spaces
/// and trim both ends.
pub fn clean_text(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Like [`clean_text`], then drop one leading and one trailing colon.
///
/// Table labels on notice boards are usually written as `"Oggetto:"`.
pub fn clean_label(s: &str) -> String {
    let cleaned = clean_text(s);
    let stripped = cleaned.strip_prefix(':').unwrap_or(&cleaned);
    let stripped = stripped.strip_suffix(':').unwrap_or(stripped);
    stripped.trim().to_string()
}

/// Input date layout of a notice board, e.g. `DD/MM/YYYY`.
///
/// `tokens` is the human-readable layout; `format` is the equivalent chrono
/// format string used both to parse and to print.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatePattern {
    pub tokens: &'static str,
    pub format: &'static str,
}

impl DatePattern {
    /// Zero-padded day and month: `05/03/2024`.
    pub const DD_MM_YYYY: Self = Self {
        tokens: "DD/MM/YYYY",
        format: "%d/%m/%Y",
    };

    /// Unpadded day and month: `5/3/2024`.
    pub const D_M_YYYY: Self = Self {
        tokens: "D/M/YYYY",
        format: "%-d/%-m/%Y",
    };

    /// Unpadded day, padded month: `5/03/2024`.
    pub const D_MM_YYYY: Self = Self {
        tokens: "D/MM/YYYY",
        format: "%-d/%m/%Y",
    };
}

/// Parse a board date into a timezone-anchored instant at local midnight.
///
/// Only the first whitespace-separated token is considered, so values such
/// as `"12/03/2024 ore 10:00"` still resolve to the date. Absent, empty or
/// malformed input yields `None`.
pub fn parse_date(
    raw: Option<&str>,
    pattern: DatePattern,
    tz: Tz,
) -> Option<DateTime<FixedOffset>> {
    let cleaned = clean_text(raw?);
    let token = cleaned.split_whitespace().next()?;
    let date = NaiveDate::parse_from_str(token, pattern.format).ok()?;
    tz.from_local_datetime(&date.and_time(NaiveTime::MIN))
        .earliest()
        .map(|dt| dt.fixed_offset())
}

/// Print a date back in the board's own layout.
pub fn format_date(dt: &DateTime<FixedOffset>, pattern: DatePattern) -> String {
    dt.format(pattern.format).to_string()
}

/// Parse a human-readable size such as `"12.3 MB"` with 1024-based units.
///
/// The first size token found anywhere in `raw` wins; a bare integer is read
/// as bytes. When nothing matches, [`DEFAULT_ENCLOSURE_LENGTH`] is returned.
pub fn parse_byte_size(raw: &str) -> u64 {
    let trimmed = raw.trim();
    if let Ok(bytes) = trimmed.parse::<u64>() {
        return bytes;
    }

    let Some(caps) = SIZE_TOKEN.captures(trimmed) else {
        return DEFAULT_ENCLOSURE_LENGTH;
    };

    let Some(number) = decimal_number(&caps[1]) else {
        return DEFAULT_ENCLOSURE_LENGTH;
    };

    let exponent = match caps.get(2).map(|m| m.as_str().to_ascii_lowercase()) {
        None => 0,
        Some(unit) => match unit.as_str() {
            "k" => 1,
            "m" => 2,
            "g" => 3,
            "t" => 4,
            "p" => 5,
            _ => 6,
        },
    };

    // Truncated, not rounded.
    (number * 1024f64.powi(exponent)) as u64
}

/// Read a number written with either `.` or `,` as the decimal separator,
/// possibly with grouped thousands: `12.3`, `1,5`, `1.024,5`, `1,048,576`.
///
/// A lone separator is the decimal point. With several, the last one is the
/// decimal point when it differs from the others, and all are grouping marks
/// otherwise.
fn decimal_number(raw: &str) -> Option<f64> {
    let separators: Vec<(usize, char)> = raw
        .char_indices()
        .filter(|(_, c)| *c == '.' || *c == ',')
        .collect();

    let decimal_at = match separators.as_slice() {
        [] => None,
        [(at, _)] => Some(*at),
        [.., (_, a), (last, b)] if a != b => Some(*last),
        _ => None,
    };

    let normalized: String = raw
        .char_indices()
        .filter_map(|(i, c)| match c {
            '.' | ',' if Some(i) == decimal_at => Some('.'),
            '.' | ',' => None,
            digit => Some(digit),
        })
        .collect();
    normalized.parse().ok()
}

/// Guess a MIME type from a file name or URL extension.
pub fn guess_mime_type(name_or_url: &str) -> String {
    let path = name_or_url
        .split(['?', '#'])
        .next()
        .unwrap_or(name_or_url)
        .trim();
    mime_guess::from_path(path)
        .first_raw()
        .unwrap_or(DEFAULT_MIME_TYPE)
        .to_string()
}

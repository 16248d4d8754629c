//! Configured date format handling.
//!
//! The `dateformat` config value uses PHP `date()` letters (`m/d/Y`,
//! `d.m.Y`, `Y-m-d`, ...). This module translates it once into a `chrono`
//! format string and exposes parse/render helpers.
//!
//! # Invariants
//! - Storage format is always `%Y-%m-%d`, independent of the configured one.
//! - Parsing is strict: trailing input or impossible dates are rejected.

use chrono::NaiveDate;

/// Storage format of `attribute_values.attribute_date`.
pub const STORAGE_DATE_FORMAT: &str = "%Y-%m-%d";

/// Default PHP-style display format.
pub const DEFAULT_DATE_FORMAT: &str = "m/d/Y";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateFormat {
    source: String,
    chrono_format: String,
}

impl DateFormat {
    /// Builds a format from a PHP `date()` style pattern.
    pub fn from_php(pattern: &str) -> Self {
        Self {
            source: pattern.to_string(),
            chrono_format: php_to_chrono(pattern),
        }
    }

    /// The PHP-style pattern as configured.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn chrono_format(&self) -> &str {
        &self.chrono_format
    }

    pub fn parse(&self, value: &str) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(value.trim(), &self.chrono_format).ok()
    }

    pub fn render(&self, date: NaiveDate) -> String {
        date.format(&self.chrono_format).to_string()
    }
}

impl Default for DateFormat {
    fn default() -> Self {
        Self::from_php(DEFAULT_DATE_FORMAT)
    }
}

fn php_to_chrono(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() * 2);
    let mut chars = pattern.chars();
    while let Some(ch) = chars.next() {
        let mapped = match ch {
            'd' => "%d",
            'j' => "%-d",
            'm' => "%m",
            'n' => "%-m",
            'Y' => "%Y",
            'y' => "%y",
            'M' => "%b",
            'F' => "%B",
            'D' => "%a",
            'l' => "%A",
            '%' => "%%",
            '\\' => {
                // Escaped literal.
                if let Some(next) = chars.next() {
                    push_literal(&mut out, next);
                }
                continue;
            }
            other => {
                push_literal(&mut out, other);
                continue;
            }
        };
        out.push_str(mapped);
    }
    out
}

fn push_literal(out: &mut String, ch: char) {
    if ch == '%' {
        out.push_str("%%");
    } else {
        out.push(ch);
    }
}

#[cfg(test)]
mod tests {
    use super::{php_to_chrono, DateFormat};
    use chrono::NaiveDate;

    #[test]
    fn translates_common_patterns() {
        assert_eq!(php_to_chrono("m/d/Y"), "%m/%d/%Y");
        assert_eq!(php_to_chrono("d.m.y"), "%d.%m.%y");
        assert_eq!(php_to_chrono("j F Y"), "%-d %B %Y");
        assert_eq!(php_to_chrono("Y\\m"), "%Ym");
    }

    #[test]
    fn parses_and_renders_with_configured_format() {
        let format = DateFormat::from_php("d/m/Y");
        let date = format.parse("24/12/2023").unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2023, 12, 24).unwrap());
        assert_eq!(format.render(date), "24/12/2023");
    }

    #[test]
    fn rejects_impossible_or_foreign_dates() {
        let format = DateFormat::default();
        assert!(format.parse("02/30/2023").is_none());
        assert!(format.parse("2023-02-01").is_none());
        assert!(format.parse("blue").is_none());
    }
}

//! Row retention (TTL) durations for time columns.
//!
//! A TTL is written in tags as a count followed by a unit letter: `3m`
//! (months), `1d` (days) or `24h` (hours). Live ClickHouse tables report it
//! as an expression such as `created_at + INTERVAL 3 MONTH` or
//! `ops_time + toIntervalMonth(6)`.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Error, Result};

/// Unit of a TTL interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TtlUnit {
    /// Hours.
    Hour,
    /// Days.
    Day,
    /// Months.
    Month,
}

impl TtlUnit {
    /// SQL interval keyword.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hour => "HOUR",
            Self::Day => "DAY",
            Self::Month => "MONTH",
        }
    }
}

/// A retention interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ttl {
    /// Number of units.
    pub count: u32,
    /// Interval unit.
    pub unit: TtlUnit,
}

impl fmt::Display for Ttl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "INTERVAL {} {}", self.count, self.unit.as_str())
    }
}

/// A TTL bound to the column it is computed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnTtl {
    /// Column name.
    pub column: String,
    /// Retention interval.
    pub ttl: Ttl,
}

/// Parses a tag value such as `3m`, `1d` or `24h`.
pub fn parse_ttl(input: &str) -> Result<Ttl> {
    let s = input.trim();
    let Some(last) = s.chars().last() else {
        return Err(Error::parse("ttl", input));
    };
    let digits = &s[..s.len() - last.len_utf8()];
    let count: u32 = digits.parse().map_err(|_| Error::parse("ttl", input))?;
    let unit = match last.to_ascii_lowercase() {
        'm' => TtlUnit::Month,
        'd' => TtlUnit::Day,
        'h' => TtlUnit::Hour,
        _ => return Err(Error::parse("ttl", input)),
    };
    Ok(Ttl { count, unit })
}

fn normalize(count: u32, unit: &str, input: &str) -> Result<Ttl> {
    let (factor, unit) = match unit.to_ascii_uppercase().as_str() {
        "HOUR" => (1, TtlUnit::Hour),
        "DAY" => (1, TtlUnit::Day),
        "WEEK" => (7, TtlUnit::Day),
        "MONTH" => (1, TtlUnit::Month),
        "QUARTER" => (3, TtlUnit::Month),
        "YEAR" => (12, TtlUnit::Month),
        _ => return Err(Error::parse("ttl expression", input)),
    };
    let count = count
        .checked_mul(factor)
        .ok_or_else(|| Error::parse("ttl expression", input))?;
    Ok(Ttl { count, unit })
}

fn interval_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[`'\x22]?(\w+)[`'\x22]?\s*\+\s*INTERVAL\s+(\d+)\s+(\w+)$")
            .expect("valid interval regex")
    })
}

fn function_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[`'\x22]?(\w+)[`'\x22]?\s*\+\s*toInterval(\w+)\(\s*(\d+)\s*\)$")
            .expect("valid interval function regex")
    })
}

/// Parses a live TTL expression into the column and interval it names.
pub fn parse_ttl_expression(input: &str) -> Result<ColumnTtl> {
    let s = input.trim();
    if let Some(caps) = interval_re().captures(s) {
        let count: u32 = caps[2]
            .parse()
            .map_err(|_| Error::parse("ttl expression", input))?;
        return Ok(ColumnTtl {
            column: caps[1].to_string(),
            ttl: normalize(count, &caps[3], input)?,
        });
    }
    if let Some(caps) = function_re().captures(s) {
        let count: u32 = caps[3]
            .parse()
            .map_err(|_| Error::parse("ttl expression", input))?;
        return Ok(ColumnTtl {
            column: caps[1].to_string(),
            ttl: normalize(count, &caps[2], input)?,
        });
    }
    Err(Error::parse("ttl expression", input))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ttl() {
        assert_eq!(
            parse_ttl("10m").unwrap(),
            Ttl {
                count: 10,
                unit: TtlUnit::Month
            }
        );
        assert_eq!(
            parse_ttl("1d").unwrap(),
            Ttl {
                count: 1,
                unit: TtlUnit::Day
            }
        );
        assert_eq!(
            parse_ttl("24h").unwrap(),
            Ttl {
                count: 24,
                unit: TtlUnit::Hour
            }
        );
        assert!(parse_ttl("").is_err());
        assert!(parse_ttl("3y").is_err());
        assert!(parse_ttl("m").is_err());
    }

    #[test]
    fn test_parse_ttl_expression() {
        let cases = [
            ("created_at + INTERVAL 3 MONTH", "created_at", 3, TtlUnit::Month),
            ("`created_at` + INTERVAL 3 MONTH", "created_at", 3, TtlUnit::Month),
            ("'created_at' + INTERVAL 100 DAY", "created_at", 100, TtlUnit::Day),
            ("ops_time + toIntervalMonth(6)", "ops_time", 6, TtlUnit::Month),
            ("ops_time + toIntervalYear(1)", "ops_time", 12, TtlUnit::Month),
            ("ops_time + toIntervalHour(36)", "ops_time", 36, TtlUnit::Hour),
        ];
        for (input, column, count, unit) in cases {
            let got = parse_ttl_expression(input).unwrap();
            assert_eq!(got.column, column, "{input}");
            assert_eq!(got.ttl, Ttl { count, unit }, "{input}");
        }
    }

    #[test]
    fn test_parse_ttl_expression_rejects_garbage() {
        assert!(parse_ttl_expression("toDate(created_at)").is_err());
        assert!(parse_ttl_expression("created_at + INTERVAL 3 FORTNIGHT").is_err());
        assert!(parse_ttl_expression("created_at + INTERVAL 4000000000 YEAR").is_err());
        assert!(parse_ttl_expression("created_at + INTERVAL 4000000000 DAY").is_ok());
    }

    #[test]
    fn test_ttl_display() {
        let ttl = parse_ttl("3m").unwrap();
        assert_eq!(ttl.to_string(), "INTERVAL 3 MONTH");
    }
}

//! Value normalizer - raw text amounts and dates to typed values
//!
//! Pure functions, safe to call from any thread. Amounts are parsed into
//! `Decimal` so the numeral's scale is kept exactly.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::result::{ConfigError, ParseError};

/// Tie-break for dates whose first two components could both be a month
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateOrder {
    #[default]
    Dmy,
    Mdy,
    /// ISO input expected; ambiguous slash dates fall back to day-first
    Iso,
}

impl DateOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            DateOrder::Dmy => "dmy",
            DateOrder::Mdy => "mdy",
            DateOrder::Iso => "iso",
        }
    }
}

impl fmt::Display for DateOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DateOrder {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "dmy" | "day-first" => Ok(DateOrder::Dmy),
            "mdy" | "month-first" => Ok(DateOrder::Mdy),
            "iso" | "ymd" => Ok(DateOrder::Iso),
            other => Err(ConfigError::InvalidSetting(format!(
                "unknown date order '{}' (expected dmy, mdy or iso)",
                other
            ))),
        }
    }
}

/// Grouping and decimal separators of amount text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NumberFormat {
    /// `1,234.56`
    #[default]
    Standard,
    /// `1.234,56`
    European,
}

impl NumberFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            NumberFormat::Standard => "standard",
            NumberFormat::European => "european",
        }
    }
}

impl fmt::Display for NumberFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NumberFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "standard" | "us" => Ok(NumberFormat::Standard),
            "european" | "eu" => Ok(NumberFormat::European),
            other => Err(ConfigError::InvalidSetting(format!(
                "unknown number format '{}' (expected standard or european)",
                other
            ))),
        }
    }
}

pub const DEFAULT_CURRENCY_SYMBOLS: [&str; 5] = ["$", "€", "£", "¥", "R"];

/// Options for [`normalize_amount`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmountOptions {
    #[serde(default)]
    pub number_format: NumberFormat,
    #[serde(default = "default_currency_symbols")]
    pub currency_symbols: Vec<String>,
}

fn default_currency_symbols() -> Vec<String> {
    DEFAULT_CURRENCY_SYMBOLS.iter().map(|s| s.to_string()).collect()
}

impl Default for AmountOptions {
    fn default() -> Self {
        Self {
            number_format: NumberFormat::Standard,
            currency_symbols: default_currency_symbols(),
        }
    }
}

impl AmountOptions {
    pub fn european() -> Self {
        Self {
            number_format: NumberFormat::European,
            ..Self::default()
        }
    }

    fn strip_symbols(&self, text: &str) -> String {
        // Longest first so "R$" is removed before "R"
        let mut symbols: Vec<&str> = self
            .currency_symbols
            .iter()
            .map(String::as_str)
            .filter(|s| !s.is_empty())
            .collect();
        symbols.sort_by_key(|s| std::cmp::Reverse(s.len()));

        let mut out = text.to_string();
        for symbol in symbols {
            out = out.replace(symbol, "");
        }
        out
    }
}

/// Parse a raw amount into a signed decimal.
///
/// Accepts currency symbols, grouping separators, `(100.00)` negatives and
/// leading or trailing minus signs. The scale of the numeral is preserved.
pub fn normalize_amount(raw: &str, options: &AmountOptions) -> Result<Decimal, ParseError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ParseError::Empty);
    }
    let invalid = || ParseError::InvalidAmount(trimmed.to_string());

    let (parenthesized, body) = match trimmed.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
        Some(inner) => (true, inner),
        None => (false, trimmed),
    };

    let cleaned: String = options
        .strip_symbols(body)
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\'' && *c != '\u{2019}')
        .collect();

    let mut rest = cleaned.as_str();
    let mut negative = parenthesized;
    let mut signs = 0;
    if let Some(r) = rest.strip_prefix('-') {
        negative = true;
        signs += 1;
        rest = r;
    } else if let Some(r) = rest.strip_prefix('+') {
        signs += 1;
        rest = r;
    }
    if let Some(r) = rest.strip_suffix('-') {
        negative = true;
        signs += 1;
        rest = r;
    }
    if signs > 1 || (parenthesized && signs > 0) {
        return Err(invalid());
    }

    let numeral = match options.number_format {
        NumberFormat::Standard => rest.replace(',', ""),
        NumberFormat::European => rest.replace('.', "").replace(',', "."),
    };
    if !is_decimal_numeral(&numeral) {
        return Err(invalid());
    }

    let numeral = if numeral.starts_with('.') {
        format!("0{}", numeral)
    } else {
        numeral
    };
    let value = Decimal::from_str_exact(&numeral).map_err(|_| invalid())?;

    if negative && !value.is_zero() {
        Ok(-value)
    } else {
        Ok(value)
    }
}

/// `digits[.digits]` with at least one digit on the integer or fraction side
fn is_decimal_numeral(s: &str) -> bool {
    let all_digits = |p: &str| p.chars().all(|c| c.is_ascii_digit());
    match s.split_once('.') {
        Some((int, frac)) => !frac.is_empty() && all_digits(int) && all_digits(frac),
        None => !s.is_empty() && all_digits(s),
    }
}

const MONTHS: [&str; 12] = [
    "january", "february", "march", "april", "may", "june", "july", "august", "september",
    "october", "november", "december",
];

/// Parse a raw date into a calendar date.
///
/// Accepts `YYYY-MM-DD` (also `/` or `.` separated, optional trailing time),
/// `a/b/YYYY` style dates and `DD-Mon-YYYY`. When both `a` and `b` are at
/// most 12 the `order` decides which one is the day; a component above 12 is
/// always the day.
pub fn normalize_date(raw: &str, order: DateOrder) -> Result<NaiveDate, ParseError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ParseError::Empty);
    }
    let invalid = || ParseError::InvalidDate(trimmed.to_string());

    let date_part = strip_time(trimmed);

    if let Some(parts) = split_numeric(date_part) {
        let (year, month, day) = match (parts[0].len(), parts[1].len(), parts[2].len()) {
            (4, 1..=2, 1..=2) => (num(parts[0]), num(parts[1]), num(parts[2])),
            (1..=2, 1..=2, 4) => {
                let (a, b) = (num(parts[0]), num(parts[1]));
                let (day, month) = if a > 12 {
                    (a, b)
                } else if b > 12 {
                    (b, a)
                } else {
                    match order {
                        DateOrder::Mdy => (b, a),
                        DateOrder::Dmy | DateOrder::Iso => (a, b),
                    }
                };
                (num(parts[2]), month, day)
            }
            _ => return Err(invalid()),
        };
        return NaiveDate::from_ymd_opt(year as i32, month, day).ok_or_else(invalid);
    }

    if let Some((day, month, year)) = split_month_name(date_part) {
        return NaiveDate::from_ymd_opt(year as i32, month, day).ok_or_else(invalid);
    }

    Err(invalid())
}

/// Drop a `T10:00:00` or ` 10:00` suffix; anything else is left alone
///
/// The cut is made at the first separator followed by a time, so month-name
/// dates such as `05 Jan 2024 10:00` keep their inner spaces.
fn strip_time(s: &str) -> &str {
    s.match_indices(['T', ' '])
        .find(|(pos, _)| is_time(&s[pos + 1..]))
        .map_or(s, |(pos, _)| &s[..pos])
}

/// `10:00`, `13:45:00Z`, `09:30:00.5+02:00`, optionally followed by more text
fn is_time(s: &str) -> bool {
    let token = s.split(' ').next().unwrap_or("");
    token.starts_with(|c: char| c.is_ascii_digit())
        && token.contains(':')
        && token
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, ':' | '.' | 'Z' | '+' | '-'))
}

/// Three all-digit components joined by one of `-`, `/`, `.`
fn split_numeric(s: &str) -> Option<[&str; 3]> {
    let sep = s.chars().find(|c| !c.is_ascii_digit())?;
    if !matches!(sep, '-' | '/' | '.') {
        return None;
    }
    let parts: Vec<&str> = s.split(sep).collect();
    if parts.len() != 3 || parts.iter().any(|p| p.is_empty() || !p.chars().all(|c| c.is_ascii_digit())) {
        return None;
    }
    Some([parts[0], parts[1], parts[2]])
}

/// `DD-Mon-YYYY` or `DD Mon YYYY`, English month names or abbreviations
fn split_month_name(s: &str) -> Option<(u32, u32, u32)> {
    let parts: Vec<&str> = s.split(['-', ' ']).filter(|p| !p.is_empty()).collect();
    if parts.len() != 3 {
        return None;
    }
    let (day, month, year) = (parts[0], parts[1].to_lowercase(), parts[2]);
    if !(1..=2).contains(&day.len()) || year.len() != 4 {
        return None;
    }
    if !day.chars().chain(year.chars()).all(|c| c.is_ascii_digit()) {
        return None;
    }
    if month.len() < 3 {
        return None;
    }
    let month = MONTHS.iter().position(|m| m.starts_with(month.as_str()))? as u32 + 1;
    Some((num(day), month, num(year)))
}

/// Short all-digit slices only; callers check the shape first
fn num(s: &str) -> u32 {
    s.parse().unwrap_or(0)
}

/// Comparison form of a key cell: trimmed and lower-cased; empty means unkeyed
pub fn normalize_key(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

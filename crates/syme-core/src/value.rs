//! Scalar coercion for route captures and form fields.
//!
//! Text coming off the wire is turned into the narrowest matching value:
//!
//! | Input | Value |
//! |---|---|
//! | `true`, `FALSE` | [`Value::Bool`] |
//! | `42`, `-7` | [`Value::Int`] |
//! | `3.14`, `1e3`, `.5` | [`Value::Float`] |
//! | `2024-01-01`, `2024-01-01T10:00:00Z` | [`Value::Date`] / [`Value::DateTime`] |
//! | anything else | [`Value::Text`], trimmed |

use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use indexmap::IndexMap;
use serde::Serialize;

/// A coerced scalar.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// `true` or `false`, case-insensitive.
    Bool(bool),
    /// An integer literal.
    Int(i64),
    /// Any other numeric literal.
    Float(f64),
    /// A calendar date without time.
    Date(NaiveDate),
    /// A date with time; offset-less inputs are taken as UTC.
    DateTime(DateTime<FixedOffset>),
    /// Trimmed text that matched nothing else.
    Text(String),
}

impl Value {
    /// Coerces trimmed text.
    ///
    /// ```rust
    /// use syme_core::Value;
    ///
    /// assert_eq!(Value::coerce(" true "), Value::Bool(true));
    /// assert_eq!(Value::coerce("42"), Value::Int(42));
    /// assert_eq!(Value::coerce("3.14"), Value::Float(3.14));
    /// assert!(matches!(Value::coerce("2024-01-01"), Value::Date(_)));
    /// assert_eq!(Value::coerce("  hello "), Value::Text("hello".into()));
    /// ```
    #[must_use]
    pub fn coerce(raw: &str) -> Self {
        parse(raw.trim(), true)
    }

    /// HTML-escapes the text, then coerces it.
    #[must_use]
    pub fn coerce_sanitized(raw: &str) -> Self {
        parse(escape_html(raw).trim(), true)
    }

    /// Coerces booleans and numbers only; dates stay text.
    #[must_use]
    pub fn coerce_scalar(raw: &str) -> Self {
        parse(raw.trim(), false)
    }

    /// Returns the boolean, if this is one.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the integer, if this is one.
    #[must_use]
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns a float for both integer and float values.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Returns the text, if this is text.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Self::DateTime(dt) => f.write_str(&dt.to_rfc3339()),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Value {
    fn from(raw: &str) -> Self {
        Self::coerce(raw)
    }
}

fn parse(text: &str, dates: bool) -> Value {
    if text.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if text.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }
    if is_numeric(text) {
        if let Ok(i) = text.parse::<i64>() {
            return Value::Int(i);
        }
        if let Ok(x) = text.parse::<f64>() {
            return Value::Float(x);
        }
    }
    if dates && !text.is_empty() {
        if let Some(value) = parse_date(text) {
            return value;
        }
    }
    Value::Text(text.to_string())
}

/// Accepts `[+-]digits[.digits][(e|E)[+-]digits]`, with at least one digit
/// before or after the dot.
fn is_numeric(text: &str) -> bool {
    let bytes = text.as_bytes();
    let mut i = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        i += 1;
    }
    let int_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    let mut digits = i - int_start;
    if i < bytes.len() && bytes[i] == b'.' {
        i += 1;
        let frac_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        digits += i - frac_start;
    }
    if digits == 0 {
        return false;
    }
    if i < bytes.len() && matches!(bytes[i], b'e' | b'E') {
        i += 1;
        if matches!(bytes.get(i), Some(b'+' | b'-')) {
            i += 1;
        }
        let exp_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i == exp_start {
            return false;
        }
    }
    i == bytes.len()
}

const NAIVE_DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%d-%m-%Y", "%Y/%m/%d"];

fn parse_date(text: &str) -> Option<Value> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(Value::DateTime(dt));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Some(Value::DateTime(dt));
    }
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(Value::DateTime(naive.and_utc().fixed_offset()));
        }
    }
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
        .map(Value::Date)
}

/// Escapes `& < > " '` for safe inclusion in HTML.
#[must_use]
pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(c),
        }
    }
    out
}

/// The complete map of coerced route captures, in declaration order.
///
/// Injected whole into any handler or middleware that asks for it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Attributes(IndexMap<String, Value>);

impl Attributes {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Coerces and sanitizes each raw capture.
    pub fn from_captures<'a, I>(captures: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        Self(
            captures
                .into_iter()
                .map(|(name, raw)| (name.to_string(), Value::coerce_sanitized(raw)))
                .collect(),
        )
    }

    /// Inserts or replaces a value.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.0.insert(name.into(), value);
    }

    /// Returns the value named `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Returns true if `name` was captured.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Number of values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if nothing was captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Renders every value as text, ready for reverse routing.
    #[must_use]
    pub fn to_strings(&self) -> Vec<(String, String)> {
        self.0
            .iter()
            .map(|(k, v)| (k.clone(), v.to_string()))
            .collect()
    }
}

//! Purpose: Typed comparison operands and cell formats for filter predicates.
//! Exports: `Value`, `CellFormat`, `Comparator`.
//! Role: Gives row and bean predicates one ordering model (text, numbers, booleans, date-times).
//! Invariants: Integers and floats compare numerically with each other.
//! Invariants: Values of unrelated kinds are unordered (`compare` yields `None`).
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use time::format_description::{self, OwnedFormatItem};
use time::parsing::Parsable;
use time::{Date, PrimitiveDateTime, Time};

use crate::core::error::{Error, ErrorKind};

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Text(String),
    Integer(i64),
    Number(f64),
    Bool(bool),
    DateTime(PrimitiveDateTime),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Null or an empty string.
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Text(text) => text.is_empty(),
            _ => false,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }

    fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Text(_) => "text",
            Value::Integer(_) => "integer",
            Value::Number(_) => "number",
            Value::Bool(_) => "bool",
            Value::DateTime(_) => "date-time",
        }
    }

    /// Natural ordering; `ignore_case` only affects text.
    pub fn compare(&self, other: &Value, ignore_case: bool) -> Option<Ordering> {
        match (self, other) {
            (Value::Text(a), Value::Text(b)) => {
                if ignore_case {
                    Some(a.to_lowercase().cmp(&b.to_lowercase()))
                } else {
                    Some(a.cmp(b))
                }
            }
            (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
            (Value::Integer(a), Value::Number(b)) => (*a as f64).partial_cmp(b),
            (Value::Number(a), Value::Integer(b)) => a.partial_cmp(&(*b as f64)),
            (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::DateTime(a), Value::DateTime(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    pub(crate) fn mismatch(&self, other: &Value) -> Error {
        Error::new(ErrorKind::Conversion).with_message(format!(
            "cannot compare {} with {}",
            self.kind_name(),
            other.kind_name()
        ))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Text(text) => write!(f, "{text}"),
            Value::Integer(n) => write!(f, "{n}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::DateTime(dt) => write!(f, "{dt}"),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<PrimitiveDateTime> for Value {
    fn from(value: PrimitiveDateTime) -> Self {
        Value::DateTime(value)
    }
}

impl From<Date> for Value {
    fn from(value: Date) -> Self {
        Value::DateTime(value.with_time(Time::MIDNIGHT))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

impl From<&serde_json::Value> for Value {
    fn from(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::Text(s.clone()),
            other => Value::Text(other.to_string()),
        }
    }
}

/// Custom ordering used in place of `Value::compare`.
pub type Comparator = Arc<dyn Fn(&Value, &Value) -> Ordering + Send + Sync>;

/// How a text cell is parsed before a typed comparison.
#[derive(Clone, Debug)]
pub enum CellFormat {
    Integer,
    Number,
    Bool,
    /// A `time` format description, e.g. `[year]-[month]-[day]`.
    DateTime {
        pattern: String,
        items: OwnedFormatItem,
    },
}

impl CellFormat {
    pub fn date_time(pattern: &str) -> Result<Self, Error> {
        let items = format_description::parse_owned::<2>(pattern).map_err(|err| {
            Error::new(ErrorKind::Argument)
                .with_message(format!("invalid date-time format `{pattern}`"))
                .with_source(err)
        })?;
        Ok(CellFormat::DateTime {
            pattern: pattern.to_string(),
            items,
        })
    }

    pub fn parse(&self, text: &str) -> Result<Value, Error> {
        let text = text.trim();
        match self {
            CellFormat::Integer => text
                .parse::<i64>()
                .map(Value::Integer)
                .map_err(|err| conversion_error(text, "integer", err)),
            CellFormat::Number => text
                .parse::<f64>()
                .map(Value::Number)
                .map_err(|err| conversion_error(text, "number", err)),
            CellFormat::Bool => parse_bool(text)
                .map(Value::Bool)
                .ok_or_else(|| conversion_message(text, "bool")),
            CellFormat::DateTime { pattern, items } => parse_date_time(text, items)
                .map(Value::DateTime)
                .map_err(|err| conversion_error(text, pattern, err)),
        }
    }
}

pub(crate) fn parse_bool(text: &str) -> Option<bool> {
    if text.eq_ignore_ascii_case("true") || text == "1" {
        Some(true)
    } else if text.eq_ignore_ascii_case("false") || text == "0" {
        Some(false)
    } else {
        None
    }
}

/// Accepts date-only formats by assuming midnight.
pub(crate) fn parse_date_time(
    text: &str,
    items: &(impl Parsable + ?Sized),
) -> Result<PrimitiveDateTime, time::error::Parse> {
    match PrimitiveDateTime::parse(text, items) {
        Ok(dt) => Ok(dt),
        Err(err) => match Date::parse(text, items) {
            Ok(date) => Ok(date.with_time(Time::MIDNIGHT)),
            Err(_) => Err(err),
        },
    }
}

fn conversion_error(
    text: &str,
    target: &str,
    err: impl std::error::Error + Send + Sync + 'static,
) -> Error {
    conversion_message(text, target).with_source(err)
}

fn conversion_message(text: &str, target: &str) -> Error {
    Error::new(ErrorKind::Conversion).with_message(format!("cannot parse {text:?} as {target}"))
}

#[cfg(test)]
mod tests {
    use super::{CellFormat, Value};
    use crate::core::error::ErrorKind;
    use std::cmp::Ordering;
    use time::macros::datetime;

    #[test]
    fn integers_and_floats_compare_numerically() {
        assert_eq!(
            Value::Integer(100).compare(&Value::Number(1088.7), false),
            Some(Ordering::Less)
        );
        assert_eq!(
            Value::Number(1088.7).compare(&Value::Number(1088.7), false),
            Some(Ordering::Equal)
        );
    }

    #[test]
    fn text_case_folding_is_opt_in() {
        let a = Value::from("AAA");
        let b = Value::from("aaa");
        assert_ne!(a.compare(&b, false), Some(Ordering::Equal));
        assert_eq!(a.compare(&b, true), Some(Ordering::Equal));
    }

    #[test]
    fn unrelated_kinds_are_unordered() {
        assert_eq!(Value::from("1").compare(&Value::Integer(1), false), None);
    }

    #[test]
    fn date_only_formats_parse_to_midnight() {
        let format = CellFormat::date_time("[year]/[month]/[day]").expect("format");
        assert_eq!(
            format.parse("2009/11/06").expect("parse"),
            Value::DateTime(datetime!(2009-11-06 0:00))
        );
    }

    #[test]
    fn unparseable_cells_are_conversion_errors() {
        let err = CellFormat::Number.parse("abc").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conversion);
        let err = CellFormat::Bool.parse("maybe").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conversion);
    }

    #[test]
    fn bad_format_description_is_argument_error() {
        let err = CellFormat::date_time("[yeer]").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Argument);
    }
}

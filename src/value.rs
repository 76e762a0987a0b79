//! Typed cell values and the coercion utility.
//!
//! Every attribute in the catalog is declared as one of four field types:
//! string, number, boolean, or date. Uploaded cells arrive as raw text and
//! are converted here. Two entry points exist with different failure
//! behavior:
//!
//! - [`parse_typed_value()`] is strict and returns an error for
//!   unconvertible input; the query builder uses it for filter operands.
//! - [`coerce_value()`] is lenient and falls back to the trimmed string
//!   when conversion fails; ingestion uses it so a malformed price never
//!   aborts an upload.

use std::{fmt, str::FromStr};

use anyhow::{Result, anyhow, bail};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Declared type of a catalog attribute.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    String,
    Number,
    Boolean,
    Date,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "string" | "text" => Ok(FieldType::String),
            "number" | "numeric" | "float" | "integer" => Ok(FieldType::Number),
            "boolean" | "bool" => Ok(FieldType::Boolean),
            "date" => Ok(FieldType::Date),
            other => Err(anyhow!("Unknown field type '{other}'")),
        }
    }
}

/// A typed cell value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Value {
    String(String),
    Number(f64),
    Boolean(bool),
    Date(NaiveDate),
}

impl Value {
    pub fn field_type(&self) -> FieldType {
        match self {
            Value::String(_) => FieldType::String,
            Value::Number(_) => FieldType::Number,
            Value::Boolean(_) => FieldType::Boolean,
            Value::Date(_) => FieldType::Date,
        }
    }

    /// Display form stable enough to round-trip through the attribute store,
    /// which keeps values as text.
    pub fn as_display(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    (*n as i64).to_string()
                } else {
                    n.to_string()
                }
            }
            Value::Boolean(b) => b.to_string(),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

pub fn parse_naive_date(value: &str) -> Result<NaiveDate> {
    const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%Y/%m/%d", "%d-%m-%Y"];
    for fmt in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(value, fmt) {
            return Ok(parsed);
        }
    }
    Err(anyhow!("Failed to parse '{value}' as date"))
}

pub fn parse_boolean(value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" => Ok(true),
        "false" | "f" | "no" | "n" | "0" => Ok(false),
        _ => bail!("Failed to parse '{value}' as boolean"),
    }
}

/// Strict conversion. Empty input yields `None`; anything unconvertible is
/// an error.
pub fn parse_typed_value(value: &str, ty: FieldType) -> Result<Option<Value>> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let parsed = match ty {
        FieldType::String => Value::String(trimmed.to_string()),
        FieldType::Number => {
            let parsed: f64 = trimmed
                .parse()
                .map_err(|_| anyhow!("Failed to parse '{trimmed}' as number"))?;
            Value::Number(parsed)
        }
        FieldType::Boolean => Value::Boolean(parse_boolean(trimmed)?),
        FieldType::Date => Value::Date(parse_naive_date(trimmed)?),
    };
    Ok(Some(parsed))
}

/// Lenient conversion for ingestion. Unconvertible cells degrade to the
/// trimmed string so one bad value never rejects a row.
pub fn coerce_value(value: &str, ty: FieldType) -> Option<Value> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    match parse_typed_value(trimmed, ty) {
        Ok(parsed) => parsed,
        Err(_) => Some(Value::String(trimmed.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn parse_naive_date_supports_multiple_formats() {
        let expected = NaiveDate::from_ymd_opt(2025, 3, 4).unwrap();
        assert_eq!(parse_naive_date("2025-03-04").unwrap(), expected);
        assert_eq!(parse_naive_date("04/03/2025").unwrap(), expected);
        assert_eq!(parse_naive_date("2025/03/04").unwrap(), expected);
    }

    #[test]
    fn parse_typed_value_handles_empty_and_boolean_inputs() {
        assert_eq!(parse_typed_value("", FieldType::Number).unwrap(), None);
        assert_eq!(parse_typed_value("  ", FieldType::String).unwrap(), None);

        let truthy = parse_typed_value("Yes", FieldType::Boolean)
            .unwrap()
            .unwrap();
        assert_eq!(truthy, Value::Boolean(true));
        assert!(parse_typed_value("maybe", FieldType::Boolean).is_err());
    }

    #[test]
    fn coerce_value_falls_back_to_string() {
        assert_eq!(
            coerce_value("9.99", FieldType::Number),
            Some(Value::Number(9.99))
        );
        assert_eq!(
            coerce_value("call for pricing", FieldType::Number),
            Some(Value::String("call for pricing".to_string()))
        );
        assert_eq!(coerce_value("   ", FieldType::Number), None);
    }

    #[test]
    fn number_display_drops_trailing_zero_fraction() {
        assert_eq!(Value::Number(42.0).as_display(), "42");
        assert_eq!(Value::Number(9.99).as_display(), "9.99");
    }

    #[test]
    fn field_type_parses_aliases() {
        assert_eq!("NUMERIC".parse::<FieldType>().unwrap(), FieldType::Number);
        assert_eq!("bool".parse::<FieldType>().unwrap(), FieldType::Boolean);
        assert!("guid".parse::<FieldType>().is_err());
    }
}

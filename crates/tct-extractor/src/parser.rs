//! Entity parsing from untrusted model output
//!
//! Every category is parsed independently and every record on its own. A
//! record that cannot be coerced is dropped, logged and described in the
//! `parse_warnings` extra; nothing here returns an error.
//!
//! Coercion rules:
//! - numbers accept JSON numbers or numeric strings; a missing required
//!   number is 0, an explicit `null` or non-numeric value drops the record
//! - a missing `name` becomes "unknown"; a blank or non-string one drops it
//! - list fields take an array of strings, absent or `null` meaning empty
//! - dates must be `YYYY-MM-DD`; anything else is "no date"

use chrono::NaiveDate;
use serde_json::{Map, Value};
use std::collections::HashSet;
use tct_core::{
    EntitySet, TaxBracket, TaxDeadline, TaxRate, TaxRule, TaxThreshold, TaxType,
    DEFAULT_CURRENCY, EXTRA_CONFIDENCE, EXTRA_PARSE_WARNINGS, EXTRA_SUMMARY, EXTRA_WARNINGS,
};
use thiserror::Error;
use tracing::{debug, warn};

/// Why a single record was dropped
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecordError {
    #[error("record is not an object")]
    NotAnObject,

    #[error("field '{field}' is not a number: {value}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("field '{field}' is not an integer: {value}")]
    InvalidInteger { field: &'static str, value: String },

    #[error("field '{field}' must be a non-empty string")]
    InvalidName { field: &'static str },

    #[error("field '{field}' must be a string or null")]
    InvalidText { field: &'static str },

    #[error("field '{field}' must be a list of strings")]
    InvalidList { field: &'static str },
}

type RecordResult<T> = std::result::Result<T, RecordError>;

/// Parse one extraction reply into an entity set
pub fn parse_entities(response: &Map<String, Value>) -> EntitySet {
    let mut parser = ResponseParser::default();
    let mut entities = EntitySet::new();

    entities.tax_types = parser.tax_types(response.get("tax_types"));
    entities.rates = parser.records(response, "rates", |_, obj| parse_rate(obj));
    entities.brackets = parser.records(response, "brackets", |_, obj| parse_bracket(obj));
    entities.thresholds = parser.records(response, "thresholds", |p, obj| p.threshold(obj));
    entities.deadlines = parser.records(response, "deadlines", |_, obj| parse_deadline(obj));
    entities.rules = parser.rules(response);

    entities.extras.insert(
        EXTRA_SUMMARY.to_string(),
        Value::String(
            response
                .get("summary")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        ),
    );
    let confidence = response
        .get("confidence_score")
        .and_then(|v| number(v).ok())
        .unwrap_or(0.0);
    entities
        .extras
        .insert(EXTRA_CONFIDENCE.to_string(), Value::from(confidence));
    let warnings: Vec<Value> = response
        .get("warnings")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter(|v| v.is_string()).cloned().collect())
        .unwrap_or_default();
    entities
        .extras
        .insert(EXTRA_WARNINGS.to_string(), Value::Array(warnings));

    if !parser.diagnostics.is_empty() {
        entities.extras.insert(
            EXTRA_PARSE_WARNINGS.to_string(),
            Value::Array(parser.diagnostics.into_iter().map(Value::String).collect()),
        );
    }

    debug!(entities = entities.entity_count(), "Parsed extraction reply");
    entities
}

#[derive(Default)]
struct ResponseParser {
    diagnostics: Vec<String>,
}

impl ResponseParser {
    fn note(&mut self, message: String) {
        warn!("{}", message);
        self.diagnostics.push(message);
    }

    /// Elements of a category, or empty (with a diagnostic) if not an array
    fn category<'a>(&mut self, response: &'a Map<String, Value>, key: &str) -> &'a [Value] {
        match response.get(key) {
            None | Some(Value::Null) => &[],
            Some(Value::Array(items)) => items,
            Some(other) => {
                self.note(format!(
                    "{key}: expected a list, got {}; category ignored",
                    kind(other)
                ));
                &[]
            }
        }
    }

    fn records<T>(
        &mut self,
        response: &Map<String, Value>,
        key: &str,
        mut parse: impl FnMut(&mut Self, &Map<String, Value>) -> RecordResult<T>,
    ) -> Vec<T> {
        let mut out = Vec::new();
        for (index, item) in self.category(response, key).iter().enumerate() {
            let result = match item.as_object() {
                Some(obj) => parse(self, obj),
                None => Err(RecordError::NotAnObject),
            };
            match result {
                Ok(record) => out.push(record),
                Err(e) => self.note(format!("{key}[{index}]: {e}; record dropped")),
            }
        }
        out
    }

    fn tax_types(&mut self, value: Option<&Value>) -> Vec<TaxType> {
        let items = match value {
            None | Some(Value::Null) => return Vec::new(),
            Some(Value::Array(items)) => items,
            Some(other) => {
                self.note(format!(
                    "tax_types: expected a list, got {}; category ignored",
                    kind(other)
                ));
                return Vec::new();
            }
        };

        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for (index, item) in items.iter().enumerate() {
            let Some(label) = item.as_str() else {
                self.note(format!("tax_types[{index}]: not a string; value dropped"));
                continue;
            };
            let tax_type = self.tax_type(label);
            if seen.insert(tax_type) {
                out.push(tax_type);
            }
        }
        out
    }

    fn tax_type(&mut self, label: &str) -> TaxType {
        TaxType::parse(label).unwrap_or_else(|| {
            warn!(label, "Unknown tax type, using OTHER");
            TaxType::Other
        })
    }

    fn date(&mut self, obj: &Map<String, Value>, field: &'static str) -> Option<NaiveDate> {
        match obj.get(field) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => {
                let s = s.trim();
                if s.is_empty() || s.eq_ignore_ascii_case("null") {
                    return None;
                }
                let date = parse_iso_date(s);
                if date.is_none() {
                    warn!(field, value = s, "Invalid date format, ignoring");
                }
                date
            }
            Some(other) => {
                warn!(field, value = %other, "Invalid date value, ignoring");
                None
            }
        }
    }

    fn threshold(&mut self, obj: &Map<String, Value>) -> RecordResult<TaxThreshold> {
        Ok(TaxThreshold {
            name: name(obj, "name")?,
            amount: required_number(obj, "amount")?,
            currency: text_or(obj, "currency", DEFAULT_CURRENCY)?,
            description: optional_text(obj, "description")?,
            effective_date: self.date(obj, "effective_date"),
        })
    }

    fn rules(&mut self, response: &Map<String, Value>) -> Vec<TaxRule> {
        let mut out = Vec::new();
        for (index, item) in self.category(response, "rules").iter().enumerate() {
            let result = match item.as_object() {
                Some(obj) => self.rule(obj, index),
                None => Err(RecordError::NotAnObject),
            };
            match result {
                Ok(rule) => out.push(rule),
                Err(e) => self.note(format!("rules[{index}]: {e}; record dropped")),
            }
        }
        out
    }

    fn rule(&mut self, obj: &Map<String, Value>, index: usize) -> RecordResult<TaxRule> {
        let id = match obj.get("id") {
            None | Some(Value::Null) => format!("rule_{index}"),
            Some(Value::String(s)) if s.trim().is_empty() => format!("rule_{index}"),
            Some(Value::String(s)) => s.trim().to_string(),
            Some(Value::Number(n)) => n.to_string(),
            Some(_) => return Err(RecordError::InvalidName { field: "id" }),
        };

        let tax_type = match obj.get("tax_type") {
            None | Some(Value::Null) => TaxType::Other,
            Some(Value::String(s)) => self.tax_type(s),
            Some(other) => {
                warn!(value = %other, "Non-string tax type, using OTHER");
                TaxType::Other
            }
        };

        Ok(TaxRule {
            name: name(obj, "name")?,
            description: text_or(obj, "description", "")?,
            tax_type,
            conditions: string_list(obj, "conditions")?,
            rate: optional_number(obj, "rate")?,
            effective_date: self.date(obj, "effective_date"),
            expiry_date: self.date(obj, "expiry_date"),
            source_reference: optional_text(obj, "source_reference")?,
            id,
        })
    }
}

fn parse_rate(obj: &Map<String, Value>) -> RecordResult<TaxRate> {
    Ok(TaxRate {
        name: name(obj, "name")?,
        rate: required_number(obj, "rate")?,
        description: optional_text(obj, "description")?,
        conditions: string_list(obj, "conditions")?,
        exemptions: string_list(obj, "exemptions")?,
    })
}

fn parse_bracket(obj: &Map<String, Value>) -> RecordResult<TaxBracket> {
    Ok(TaxBracket {
        min_amount: required_number(obj, "min_amount")?,
        max_amount: optional_number(obj, "max_amount")?,
        rate: required_number(obj, "rate")?,
        fixed_amount: optional_number(obj, "fixed_amount")?,
    })
}

fn parse_deadline(obj: &Map<String, Value>) -> RecordResult<TaxDeadline> {
    Ok(TaxDeadline {
        name: name(obj, "name")?,
        deadline_type: text_or(obj, "deadline_type", "filing")?,
        frequency: text_or(obj, "frequency", "annually")?,
        day_of_period: optional_integer(obj, "day_of_period")?,
        description: optional_text(obj, "description")?,
    })
}

// ============================================================================
// Field coercion
// ============================================================================

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

/// JSON number or numeric string
fn number(value: &Value) -> std::result::Result<f64, ()> {
    match value {
        Value::Number(n) => n.as_f64().ok_or(()),
        Value::String(s) => s.trim().parse::<f64>().map_err(|_| ()),
        _ => Err(()),
    }
    .and_then(|n| if n.is_finite() { Ok(n) } else { Err(()) })
}

fn required_number(obj: &Map<String, Value>, field: &'static str) -> RecordResult<f64> {
    match obj.get(field) {
        None => Ok(0.0),
        Some(value) => number(value).map_err(|_| RecordError::InvalidNumber {
            field,
            value: value.to_string(),
        }),
    }
}

fn optional_number(obj: &Map<String, Value>, field: &'static str) -> RecordResult<Option<f64>> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => number(value)
            .map(Some)
            .map_err(|_| RecordError::InvalidNumber {
                field,
                value: value.to_string(),
            }),
    }
}

fn optional_integer(obj: &Map<String, Value>, field: &'static str) -> RecordResult<Option<i64>> {
    let invalid = |value: &Value| RecordError::InvalidInteger {
        field,
        value: value.to_string(),
    };
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(value @ Value::Number(n)) => match n.as_i64() {
            Some(i) => Ok(Some(i)),
            None => n
                .as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| Some(f as i64))
                .ok_or_else(|| invalid(value)),
        },
        Some(value @ Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| invalid(value)),
        Some(value) => Err(invalid(value)),
    }
}

fn name(obj: &Map<String, Value>, field: &'static str) -> RecordResult<String> {
    match obj.get(field) {
        None => Ok("unknown".to_string()),
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        Some(_) => Err(RecordError::InvalidName { field }),
    }
}

fn optional_text(obj: &Map<String, Value>, field: &'static str) -> RecordResult<Option<String>> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(RecordError::InvalidText { field }),
    }
}

fn text_or(obj: &Map<String, Value>, field: &'static str, default: &str) -> RecordResult<String> {
    Ok(optional_text(obj, field)?.unwrap_or_else(|| default.to_string()))
}

fn string_list(obj: &Map<String, Value>, field: &'static str) -> RecordResult<Vec<String>> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or(RecordError::InvalidList { field })
            })
            .collect(),
        Some(_) => Err(RecordError::InvalidList { field }),
    }
}

/// Strict `YYYY-MM-DD`
fn parse_iso_date(s: &str) -> Option<NaiveDate> {
    let bytes = s.as_bytes();
    let shape_ok = bytes.len() == 10
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| i == 4 || i == 7 || b.is_ascii_digit());
    if !shape_ok {
        return None;
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

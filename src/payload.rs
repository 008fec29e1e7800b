//! Payload module.
//! Checks a submitted configuration (flat JSON object keyed by form field name)
//! against a composed field set, and builds the default payload for a new site.
//! Every violation is collected; the caller decides how to present them.

use reqwest::Url;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::field::{FieldDescriptor, FieldKind, FieldSet};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldViolation {
    #[error("{key}: value is required")]
    Missing { key: String },

    #[error("{key}: expected {expected}")]
    WrongType { key: String, expected: &'static str },

    #[error("{key}: '{value}' is not a number")]
    NotANumber { key: String, value: String },

    #[error("{key}: {value} is outside {min}..={max}")]
    OutOfRange {
        key: String,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("{key}: '{value}' is not an http(s) url")]
    InvalidUrl { key: String, value: String },
}

pub fn validate(fields: &FieldSet, payload: &Map<String, Value>) -> Result<(), Vec<FieldViolation>> {
    let mut violations = Vec::new();
    for field in fields {
        check_field(field, payload.get(field.key), &mut violations);
    }
    if violations.is_empty() {
        Ok(())
    } else {
        Err(violations)
    }
}

pub fn defaults(fields: &FieldSet) -> Map<String, Value> {
    fields
        .iter()
        .map(|field| (field.key.to_string(), default_value(field)))
        .collect()
}

// *************** Internal Functions ***************

fn default_value(field: &FieldDescriptor) -> Value {
    match (field.kind, field.default) {
        (FieldKind::Number { .. }, Some(raw)) => raw
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(raw.to_string())),
        (FieldKind::Number { .. }, None) => Value::Null,
        (FieldKind::UrlList, raw) => Value::Array(
            raw.unwrap_or("")
                .lines()
                .filter(|line| !line.trim().is_empty())
                .map(|line| Value::String(line.trim().to_string()))
                .collect(),
        ),
        (_, raw) => Value::String(raw.unwrap_or("").to_string()),
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.iter().all(is_blank),
        _ => false,
    }
}

fn check_field(field: &FieldDescriptor, value: Option<&Value>, violations: &mut Vec<FieldViolation>) {
    let key = field.key.to_string();
    let value = match value {
        Some(value) if !is_blank(value) => value,
        _ => {
            if field.required {
                violations.push(FieldViolation::Missing { key });
            }
            return;
        }
    };

    match field.kind {
        FieldKind::Text | FieldKind::Password => {
            if !value.is_string() {
                violations.push(FieldViolation::WrongType { key, expected: "a string" });
            }
        }
        FieldKind::Number { min, max } => {
            let number = match value {
                Value::Number(n) => n.as_i64(),
                Value::String(s) => s.trim().parse::<i64>().ok(),
                _ => None,
            };
            match number {
                Some(n) if n < min || n > max => violations.push(FieldViolation::OutOfRange {
                    key,
                    value: n,
                    min,
                    max,
                }),
                Some(_) => {}
                None => violations.push(FieldViolation::NotANumber {
                    key,
                    value: value_text(value),
                }),
            }
        }
        FieldKind::Url => match value.as_str() {
            Some(raw) => check_url(&key, raw, violations),
            None => violations.push(FieldViolation::WrongType { key, expected: "a url string" }),
        },
        FieldKind::UrlList => {
            let entries: Vec<&str> = match value {
                Value::String(s) => s.lines().collect(),
                Value::Array(items) if items.iter().all(Value::is_string) => {
                    items.iter().filter_map(Value::as_str).collect()
                }
                _ => {
                    violations.push(FieldViolation::WrongType {
                        key,
                        expected: "a list of url strings",
                    });
                    return;
                }
            };
            for entry in entries.into_iter().filter(|e| !e.trim().is_empty()) {
                check_url(&key, entry, violations);
            }
        }
    }
}

fn check_url(key: &str, raw: &str, violations: &mut Vec<FieldViolation>) {
    let valid = Url::parse(raw.trim())
        .map(|url| matches!(url.scheme(), "http" | "https") && url.has_host())
        .unwrap_or(false);
    if !valid {
        violations.push(FieldViolation::InvalidUrl {
            key: key.to_string(),
            value: raw.to_string(),
        });
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A typed parameter value extracted by the NLU service.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ParamValue {
    Text(String),
    Number(f64),
    Date(NaiveDate),
    Null,
}

impl ParamValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Non-empty string content, if this is a text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) if !value.trim().is_empty() => Some(value.as_str()),
            _ => None,
        }
    }

    /// Calendar date carried by the value. Accepts `YYYY-MM-DD` and RFC 3339
    /// date-times; for the latter the date in the value's own offset is kept.
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Self::Date(date) => Some(*date),
            Self::Text(raw) => parse_date(raw),
            Self::Number(_) | Self::Null => None,
        }
    }

    /// Maps a JSON parameter as returned by the NLU service.
    ///
    /// Lists collapse to their first element and structured date values
    /// (`date_time`, `startDate`, `startDateTime`) collapse to their string.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(flag) => Self::Text(flag.to_string()),
            Value::Number(number) => number.as_f64().map(Self::Number).unwrap_or(Self::Null),
            Value::String(raw) if raw.trim().is_empty() => Self::Null,
            Value::String(raw) => Self::Text(raw.clone()),
            Value::Array(items) => items.first().map(Self::from_json).unwrap_or(Self::Null),
            Value::Object(fields) => ["date_time", "startDate", "startDateTime"]
                .iter()
                .find_map(|key| fields.get(*key).and_then(Value::as_str))
                .filter(|raw| !raw.trim().is_empty())
                .map(|raw| Self::Text(raw.to_string()))
                .unwrap_or(Self::Null),
        }
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(trimmed).ok().map(|dt| dt.date_naive()))
}

/// Structured NLU output for one inbound message.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct IntentResult {
    pub intent_name: String,
    pub parameters: BTreeMap<String, ParamValue>,
    pub default_text: String,
}

impl IntentResult {
    pub fn new(intent_name: impl Into<String>, default_text: impl Into<String>) -> Self {
        Self {
            intent_name: intent_name.into(),
            parameters: BTreeMap::new(),
            default_text: default_text.into(),
        }
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: ParamValue) -> Self {
        self.parameters.insert(name.into(), value);
        self
    }

    /// Present, non-null parameter.
    pub fn parameter(&self, name: &str) -> Option<&ParamValue> {
        self.parameters.get(name).filter(|value| !value.is_null())
    }

    pub fn text_parameter(&self, name: &str) -> Option<&str> {
        self.parameter(name).and_then(ParamValue::as_text)
    }
}

//! Input decoding and field validation shared by every handler.
//!
//! Handlers decode their input into a struct whose fields are all optional,
//! then pull required fields through [`require`] / [`require_text`] so a
//! missing key surfaces as `missing_field` rather than a generic decode error.
//! Enumerations arrive as strings and are checked here against their allowed
//! set, which is echoed back to the model on failure.

use crate::ToolError;
use itinera_core::{CATEGORIES, ItemStatus, Suitability};
use serde::de::DeserializeOwned;
use serde_json::Value;

pub const NOTE_MODES: [&str; 2] = ["append", "replace"];

/// Decode a tool input. A `null` input is treated as an empty object.
pub fn parse_input<T: DeserializeOwned>(input: &Value) -> Result<T, ToolError> {
    let value = match input {
        Value::Null => Value::Object(Default::default()),
        Value::Object(_) => input.clone(),
        other => {
            return Err(ToolError::InvalidInput(format!(
                "expected a JSON object, got {}",
                type_name(other)
            )));
        }
    };
    serde_json::from_value(value).map_err(|e| ToolError::InvalidInput(e.to_string()))
}

pub fn require<T>(value: Option<T>, field: &'static str) -> Result<T, ToolError> {
    value.ok_or(ToolError::MissingField(field))
}

/// Like [`require`] but also rejects blank strings.
pub fn require_text(value: Option<String>, field: &'static str) -> Result<String, ToolError> {
    match value {
        Some(s) if !s.trim().is_empty() => Ok(s),
        _ => Err(ToolError::MissingField(field)),
    }
}

pub fn parse_status(raw: &str) -> Result<ItemStatus, ToolError> {
    ItemStatus::parse(raw)
        .ok_or_else(|| ToolError::invalid_value("status", raw, &ItemStatus::names()))
}

pub fn parse_suitability(field: &str, raw: &str) -> Result<Suitability, ToolError> {
    Suitability::parse(raw)
        .ok_or_else(|| ToolError::invalid_value(field, raw, &Suitability::names()))
}

pub fn parse_category(raw: &str) -> Result<String, ToolError> {
    if CATEGORIES.contains(&raw) {
        Ok(raw.to_string())
    } else {
        Err(ToolError::invalid_value("cat", raw, &CATEGORIES))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteMode {
    Append,
    Replace,
}

impl NoteMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoteMode::Append => "append",
            NoteMode::Replace => "replace",
        }
    }
}

pub fn parse_note_mode(raw: Option<&str>) -> Result<NoteMode, ToolError> {
    match raw {
        None | Some("append") => Ok(NoteMode::Append),
        Some("replace") => Ok(NoteMode::Replace),
        Some(other) => Err(ToolError::invalid_value("mode", other, &NOTE_MODES)),
    }
}

/// Latitude and longitude only travel as a pair.
pub fn coordinate_pair(
    lat: Option<f64>,
    lng: Option<f64>,
) -> Result<Option<(f64, f64)>, ToolError> {
    match (lat, lng) {
        (Some(lat), Some(lng)) => {
            if !(-90.0..=90.0).contains(&lat) {
                return Err(ToolError::InvalidInput(format!(
                    "lat must be within -90..=90, got {lat}"
                )));
            }
            if !(-180.0..=180.0).contains(&lng) {
                return Err(ToolError::InvalidInput(format!(
                    "lng must be within -180..=180, got {lng}"
                )));
            }
            Ok(Some((lat, lng)))
        }
        (None, None) => Ok(None),
        _ => Err(ToolError::InvalidInput(
            "lat and lng must be given together".to_string(),
        )),
    }
}

pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

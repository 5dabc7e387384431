use serde_json::{Value, json};
use thiserror::Error;

/// A dispatcher-level failure. Always rendered back to the model as data via
/// [`ToolError::to_output`]; never propagated as a fault.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ToolError {
    #[error("{what} not found: {key}")]
    NotFound {
        what: &'static str,
        key: String,
        /// Sibling names the caller could have meant (option lookups only).
        candidates: Vec<String>,
    },
    #[error("missing required field '{0}'")]
    MissingField(&'static str),
    #[error("invalid value '{value}' for '{field}'")]
    InvalidValue {
        field: String,
        value: String,
        allowed: Vec<String>,
    },
    #[error("unsupported field '{field}'")]
    UnknownField { field: String, allowed: Vec<String> },
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    #[error("tool execution failed: {0}")]
    Execution(String),
}

impl ToolError {
    pub fn not_found(what: &'static str, key: impl Into<String>) -> Self {
        Self::NotFound {
            what,
            key: key.into(),
            candidates: Vec::new(),
        }
    }

    pub fn option_not_found(partial: impl Into<String>, candidates: Vec<String>) -> Self {
        Self::NotFound {
            what: "option",
            key: partial.into(),
            candidates,
        }
    }

    pub fn invalid_value(
        field: impl Into<String>,
        value: impl Into<String>,
        allowed: &[&str],
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.into(),
            allowed: allowed.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ToolError::NotFound { .. } => "not_found",
            ToolError::MissingField(_) => "missing_field",
            ToolError::InvalidValue { .. } => "invalid_value",
            ToolError::UnknownField { .. } => "unknown_field",
            ToolError::InvalidInput(_) => "invalid_input",
            ToolError::UnknownTool(_) => "unknown_tool",
            ToolError::Execution(_) => "execution",
        }
    }

    pub fn to_output(&self) -> Value {
        let mut out = json!({
            "ok": false,
            "error": self.to_string(),
            "kind": self.kind(),
        });
        match self {
            ToolError::NotFound { candidates, .. } if !candidates.is_empty() => {
                out["candidates"] = json!(candidates);
            }
            ToolError::InvalidValue { allowed, .. } | ToolError::UnknownField { allowed, .. } => {
                out["allowed"] = json!(allowed);
            }
            _ => {}
        }
        out
    }
}

//! Conversion between model tool calls and dispatcher outcomes.

use itinera_core::ChatMessage;
use itinera_tools::ToolOutcome;
use serde_json::Value;

/// Default cap on characters of one tool result fed back to the model.
pub const MAX_TOOL_OUTPUT_CHARS: usize = 25_000;

/// Wrap a dispatcher outcome as the transcript entry answering `tool_call_id`.
/// The content is the outcome's JSON, truncated to `max_chars`.
pub fn outcome_to_message(
    tool_call_id: &str,
    outcome: &ToolOutcome,
    max_chars: usize,
) -> ChatMessage {
    let raw = serde_json::to_string(&outcome.output).unwrap_or_else(|_| outcome.output.to_string());
    ChatMessage::Tool {
        tool_call_id: tool_call_id.to_string(),
        content: truncate_output(&raw, max_chars),
        is_error: !outcome.success,
    }
}

/// Truncate to at most `max_chars` bytes on a UTF-8 boundary, appending a notice.
pub fn truncate_output(text: &str, max_chars: usize) -> String {
    if text.len() <= max_chars {
        return text.to_string();
    }
    let boundary = text
        .char_indices()
        .take_while(|(i, c)| i + c.len_utf8() <= max_chars.saturating_sub(80))
        .last()
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(0);
    format!(
        "{}\n\n[Output truncated: showing {boundary}/{} bytes. Use a narrower query.]",
        &text[..boundary],
        text.len()
    )
}

/// Short `key=value` rendering of tool arguments for records and logs.
pub fn summarize_args(args: &Value) -> String {
    let Some(obj) = args.as_object() else {
        return "()".to_string();
    };
    let parts: Vec<String> = obj
        .iter()
        .map(|(key, val)| match val {
            Value::String(s) if s.chars().count() > 60 => {
                let head: String = s.chars().take(57).collect();
                format!("{key}=\"{head}...\"")
            }
            Value::String(s) => format!("{key}=\"{s}\""),
            Value::Number(n) => format!("{key}={n}"),
            Value::Bool(b) => format!("{key}={b}"),
            _ => format!("{key}=..."),
        })
        .collect();
    if parts.is_empty() {
        return "()".to_string();
    }
    parts.join(", ")
}

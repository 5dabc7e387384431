use anyhow::Result;
use chrono::{DateTime, NaiveDateTime, Utc};
use itinera_core::{
    ANTHROPIC_VERSION, ChatMessage, ChatRequest, LlmConfig, LlmResponse, LlmToolCall, TokenUsage,
};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::RETRY_AFTER;
use serde_json::{Value, json};
use std::thread;
use std::time::Duration;
use thiserror::Error;

/// Base delay for network/transport error retries (1s, 2s, 4s exponential backoff).
const NETWORK_RETRY_BASE_MS: u64 = 1000;

/// The remote model boundary: one transcript in, one reply out.
pub trait LlmClient {
    /// Send the transcript with tool schemas and return either final text or
    /// a batch of tool calls.
    fn complete_chat(&self, req: &ChatRequest) -> Result<LlmResponse>;
}

/// Transport-level failure classes. Auth is kept apart so callers can show a
/// different message for credentials problems.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("API error (HTTP {status}): {detail}")]
    Api { status: u16, detail: String },
    #[error("network error: {0}")]
    Transport(String),
    #[error("unexpected response payload: {0}")]
    Payload(String),
}

impl LlmError {
    pub fn is_auth(&self) -> bool {
        match self {
            LlmError::Auth(_) => true,
            LlmError::Api { status, .. } => *status == 401 || *status == 403,
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnthropicClient {
    cfg: LlmConfig,
    client: Client,
}

impl AnthropicClient {
    pub fn new(cfg: LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_seconds))
            .build()?;
        Ok(Self { cfg, client })
    }

    fn complete_chat_inner(&self, req: &ChatRequest, api_key: &str) -> Result<LlmResponse> {
        let payload = build_chat_payload(req);

        let mut last_err: Option<LlmError> = None;
        let mut attempt: u8 = 0;
        while attempt <= self.cfg.max_retries {
            let response = self
                .client
                .post(&self.cfg.endpoint)
                .header("x-api-key", api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&payload)
                .send();

            match response {
                Ok(resp) => {
                    let status = resp.status();
                    let retry_after = parse_retry_after_seconds(resp.headers().get(RETRY_AFTER));
                    let body = resp
                        .text()
                        .map_err(|e| LlmError::Transport(e.to_string()))?;
                    if status.is_success() {
                        return Ok(parse_messages_payload(&body)?);
                    }
                    let err = classify_api_error(status, &body);
                    if should_retry_status(status) && attempt < self.cfg.max_retries {
                        last_err = Some(err);
                        thread::sleep(retry_delay_ms(self.cfg.retry_base_ms, attempt, retry_after));
                        attempt = attempt.saturating_add(1);
                        continue;
                    }
                    return Err(err.into());
                }
                Err(e) => {
                    let err = LlmError::Transport(describe_transport_error(&e));
                    if should_retry_transport_error(&e) && attempt < self.cfg.max_retries {
                        last_err = Some(err);
                        thread::sleep(retry_delay_ms(NETWORK_RETRY_BASE_MS, attempt, None));
                        attempt = attempt.saturating_add(1);
                        continue;
                    }
                    return Err(err.into());
                }
            }
        }
        Err(last_err
            .unwrap_or_else(|| LlmError::Transport("chat request failed".to_string()))
            .into())
    }
}

impl LlmClient for AnthropicClient {
    fn complete_chat(&self, req: &ChatRequest) -> Result<LlmResponse> {
        let key = self.cfg.api_key().ok_or_else(|| {
            LlmError::Auth(format!(
                "{} not set and llm.api_key is empty",
                self.cfg.api_key_env
            ))
        })?;
        self.complete_chat_inner(req, &key)
    }
}

fn build_chat_payload(req: &ChatRequest) -> Value {
    let mut payload = json!({
        "model": req.model,
        "max_tokens": req.max_tokens,
        "messages": to_wire_messages(&req.messages),
    });
    if !req.system.is_empty() {
        payload["system"] = json!(req.system);
    }
    if !req.tools.is_empty() {
        payload["tools"] = serde_json::to_value(&req.tools).unwrap_or_else(|_| json!([]));
    }
    if let Some(temperature) = req.temperature {
        payload["temperature"] = json!(temperature);
    }
    payload
}

/// Map the transcript onto Messages API turns. Consecutive tool results are
/// folded into a single user turn of `tool_result` blocks.
fn to_wire_messages(messages: &[ChatMessage]) -> Vec<Value> {
    let mut out: Vec<Value> = Vec::with_capacity(messages.len());
    for message in messages {
        match message {
            ChatMessage::User { content } => {
                out.push(json!({"role": "user", "content": content}));
            }
            ChatMessage::Assistant {
                content,
                tool_calls,
            } => {
                let text = content.as_deref().unwrap_or_default();
                if tool_calls.is_empty() {
                    out.push(json!({"role": "assistant", "content": text}));
                    continue;
                }
                let mut blocks = Vec::with_capacity(tool_calls.len() + 1);
                if !text.is_empty() {
                    blocks.push(json!({"type": "text", "text": text}));
                }
                for call in tool_calls {
                    let input = if call.input.is_object() {
                        call.input.clone()
                    } else {
                        json!({})
                    };
                    blocks.push(json!({
                        "type": "tool_use",
                        "id": call.id,
                        "name": call.name,
                        "input": input,
                    }));
                }
                out.push(json!({"role": "assistant", "content": blocks}));
            }
            ChatMessage::Tool {
                tool_call_id,
                content,
                is_error,
            } => {
                let mut block = json!({
                    "type": "tool_result",
                    "tool_use_id": tool_call_id,
                    "content": content,
                });
                if *is_error {
                    block["is_error"] = json!(true);
                }
                let folds_into_last = out.last().is_some_and(|last| {
                    last["role"] == "user"
                        && last["content"]
                            .as_array()
                            .and_then(|blocks| blocks.first())
                            .is_some_and(|b| b["type"] == "tool_result")
                });
                if folds_into_last
                    && let Some(blocks) = out
                        .last_mut()
                        .and_then(|last| last["content"].as_array_mut())
                {
                    blocks.push(block);
                } else {
                    out.push(json!({"role": "user", "content": [block]}));
                }
            }
        }
    }
    out
}

fn parse_messages_payload(body: &str) -> std::result::Result<LlmResponse, LlmError> {
    let value: Value =
        serde_json::from_str(body).map_err(|e| LlmError::Payload(e.to_string()))?;
    let blocks = value
        .get("content")
        .and_then(|v| v.as_array())
        .ok_or_else(|| LlmError::Payload("missing content array".to_string()))?;

    let mut texts = Vec::new();
    let mut tool_calls = Vec::new();
    for block in blocks {
        match block.get("type").and_then(|t| t.as_str()) {
            Some("text") => {
                if let Some(text) = block.get("text").and_then(|t| t.as_str()) {
                    texts.push(text.to_string());
                }
            }
            Some("tool_use") => {
                let id = block.get("id").and_then(|v| v.as_str()).unwrap_or_default();
                let name = block.get("name").and_then(|v| v.as_str()).unwrap_or_default();
                if id.is_empty() || name.is_empty() {
                    return Err(LlmError::Payload("tool_use block without id or name".to_string()));
                }
                tool_calls.push(LlmToolCall {
                    id: id.to_string(),
                    name: name.to_string(),
                    input: block.get("input").cloned().unwrap_or_else(|| json!({})),
                });
            }
            _ => {}
        }
    }

    let finish_reason = value
        .get("stop_reason")
        .and_then(|v| v.as_str())
        .unwrap_or("end_turn")
        .to_string();
    let usage = value
        .get("usage")
        .map(|u| TokenUsage {
            input_tokens: u.get("input_tokens").and_then(|v| v.as_u64()).unwrap_or(0),
            output_tokens: u.get("output_tokens").and_then(|v| v.as_u64()).unwrap_or(0),
        })
        .unwrap_or_default();

    Ok(LlmResponse {
        text: texts.join("\n"),
        finish_reason,
        tool_calls,
        usage,
    })
}

fn classify_api_error(status: StatusCode, body: &str) -> LlmError {
    let detail = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message").or(Some(e)))
                .and_then(|m| m.as_str().map(ToString::to_string))
        })
        .unwrap_or_else(|| body.chars().take(200).collect());

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            LlmError::Auth(format!("HTTP {}: {detail}", status.as_u16()))
        }
        _ => LlmError::Api {
            status: status.as_u16(),
            detail,
        },
    }
}

fn describe_transport_error(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        format!("request timed out ({err}); consider raising llm.timeout_seconds")
    } else if err.is_connect() {
        format!("could not reach the configured endpoint ({err})")
    } else {
        err.to_string()
    }
}

/// 529 is the provider's "overloaded" status.
fn should_retry_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 503 | 529)
}

fn should_retry_transport_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect()
}

fn parse_retry_after_seconds(header: Option<&reqwest::header::HeaderValue>) -> Option<u64> {
    let value = header?.to_str().ok()?.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(seconds);
    }
    parse_retry_after_http_date(value)
}

fn parse_retry_after_http_date(value: &str) -> Option<u64> {
    let retry_at = DateTime::parse_from_rfc2822(value)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(value, "%a, %d %b %Y %H:%M:%S GMT")
                .map(|naive| DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc))
        })
        .ok()?;
    let delta = retry_at.signed_duration_since(Utc::now()).num_seconds();
    Some(delta.max(0) as u64)
}

fn retry_delay_ms(base_ms: u64, attempt: u8, retry_after_seconds: Option<u64>) -> Duration {
    if let Some(seconds) = retry_after_seconds {
        return Duration::from_millis(seconds.saturating_mul(1000));
    }
    let exponential = base_ms.saturating_mul(2_u64.saturating_pow(u32::from(attempt)));
    Duration::from_millis(exponential.max(base_ms.max(100)))
}

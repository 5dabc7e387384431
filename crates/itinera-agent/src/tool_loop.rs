//! Bounded tool-use conversation loop.
//!
//! Each round sends the transcript, the system prompt and the tool catalog to
//! the model. A reply without tool calls ends the loop; a reply with tool calls
//! is executed call by call, in order, against one [`ExecutionContext`], and
//! the results are appended before the next round. The loop stops on:
//! - a text-only reply
//! - the round ceiling
//! - a transport fault

use chrono::{DateTime, FixedOffset};
use itinera_core::{
    AppConfig, ChatMessage, ChatRequest, DEFAULT_MODEL, Document, EventKind, HistoryTurn,
    LlmToolCall, TokenUsage, fixed_offset, now_in,
};
use itinera_llm::{LlmClient, LlmError};
use itinera_tools::{ExecutionContext, ToolRegistry};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use crate::prompt::build_system_prompt;
use crate::tool_bridge::{self, MAX_TOOL_OUTPUT_CHARS};

pub const DEFAULT_MAX_ROUNDS: u32 = 10;
pub const DEFAULT_MAX_TOKENS: u32 = 2048;

/// Reply used when the model produced no text at all.
pub const FALLBACK_REPLY: &str = "처리 중 문제가 발생했어요.";
/// Reply used when the model endpoint rejected our credentials.
pub const AUTH_FAILURE_REPLY: &str = "API 인증에 문제가 있어요. 관리자에게 문의해주세요.";
/// Reply used for every other transport fault.
pub const TRANSPORT_FAILURE_REPLY: &str =
    "API 호출 중 문제가 발생했어요. 잠시 후 다시 시도해주세요.";

/// Callback for loop events; the CLI forwards these to the observer.
pub type EventCallback = Arc<dyn Fn(EventKind) + Send + Sync>;

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
    pub max_rounds: u32,
    pub max_tool_output_chars: usize,
    /// Offset for "today" in the prompt and for revision timestamps.
    pub offset: FixedOffset,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: None,
            max_rounds: DEFAULT_MAX_ROUNDS,
            max_tool_output_chars: MAX_TOOL_OUTPUT_CHARS,
            offset: fixed_offset(9),
        }
    }
}

impl LoopConfig {
    pub fn from_app(cfg: &AppConfig) -> Self {
        Self {
            model: cfg.llm.model.clone(),
            max_tokens: cfg.llm.max_tokens,
            temperature: cfg.llm.temperature,
            max_rounds: cfg.agent_loop.max_rounds,
            max_tool_output_chars: cfg.agent_loop.max_tool_output_chars,
            offset: fixed_offset(cfg.clock.utc_offset_hours),
        }
    }
}

/// Record of a single tool call made during the loop.
#[derive(Debug, Clone)]
pub struct ToolCallRecord {
    pub tool_name: String,
    pub tool_call_id: String,
    pub args_summary: String,
    pub success: bool,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Completed,
    MaxRounds,
    TransportError,
}

impl FinishReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FinishReason::Completed => "completed",
            FinishReason::MaxRounds => "max_rounds",
            FinishReason::TransportError => "transport_error",
        }
    }
}

impl fmt::Display for FinishReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What one conversation produced. `document` is present exactly when
/// `mutated` is true.
#[derive(Debug, Clone)]
pub struct ConversationOutcome {
    pub text: String,
    pub mutated: bool,
    pub document: Option<Document>,
    /// Operator-facing transport error, when the loop was cut short.
    pub error: Option<String>,
    pub rounds: u32,
    pub tool_calls: Vec<ToolCallRecord>,
    pub finish_reason: FinishReason,
    pub usage: TokenUsage,
}

pub struct ConversationLoop<'a> {
    llm: &'a dyn LlmClient,
    registry: &'a ToolRegistry,
    config: LoopConfig,
    event_cb: Option<EventCallback>,
}

struct Progress {
    rounds: u32,
    tool_calls: Vec<ToolCallRecord>,
    usage: TokenUsage,
}

impl<'a> ConversationLoop<'a> {
    pub fn new(llm: &'a dyn LlmClient, registry: &'a ToolRegistry, config: LoopConfig) -> Self {
        Self {
            llm,
            registry,
            config,
            event_cb: None,
        }
    }

    pub fn set_event_callback(&mut self, cb: EventCallback) {
        self.event_cb = Some(cb);
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    /// Run one conversation against a private copy of `document`.
    pub fn run(
        &self,
        document: &Document,
        instruction: &str,
        history: &[HistoryTurn],
    ) -> ConversationOutcome {
        self.run_at(document, instruction, history, now_in(self.config.offset))
    }

    /// [`run`](Self::run) with an explicit "now" for the prompt.
    pub fn run_at(
        &self,
        document: &Document,
        instruction: &str,
        history: &[HistoryTurn],
        now: DateTime<FixedOffset>,
    ) -> ConversationOutcome {
        self.emit(EventKind::ConversationStartedV1 {
            instruction: instruction.to_string(),
            history_turns: history.len(),
        });

        // Computed once; later rounds do not see in-loop mutations here.
        let system = build_system_prompt(document, now);
        let mut messages: Vec<ChatMessage> =
            history.iter().filter_map(HistoryTurn::to_message).collect();
        messages.push(ChatMessage::User {
            content: instruction.to_string(),
        });

        let mut ctx = ExecutionContext::with_offset(document, self.config.offset);
        let mut progress = Progress {
            rounds: 0,
            tool_calls: Vec::new(),
            usage: TokenUsage::default(),
        };
        let mut last_text = String::new();

        while progress.rounds < self.config.max_rounds {
            progress.rounds += 1;
            self.emit(EventKind::RoundStartedV1 {
                round: progress.rounds,
            });

            let request = self.build_request(&system, &messages);
            let response = match self.llm.complete_chat(&request) {
                Ok(response) => response,
                Err(err) => return self.transport_failure(&err, progress),
            };
            progress.usage.input_tokens += response.usage.input_tokens;
            progress.usage.output_tokens += response.usage.output_tokens;
            if !response.text.trim().is_empty() {
                last_text = response.text.clone();
            }

            if response.tool_calls.is_empty() {
                let text = if response.text.trim().is_empty() {
                    FALLBACK_REPLY.to_string()
                } else {
                    response.text
                };
                return self.finish(ctx, text, FinishReason::Completed, progress);
            }

            messages.push(ChatMessage::Assistant {
                content: (!response.text.is_empty()).then(|| response.text.clone()),
                tool_calls: response.tool_calls.clone(),
            });
            for call in &response.tool_calls {
                let (record, message) = self.execute_tool_call(&mut ctx, call);
                progress.tool_calls.push(record);
                messages.push(message);
            }
        }

        let text = if last_text.is_empty() {
            FALLBACK_REPLY.to_string()
        } else {
            last_text
        };
        self.finish(ctx, text, FinishReason::MaxRounds, progress)
    }

    fn build_request(&self, system: &str, messages: &[ChatMessage]) -> ChatRequest {
        ChatRequest {
            model: self.config.model.clone(),
            system: system.to_string(),
            messages: messages.to_vec(),
            tools: self.registry.definitions().to_vec(),
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        }
    }

    fn execute_tool_call(
        &self,
        ctx: &mut ExecutionContext,
        call: &LlmToolCall,
    ) -> (ToolCallRecord, ChatMessage) {
        let started = Instant::now();
        let outcome = self.registry.dispatch(ctx, &call.name, &call.input);
        let duration_ms = started.elapsed().as_millis() as u64;

        self.emit(EventKind::ToolExecutedV1 {
            call_id: call.id.clone(),
            tool_name: call.name.clone(),
            success: outcome.success,
            duration_ms,
        });
        if outcome.success && !self.registry.is_read_only(&call.name) {
            self.emit(EventKind::DocumentMutatedV1 {
                tool_name: call.name.clone(),
                update_note: ctx.document().meta.update_note.clone(),
            });
        }

        let record = ToolCallRecord {
            tool_name: call.name.clone(),
            tool_call_id: call.id.clone(),
            args_summary: tool_bridge::summarize_args(&call.input),
            success: outcome.success,
            duration_ms,
        };
        let message =
            tool_bridge::outcome_to_message(&call.id, &outcome, self.config.max_tool_output_chars);
        (record, message)
    }

    fn finish(
        &self,
        ctx: ExecutionContext,
        text: String,
        finish_reason: FinishReason,
        progress: Progress,
    ) -> ConversationOutcome {
        let document = ctx.into_mutation();
        let mutated = document.is_some();
        self.emit(EventKind::ConversationFinishedV1 {
            rounds: progress.rounds,
            mutated,
            finish_reason: finish_reason.to_string(),
        });
        ConversationOutcome {
            text,
            mutated,
            document,
            error: None,
            rounds: progress.rounds,
            tool_calls: progress.tool_calls,
            finish_reason,
            usage: progress.usage,
        }
    }

    /// Transport faults end the loop and discard every in-loop mutation.
    fn transport_failure(&self, err: &anyhow::Error, progress: Progress) -> ConversationOutcome {
        let auth = err
            .downcast_ref::<LlmError>()
            .is_some_and(LlmError::is_auth);
        let detail = format!("{err:#}");
        self.emit(EventKind::TransportFailedV1 {
            auth,
            error: detail.clone(),
        });
        self.emit(EventKind::ConversationFinishedV1 {
            rounds: progress.rounds,
            mutated: false,
            finish_reason: FinishReason::TransportError.to_string(),
        });
        ConversationOutcome {
            text: if auth {
                AUTH_FAILURE_REPLY
            } else {
                TRANSPORT_FAILURE_REPLY
            }
            .to_string(),
            mutated: false,
            document: None,
            error: Some(detail),
            rounds: progress.rounds,
            tool_calls: progress.tool_calls,
            finish_reason: FinishReason::TransportError,
            usage: progress.usage,
        }
    }

    fn emit(&self, kind: EventKind) {
        if let Some(cb) = &self.event_cb {
            cb(kind);
        }
    }
}

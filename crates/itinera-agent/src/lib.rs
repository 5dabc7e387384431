pub mod overview;
pub mod prompt;
pub mod tool_bridge;
pub mod tool_loop;

pub use overview::schedule_overview;
pub use prompt::{TripStatus, build_system_prompt};
pub use tool_loop::{
    AUTH_FAILURE_REPLY, ConversationLoop, ConversationOutcome, DEFAULT_MAX_ROUNDS,
    DEFAULT_MAX_TOKENS, EventCallback, FALLBACK_REPLY, FinishReason, LoopConfig,
    TRANSPORT_FAILURE_REPLY, ToolCallRecord,
};

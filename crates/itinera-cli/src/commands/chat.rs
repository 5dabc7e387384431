use anyhow::{Context, Result};
use itinera_agent::{ConversationLoop, ConversationOutcome};
use itinera_core::HistoryTurn;
use itinera_llm::AnthropicClient;
use itinera_tools::ToolRegistry;
use serde_json::json;
use std::fs;
use std::path::Path;

use crate::context::CliContext;
use crate::output::print_json;

pub(crate) fn run_chat(ctx: &CliContext, instruction: &str, history: Option<&Path>) -> Result<()> {
    let history = match history {
        Some(path) => load_history(path)?,
        None => Vec::new(),
    };
    let document = ctx.load_document()?;
    let client = AnthropicClient::new(ctx.config.llm.clone())?;

    let mut agent = ConversationLoop::new(&client, ToolRegistry::standard(), ctx.loop_config());
    agent.set_event_callback(ctx.event_sink());
    let outcome = agent.run(&document, instruction, &history);

    if let Some(error) = &outcome.error {
        ctx.observer.warn_log(&format!("model call failed: {error}"));
    }
    if let Some(updated) = &outcome.document {
        ctx.save_document(updated)?;
    }
    report(ctx, &outcome)
}

fn load_history(path: &Path) -> Result<Vec<HistoryTurn>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read history {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| {
        format!(
            "history {} must be a JSON array of {{role, text}}",
            path.display()
        )
    })
}

fn report(ctx: &CliContext, outcome: &ConversationOutcome) -> Result<()> {
    if ctx.json {
        let calls: Vec<_> = outcome
            .tool_calls
            .iter()
            .map(|c| {
                json!({
                    "tool": c.tool_name,
                    "id": c.tool_call_id,
                    "args": c.args_summary,
                    "success": c.success,
                    "durationMs": c.duration_ms,
                })
            })
            .collect();
        return print_json(&json!({
            "text": outcome.text,
            "mutated": outcome.mutated,
            "rounds": outcome.rounds,
            "finishReason": outcome.finish_reason.as_str(),
            "error": outcome.error,
            "toolCalls": calls,
            "usage": outcome.usage,
        }));
    }
    for call in &outcome.tool_calls {
        ctx.observer.verbose_log(&format!(
            "{} {}({}) {}ms",
            if call.success { "ok  " } else { "fail" },
            call.tool_name,
            call.args_summary,
            call.duration_ms
        ));
    }
    println!("{}", outcome.text);
    if outcome.mutated {
        eprintln!("itinerary saved to {}", ctx.store.path().display());
    }
    Ok(())
}

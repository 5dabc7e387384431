use anyhow::{Context, Result, anyhow};
use itinera_tools::{ExecutionContext, ToolRegistry};
use serde_json::Value;

use crate::context::CliContext;
use crate::output::print_json;

/// Dispatch one operation the same way the conversation loop would, then
/// persist if it changed the itinerary.
pub(crate) fn run_tool(ctx: &CliContext, name: &str, input: &str) -> Result<()> {
    let input: Value =
        serde_json::from_str(input).with_context(|| format!("--input is not valid JSON: {input}"))?;
    let registry = ToolRegistry::standard();
    if registry.get(name).is_none() {
        let known: Vec<&str> = registry.names().collect();
        return Err(anyhow!("unknown operation '{name}' (known: {})", known.join(", ")));
    }

    let document = ctx.load_document()?;
    let offset = ctx.loop_config().offset;
    let mut exec = ExecutionContext::with_offset(&document, offset);
    let outcome = registry.dispatch(&mut exec, name, &input);
    if let Some(updated) = exec.into_mutation() {
        ctx.save_document(&updated)?;
    }

    if ctx.json {
        print_json(&outcome.output)?;
    } else {
        println!("{}", serde_json::to_string_pretty(&outcome.output)?);
    }
    if outcome.success {
        Ok(())
    } else {
        Err(anyhow!("{name} failed"))
    }
}

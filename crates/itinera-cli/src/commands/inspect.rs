use anyhow::{Result, anyhow};
use itinera_agent::schedule_overview;
use itinera_tools::ToolRegistry;
use serde_json::json;

use crate::context::CliContext;
use crate::output::print_json;

pub(crate) fn run_overview(ctx: &CliContext) -> Result<()> {
    let document = ctx.load_document()?;
    let overview = schedule_overview(&document);
    if ctx.json {
        return print_json(&json!({"overview": overview, "items": document.item_count()}));
    }
    println!("{overview}");
    Ok(())
}

pub(crate) fn run_tools(ctx: &CliContext) -> Result<()> {
    let registry = ToolRegistry::standard();
    if ctx.json {
        return print_json(&registry.definitions());
    }
    for def in registry.definitions() {
        let kind = if registry.is_read_only(&def.name) {
            "read "
        } else {
            "write"
        };
        println!("{kind}  {:<18} {}", def.name, def.description);
    }
    Ok(())
}

pub(crate) fn run_check(ctx: &CliContext) -> Result<()> {
    let document = ctx.load_document()?;
    let violations: Vec<String> = document.validate().iter().map(ToString::to_string).collect();
    if ctx.json {
        print_json(&json!({
            "ok": violations.is_empty(),
            "days": document.days.len(),
            "items": document.item_count(),
            "violations": violations,
        }))?;
    } else if violations.is_empty() {
        println!(
            "ok: {} days, {} items",
            document.days.len(),
            document.item_count()
        );
    } else {
        for violation in &violations {
            println!("{violation}");
        }
    }
    if violations.is_empty() {
        Ok(())
    } else {
        Err(anyhow!("{} violation(s)", violations.len()))
    }
}

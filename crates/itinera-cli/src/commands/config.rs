use anyhow::Result;
use itinera_core::AppConfig;
use serde_json::json;

use crate::context::CliContext;
use crate::output::{print_json, redact_config_for_display};

pub(crate) fn run_config(ctx: &CliContext) -> Result<()> {
    let shown = redact_config_for_display(&ctx.config)?;
    if ctx.json {
        return print_json(&json!({
            "config": shown,
            "document": ctx.store.path(),
            "settings": AppConfig::project_settings_path(&ctx.workspace),
            "log": ctx.observer.log_path(),
        }));
    }
    println!("{}", serde_json::to_string_pretty(&shown)?);
    println!("document: {}", ctx.store.path().display());
    println!(
        "settings: {}",
        AppConfig::project_settings_path(&ctx.workspace).display()
    );
    let key = if ctx.config.api_key().is_some() {
        "set"
    } else {
        "missing"
    };
    println!("api key: {key}");
    Ok(())
}

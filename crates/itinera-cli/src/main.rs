use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod context;
mod output;

use commands::chat::run_chat;
use commands::config::run_config;
use commands::inspect::{run_check, run_overview, run_tools};
use commands::tool::run_tool;
use context::CliContext;

#[derive(Parser)]
#[command(name = "itinera")]
#[command(
    about = "Itinerary assistant: edit a trip plan through model-driven tool calls",
    long_about = None
)]
struct Cli {
    /// Emit machine-readable JSON.
    #[arg(long, global = true)]
    json: bool,

    /// Enable verbose logging to stderr.
    #[arg(short = 'v', long = "verbose", global = true)]
    verbose: bool,

    /// Workspace directory holding `.itinera/` (defaults to the current directory).
    #[arg(long, global = true)]
    workspace: Option<PathBuf>,

    /// Itinerary JSON file, overriding `store.document_path`.
    #[arg(long, global = true)]
    document: Option<PathBuf>,

    /// Override the model for this invocation.
    #[arg(long, global = true)]
    model: Option<String>,

    /// Maximum model rounds per conversation.
    #[arg(long = "max-rounds", global = true)]
    max_rounds: Option<u32>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one conversation and save the itinerary if it changed.
    Chat(ChatArgs),
    /// Invoke a single operation directly, without a model.
    Tool(ToolArgs),
    /// Print the schedule overview the model sees.
    Overview,
    /// List the operation catalog.
    Tools,
    /// Validate the itinerary's invariants.
    Check,
    /// Show the effective configuration (API key redacted).
    Config,
}

#[derive(Args)]
struct ChatArgs {
    /// Instruction for the assistant.
    #[arg(required = true, trailing_var_arg = true)]
    instruction: Vec<String>,
    /// JSON file with prior turns: `[{"role":"user","text":"..."}, ...]`.
    #[arg(long)]
    history: Option<PathBuf>,
}

#[derive(Args)]
struct ToolArgs {
    /// Operation name, e.g. `get_schedule`.
    name: String,
    /// Operation input as a JSON object.
    #[arg(long, default_value = "{}")]
    input: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let workspace = match &cli.workspace {
        Some(path) => path.clone(),
        None => std::env::current_dir()?,
    };
    let ctx = CliContext::load(
        &workspace,
        context::Overrides {
            document: cli.document.clone(),
            model: cli.model.clone(),
            max_rounds: cli.max_rounds,
        },
        cli.verbose,
        cli.json,
    )?;

    match cli.command {
        Commands::Chat(args) => {
            run_chat(&ctx, &args.instruction.join(" "), args.history.as_deref())
        }
        Commands::Tool(args) => run_tool(&ctx, &args.name, &args.input),
        Commands::Overview => run_overview(&ctx),
        Commands::Tools => run_tools(&ctx),
        Commands::Check => run_check(&ctx),
        Commands::Config => run_config(&ctx),
    }
}

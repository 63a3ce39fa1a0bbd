use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use fluxo_engine::{FlowDefinition, Orchestrator};
use fluxo_steps::create_default_registry;

#[derive(Parser)]
#[command(name = "fluxo")]
#[command(version, about = "Fluxo Command Line Tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a flow definition against an optional input payload
    /// Examples:
    ///     fluxo run flows/checkout.json
    ///     fluxo run flows/checkout.json --input payload.json
    ///     fluxo run flows/checkout.json --trace
    #[command(verbatim_doc_comment)]
    Run {
        /// Path to the flow definition JSON
        flow: PathBuf,

        /// Path to a JSON file with the input payload
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Print the execution trace to stderr
        #[arg(short, long)]
        trace: bool,
    },
    /// Parse and validate a flow definition without executing it
    /// Example:
    ///     fluxo validate flows/checkout.json
    #[command(verbatim_doc_comment)]
    Validate {
        /// Path to the flow definition JSON
        flow: PathBuf,
    },
}

fn load_flow(path: &PathBuf) -> Result<FlowDefinition> {
    let source = fs::read_to_string(path)
        .context(format!("Failed to read flow file: {:?}", path))?;
    FlowDefinition::from_str(&source)
        .map_err(|e| anyhow::anyhow!("Failed to parse flow {:?}: {}", path, e))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run { flow, input, trace } => {
            let definition = load_flow(&flow)?;
            let input = match input {
                Some(path) => {
                    let content = fs::read_to_string(&path)
                        .context(format!("Failed to read input file: {:?}", path))?;
                    serde_json::from_str(&content).context("Failed to parse input JSON")?
                }
                None => serde_json::Value::Null,
            };

            let orchestrator = Orchestrator::new(create_default_registry());
            let outcome = orchestrator
                .run(&definition, input)
                .await
                .map_err(|e| anyhow::anyhow!("Flow '{}' failed: {}", definition.name, e))?;

            if trace {
                eprintln!("{}", outcome.trace_rendered);
            }
            println!("{}", serde_json::to_string_pretty(&outcome.output)?);
        }
        Commands::Validate { flow } => {
            let definition = load_flow(&flow)?;
            println!(
                "Flow '{}' is valid ({} root step(s)).",
                definition.name,
                definition.steps.len()
            );
        }
    }

    Ok(())
}

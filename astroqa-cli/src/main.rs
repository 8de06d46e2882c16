//! AstroQA CLI — grounded question answering about NASA missions.
//!
//! Provides single-question, interactive chat, and batch evaluation modes.

mod commands;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// AstroQA: retrieval-grounded answers about NASA missions
#[derive(Parser, Debug)]
#[command(name = "astroqa", version, about, long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// LLM model to use (overrides config)
    #[arg(short, long)]
    model: Option<String>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Ask a single question
    Ask {
        /// The question to answer
        question: String,

        /// Restrict retrieval to one mission ("all" for unrestricted)
        #[arg(long)]
        mission: Option<String>,
    },
    /// Interactive multi-turn chat
    Chat {
        /// Restrict retrieval to one mission ("all" for unrestricted)
        #[arg(long)]
        mission: Option<String>,
    },
    /// Run batch evaluation over a question set
    Eval {
        /// Question set: JSON records or one question per line
        #[arg(short, long)]
        questions: PathBuf,

        /// Where to write the report
        #[arg(short, long, default_value = "batch_evaluation_results.json")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));
    tracing_subscriber::registry().with(stderr_layer).init();

    let mut config = astroqa_core::load_config(cli.config.as_deref())
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;
    if let Some(model) = cli.model {
        config.llm.model = model;
    }

    match cli.command {
        Commands::Ask { question, mission } => {
            commands::run_ask(&config, &question, mission).await
        }
        Commands::Chat { mission } => commands::run_chat(&config, mission).await,
        Commands::Eval { questions, output } => {
            commands::run_eval(&config, &questions, &output).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_structure() {
        Cli::command().debug_assert();
    }
}

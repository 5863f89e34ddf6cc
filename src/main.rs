use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ranklab::config::Config;
use ranklab::letor::{self, SvmRankProcess};
use ranklab::logging;
use ranklab::pipeline;

#[derive(Parser)]
#[command(name = "ranklab", version, about = "Batch query evaluation, feedback, diversification and learning to rank")]
struct Cli {
    /// Config file (default: ranklab.toml in the working directory)
    #[arg(long, global = true, env = "RANKLAB_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Clone, Copy)]
enum Commands {
    /// Evaluate the query file and write a run, with feedback when enabled
    Search,
    /// Print each query's expansion clause without re-running it
    Expand,
    /// Diversify initial or evaluated rankings with PM2 or xQuAD
    Diversify,
    /// Train and apply the learning-to-rank model
    Letor,
}

impl Commands {
    /// Command implied by the config when none is given.
    fn from_config(config: &Config) -> Commands {
        if config.diversity.enabled {
            Commands::Diversify
        } else if config.model.algorithm.trim().eq_ignore_ascii_case("letor") {
            Commands::Letor
        } else {
            Commands::Search
        }
    }
}

fn main() -> Result<()> {
    // 1. Parse CLI args
    let cli = Cli::parse();

    // 2. Load configuration
    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;

    // 3. Initialize logging before anything else writes; stdout carries `expand` output only
    logging::init_logging(&config)?;

    let command = cli.command.unwrap_or_else(|| Commands::from_config(&config));
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "ranklab starting");

    let index = pipeline::load_index(&config)?;

    match command {
        Commands::Search => {
            let n = pipeline::run_search(&config, &index)?;
            tracing::info!(queries = n, run = %config.output.path.display(), "Search finished");
        }
        Commands::Expand => {
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            pipeline::run_expand(&config, &index, &mut out)?;
        }
        Commands::Diversify => {
            let n = pipeline::run_diversify(&config, &index)?;
            tracing::info!(queries = n, run = %config.output.path.display(), "Diversification finished");
        }
        Commands::Letor => {
            let ranker = SvmRankProcess::from_config(&config.letor)?;
            let n = letor::run_letor(&config, &index, &ranker)?;
            tracing::info!(queries = n, run = %config.output.path.display(), "Re-ranking finished");
        }
    }
    Ok(())
}

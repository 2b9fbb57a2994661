mod api;
mod dramatic_moves;
mod indicators;
mod leaderboard;
mod pipeline;
mod quotes;
mod round;
mod scores;
mod storage_utils;
mod symbols;
mod tui;

use anyhow::Result;
use api::RoundResponse;
use clap::{Parser, Subcommand};
use leaderboard::Tab;
use pipeline::Game;
use std::fs::{File, OpenOptions};
use std::io;
use std::sync::{Arc, Mutex};
use storage_utils::AsyncStorageManager;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "chart-swipe", version, about = "Swipe right for bull, left for bear")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Play in the terminal (default)
    Play,
    /// Print a round as JSON
    Round {
        /// Independent rounds to fetch concurrently
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u64).range(1..))]
        count: u64,
    },
    /// Print the leaderboard
    Leaderboard {
        #[arg(long, value_enum, default_value_t = Tab::Streak)]
        by: Tab,
    },
}

/// Logs go to stderr, or to a file while the TUI owns the terminal.
fn init_logging(log_file: Option<File>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    let installed = match log_file {
        Some(file) => builder
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .try_init(),
        None => builder.with_writer(io::stderr).try_init(),
    };
    installed.map_err(|e| anyhow::anyhow!("could not install logger: {}", e))
}

async fn print_rounds(storage: &AsyncStorageManager, count: usize) -> Result<()> {
    let responses = match Game::load(storage).await {
        Ok(game) => game.round_responses(count).await,
        Err(e) => vec![RoundResponse::from_result(Err(e))],
    };

    let failed = responses.iter().any(|r| r.status() != 200);
    let json = match responses.as_slice() {
        [single] => serde_json::to_string_pretty(single)?,
        many => serde_json::to_string_pretty(many)?,
    };
    println!("{}", json);

    if failed {
        std::process::exit(1);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let storage = AsyncStorageManager::new_relative("storage").await?;

    match cli.command.unwrap_or(Command::Play) {
        Command::Play => {
            let log_file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(storage.base_dir.join("chart-swipe.log"))?;
            init_logging(Some(log_file))?;

            let game = Arc::new(Game::load(&storage).await?);
            tui::run_tui(game, storage).await
        }
        Command::Round { count } => {
            init_logging(None)?;
            print_rounds(&storage, count as usize).await
        }
        Command::Leaderboard { by } => {
            init_logging(None)?;
            leaderboard::run(by, &storage).await
        }
    }
}

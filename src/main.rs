//! Codewatch - A Matrix bot announcing game redemption codes.
//!
//! # Overview
//!
//! Codewatch polls public code sources for Genshin Impact, Honkai: Star Rail,
//! Zenless Zone Zero and Honkai Impact 3rd. New codes are posted in every
//! Matrix room that subscribed with `enablefetch`, and anyone can list the
//! active codes of a game on demand.
//!
//! # Configuration
//!
//! Create a `config.yaml` file with your settings:
//!
//! ```yaml
//! matrix:
//!   user_id: "@codewatch:matrix.org"
//!   password: "your-password"
//!   passphrase: "your-store-passphrase"
//!   moderators: ["@admin:matrix.org"]
//!
//! fetch:
//!   interval_minutes: 60
//!   disabled_games: ["hi3"]
//! ```
//!
//! # Environment Variable Overrides
//!
//! A fixed set of keys can be overridden with the `CODEWATCH_` prefix:
//!
//! ```bash
//! export CODEWATCH_MATRIX__PASSWORD="your-password"
//! export CODEWATCH_FETCH__INTERVAL_MINUTES="30"
//! ```
//!
//! # Usage
//!
//! ```bash
//! codewatch --config config.yaml --data ./codewatch-data
//! ```
//!
//! # Architecture
//!
//! - [`announce`] - Announcement formatting and chunked delivery
//! - [`bot`] - Wiring of the sweep task and the Matrix sync
//! - [`codes`] - Game catalog and code sources
//! - [`commands`] - Command parsing and execution
//! - [`config`] - YAML configuration with environment overrides
//! - [`matrix`] - Matrix client integration and session management
//! - [`sweep`] - Periodic fetch and announcement of new codes
//! - [`tracker`] - Subscriptions, cursors and held codes
//! - [`utils`] - Data directory layout
//!
//! # Exit Status
//!
//! `0` after a signal or a `restart` command, `1` when the configuration is
//! invalid or the homeserver rejects the credentials. A supervisor is
//! expected to start the bot again after a restart.
//!
//! # Environment Variables
//!
//! - `RUST_LOG` - Controls logging level (default: `info`)

use std::{path::Path, process::ExitCode};

use clap::Parser;
use env_logger::Env;
use log::{error, info};

use crate::{
    bot::{Bot, ExitReason},
    config::Config,
    matrix::MatrixError,
};

mod announce;
mod bot;
mod codes;
mod commands;
mod config;
mod matrix;
mod sweep;
mod tracker;
mod utils;

/// Command-line arguments for the Codewatch bot.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the YAML configuration file.
    #[arg(short, long)]
    config: String,

    /// Path to the directory for storing persistent data.
    ///
    /// This directory will contain:
    /// - `channels.json` - Subscribed rooms and their cursors
    /// - `pending.json` - Codes held until their rewards are known
    /// - `session/` - Matrix session data (authentication tokens, device keys)
    #[arg(short, long)]
    data: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Put logger at info level by default
    let env = Env::default().filter_or("RUST_LOG", "info");
    env_logger::init_from_env(env);

    info!("Starting codewatch {}...", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();

    let config = match Config::load(&args.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load config file: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let bot = match Bot::new(config, Path::new(&args.data)).await {
        Ok(b) => b,
        Err(e) => return report_failure("Failed to initialize bot", &e),
    };

    match bot.start().await {
        Ok(ExitReason::Shutdown) => {
            info!("codewatch stopped");
            ExitCode::SUCCESS
        }
        Ok(ExitReason::Restart) => {
            info!("codewatch exiting for restart");
            ExitCode::SUCCESS
        }
        Err(e) => report_failure("Bot stopped", &e),
    }
}

fn report_failure(context: &str, error: &MatrixError) -> ExitCode {
    error!("{}: {:#}", context, error);
    if let MatrixError::CredentialInvalid(_) = error {
        error!(
            "Check matrix.user_id and matrix.password. If the stored session was revoked, \
            delete the session directory in the data directory to log in again."
        );
    }
    ExitCode::FAILURE
}

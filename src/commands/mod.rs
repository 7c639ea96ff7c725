//! Bot command parsing and handling.
//!
//! # Overview
//!
//! A message goes through three steps:
//! 1. **Parsing** - [`Commander::parse`] turns the text into a [`Command`]
//! 2. **Fetching** - the bot fetches the games returned by
//!    [`Commander::games_to_fetch`] and stores the outcomes in the
//!    [`CommandContext`]
//! 3. **Execution** - [`Commander::parse_command`] routes the command to its
//!    handler, which returns a [`CommandResult`]
//!
//! Handlers never touch shared state. The caller applies the announcements
//! and subscription changes of the result.
//!
//! # Commands
//!
//! | Command | Arguments | Description |
//! |---------|-----------|-------------|
//! | `fetch<alias>` | None | List the active codes of a game |
//! | `enablefetch` | None | Announce new codes in the room |
//! | `disablefetch` | None | Stop announcing new codes in the room |
//! | `forcefetch` | `[alias]` | Announce every active code again |
//! | `restart` | None | Flush the state and exit |
//! | `helpcodes` | None | Display help information |
//!
//! # Error Handling
//!
//! - [`CommandParseError::NotForBot`]: the message is not one of our
//!   commands, nothing is sent back
//! - [`CommandParseError::InvalidCommand`]: one of our commands with invalid
//!   arguments, the message explains why

use std::time::Duration;

mod actions;
mod command;
mod commander;
mod cooldown;
mod markdown_response;

pub use crate::commands::command::Command;
pub use crate::commands::commander::Commander;
pub use crate::commands::cooldown::Cooldowns;
use crate::{
    codes::{GameCode, GameDefinition, SourceError},
    tracker::Published,
};

/// Result of a fetch done on behalf of a command.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub game: GameDefinition,
    pub result: Result<Vec<GameCode>, SourceError>,
}

/// Runtime context of a command.
#[derive(Debug, Clone)]
pub struct CommandContext {
    /// Room where the command was issued
    pub channel_id: String,
    /// User who issued the command
    pub sender_id: String,
    /// The room is subscribed to announcements
    pub channel_enabled: bool,
    /// The sender may run the room commands
    pub is_moderator: bool,
    /// The sender is a moderator of the bot itself and may restart it
    pub is_operator: bool,
    /// Remaining wait before the requested manual fetch is allowed
    pub cooldown: Option<Duration>,
    /// Fetches done for the command
    pub fetched: Vec<FetchOutcome>,
}

/// Codes to announce in the room of the command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    pub game: GameDefinition,
    pub codes: Vec<Published>,
}

/// Change of the room subscription requested by a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionChange {
    /// Subscribe the room, priming each game with its current codes
    Enable(Vec<(GameDefinition, Vec<GameCode>)>),
    /// Unsubscribe the room
    Disable,
    /// Prime games of a subscribed room with their current codes
    Prime(Vec<(GameDefinition, Vec<GameCode>)>),
}

/// Result of command execution.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CommandResult {
    /// Markdown reply to the command
    pub response: Option<String>,
    pub announcements: Vec<Announcement>,
    pub subscription_change: Option<SubscriptionChange>,
    /// The bot must flush its state and exit
    pub restart: bool,
}

impl CommandResult {
    pub fn reply(response: String) -> Self {
        CommandResult {
            response: Some(response),
            ..Default::default()
        }
    }
}

/// Errors that can occur during command parsing.
#[derive(Debug, PartialEq, Eq)]
pub enum CommandParseError {
    /// Message is not for this bot (silent error)
    NotForBot,
    /// Invalid command syntax with error message
    InvalidCommand(String),
}

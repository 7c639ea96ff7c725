//! Command parsing.
//!
//! Converts Matrix message text into a [`Command`]. Matching is
//! case-insensitive.

use command_parser::Parser;
use log::debug;

use crate::codes::GameDefinition;
use crate::commands::markdown_response::format_unknown_game;

/// A parsed bot command.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub enum Command {
    /// List the active codes of a game, by game key
    Fetch(String),
    /// Subscribe the room to announcements
    EnableFetch,
    /// Unsubscribe the room
    DisableFetch,
    /// Announce every active code again, for one game key or all games
    ForceFetch(Option<String>),
    /// Flush the state and exit
    Restart,
    /// Display help information
    Help,
}

/// Errors that can occur during command parsing.
#[derive(Debug, PartialEq, Eq)]
pub enum CommandParsingError {
    /// The message is not a command
    UnableToParse,
    /// The command is not one of ours, likely meant for another bot
    Unknown,
    /// `forcefetch` names no known game
    InvalidForceFetch(String),
}

impl Command {
    /// Parses a message body into a command.
    ///
    /// `games` gives the `fetch<alias>` commands and the aliases accepted
    /// by `forcefetch`.
    pub fn parse(
        parser: &Parser,
        body: &str,
        games: &[GameDefinition],
    ) -> Result<Self, CommandParsingError> {
        // The parser drops the last word, hence the dummy one
        let body = body.trim().to_lowercase() + " dummy";

        let command = parser
            .parse(&body)
            .map_err(|_| CommandParsingError::UnableToParse)?;
        debug!("parsing command: {:?}", command);

        match command.name.as_str() {
            "helpcodes" => Ok(Command::Help),
            "enablefetch" => Ok(Command::EnableFetch),
            "disablefetch" => Ok(Command::DisableFetch),
            "restart" => Ok(Command::Restart),
            "forcefetch" => match command.arguments.first() {
                None => Ok(Command::ForceFetch(None)),
                Some(name) => find_game(games, name)
                    .map(|game| Command::ForceFetch(Some(game.key.clone())))
                    .ok_or_else(|| CommandParsingError::InvalidForceFetch(name.clone())),
            },
            name => games
                .iter()
                .find(|game| game.fetch_command() == name)
                .map(|game| Command::Fetch(game.key.clone()))
                .ok_or(CommandParsingError::Unknown),
        }
    }

    /// Whether only moderators may run the command.
    pub fn is_privileged(&self) -> bool {
        matches!(
            self,
            Command::EnableFetch | Command::DisableFetch | Command::ForceFetch(_) | Command::Restart
        )
    }
}

/// Finds a game by alias or key.
pub fn find_game<'a>(games: &'a [GameDefinition], name: &str) -> Option<&'a GameDefinition> {
    games
        .iter()
        .find(|game| game.alias.eq_ignore_ascii_case(name) || game.key.eq_ignore_ascii_case(name))
}

/// Formats a parsing error for the user.
///
/// Returns `None` for messages the bot stays silent about.
pub fn format_command_error(
    error: CommandParsingError,
    games: &[GameDefinition],
) -> Option<String> {
    match error {
        CommandParsingError::InvalidForceFetch(name) => Some(format_unknown_game(&name, games)),
        CommandParsingError::UnableToParse | CommandParsingError::Unknown => None,
    }
}

//! Command orchestration and execution.
//!
//! # Flow
//!
//! ```text
//! Matrix Message → parse() → Command → games_to_fetch() → fetches → parse_command() → CommandResult
//! ```

use command_parser::Parser;

use crate::codes::GameDefinition;
use crate::commands::{
    CommandContext, CommandParseError, CommandResult,
    actions::{
        handle_disable, handle_enable, handle_fetch, handle_force_fetch, handle_help,
        handle_restart,
    },
    command::{Command, find_game, format_command_error},
    markdown_response::{format_game_disabled, format_unknown_game},
};

/// Command orchestrator for parsing and executing bot commands.
///
/// Messages starting with the configured prefix are parsed against the
/// fixed commands and the `fetch<alias>` command of every game. Anything
/// else is ignored silently, other bots may share the prefix.
pub struct Commander {
    parser: Parser,
    prefix: char,
    games: Vec<GameDefinition>,
}

impl Commander {
    pub fn new(prefix: char, games: &[GameDefinition]) -> Self {
        Commander {
            parser: Parser::new(prefix, '-'),
            prefix,
            games: games.to_vec(),
        }
    }

    /// Parses a Matrix message body into a structured command.
    ///
    /// # Errors
    ///
    /// - [`CommandParseError::NotForBot`] for regular chat and unknown commands
    /// - [`CommandParseError::InvalidCommand`] with the message to send back
    ///   when the arguments are invalid
    pub fn parse(&self, body: &str) -> Result<Command, CommandParseError> {
        Command::parse(&self.parser, body, &self.games).map_err(|error| {
            match format_command_error(error, &self.games) {
                Some(message) => CommandParseError::InvalidCommand(message),
                None => CommandParseError::NotForBot,
            }
        })
    }

    /// Game a manual fetch would hit, for cooldown accounting.
    pub fn cooldown_target(&self, command: &Command) -> Option<&GameDefinition> {
        match command {
            Command::Fetch(key) => self.game(key).filter(|game| game.enabled),
            _ => None,
        }
    }

    /// Games to fetch before executing `command` in `context`.
    ///
    /// Nothing is fetched for commands that will be refused.
    pub fn games_to_fetch(&self, command: &Command, context: &CommandContext) -> Vec<GameDefinition> {
        if command.is_privileged() && !context.is_moderator {
            return vec![];
        }

        let enabled_games = || {
            self.games
                .iter()
                .filter(|game| game.enabled)
                .cloned()
                .collect()
        };

        match command {
            Command::Fetch(_) if context.cooldown.is_some() => vec![],
            Command::Fetch(key) | Command::ForceFetch(Some(key)) => self
                .game(key)
                .filter(|game| game.enabled)
                .cloned()
                .into_iter()
                .collect(),
            Command::EnableFetch if !context.channel_enabled => enabled_games(),
            Command::ForceFetch(None) => enabled_games(),
            _ => vec![],
        }
    }

    /// Executes a parsed command.
    ///
    /// The context must hold the outcomes of [`Commander::games_to_fetch`].
    pub fn parse_command(&self, command: &Command, context: &CommandContext) -> CommandResult {
        match command {
            Command::Help => handle_help(self.prefix, &self.games),
            Command::Fetch(key) => match self.game(key) {
                Some(game) => handle_fetch(context, game),
                None => CommandResult::reply(format_unknown_game(key, &self.games)),
            },
            Command::EnableFetch => handle_enable(context),
            Command::DisableFetch => handle_disable(context),
            Command::ForceFetch(Some(key)) => match self.game(key) {
                Some(game) if !game.enabled && context.is_moderator => {
                    CommandResult::reply(format_game_disabled(game))
                }
                _ => handle_force_fetch(context),
            },
            Command::ForceFetch(None) => handle_force_fetch(context),
            Command::Restart => handle_restart(context),
        }
    }

    fn game(&self, key: &str) -> Option<&GameDefinition> {
        find_game(&self.games, key)
    }
}

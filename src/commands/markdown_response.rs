//! Markdown replies to bot commands.
//!
//! Failures are reported by category only, raw errors stay in the logs.

use std::time::Duration;

use crate::codes::{GameDefinition, SourceError};

/// Formats the help message listing every command.
pub fn format_help(prefix: char, games: &[GameDefinition]) -> String {
    let fetch_commands = games
        .iter()
        .map(|game| format!("- `{}{}`: list the active {} codes", prefix, game.fetch_command(), game.name))
        .collect::<Vec<String>>()
        .join("\n");
    let aliases = games
        .iter()
        .map(|game| game.alias.as_str())
        .collect::<Vec<&str>>()
        .join("|");

    format!(
        "Commands:\n\
        {fetch_commands}\n\
        - `{p}enablefetch`: announce new codes in this room\n\
        - `{p}disablefetch`: stop announcing new codes in this room\n\
        - `{p}forcefetch [{aliases}]`: announce every active code again\n\
        - `{p}restart`: restart the bot\n\
        - `{p}helpcodes`: show this help message\n\n\
        `enablefetch`, `disablefetch` and `forcefetch` are reserved to room moderators, \
        `restart` to the bot moderators.\n\
        > *codewatch* is a free open source bot announcing game redemption codes.",
        p = prefix
    )
}

pub fn format_unknown_game(name: &str, games: &[GameDefinition]) -> String {
    let aliases = games
        .iter()
        .map(|game| format!("`{}`", game.alias))
        .collect::<Vec<String>>()
        .join(", ");

    format!("Unknown game `{}`. Known games: {}.", name, aliases)
}

pub fn format_permission_denied() -> String {
    "Permission denied: this command is reserved to moderators.".to_owned()
}

pub fn format_restart_denied() -> String {
    "Permission denied: only the bot moderators may restart it.".to_owned()
}

pub fn format_cooldown(game: &GameDefinition, remaining: Duration) -> String {
    let seconds = (remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0)).max(1);
    format!(
        "{} codes were fetched recently, try again in {}s.",
        game.name, seconds
    )
}

pub fn format_game_disabled(game: &GameDefinition) -> String {
    format!("{} is disabled on this bot.", game.name)
}

/// Short description of a source failure.
pub fn source_error_category(error: &SourceError) -> &'static str {
    if error.is_format() {
        "unexpected data"
    } else {
        "source unreachable"
    }
}

pub fn format_source_error(game: &GameDefinition, error: &SourceError) -> String {
    format!(
        "Could not fetch {} codes: {}. Try again later.",
        game.name,
        source_error_category(error)
    )
}

pub fn format_no_active_codes(game: &GameDefinition) -> String {
    format!("No active {} code right now.", game.name)
}

/// Formats the reply to `enablefetch`.
///
/// `deferred` lists the games whose fetch failed, they are primed on the
/// next sweep.
pub fn format_enabled(deferred: &[&str]) -> String {
    let mut body = "New codes will be announced in this room.".to_owned();
    if !deferred.is_empty() {
        body.push_str(&format!(
            "\n\nCould not fetch {} yet, their current codes will be skipped on the next check.",
            deferred.join(", ")
        ));
    }
    body
}

pub fn format_already_enabled() -> String {
    "New codes are already announced in this room.".to_owned()
}

pub fn format_disabled() -> String {
    "New codes will no longer be announced in this room.".to_owned()
}

pub fn format_not_enabled() -> String {
    "New codes are not announced in this room.".to_owned()
}

/// Formats the notes of a `forcefetch`, if there is anything to report.
pub fn format_force_fetch_notes(empty: &[&str], failed: &[(&str, &str)]) -> Option<String> {
    let mut notes = vec![];
    if !empty.is_empty() {
        notes.push(format!("No active code for {}.", empty.join(", ")));
    }
    notes.extend(
        failed
            .iter()
            .map(|(name, category)| format!("Could not fetch {} codes: {}.", name, category)),
    );

    (!notes.is_empty()).then(|| notes.join("\n"))
}

pub fn format_restart() -> String {
    "Restarting…".to_owned()
}

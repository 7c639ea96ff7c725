//! Manual fetch command handler.
//!
//! Lists every active code of one game in the room, whether the room is
//! subscribed or not. The listing bypasses the announcement cursor and
//! changes no tracking state.

use log::{debug, warn};

use crate::codes::{GameDefinition, SourceError};
use crate::commands::{
    Announcement, CommandContext, CommandResult,
    markdown_response::{
        format_cooldown, format_game_disabled, format_no_active_codes, format_source_error,
    },
};
use crate::tracker::Published;

/// Lists the active codes of `game` fetched in the context.
pub fn handle_fetch(context: &CommandContext, game: &GameDefinition) -> CommandResult {
    debug!("handling fetch command for {}", game.key);

    if !game.enabled {
        return CommandResult::reply(format_game_disabled(game));
    }
    if let Some(remaining) = context.cooldown {
        debug!("{} fetch in {} on cooldown", game.key, context.channel_id);
        return CommandResult::reply(format_cooldown(game, remaining));
    }

    let Some(outcome) = context.fetched.iter().find(|outcome| outcome.game.key == game.key)
    else {
        warn!("{} was not fetched for the command", game.key);
        return CommandResult::reply(format_source_error(
            game,
            &SourceError::Unavailable("not fetched".to_string()),
        ));
    };

    match &outcome.result {
        Ok(codes) if codes.is_empty() => CommandResult::reply(format_no_active_codes(game)),
        Ok(codes) => CommandResult {
            announcements: vec![Announcement {
                game: game.clone(),
                codes: codes
                    .iter()
                    .map(|code| Published::listing(code, &game.fallback_reward))
                    .collect(),
            }],
            ..Default::default()
        },
        Err(e) => {
            warn!("manual fetch of {} failed: {}", game.key, e);
            CommandResult::reply(format_source_error(game, e))
        }
    }
}

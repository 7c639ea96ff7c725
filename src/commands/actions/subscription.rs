//! Room subscription command handlers.

use log::{debug, warn};

use crate::commands::{
    CommandContext, CommandResult, SubscriptionChange,
    markdown_response::{
        format_already_enabled, format_disabled, format_enabled, format_not_enabled,
        format_permission_denied,
    },
};

/// Subscribes the room to announcements.
///
/// Games fetched successfully are primed with their current codes so they
/// are not announced. The other ones are primed on their next sweep.
pub fn handle_enable(context: &CommandContext) -> CommandResult {
    debug!("handling enablefetch in {}", context.channel_id);

    if !context.is_moderator {
        return CommandResult::reply(format_permission_denied());
    }
    if context.channel_enabled {
        return CommandResult::reply(format_already_enabled());
    }

    let mut primes = vec![];
    let mut deferred = vec![];
    for outcome in &context.fetched {
        match &outcome.result {
            Ok(codes) => primes.push((outcome.game.clone(), codes.clone())),
            Err(e) => {
                warn!("cannot prime {} in {}: {}", outcome.game.key, context.channel_id, e);
                deferred.push(outcome.game.name.as_str());
            }
        }
    }

    CommandResult {
        response: Some(format_enabled(&deferred)),
        subscription_change: Some(SubscriptionChange::Enable(primes)),
        ..Default::default()
    }
}

/// Unsubscribes the room.
pub fn handle_disable(context: &CommandContext) -> CommandResult {
    debug!("handling disablefetch in {}", context.channel_id);

    if !context.is_moderator {
        return CommandResult::reply(format_permission_denied());
    }
    if !context.channel_enabled {
        return CommandResult::reply(format_not_enabled());
    }

    CommandResult {
        response: Some(format_disabled()),
        subscription_change: Some(SubscriptionChange::Disable),
        ..Default::default()
    }
}

//! Forced announcement command handler.

use log::{debug, warn};

use crate::commands::{
    Announcement, CommandContext, CommandResult, SubscriptionChange,
    markdown_response::{format_force_fetch_notes, format_permission_denied, source_error_category},
};
use crate::tracker::Published;

/// Announces every active code of the fetched games, ignoring the cursor.
///
/// In a subscribed room the fetched games are primed again, so the codes
/// are not announced a second time by the next sweep.
pub fn handle_force_fetch(context: &CommandContext) -> CommandResult {
    debug!("handling forcefetch in {}", context.channel_id);

    if !context.is_moderator {
        return CommandResult::reply(format_permission_denied());
    }

    let mut announcements = vec![];
    let mut primes = vec![];
    let mut empty = vec![];
    let mut failed = vec![];

    for outcome in &context.fetched {
        let game = &outcome.game;
        match &outcome.result {
            Ok(codes) => {
                if codes.is_empty() {
                    empty.push(game.name.as_str());
                } else {
                    announcements.push(Announcement {
                        game: game.clone(),
                        codes: codes
                            .iter()
                            .map(|code| Published::listing(code, &game.fallback_reward))
                            .collect(),
                    });
                }
                primes.push((game.clone(), codes.clone()));
            }
            Err(e) => {
                warn!("forced fetch of {} failed: {}", game.key, e);
                failed.push((game.name.as_str(), source_error_category(e)));
            }
        }
    }

    let subscription_change =
        (context.channel_enabled && !primes.is_empty()).then_some(SubscriptionChange::Prime(primes));

    CommandResult {
        response: format_force_fetch_notes(&empty, &failed),
        announcements,
        subscription_change,
        restart: false,
    }
}

//! Restart command handler.

use log::{debug, info};

use crate::commands::{
    CommandContext, CommandResult,
    markdown_response::{format_restart, format_restart_denied},
};

/// Asks the bot to flush its state and exit.
///
/// Room moderators may not restart the bot, only the moderators listed in
/// the configuration.
pub fn handle_restart(context: &CommandContext) -> CommandResult {
    debug!("handling restart command");

    if !context.is_operator {
        return CommandResult::reply(format_restart_denied());
    }

    info!("restart requested by {} in {}", context.sender_id, context.channel_id);
    CommandResult {
        response: Some(format_restart()),
        restart: true,
        ..Default::default()
    }
}

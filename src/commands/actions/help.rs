//! Help command handler.

use log::debug;

use crate::codes::GameDefinition;
use crate::commands::{CommandResult, markdown_response::format_help};

/// Returns the list of commands.
pub fn handle_help(prefix: char, games: &[GameDefinition]) -> CommandResult {
    debug!("handling help command");

    CommandResult::reply(format_help(prefix, games))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codes::game_catalog;
    use crate::config::Sources;

    #[test]
    fn test_handle_help() {
        let result = handle_help('!', &game_catalog(&Sources::default(), &[]));

        assert!(result.response.unwrap().contains("`!helpcodes`"));
        assert!(result.announcements.is_empty());
        assert!(result.subscription_change.is_none());
        assert!(!result.restart);
    }
}

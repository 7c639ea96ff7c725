//! Command action handlers.
//!
//! Each handler receives the [`CommandContext`](crate::commands::CommandContext)
//! prepared by the bot and returns a
//! [`CommandResult`](crate::commands::CommandResult). Handlers never change
//! state themselves, they describe the announcements and subscription changes
//! the caller has to apply.
//!
//! - [`handle_help`] - Display help information
//! - [`handle_fetch`] - List the active codes of one game
//! - [`handle_enable`] / [`handle_disable`] - Room subscription
//! - [`handle_force_fetch`] - Announce every active code again
//! - [`handle_restart`] - Restart the bot

mod fetch;
mod force_fetch;
mod help;
mod restart;
mod subscription;

pub use crate::commands::actions::{
    fetch::handle_fetch,
    force_fetch::handle_force_fetch,
    help::handle_help,
    restart::handle_restart,
    subscription::{handle_disable, handle_enable},
};

//! Announcement of codes in chat channels.
//!
//! # Modules
//!
//! - `chunk` - Splitting of long messages
//! - `dispatcher` - Chunked delivery with retry and unreachable detection
//! - `format` - Markdown rendering of announcements
//! - `rewards` - Cleanup of reward descriptions

mod chunk;
mod dispatcher;
mod format;
mod rewards;

use mockall::automock;
use thiserror::Error;

pub use crate::announce::dispatcher::{DispatchSettings, Dispatcher};
pub use crate::announce::format::AnnouncementKind;
pub use crate::announce::rewards::EmojiMode;

/// Failure of a single message send.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SendError {
    /// The bot may not post in the channel anymore.
    #[error("channel unreachable: {0}")]
    Unreachable(String),
    /// Any other failure, worth retrying.
    #[error("send failed: {0}")]
    Transient(String),
}

/// Failure of an announcement.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// The channel denied access, its subscription must be dropped.
    #[error("channel unreachable: {0}")]
    ChannelUnreachable(String),
    #[error("{failed} of {total} messages could not be sent")]
    Incomplete { failed: usize, total: usize },
}

/// Trait for posting messages in a channel.
///
/// This trait abstracts the chat platform for easier testing with mocks.
#[automock]
pub trait Announcer {
    /// Posts a Markdown `body` in `channel_id`.
    async fn send(&self, channel_id: &str, body: &str) -> Result<(), SendError>;
}

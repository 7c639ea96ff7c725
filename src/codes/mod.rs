//! Upstream code sources.
//!
//! This module fetches the list of active redemption codes of a game from its
//! configured sources and normalizes every payload into [`GameCode`] records.
//!
//! # Modules
//!
//! - `catalog` - Built-in list of supported games and their sources
//! - `fetcher` - Multi-source fallback and retry policy
//! - `requester` - HTTP client for the sources
//! - `response_structs` - JSON payload shapes and their normalization
//! - `structs` - Public data structures for games and codes
//! - `wiki` - HTML scraping of wiki "Active codes" tables

mod catalog;
mod fetcher;
mod requester;
mod response_structs;
mod structs;
mod wiki;

use thiserror::Error;

pub use crate::codes::catalog::game_catalog;
pub use crate::codes::fetcher::{CodeFetcher, RetryPolicy};
#[cfg(test)]
pub use crate::codes::requester::MockRequester;
pub use crate::codes::requester::{RequestError, Requester, SourceRequester};
#[cfg(test)]
pub use crate::codes::structs::Source;
pub use crate::codes::structs::{
    CursorMode, GameCode, GameDefinition, SourceKind, cap_reward_text,
};

/// Errors returned when fetching the codes of a game.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// Network failure, timeout or non-2xx answer.
    #[error("source unavailable: {0}")]
    Unavailable(String),
    /// The payload could not be coerced into a list of codes.
    #[error("unexpected payload: {0}")]
    Format(String),
    /// Every configured source failed, with the name and error of each.
    #[error("all sources failed: {}", describe_failures(.0))]
    Exhausted(Vec<(String, SourceError)>),
}

fn describe_failures(failures: &[(String, SourceError)]) -> String {
    failures
        .iter()
        .map(|(name, error)| format!("{}: {}", name, error))
        .collect::<Vec<String>>()
        .join("; ")
}

impl SourceError {
    /// Whether the failure comes from a payload the bot could not understand,
    /// as opposed to a source that could not be reached.
    pub fn is_format(&self) -> bool {
        match self {
            SourceError::Format(_) => true,
            SourceError::Unavailable(_) => false,
            SourceError::Exhausted(failures) => {
                failures.iter().all(|(_, error)| error.is_format())
            }
        }
    }
}

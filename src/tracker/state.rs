//! Persisted tracking state.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per channel and game cursor of announced codes.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelGameState {
    /// Highest sort key ever published
    #[serde(default)]
    pub last_published_key: u64,
    /// Codes published without a usable sort key
    #[serde(default)]
    pub seen_codes: BTreeSet<String>,
}

/// Subscription of a channel, with its cursors indexed by game key.
///
/// A game missing from `games` has never been primed for this channel.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelRecord {
    pub enabled: bool,
    #[serde(default)]
    pub games: BTreeMap<String, ChannelGameState>,
}

/// A code held back until upstream provides its reward text.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PendingEntry {
    /// Sweeps the code was seen without reward text
    pub attempt_count: u32,
    pub first_seen_at: DateTime<Utc>,
    /// Consecutive sweeps the source stopped listing the code
    #[serde(default)]
    pub absent_streak: u32,
}

impl PendingEntry {
    pub fn new(first_seen_at: DateTime<Utc>) -> Self {
        PendingEntry {
            attempt_count: 0,
            first_seen_at,
            absent_streak: 0,
        }
    }
}

/// Channel id to subscription.
pub type ChannelTable = BTreeMap<String, ChannelRecord>;

/// Pending codes of one channel and game, by code.
pub type PendingCodes = BTreeMap<String, PendingEntry>;

/// Channel id to game key to pending codes.
pub type PendingTable = BTreeMap<String, BTreeMap<String, PendingCodes>>;

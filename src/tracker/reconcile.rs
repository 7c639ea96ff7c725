//! New code detection for one channel and game.
//!
//! [`reconcile`] is a pure function over the cursor, the pending entries and
//! the current source listing; everything time related is injected.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use log::debug;

use crate::codes::{CursorMode, GameCode};
use crate::tracker::state::{ChannelGameState, PendingCodes, PendingEntry};

/// Limits applied to codes missing their reward text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingPolicy {
    /// Sweeps a code can be seen without rewards before being published anyway
    pub retry_limit: u32,
    /// Maximum time a code is held before being published anyway
    pub hold: Duration,
    /// Consecutive absent sweeps after which a held code is dropped
    pub max_absent_sweeps: u32,
    /// Maximum time a held code is kept at all
    pub max_pending_age: Duration,
}

/// A code selected for announcement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub code: GameCode,
    /// The reward text was replaced by the game fallback text
    pub fallback: bool,
}

impl Published {
    /// Listing entry for a code announced outside of the cursor, e.g. by a
    /// manual fetch.
    pub fn listing(code: &GameCode, fallback_reward: &str) -> Self {
        match code.reward_text {
            Some(_) => Published {
                code: code.clone(),
                fallback: false,
            },
            None => Published {
                code: substitute(code, fallback_reward),
                fallback: true,
            },
        }
    }
}

/// Outcome of a reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishDecision {
    /// Codes to announce, ascending by sort key
    pub published: Vec<Published>,
    /// Codes still waiting for their reward text
    pub held: Vec<String>,
    /// Held codes dropped without ever being published
    pub discarded: Vec<String>,
}

impl PublishDecision {
    pub fn is_empty(&self) -> bool {
        self.published.is_empty() && self.held.is_empty() && self.discarded.is_empty()
    }
}

/// Computes which of `current` must be announced and updates the cursor and
/// the pending entries accordingly.
///
/// # Arguments
///
/// * `state` - Cursor of the channel and game
/// * `pending` - Held codes of the channel and game
/// * `mode` - How announced codes are remembered
/// * `current` - Full listing returned by the source
/// * `fallback_reward` - Text substituted when a held code is force-published
/// * `policy` - Hold limits
/// * `now` - Current time
pub fn reconcile(
    state: &mut ChannelGameState,
    pending: &mut PendingCodes,
    mode: CursorMode,
    current: &[GameCode],
    fallback_reward: &str,
    policy: &PendingPolicy,
    now: DateTime<Utc>,
) -> PublishDecision {
    let mut decision = PublishDecision::default();

    let mut candidates: Vec<(usize, &GameCode)> = current
        .iter()
        .enumerate()
        .filter(|(_, code)| pending.contains_key(&code.code) || is_new(state, mode, code))
        .collect();
    candidates.sort_by_key(|(index, code)| (code.sort_key, *index));

    for (_, code) in candidates {
        if code.has_reward() {
            pending.remove(&code.code);
            decision.published.push(Published {
                code: code.clone(),
                fallback: false,
            });
            continue;
        }

        let entry = pending
            .entry(code.code.clone())
            .or_insert_with(|| PendingEntry::new(now));
        entry.attempt_count += 1;
        entry.absent_streak = 0;

        if entry.attempt_count >= policy.retry_limit || now - entry.first_seen_at >= policy.hold {
            debug!(
                "{} still has no reward after {} attempts, publishing with fallback",
                code.code, entry.attempt_count
            );
            pending.remove(&code.code);
            decision.published.push(Published {
                code: substitute(code, fallback_reward),
                fallback: true,
            });
        } else {
            decision.held.push(code.code.clone());
        }
    }

    let listed: HashSet<&str> = current.iter().map(|code| code.code.as_str()).collect();
    pending.retain(|code, entry| {
        if listed.contains(code.as_str()) {
            return true;
        }
        entry.absent_streak += 1;
        let stale = entry.absent_streak >= policy.max_absent_sweeps
            || now - entry.first_seen_at >= policy.max_pending_age;
        if stale {
            decision.discarded.push(code.clone());
        }
        !stale
    });

    for published in &decision.published {
        record_published(state, mode, &published.code);
    }

    decision
}

/// Records every code of `current` as already announced.
pub fn prime(state: &mut ChannelGameState, mode: CursorMode, current: &[GameCode]) {
    for code in current {
        record_published(state, mode, code);
    }
}

fn is_new(state: &ChannelGameState, mode: CursorMode, code: &GameCode) -> bool {
    match mode {
        CursorMode::SortKey if code.sort_key > 0 => code.sort_key > state.last_published_key,
        _ => !state.seen_codes.contains(&code.code),
    }
}

fn record_published(state: &mut ChannelGameState, mode: CursorMode, code: &GameCode) {
    match mode {
        CursorMode::SortKey if code.sort_key > 0 => {
            state.last_published_key = state.last_published_key.max(code.sort_key);
        }
        _ => {
            state.seen_codes.insert(code.code.clone());
        }
    }
}

fn substitute(code: &GameCode, fallback_reward: &str) -> GameCode {
    GameCode {
        reward_text: Some(fallback_reward.to_string()),
        ..code.clone()
    }
}

//! In-memory owner of subscriptions, cursors and pending codes.

use chrono::{DateTime, Utc};
use log::{debug, info, warn};

use crate::codes::{GameCode, GameDefinition};
use crate::tracker::{
    reconcile::{PendingPolicy, PublishDecision, prime, reconcile},
    state::{ChannelRecord, ChannelTable, PendingTable},
    store::StateStore,
};

/// Tracks which codes were announced in which channel.
///
/// The tracker is the only writer of the tracking state. Every mutation marks
/// it dirty and [`CodeTracker::flush`] writes both documents back through the
/// [`StateStore`].
pub struct CodeTracker {
    channels: ChannelTable,
    pending: PendingTable,
    store: StateStore,
    policy: PendingPolicy,
    dirty: bool,
}

impl CodeTracker {
    /// Loads the persisted state of `store`.
    pub async fn load(store: StateStore, policy: PendingPolicy) -> anyhow::Result<Self> {
        let channels = store.load_channels().await?;
        let pending = store.load_pending().await?;
        info!(
            "tracking {} channels, {} with pending codes",
            channels.len(),
            pending.len()
        );

        Ok(CodeTracker {
            channels,
            pending,
            store,
            policy,
            dirty: false,
        })
    }

    pub fn is_enabled(&self, channel_id: &str) -> bool {
        self.channels
            .get(channel_id)
            .is_some_and(|record| record.enabled)
    }

    /// Subscribed channels, in stable order.
    pub fn enabled_channels(&self) -> Vec<String> {
        self.channels
            .iter()
            .filter(|(_, record)| record.enabled)
            .map(|(channel_id, _)| channel_id.clone())
            .collect()
    }

    /// Subscribes a channel to every game.
    ///
    /// Returns `false` when the channel was already subscribed. Games are
    /// primed with [`CodeTracker::prime`] or on their first sweep.
    pub fn enable(&mut self, channel_id: &str) -> bool {
        if self.is_enabled(channel_id) {
            return false;
        }

        info!("enable announcements in {}", channel_id);
        self.channels.insert(
            channel_id.to_string(),
            ChannelRecord {
                enabled: true,
                ..Default::default()
            },
        );
        self.dirty = true;
        true
    }

    /// Unsubscribes a channel, forgetting its cursors and pending codes.
    ///
    /// Returns `false` when the channel was not subscribed.
    pub fn disable(&mut self, channel_id: &str) -> bool {
        let was_enabled = self.is_enabled(channel_id);
        self.remove_channel(channel_id);
        was_enabled
    }

    /// Forgets everything about a channel.
    pub fn remove_channel(&mut self, channel_id: &str) {
        let removed = self.channels.remove(channel_id).is_some();
        let removed_pending = self.pending.remove(channel_id).is_some();

        if removed || removed_pending {
            info!("removed channel {}", channel_id);
            self.dirty = true;
        }
    }

    /// Marks every code of `codes` as already announced in `channel_id` and
    /// drops the codes of `game` held for that channel.
    pub fn prime(&mut self, channel_id: &str, game: &GameDefinition, codes: &[GameCode]) {
        let Some(record) = self.channels.get_mut(channel_id) else {
            warn!("cannot prime {} in unknown channel {}", game.key, channel_id);
            return;
        };

        let state = record.games.entry(game.key.clone()).or_default();
        prime(state, game.cursor, codes);

        if let Some(games_pending) = self.pending.get_mut(channel_id) {
            games_pending.remove(&game.key);
            if games_pending.is_empty() {
                self.pending.remove(channel_id);
            }
        }
        debug!(
            "primed {} in {} with {} codes",
            game.key,
            channel_id,
            codes.len()
        );
        self.dirty = true;
    }

    /// Reconciles the current listing of `game` with the state of
    /// `channel_id`.
    ///
    /// A game that was never primed for the channel is primed instead, and
    /// nothing is published.
    pub fn reconcile(
        &mut self,
        channel_id: &str,
        game: &GameDefinition,
        codes: &[GameCode],
        now: DateTime<Utc>,
    ) -> PublishDecision {
        let Some(record) = self.channels.get_mut(channel_id).filter(|record| record.enabled) else {
            return PublishDecision::default();
        };

        let Some(state) = record.games.get_mut(&game.key) else {
            info!("first sweep of {} in {}, priming", game.key, channel_id);
            self.prime(channel_id, game, codes);
            return PublishDecision::default();
        };

        let games_pending = self.pending.entry(channel_id.to_string()).or_default();
        let pending = games_pending.entry(game.key.clone()).or_default();
        let had_pending = !pending.is_empty();

        let decision = reconcile(
            state,
            pending,
            game.cursor,
            codes,
            &game.fallback_reward,
            &self.policy,
            now,
        );

        if pending.is_empty() {
            games_pending.remove(&game.key);
        }
        if games_pending.is_empty() {
            self.pending.remove(channel_id);
        }

        if had_pending || !decision.is_empty() {
            self.dirty = true;
        }
        if !decision.is_empty() {
            debug!(
                "{} in {}: published {}, held {:?}, discarded {:?}",
                game.key,
                channel_id,
                decision.published.len(),
                decision.held,
                decision.discarded
            );
        }

        decision
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Writes the state back to disk if it changed since the last flush.
    ///
    /// The tracker stays dirty when writing fails so the next flush retries.
    pub async fn flush(&mut self) -> anyhow::Result<()> {
        if !self.dirty {
            return Ok(());
        }

        self.store.persist_channels(&self.channels).await?;
        self.store.persist_pending(&self.pending).await?;
        self.dirty = false;
        info!("persisted tracking state");

        Ok(())
    }
}

//! Rate limit of manual fetches.

use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

/// Last manual fetch of each game in each room.
pub struct Cooldowns {
    period: Duration,
    last_fetch: HashMap<(String, String), Instant>,
}

impl Cooldowns {
    pub fn new(period: Duration) -> Self {
        Cooldowns {
            period,
            last_fetch: HashMap::new(),
        }
    }

    /// Records a fetch of `game_key` in `channel_id` at `now`.
    ///
    /// Returns the remaining wait instead when the previous fetch is more
    /// recent than the cooldown period.
    pub fn try_acquire(
        &mut self,
        channel_id: &str,
        game_key: &str,
        now: Instant,
    ) -> Result<(), Duration> {
        let period = self.period;
        self.last_fetch
            .retain(|_, last| now.saturating_duration_since(*last) < period);

        let key = (channel_id.to_string(), game_key.to_string());
        if let Some(last) = self.last_fetch.get(&key) {
            return Err(period.saturating_sub(now.saturating_duration_since(*last)));
        }

        self.last_fetch.insert(key, now);
        Ok(())
    }
}

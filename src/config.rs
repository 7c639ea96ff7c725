//! Configuration file structures for the codewatch bot.
//!
//! The configuration is read from a YAML file, then overridden by environment
//! variables prefixed with `CODEWATCH_` where `__` separates sections. Only
//! the keys of [`ENV_ALLOW_LIST`] are applied; any other `CODEWATCH_*`
//! variable is reported and ignored.
//!
//! # Configuration File Format
//!
//! ```yaml
//! matrix:
//!   user_id: "@codewatch:matrix.org"
//!   password: "secret-password"
//!   passphrase: "store-passphrase"
//!   prefix: "!"
//!   moderators: ["@admin:matrix.org"]
//!
//! fetch:
//!   interval_minutes: 60
//!   timeout_seconds: 15
//!   wiki_timeout_seconds: 20
//!   retries: 2
//!   retry_backoff_ms: 1000
//!   command_cooldown_seconds: 30
//!   disabled_games: []
//!
//! pending:
//!   retry_limit: 3
//!   hold_minutes: 180
//!   max_absent_sweeps: 3
//!   max_age_minutes: 2880
//!
//! announce:
//!   chunk_limit: 2000
//!   chunk_delay_ms: 1000
//!   send_retries: 1
//!   emoji: unicode
//!
//! sources:
//!   hoyo_api_base: "https://hoyo-codes.seria.moe/codes"
//!   honkai3rd_api: "https://api.ennead.cc/mihoyo/honkai/codes"
//!   honkai3rd_wiki: "https://honkaiimpact3.fandom.com/wiki/Exchange_Rewards"
//! ```
//!
//! Every section but `matrix` is optional.

use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use log::warn;
use serde::Deserialize;

use crate::{
    announce::{DispatchSettings, EmojiMode},
    codes::RetryPolicy,
    tracker::PendingPolicy,
};

/// Prefix of the environment variables read by the bot.
pub const ENV_PREFIX: &str = "CODEWATCH_";

/// Environment keys, without [`ENV_PREFIX`], that may override the file.
pub const ENV_ALLOW_LIST: [&str; 13] = [
    "MATRIX__USER_ID",
    "MATRIX__PASSWORD",
    "MATRIX__PASSPHRASE",
    "MATRIX__PREFIX",
    "FETCH__INTERVAL_MINUTES",
    "FETCH__TIMEOUT_SECONDS",
    "FETCH__COMMAND_COOLDOWN_SECONDS",
    "PENDING__RETRY_LIMIT",
    "PENDING__HOLD_MINUTES",
    "ANNOUNCE__EMOJI",
    "SOURCES__HOYO_API_BASE",
    "SOURCES__HONKAI3RD_API",
    "SOURCES__HONKAI3RD_WIKI",
];

const MIN_INTERVAL_MINUTES: u64 = 1;
const MAX_INTERVAL_MINUTES: u64 = 1440;
const MIN_CHUNK_LIMIT: usize = 200;
const MAX_CHUNK_LIMIT: usize = 30_000;

/// Root configuration structure.
#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    /// Matrix account configuration
    pub matrix: Matrix,
    #[serde(default)]
    pub fetch: Fetch,
    #[serde(default)]
    pub pending: Pending,
    #[serde(default)]
    pub announce: Announce,
    #[serde(default)]
    pub sources: Sources,
}

/// Matrix account configuration.
#[derive(Deserialize, Debug, Clone)]
pub struct Matrix {
    /// Fully qualified Matrix user ID, e.g. `@codewatch:matrix.org`.
    pub user_id: String,

    /// Matrix account password.
    ///
    /// Used for the first login only, the session is then restored from the
    /// data directory.
    pub password: String,

    /// Passphrase encrypting the local sqlite store.
    pub passphrase: String,

    /// Single character starting every command.
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Users allowed to run the administrative commands in every room and
    /// to restart the bot.
    ///
    /// Room members allowed to change the power levels of a room may run the
    /// room commands there, whether listed or not.
    #[serde(default)]
    pub moderators: Vec<String>,
}

fn default_prefix() -> String {
    "!".to_string()
}

impl Matrix {
    pub fn prefix_char(&self) -> char {
        self.prefix.chars().next().unwrap_or('!')
    }

    /// Whether `user_id` is listed in [`Matrix::moderators`].
    pub fn is_moderator(&self, user_id: &str) -> bool {
        self.moderators.iter().any(|moderator| moderator == user_id)
    }
}

/// Polling settings.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Fetch {
    /// Minutes between two sweeps, clamped to a day
    pub interval_minutes: u64,
    pub timeout_seconds: u64,
    pub wiki_timeout_seconds: u64,
    /// Extra attempts for transient source failures
    pub retries: u32,
    pub retry_backoff_ms: u64,
    /// Minimum delay between two manual fetches of a game in a channel
    pub command_cooldown_seconds: u64,
    /// Game keys or aliases never swept
    pub disabled_games: Vec<String>,
}

impl Default for Fetch {
    fn default() -> Self {
        Fetch {
            interval_minutes: 60,
            timeout_seconds: 15,
            wiki_timeout_seconds: 20,
            retries: 2,
            retry_backoff_ms: 1000,
            command_cooldown_seconds: 30,
            disabled_games: vec![],
        }
    }
}

impl Fetch {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes * 60)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            retries: self.retries,
            backoff: Duration::from_millis(self.retry_backoff_ms),
        }
    }
}

/// Limits of codes held back for missing rewards.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Pending {
    pub retry_limit: u32,
    pub hold_minutes: u64,
    pub max_absent_sweeps: u32,
    pub max_age_minutes: u64,
}

impl Default for Pending {
    fn default() -> Self {
        Pending {
            retry_limit: 3,
            hold_minutes: 180,
            max_absent_sweeps: 3,
            max_age_minutes: 2880,
        }
    }
}

impl Pending {
    pub fn policy(&self) -> PendingPolicy {
        PendingPolicy {
            retry_limit: self.retry_limit,
            hold: minutes(self.hold_minutes),
            max_absent_sweeps: self.max_absent_sweeps,
            max_pending_age: minutes(self.max_age_minutes),
        }
    }
}

/// Converts minutes to a duration, saturating at the largest duration.
fn minutes(value: u64) -> chrono::Duration {
    i64::try_from(value)
        .ok()
        .and_then(chrono::Duration::try_minutes)
        .unwrap_or(chrono::Duration::MAX)
}

/// Outbound message settings.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Announce {
    pub chunk_limit: usize,
    pub chunk_delay_ms: u64,
    pub send_retries: u32,
    pub emoji: EmojiMode,
}

impl Default for Announce {
    fn default() -> Self {
        Announce {
            chunk_limit: 2000,
            chunk_delay_ms: 1000,
            send_retries: 1,
            emoji: EmojiMode::Unicode,
        }
    }
}

impl Announce {
    pub fn settings(&self) -> DispatchSettings {
        DispatchSettings {
            chunk_limit: self.chunk_limit,
            chunk_delay: Duration::from_millis(self.chunk_delay_ms),
            send_retries: self.send_retries,
            emoji: self.emoji,
        }
    }
}

/// Upstream endpoints.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Sources {
    /// Code API queried with `?game=<key>`
    pub hoyo_api_base: String,
    pub honkai3rd_api: String,
    pub honkai3rd_wiki: String,
}

impl Default for Sources {
    fn default() -> Self {
        Sources {
            hoyo_api_base: "https://hoyo-codes.seria.moe/codes".to_string(),
            honkai3rd_api: "https://api.ennead.cc/mihoyo/honkai/codes".to_string(),
            honkai3rd_wiki: "https://honkaiimpact3.fandom.com/wiki/Exchange_Rewards".to_string(),
        }
    }
}

impl Config {
    /// Loads the configuration from `path` and the allowed environment
    /// variables, then normalizes out of range values.
    pub fn load(path: &str) -> Result<Config, figment::Error> {
        for key in unrecognized_env_keys(std::env::vars()) {
            warn!("ignoring unrecognized environment variable {}", key);
        }

        let mut config: Config = Figment::new()
            .merge(Yaml::file(path))
            .merge(
                Env::prefixed(ENV_PREFIX)
                    .filter(|key| is_allowed_env_key(key.as_str()))
                    .split("__"),
            )
            .extract()?;
        config.normalize();

        Ok(config)
    }

    fn normalize(&mut self) {
        let interval = self
            .fetch
            .interval_minutes
            .clamp(MIN_INTERVAL_MINUTES, MAX_INTERVAL_MINUTES);
        if interval != self.fetch.interval_minutes {
            warn!(
                "fetch interval {} out of range, using {} minutes",
                self.fetch.interval_minutes, interval
            );
            self.fetch.interval_minutes = interval;
        }

        let chunk_limit = self.announce.chunk_limit.clamp(MIN_CHUNK_LIMIT, MAX_CHUNK_LIMIT);
        if chunk_limit != self.announce.chunk_limit {
            warn!(
                "chunk limit {} out of range, using {}",
                self.announce.chunk_limit, chunk_limit
            );
            self.announce.chunk_limit = chunk_limit;
        }

        if self.matrix.prefix.chars().count() != 1
            || self.matrix.prefix.chars().all(char::is_whitespace)
        {
            warn!("invalid command prefix {:?}, using \"!\"", self.matrix.prefix);
            self.matrix.prefix = default_prefix();
        }

        self.pending.retry_limit = self.pending.retry_limit.max(1);
        self.pending.max_absent_sweeps = self.pending.max_absent_sweeps.max(1);

        while self.sources.hoyo_api_base.ends_with('/') {
            self.sources.hoyo_api_base.pop();
        }
    }
}

/// Whether `key`, stripped of [`ENV_PREFIX`], may override the file.
pub fn is_allowed_env_key(key: &str) -> bool {
    ENV_ALLOW_LIST
        .iter()
        .any(|allowed| allowed.eq_ignore_ascii_case(key))
}

/// Prefixed variables of `vars` that are not in the allow list.
pub fn unrecognized_env_keys(vars: impl IntoIterator<Item = (String, String)>) -> Vec<String> {
    let mut keys: Vec<String> = vars
        .into_iter()
        .filter_map(|(key, _)| {
            let stripped = key.strip_prefix(ENV_PREFIX)?;
            (!is_allowed_env_key(stripped)).then_some(key)
        })
        .collect();
    keys.sort();
    keys
}

//! Data structures describing games, their upstream sources and the codes
//! those sources return.

use std::fmt;

/// Hard cap applied to every reward string coming from upstream.
pub const REWARD_TEXT_LIMIT: usize = 500;

/// One redemption code as returned by a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameCode {
    /// Canonical identity, trimmed and upper-cased
    pub code: String,
    /// Raw reward description, `None` when the source did not provide one yet
    pub reward_text: Option<String>,
    /// Ordering hint (numeric id or timestamp), `0` when the source has none
    pub sort_key: u64,
    /// Name of the source the code came from
    pub source_label: Option<String>,
}

impl GameCode {
    /// Builds a normalized code.
    ///
    /// Blank reward text becomes `None` and non-blank text is capped to
    /// [`REWARD_TEXT_LIMIT`] characters.
    pub fn new(code: &str, reward_text: Option<&str>, sort_key: u64) -> Self {
        let reward_text = reward_text
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(cap_reward_text);

        GameCode {
            code: code.trim().to_uppercase(),
            reward_text,
            sort_key,
            source_label: None,
        }
    }

    pub fn with_source(mut self, source_label: &str) -> Self {
        self.source_label = Some(source_label.to_string());
        self
    }

    /// Whether upstream already populated the reward description.
    pub fn has_reward(&self) -> bool {
        self.reward_text.is_some()
    }
}

impl fmt::Display for GameCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "code={}, sort_key={}, reward={:?}",
            self.code, self.sort_key, self.reward_text
        )
    }
}

/// Truncates a reward string to [`REWARD_TEXT_LIMIT`] characters.
pub fn cap_reward_text(text: &str) -> String {
    match text.char_indices().nth(REWARD_TEXT_LIMIT) {
        Some((index, _)) => text[..index].to_string(),
        None => text.to_string(),
    }
}

/// How the tracker decides whether a code was already announced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorMode {
    /// The source exposes a monotonic id: anything above the last published
    /// key is new.
    SortKey,
    /// The source has no stable ordering: membership in the set of published
    /// codes decides.
    CodeSet,
}

/// Format of the payload returned by a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// JSON document in one of the supported shapes
    Json,
    /// HTML page scraped for an "Active" codes table
    Wiki,
}

/// An upstream endpoint listing the active codes of a game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    /// Human readable label, used in logs and error reports
    pub name: String,
    /// Full URL to request
    pub url: String,
    pub kind: SourceKind,
}

/// Static description of a supported game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameDefinition {
    /// Stable key used in persisted state (`genshin`, `hkrpg`, ...)
    pub key: String,
    /// Display name
    pub name: String,
    /// Short alias used to build the manual fetch command (`fetch<alias>`)
    pub alias: String,
    /// Redemption page prefix, the code is appended to it
    ///
    /// `None` for games where codes can only be redeemed in-game
    pub redeem_url: Option<String>,
    /// Sources tried in order
    pub sources: Vec<Source>,
    pub cursor: CursorMode,
    /// Text shown when a code is published without reward details
    pub fallback_reward: String,
    /// Disabled games are never swept nor fetched
    pub enabled: bool,
}

impl GameDefinition {
    /// Name of the manual fetch command for this game.
    pub fn fetch_command(&self) -> String {
        format!("fetch{}", self.alias)
    }

    /// Link redeeming `code`, if the game supports web redemption.
    pub fn redeem_link(&self, code: &str) -> Option<String> {
        self.redeem_url
            .as_ref()
            .map(|prefix| format!("{}{}", prefix, code))
    }
}

impl fmt::Display for GameDefinition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.key)
    }
}

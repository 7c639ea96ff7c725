//! Cosmetic cleanup of reward descriptions.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use crate::codes::cap_reward_text;

/// Decoration applied to known reward items.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmojiMode {
    /// Prefix currencies and materials with a unicode emoji
    #[default]
    Unicode,
    /// Leave the text undecorated
    Plain,
}

const UNICODE_EMOJI: [(&str, &str); 26] = [
    ("primogem", "💎"),
    ("mora", "🪙"),
    ("hero's wit", "📕"),
    ("adventurer's experience", "📗"),
    ("mystic enhancement ore", "🔮"),
    ("fine enhancement ore", "🔷"),
    ("resin", "🌙"),
    ("stellar jade", "💎"),
    ("credit", "🪙"),
    ("traveler's guide", "📕"),
    ("adventure log", "📗"),
    ("refined aether", "🔮"),
    ("condensed aether", "🔷"),
    ("trailblaze power", "⚡"),
    ("polychrome", "💎"),
    ("dennies", "🪙"),
    ("senior investigator log", "📕"),
    ("w-engine energy module", "🔮"),
    ("battery charge", "⚡"),
    ("crystal", "💎"),
    ("asterite", "🪙"),
    ("stamina potion", "⚡"),
    ("coin", "🪙"),
    ("stamina", "⚡"),
    ("mithril", "🔷"),
    ("exp material", "📗"),
];

static STAR_COUNT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*(\d+)").unwrap());
static X_COUNT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bx\s*(\d+)").unwrap());
static TRAILING_COUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([a-zA-Z)'])(\d+)$").unwrap());
static SPACE_AFTER_TIMES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"×\s+").unwrap());
static GLUED_TIMES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\S)×").unwrap());
/// Every keyword in one alternation, longest first so that "stamina potion"
/// wins over "stamina".
static KEYWORDS: LazyLock<Regex> = LazyLock::new(|| {
    let mut keywords: Vec<&str> = UNICODE_EMOJI.iter().map(|(keyword, _)| *keyword).collect();
    keywords.sort_by_key(|keyword| std::cmp::Reverse(keyword.len()));
    let alternation = keywords
        .iter()
        .map(|keyword| regex::escape(keyword))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!("(?i)({})", alternation)).unwrap()
});

/// Cleans a raw reward string for display.
///
/// # Examples
///
/// ```
/// assert_eq!(format_rewards("Mora;Primogem*60", EmojiMode::Plain), "Mora, Primogem ×60");
/// assert_eq!(format_rewards("Hero's Wit3", EmojiMode::Plain), "Hero's Wit ×3");
/// ```
pub fn format_rewards(raw: &str, emoji: EmojiMode) -> String {
    let cleaned = clean_rewards(&cap_reward_text(raw).replace("&amp;", "&"));

    match emoji {
        EmojiMode::Plain => cleaned,
        EmojiMode::Unicode => decorate(&cleaned),
    }
}

fn clean_rewards(raw: &str) -> String {
    raw.split(';')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            let part = STAR_COUNT.replace_all(part, " ×$1");
            let part = X_COUNT.replace_all(&part, "×$1");
            let part = TRAILING_COUNT.replace_all(&part, "$1 ×$2");
            let part = SPACE_AFTER_TIMES.replace_all(&part, "×");
            let part = GLUED_TIMES.replace_all(&part, "$1 ×");
            part.trim().to_string()
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn decorate(text: &str) -> String {
    KEYWORDS
        .replace_all(text, |captures: &regex::Captures| {
            let matched = &captures[1];
            let emoji = UNICODE_EMOJI
                .iter()
                .find(|(keyword, _)| keyword.eq_ignore_ascii_case(matched))
                .map(|(_, emoji)| *emoji)
                .unwrap_or_default();
            format!("{} {}", emoji, matched)
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_reward_counts() {
        assert_eq!(
            format_rewards("Mora;Primogem*60", EmojiMode::Plain),
            "Mora, Primogem ×60"
        );
        assert_eq!(
            format_rewards("Hero's Wit3", EmojiMode::Plain),
            "Hero's Wit ×3"
        );
        assert_eq!(
            format_rewards("Teachings of Freedom*3", EmojiMode::Plain),
            "Teachings of Freedom ×3"
        );
        assert_eq!(
            format_rewards("Crystals x60", EmojiMode::Plain),
            "Crystals ×60"
        );
        assert_eq!(
            format_rewards("Stellar Jade × 50 ;; Credit x 5000", EmojiMode::Plain),
            "Stellar Jade ×50, Credit ×5000"
        );
    }

    #[test]
    fn test_entities_are_decoded() {
        assert_eq!(
            format_rewards("Dennies &amp; Polychrome*20", EmojiMode::Plain),
            "Dennies & Polychrome ×20"
        );
    }

    #[test]
    fn test_unicode_decoration() {
        assert_eq!(
            format_rewards("Primogem x60, Mora x5000", EmojiMode::Unicode),
            "💎 Primogem ×60, 🪙 Mora ×5000"
        );
        assert_eq!(
            format_rewards("Stamina Potion*2", EmojiMode::Unicode),
            "⚡ Stamina Potion ×2"
        );
    }

    #[test]
    fn test_long_rewards_are_capped() {
        let raw = "Mora;".repeat(400);
        let formatted = format_rewards(&raw, EmojiMode::Plain);
        assert_eq!(formatted.matches("Mora").count(), 100);
    }
}

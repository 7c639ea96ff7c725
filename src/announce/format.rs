//! Markdown rendering of code announcements.

use crate::announce::rewards::{EmojiMode, format_rewards};
use crate::codes::GameDefinition;
use crate::tracker::Published;

/// Why codes are being announced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnouncementKind {
    /// Codes discovered by a sweep
    New,
    /// Listing of every active code, requested by a user
    Active,
}

/// Builds the announcement of `codes`, one block per code.
///
/// # Examples
///
/// ```text
/// let body = format_announcement(&genshin, &codes, AnnouncementKind::New, EmojiMode::Unicode);
/// // 🆕 **New Genshin Impact codes**
/// //
/// // **`GENSHINGIFT`**
/// // 💎 Primogem ×60
/// // [Redeem](https://genshin.hoyoverse.com/en/gift?code=GENSHINGIFT)
/// ```
pub fn format_announcement(
    game: &GameDefinition,
    codes: &[Published],
    kind: AnnouncementKind,
    emoji: EmojiMode,
) -> String {
    let header = match kind {
        AnnouncementKind::New if codes.len() == 1 => format!("🆕 **New {} code**", game.name),
        AnnouncementKind::New => format!("🆕 **New {} codes**", game.name),
        AnnouncementKind::Active => {
            format!("🎁 **Active {} codes** ({})", game.name, codes.len())
        }
    };

    let mut blocks = vec![header];
    blocks.extend(codes.iter().map(|published| format_code(game, published, emoji)));

    blocks.join("\n\n")
}

fn format_code(game: &GameDefinition, published: &Published, emoji: EmojiMode) -> String {
    let code = &published.code;
    let rewards = match (&code.reward_text, published.fallback) {
        (Some(text), false) => format_rewards(text, emoji),
        (Some(text), true) => format!("_{}_", text),
        (None, _) => format!("_{}_", game.fallback_reward),
    };

    let redeem = match game.redeem_link(&code.code) {
        Some(link) => format!("[Redeem]({})", link),
        None => "_Redeem in-game: Account → Exchange Rewards_".to_string(),
    };

    format!("**`{}`**\n{}\n{}", code.code, rewards, redeem)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codes::{CursorMode, GameCode};

    fn game(redeem_url: Option<&str>) -> GameDefinition {
        GameDefinition {
            key: "genshin".to_string(),
            name: "Genshin Impact".to_string(),
            alias: "gi".to_string(),
            redeem_url: redeem_url.map(str::to_string),
            sources: vec![],
            cursor: CursorMode::SortKey,
            fallback_reward: "No idea".to_string(),
            enabled: true,
        }
    }

    #[test]
    fn test_format_new_code() {
        let codes = vec![Published {
            code: GameCode::new("GENSHINGIFT", Some("Primogem*60"), 1),
            fallback: false,
        }];
        let body = format_announcement(
            &game(Some("https://genshin.hoyoverse.com/en/gift?code=")),
            &codes,
            AnnouncementKind::New,
            EmojiMode::Unicode,
        );

        assert_eq!(
            body,
            "🆕 **New Genshin Impact code**\n\n**`GENSHINGIFT`**\n💎 Primogem ×60\n[Redeem](https://genshin.hoyoverse.com/en/gift?code=GENSHINGIFT)"
        );
    }

    #[test]
    fn test_format_fallback_and_in_game_codes() {
        let codes = vec![
            Published {
                code: GameCode::new("HELD", Some("No idea"), 1),
                fallback: true,
            },
            Published {
                code: GameCode::new("BARE", None, 2),
                fallback: false,
            },
        ];
        let body = format_announcement(&game(None), &codes, AnnouncementKind::Active, EmojiMode::Plain);

        assert_eq!(
            body,
            "🎁 **Active Genshin Impact codes** (2)\n\n\
             **`HELD`**\n_No idea_\n_Redeem in-game: Account → Exchange Rewards_\n\n\
             **`BARE`**\n_No idea_\n_Redeem in-game: Account → Exchange Rewards_"
        );
    }
}

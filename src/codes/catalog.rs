//! Built-in list of supported games.

use crate::codes::structs::{CursorMode, GameDefinition, Source, SourceKind};
use crate::config::Sources;

const DEFAULT_FALLBACK_REWARD: &str =
    "Reward details unavailable, check your in-game mail after redeeming.";

/// Builds the game catalog in announcement order.
///
/// # Arguments
///
/// * `sources` - Upstream endpoints from the configuration
/// * `disabled` - Game keys (or aliases) that must not be swept
pub fn game_catalog(sources: &Sources, disabled: &[String]) -> Vec<GameDefinition> {
    let hoyo = |param: &str| Source {
        name: "hoyo-codes API".to_string(),
        url: format!("{}?game={}", sources.hoyo_api_base, param),
        kind: SourceKind::Json,
    };

    let mut games = vec![
        GameDefinition {
            key: "genshin".to_string(),
            name: "Genshin Impact".to_string(),
            alias: "gi".to_string(),
            redeem_url: Some("https://genshin.hoyoverse.com/en/gift?code=".to_string()),
            sources: vec![hoyo("genshin")],
            cursor: CursorMode::SortKey,
            fallback_reward: "Paimon had no idea, probably Primogems.".to_string(),
            enabled: true,
        },
        GameDefinition {
            key: "hkrpg".to_string(),
            name: "Honkai: Star Rail".to_string(),
            alias: "hsr".to_string(),
            redeem_url: Some("https://hsr.hoyoverse.com/gift?code=".to_string()),
            sources: vec![hoyo("hkrpg")],
            cursor: CursorMode::SortKey,
            fallback_reward: "Pom-Pom had no clue, maybe Stellar Jade.".to_string(),
            enabled: true,
        },
        GameDefinition {
            key: "nap".to_string(),
            name: "Zenless Zone Zero".to_string(),
            alias: "zzz".to_string(),
            redeem_url: Some("https://zenless.hoyoverse.com/redemption?code=".to_string()),
            sources: vec![hoyo("nap")],
            cursor: CursorMode::SortKey,
            fallback_reward: "The Bangboo stayed silent, likely Polychromes.".to_string(),
            enabled: true,
        },
        GameDefinition {
            key: "honkai3rd".to_string(),
            name: "Honkai Impact 3rd".to_string(),
            alias: "hi3".to_string(),
            redeem_url: None,
            sources: vec![
                Source {
                    name: "ennead API".to_string(),
                    url: sources.honkai3rd_api.clone(),
                    kind: SourceKind::Json,
                },
                Source {
                    name: "Fandom Wiki".to_string(),
                    url: sources.honkai3rd_wiki.clone(),
                    kind: SourceKind::Wiki,
                },
            ],
            cursor: CursorMode::CodeSet,
            fallback_reward: DEFAULT_FALLBACK_REWARD.to_string(),
            enabled: true,
        },
    ];

    for game in games.iter_mut() {
        game.enabled = !disabled
            .iter()
            .any(|name| name.eq_ignore_ascii_case(&game.key) || name.eq_ignore_ascii_case(&game.alias));
    }

    games
}

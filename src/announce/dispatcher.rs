//! Delivery of announcements to channels.

use std::{sync::Arc, time::Duration};

use log::{debug, error, info, warn};
use tokio::time;

use crate::announce::{
    Announcer, DispatchError, SendError,
    chunk::split_message,
    format::{AnnouncementKind, format_announcement},
    rewards::EmojiMode,
};
use crate::codes::GameDefinition;
use crate::tracker::Published;

/// Outbound message settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSettings {
    /// Maximum characters of one message
    pub chunk_limit: usize,
    /// Pause between two chunks of the same announcement
    pub chunk_delay: Duration,
    /// Extra attempts for a chunk failing with a transient error
    pub send_retries: u32,
    pub emoji: EmojiMode,
}

/// Formats, chunks and sends announcements.
pub struct Dispatcher<A: Announcer> {
    announcer: Arc<A>,
    settings: DispatchSettings,
}

impl<A: Announcer> Dispatcher<A> {
    pub fn new(announcer: Arc<A>, settings: DispatchSettings) -> Self {
        Dispatcher {
            announcer,
            settings,
        }
    }

    /// Announces `codes` of `game` in `channel_id`.
    ///
    /// Chunks are sent in order. A chunk failing transiently is retried
    /// [`DispatchSettings::send_retries`] times and then skipped.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::ChannelUnreachable`] as soon as the platform denies
    ///   access to the channel; the remaining chunks are not sent
    /// - [`DispatchError::Incomplete`] when some chunks could not be sent
    pub async fn publish(
        &self,
        channel_id: &str,
        game: &GameDefinition,
        codes: &[Published],
        kind: AnnouncementKind,
    ) -> Result<(), DispatchError> {
        if codes.is_empty() {
            return Ok(());
        }

        let body = format_announcement(game, codes, kind, self.settings.emoji);
        let chunks = split_message(&body, self.settings.chunk_limit);
        info!(
            "announce {} {} codes in {} ({} messages)",
            codes.len(),
            game.key,
            channel_id,
            chunks.len()
        );

        let mut failed = 0;
        for (index, chunk) in chunks.iter().enumerate() {
            if index > 0 {
                time::sleep(self.settings.chunk_delay).await;
            }

            match self.send_chunk(channel_id, chunk).await {
                Ok(()) => {}
                Err(SendError::Unreachable(reason)) => {
                    warn!("{} is unreachable: {}", channel_id, reason);
                    return Err(DispatchError::ChannelUnreachable(reason));
                }
                Err(SendError::Transient(reason)) => {
                    error!(
                        "giving up message {}/{} in {}: {}",
                        index + 1,
                        chunks.len(),
                        channel_id,
                        reason
                    );
                    failed += 1;
                }
            }
        }

        if failed > 0 {
            return Err(DispatchError::Incomplete {
                failed,
                total: chunks.len(),
            });
        }

        Ok(())
    }

    async fn send_chunk(&self, channel_id: &str, chunk: &str) -> Result<(), SendError> {
        let mut attempt = 0;
        loop {
            match self.announcer.send(channel_id, chunk).await {
                Err(SendError::Transient(reason)) if attempt < self.settings.send_retries => {
                    attempt += 1;
                    debug!("send to {} failed ({}), retry {}", channel_id, reason, attempt);
                    time::sleep(self.settings.chunk_delay).await;
                }
                result => return result,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use mockall::{Sequence, predicate::eq};

    use super::*;
    use crate::announce::MockAnnouncer;
    use crate::codes::{CursorMode, GameCode};

    const ROOM: &str = "!room:example.com";

    fn settings(chunk_limit: usize) -> DispatchSettings {
        DispatchSettings {
            chunk_limit,
            chunk_delay: Duration::from_millis(0),
            send_retries: 1,
            emoji: EmojiMode::Plain,
        }
    }

    fn game() -> GameDefinition {
        GameDefinition {
            key: "hkrpg".to_string(),
            name: "Honkai: Star Rail".to_string(),
            alias: "hsr".to_string(),
            redeem_url: Some("https://hsr.hoyoverse.com/gift?code=".to_string()),
            sources: vec![],
            cursor: CursorMode::SortKey,
            fallback_reward: "Stellar Jade, maybe".to_string(),
            enabled: true,
        }
    }

    fn codes(count: usize) -> Vec<Published> {
        (0..count)
            .map(|i| Published {
                code: GameCode::new(&format!("STARRAIL{:02}", i), Some("Stellar Jade*60"), i as u64 + 1),
                fallback: false,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_publish_single_message() {
        let mut announcer = MockAnnouncer::new();
        announcer
            .expect_send()
            .withf(|channel_id, body| {
                channel_id == ROOM
                    && body.starts_with("🆕 **New Honkai: Star Rail code**")
                    && body.contains("**`STARRAIL00`**\nStellar Jade ×60")
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let dispatcher = Dispatcher::new(Arc::new(announcer), settings(2000));
        dispatcher
            .publish(ROOM, &game(), &codes(1), AnnouncementKind::New)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_publish_sends_chunks_in_order() {
        let mut announcer = MockAnnouncer::new();
        let mut sequence = Sequence::new();
        announcer
            .expect_send()
            .withf(|_, body| body.starts_with("🆕") && body.contains("STARRAIL00"))
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_, _| Ok(()));
        announcer
            .expect_send()
            .withf(|_, body| body.starts_with("**`STARRAIL01`**"))
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_, _| Ok(()));
        announcer
            .expect_send()
            .withf(|_, body| body.starts_with("**`STARRAIL02`**"))
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_, _| Ok(()));

        let dispatcher = Dispatcher::new(Arc::new(announcer), settings(150));
        dispatcher
            .publish(ROOM, &game(), &codes(3), AnnouncementKind::New)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_unreachable_channel_stops_dispatch() {
        let mut announcer = MockAnnouncer::new();
        announcer
            .expect_send()
            .times(1)
            .returning(|_, _| Err(SendError::Unreachable("M_FORBIDDEN".to_string())));

        let dispatcher = Dispatcher::new(Arc::new(announcer), settings(150));
        let result = dispatcher
            .publish(ROOM, &game(), &codes(3), AnnouncementKind::New)
            .await;

        assert_eq!(
            result,
            Err(DispatchError::ChannelUnreachable("M_FORBIDDEN".to_string()))
        );
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let mut announcer = MockAnnouncer::new();
        let mut sequence = Sequence::new();
        announcer
            .expect_send()
            .with(eq(ROOM), mockall::predicate::always())
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_, _| Err(SendError::Transient("timeout".to_string())));
        announcer
            .expect_send()
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_, _| Ok(()));

        let dispatcher = Dispatcher::new(Arc::new(announcer), settings(2000));
        dispatcher
            .publish(ROOM, &game(), &codes(1), AnnouncementKind::New)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_persistent_failure_reports_incomplete() {
        let mut announcer = MockAnnouncer::new();
        announcer
            .expect_send()
            .times(2)
            .returning(|_, _| Err(SendError::Transient("timeout".to_string())));

        let dispatcher = Dispatcher::new(Arc::new(announcer), settings(2000));
        let result = dispatcher
            .publish(ROOM, &game(), &codes(1), AnnouncementKind::New)
            .await;

        assert_eq!(result, Err(DispatchError::Incomplete { failed: 1, total: 1 }));
    }

    #[tokio::test]
    async fn test_nothing_to_publish() {
        let announcer = MockAnnouncer::new();
        let dispatcher = Dispatcher::new(Arc::new(announcer), settings(2000));

        dispatcher
            .publish(ROOM, &game(), &[], AnnouncementKind::New)
            .await
            .unwrap();
    }
}

//! Periodic sweep of every game for every subscribed channel.
//!
//! A sweep fetches each enabled game once, then reconciles the listing with
//! the state of every subscribed channel and announces what the tracker
//! selected. Sweeps never overlap: one requested while another is running is
//! skipped.

use std::{
    collections::HashSet,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use chrono::Utc;
use log::{error, info, warn};
use tokio::sync::Mutex;

use crate::{
    announce::{AnnouncementKind, Announcer, DispatchError, Dispatcher},
    codes::{CodeFetcher, GameDefinition, Requester},
    tracker::CodeTracker,
};

/// Summary of one sweep.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Another sweep was running, nothing was done
    pub skipped: bool,
    /// Games whose sources failed this sweep
    pub failed_games: Vec<String>,
    /// Codes announced across all channels
    pub published: usize,
    /// Channels dropped because they became unreachable
    pub removed_channels: Vec<String>,
}

/// Runs sweeps over the shared tracker.
pub struct Sweeper<R: Requester, A: Announcer> {
    tracker: Arc<Mutex<CodeTracker>>,
    fetcher: Arc<CodeFetcher<R>>,
    dispatcher: Arc<Dispatcher<A>>,
    games: Arc<Vec<GameDefinition>>,
    in_progress: AtomicBool,
}

/// Clears the in-progress flag when the sweep ends, even early.
struct InProgress<'a>(&'a AtomicBool);

impl Drop for InProgress<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<R: Requester, A: Announcer> Sweeper<R, A> {
    pub fn new(
        tracker: Arc<Mutex<CodeTracker>>,
        fetcher: Arc<CodeFetcher<R>>,
        dispatcher: Arc<Dispatcher<A>>,
        games: Arc<Vec<GameDefinition>>,
    ) -> Self {
        Sweeper {
            tracker,
            fetcher,
            dispatcher,
            games,
            in_progress: AtomicBool::new(false),
        }
    }

    /// Runs one sweep unless one is already running.
    pub async fn sweep(&self) -> SweepReport {
        if self
            .in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("previous sweep still running, skipping");
            return SweepReport {
                skipped: true,
                ..Default::default()
            };
        }
        let _guard = InProgress(&self.in_progress);

        let mut report = SweepReport::default();
        let mut channels = self.tracker.lock().await.enabled_channels();
        if channels.is_empty() {
            info!("no subscribed channel, skipping sweep");
            return report;
        }
        let mut unreachable = HashSet::new();

        for game in self.games.iter().filter(|game| game.enabled) {
            let codes = match self.fetcher.fetch(game).await {
                Ok(codes) => codes,
                Err(e) => {
                    error!("skipping {} this sweep: {}", game.key, e);
                    report.failed_games.push(game.key.clone());
                    continue;
                }
            };

            channels.retain(|channel_id| !unreachable.contains(channel_id));
            for channel_id in &channels {
                let decision = self
                    .tracker
                    .lock()
                    .await
                    .reconcile(channel_id, game, &codes, Utc::now());
                if decision.published.is_empty() {
                    continue;
                }

                match self
                    .dispatcher
                    .publish(channel_id, game, &decision.published, AnnouncementKind::New)
                    .await
                {
                    Ok(()) => report.published += decision.published.len(),
                    Err(DispatchError::ChannelUnreachable(reason)) => {
                        warn!("dropping subscription of {}: {}", channel_id, reason);
                        self.tracker.lock().await.remove_channel(channel_id);
                        unreachable.insert(channel_id.clone());
                        report.removed_channels.push(channel_id.clone());
                    }
                    Err(e) => {
                        error!("announcement of {} in {} failed: {}", game.key, channel_id, e);
                        report.published += decision.published.len();
                    }
                }
            }
        }

        if let Err(e) = self.tracker.lock().await.flush().await {
            error!("failed to persist tracking state: {:#}", e);
        }

        info!(
            "sweep done: {} codes published, {} games failed",
            report.published,
            report.failed_games.len()
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use mockall::predicate::{always, eq};
    use tempfile::TempDir;

    use super::*;
    use crate::{
        announce::{DispatchSettings, EmojiMode, MockAnnouncer, SendError},
        codes::{CursorMode, GameCode, MockRequester, RequestError, RetryPolicy, Source, SourceKind},
        tracker::{PendingPolicy, StateStore},
    };

    const ROOM_A: &str = "!a:example.com";
    const ROOM_B: &str = "!b:example.com";

    fn game(key: &str) -> GameDefinition {
        GameDefinition {
            key: key.to_string(),
            name: key.to_uppercase(),
            alias: key.to_string(),
            redeem_url: None,
            sources: vec![Source {
                name: "api".to_string(),
                url: format!("http://api.local/codes?game={}", key),
                kind: SourceKind::Json,
            }],
            cursor: CursorMode::SortKey,
            fallback_reward: "unknown".to_string(),
            enabled: true,
        }
    }

    async fn tracker(
        dir: &TempDir,
        channels: &[&str],
        games: &[GameDefinition],
    ) -> Arc<Mutex<CodeTracker>> {
        let policy = PendingPolicy {
            retry_limit: 3,
            hold: chrono::Duration::minutes(180),
            max_absent_sweeps: 3,
            max_pending_age: chrono::Duration::days(2),
        };
        let mut tracker = CodeTracker::load(StateStore::new(dir.path()), policy)
            .await
            .unwrap();
        for channel_id in channels {
            tracker.enable(channel_id);
            for game in games {
                tracker.prime(channel_id, game, &[]);
            }
        }
        Arc::new(Mutex::new(tracker))
    }

    fn sweeper(
        tracker: Arc<Mutex<CodeTracker>>,
        requester: MockRequester,
        announcer: MockAnnouncer,
        games: Vec<GameDefinition>,
    ) -> Sweeper<MockRequester, MockAnnouncer> {
        let fetcher = CodeFetcher::new(
            requester,
            RetryPolicy {
                retries: 0,
                backoff: Duration::from_millis(0),
            },
        );
        let dispatcher = Dispatcher::new(
            Arc::new(announcer),
            DispatchSettings {
                chunk_limit: 2000,
                chunk_delay: Duration::from_millis(0),
                send_retries: 0,
                emoji: EmojiMode::Plain,
            },
        );
        Sweeper::new(tracker, Arc::new(fetcher), Arc::new(dispatcher), Arc::new(games))
    }

    #[tokio::test]
    async fn test_each_game_is_fetched_once_for_all_channels() {
        let dir = TempDir::new().unwrap();
        let games = vec![game("genshin")];
        let tracker = tracker(&dir, &[ROOM_A, ROOM_B], &games).await;

        let mut requester = MockRequester::new();
        requester
            .expect_get_text()
            .with(eq("http://api.local/codes?game=genshin"), eq(SourceKind::Json))
            .times(2)
            .returning(|_, _| Ok(r#"[{"code": "NEWCODE", "id": 1, "rewards": "Mora"}]"#.to_string()));

        let mut announcer = MockAnnouncer::new();
        announcer
            .expect_send()
            .with(eq(ROOM_A), always())
            .times(1)
            .returning(|_, _| Ok(()));
        announcer
            .expect_send()
            .with(eq(ROOM_B), always())
            .times(1)
            .returning(|_, _| Ok(()));

        let sweeper = sweeper(Arc::clone(&tracker), requester, announcer, games);
        let report = sweeper.sweep().await;
        assert_eq!(report.published, 2);
        assert!(report.failed_games.is_empty());

        let report = sweeper.sweep().await;
        assert_eq!(report.published, 0);
        assert!(!tracker.lock().await.is_dirty());
    }

    #[tokio::test]
    async fn test_failing_game_does_not_stop_sweep() {
        let dir = TempDir::new().unwrap();
        let games = vec![game("genshin"), game("hkrpg")];
        let tracker = tracker(&dir, &[ROOM_A], &games).await;
        {
            let mut tracker = tracker.lock().await;
            tracker.prime(ROOM_A, &games[0], &[GameCode::new("OLDCODE", Some("Mora"), 5)]);
            let decision =
                tracker.reconcile(ROOM_A, &games[0], &[GameCode::new("HELDCODE", None, 7)], Utc::now());
            assert_eq!(decision.held, vec!["HELDCODE"]);
            tracker.flush().await.unwrap();
        }
        let store = StateStore::new(dir.path());
        let genshin_before = store.load_channels().await.unwrap()[ROOM_A].games["genshin"].clone();

        let mut requester = MockRequester::new();
        requester
            .expect_get_text()
            .with(eq("http://api.local/codes?game=genshin"), always())
            .times(1)
            .returning(|_, _| Err(RequestError::Status(503)));
        requester
            .expect_get_text()
            .with(eq("http://api.local/codes?game=hkrpg"), always())
            .times(1)
            .returning(|_, _| Ok(r#"[{"code": "STARRAIL", "id": 3, "rewards": "Credit"}]"#.to_string()));

        let mut announcer = MockAnnouncer::new();
        announcer
            .expect_send()
            .withf(|channel_id, body| channel_id == ROOM_A && body.contains("STARRAIL"))
            .times(1)
            .returning(|_, _| Ok(()));

        let report = sweeper(tracker, requester, announcer, games).sweep().await;

        assert_eq!(report.failed_games, vec!["genshin"]);
        assert_eq!(report.published, 1);

        // The failed game keeps its cursor and its held code untouched
        let channels = store.load_channels().await.unwrap();
        assert_eq!(channels[ROOM_A].games["genshin"], genshin_before);
        assert_eq!(channels[ROOM_A].games["genshin"].last_published_key, 5);
        assert_eq!(channels[ROOM_A].games["hkrpg"].last_published_key, 3);
        let pending = store.load_pending().await.unwrap();
        let held = &pending[ROOM_A]["genshin"]["HELDCODE"];
        assert_eq!(held.attempt_count, 1);
        assert_eq!(held.absent_streak, 0);
    }

    #[tokio::test]
    async fn test_unreachable_channel_is_removed() {
        let dir = TempDir::new().unwrap();
        let games = vec![game("genshin"), game("hkrpg")];
        let tracker = tracker(&dir, &[ROOM_A, ROOM_B], &games).await;

        let mut requester = MockRequester::new();
        requester
            .expect_get_text()
            .times(2)
            .returning(|url, _| Ok(format!(r#"[{{"code": "{}", "id": 1, "rewards": "Mora"}}]"#, &url[url.len() - 5..])));

        let mut announcer = MockAnnouncer::new();
        announcer
            .expect_send()
            .with(eq(ROOM_A), always())
            .times(1)
            .returning(|_, _| Err(SendError::Unreachable("M_FORBIDDEN".to_string())));
        announcer
            .expect_send()
            .with(eq(ROOM_B), always())
            .times(2)
            .returning(|_, _| Ok(()));

        let report = sweeper(Arc::clone(&tracker), requester, announcer, games).sweep().await;

        assert_eq!(report.removed_channels, vec![ROOM_A]);
        assert_eq!(report.published, 2);
        assert_eq!(tracker.lock().await.enabled_channels(), vec![ROOM_B]);
    }

    #[tokio::test]
    async fn test_disabled_game_is_not_fetched() {
        let dir = TempDir::new().unwrap();
        let mut disabled = game("nap");
        disabled.enabled = false;
        let games = vec![disabled];
        let tracker = tracker(&dir, &[ROOM_A], &games).await;

        let requester = MockRequester::new();
        let announcer = MockAnnouncer::new();

        let report = sweeper(tracker, requester, announcer, games).sweep().await;
        assert_eq!(report, SweepReport::default());
    }

    #[tokio::test]
    async fn test_sweep_without_channels_fetches_nothing() {
        let dir = TempDir::new().unwrap();
        let games = vec![game("genshin")];
        let tracker = tracker(&dir, &[], &games).await;

        let report = sweeper(tracker, MockRequester::new(), MockAnnouncer::new(), games)
            .sweep()
            .await;
        assert_eq!(report, SweepReport::default());
    }

    #[tokio::test]
    async fn test_overlapping_sweep_is_skipped() {
        let dir = TempDir::new().unwrap();
        let games = vec![game("genshin")];
        let tracker = tracker(&dir, &[], &games).await;
        let sweeper = sweeper(tracker, MockRequester::new(), MockAnnouncer::new(), games);

        sweeper.in_progress.store(true, Ordering::Release);
        let report = sweeper.sweep().await;
        assert!(report.skipped);

        sweeper.in_progress.store(false, Ordering::Release);
        let report = sweeper.sweep().await;
        assert!(!report.skipped);
    }
}

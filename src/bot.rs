//! Main bot wiring Matrix, the code sources and the tracker together.
//!
//! # Architecture
//!
//! The bot runs two concurrent activities:
//!
//! 1. **Sweep Task**: every `fetch.interval_minutes`, fetches each game once
//!    and announces the new codes in every subscribed room. The first sweep
//!    runs at start-up.
//! 2. **Matrix Sync**: listens for messages, runs the commands and replies.
//!
//! Both share the [`CodeTracker`] behind one mutex. It is flushed at the end
//! of each sweep, after each command changing it and before exiting.
//!
//! # Command Processing Flow
//!
//! ```text
//! Matrix Message → Parse Command → Fetch Games → Execute → Apply Changes → Announce → Reply
//! ```

use std::{
    path::Path,
    sync::Arc,
    time::{Duration, Instant},
};

use futures::future::join_all;
use log::{error, info, warn};
use tokio::{
    signal,
    sync::{Mutex, Notify},
    time::{self, MissedTickBehavior},
};

use crate::{
    announce::{AnnouncementKind, DispatchError, Dispatcher},
    codes::{CodeFetcher, SourceRequester, game_catalog},
    commands::{
        CommandContext, CommandParseError, CommandResult, Commander, Cooldowns, FetchOutcome,
        SubscriptionChange,
    },
    config::{self, Config},
    matrix::{MatrixClient, MatrixError, UserCredentials},
    sweep::Sweeper,
    tracker::{CodeTracker, StateStore},
    utils::prepare_data_dir,
};

/// Why the bot stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// Interrupted by a signal or the end of the sync
    Shutdown,
    /// A moderator asked for a restart
    Restart,
}

/// Services shared by the message handlers.
#[derive(Clone)]
struct Services {
    matrix_client: Arc<MatrixClient>,
    tracker: Arc<Mutex<CodeTracker>>,
    fetcher: Arc<CodeFetcher<SourceRequester>>,
    dispatcher: Arc<Dispatcher<MatrixClient>>,
    commander: Arc<Commander>,
    cooldowns: Arc<Mutex<Cooldowns>>,
    account: Arc<config::Matrix>,
    restart: Arc<Notify>,
}

struct MessageContext {
    body: String,
    room_id: String,
    sender_id: String,
    event_id: String,
    services: Services,
}

pub struct Bot {
    services: Services,
    sweeper: Arc<Sweeper<SourceRequester, MatrixClient>>,
    sweep_interval: Duration,
}

impl Bot {
    /// Loads the tracking state, logs in and prepares every service.
    ///
    /// # Errors
    ///
    /// [`MatrixError::CredentialInvalid`] when the homeserver rejects the
    /// credentials, [`MatrixError::Other`] for any other start-up failure.
    pub async fn new(config: Config, data_dir: &Path) -> Result<Self, MatrixError> {
        let paths = prepare_data_dir(data_dir).await?;
        let games = Arc::new(game_catalog(&config.sources, &config.fetch.disabled_games));
        for game in games.iter().filter(|game| !game.enabled) {
            info!("{} is disabled", game);
        }

        let requester = SourceRequester::new(
            Duration::from_secs(config.fetch.timeout_seconds),
            Duration::from_secs(config.fetch.wiki_timeout_seconds),
        );
        let fetcher = Arc::new(CodeFetcher::new(requester, config.fetch.retry_policy()));

        let tracker = Arc::new(Mutex::new(
            CodeTracker::load(StateStore::new(&paths.state), config.pending.policy()).await?,
        ));

        let matrix_client = Arc::new(
            MatrixClient::new(
                &UserCredentials {
                    user_id: config.matrix.user_id.clone(),
                    password: config.matrix.password.clone(),
                    passphrase: config.matrix.passphrase.clone(),
                },
                &paths.session,
            )
            .await?,
        );

        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&matrix_client),
            config.announce.settings(),
        ));
        let sweeper = Arc::new(Sweeper::new(
            Arc::clone(&tracker),
            Arc::clone(&fetcher),
            Arc::clone(&dispatcher),
            Arc::clone(&games),
        ));
        let commander = Arc::new(Commander::new(config.matrix.prefix_char(), &games));
        let cooldowns = Arc::new(Mutex::new(Cooldowns::new(Duration::from_secs(
            config.fetch.command_cooldown_seconds,
        ))));

        Ok(Bot {
            services: Services {
                matrix_client,
                tracker,
                fetcher,
                dispatcher,
                commander,
                cooldowns,
                account: Arc::new(config.matrix),
                restart: Arc::new(Notify::new()),
            },
            sweeper,
            sweep_interval: config.fetch.interval(),
        })
    }

    /// Runs until a signal, a restart command or a fatal sync error.
    ///
    /// The tracking state is flushed before returning.
    pub async fn start(self) -> Result<ExitReason, MatrixError> {
        self.start_sweep_task();

        let services = self.services.clone();
        let on_message = move |body: String, room_id: String, sender_id: String, event_id: String| {
            Self::handle_matrix_message(MessageContext {
                body,
                room_id,
                sender_id,
                event_id,
                services: services.clone(),
            })
        };

        let outcome = tokio::select! {
            result = self.services.matrix_client.sync(on_message) => {
                result.map(|()| ExitReason::Shutdown)
            }
            () = shutdown_signal() => {
                info!("shutdown requested");
                Ok(ExitReason::Shutdown)
            }
            () = self.services.restart.notified() => {
                info!("restart requested");
                Ok(ExitReason::Restart)
            }
        };

        let mut tracker = self.services.tracker.lock().await;
        if tracker.is_dirty() {
            info!("saving tracking state before exit");
        }
        if let Err(e) = tracker.flush().await {
            error!("failed to persist tracking state on exit: {:#}", e);
        }
        drop(tracker);

        outcome
    }

    fn start_sweep_task(&self) {
        let sweeper = Arc::clone(&self.sweeper);
        let period = self.sweep_interval;

        tokio::spawn(async move {
            info!("sweeping code sources every {} minutes", period.as_secs() / 60);
            let mut interval = time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                interval.tick().await;
                sweeper.sweep().await;
            }
        });
    }

    fn handle_matrix_message(ctx: MessageContext) {
        tokio::spawn(async move {
            let services = &ctx.services;

            let command = match services.commander.parse(&ctx.body) {
                Ok(command) => command,
                Err(CommandParseError::NotForBot) => return,
                Err(CommandParseError::InvalidCommand(message)) => {
                    services
                        .matrix_client
                        .send_reply(&ctx.room_id, &ctx.sender_id, &ctx.event_id, &message)
                        .await;
                    return;
                }
            };
            info!("{} runs {:?} in {}", ctx.sender_id, command, ctx.room_id);

            let channel_enabled = services.tracker.lock().await.is_enabled(&ctx.room_id);
            let is_operator = services.account.is_moderator(&ctx.sender_id);
            let is_moderator = is_operator
                || (command.is_privileged()
                    && services
                        .matrix_client
                        .can_moderate(&ctx.room_id, &ctx.sender_id)
                        .await);
            let mut context = CommandContext {
                channel_id: ctx.room_id.clone(),
                sender_id: ctx.sender_id.clone(),
                channel_enabled,
                is_moderator,
                is_operator,
                cooldown: None,
                fetched: vec![],
            };

            if let Some(game) = services.commander.cooldown_target(&command) {
                context.cooldown = services
                    .cooldowns
                    .lock()
                    .await
                    .try_acquire(&ctx.room_id, &game.key, Instant::now())
                    .err();
            }

            let fetcher = &services.fetcher;
            let games = services.commander.games_to_fetch(&command, &context);
            context.fetched = join_all(games.into_iter().map(|game| async move {
                let result = fetcher.fetch(&game).await;
                FetchOutcome { game, result }
            }))
            .await;

            let result = services.commander.parse_command(&command, &context);
            Self::apply_result(&ctx, result).await;
        });
    }

    async fn apply_result(ctx: &MessageContext, result: CommandResult) {
        let services = &ctx.services;
        let room_id = ctx.room_id.as_str();

        if let Some(change) = &result.subscription_change {
            let mut tracker = services.tracker.lock().await;
            match change {
                SubscriptionChange::Enable(primes) => {
                    tracker.enable(room_id);
                    for (game, codes) in primes {
                        tracker.prime(room_id, game, codes);
                    }
                }
                SubscriptionChange::Disable => {
                    tracker.disable(room_id);
                }
                SubscriptionChange::Prime(primes) => {
                    for (game, codes) in primes {
                        tracker.prime(room_id, game, codes);
                    }
                }
            }
        }

        for announcement in &result.announcements {
            match services
                .dispatcher
                .publish(
                    room_id,
                    &announcement.game,
                    &announcement.codes,
                    AnnouncementKind::Active,
                )
                .await
            {
                Ok(()) => {}
                Err(DispatchError::ChannelUnreachable(reason)) => {
                    warn!("dropping subscription of {}: {}", room_id, reason);
                    services.tracker.lock().await.remove_channel(room_id);
                    break;
                }
                Err(e) => error!("listing of {} in {} failed: {}", announcement.game.key, room_id, e),
            }
        }

        if let Some(response) = &result.response {
            services
                .matrix_client
                .send_reply(room_id, &ctx.sender_id, &ctx.event_id, response)
                .await;
        }

        if let Err(e) = services.tracker.lock().await.flush().await {
            error!("failed to persist tracking state: {:#}", e);
        }

        if result.restart {
            services.restart.notify_one();
        }
    }
}

/// Completes on Ctrl-C, or SIGTERM on Unix.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{self, SignalKind};

        match unix::signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = signal::ctrl_c() => {}
                    _ = terminate.recv() => {}
                }
            }
            Err(e) => {
                warn!("cannot listen to SIGTERM: {}", e);
                let _ = signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = signal::ctrl_c().await;
    }
}

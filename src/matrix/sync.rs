//! Matrix client synchronization and event handling.
//!
//! [`MatrixSync::sync`] catches up with the homeserver once, then registers
//! the handlers for invites and room messages and syncs forever, persisting
//! the sync token after every response.

use std::sync::Arc;

use log::{error, info, warn};
use matrix_sdk::{
    Client, LoopCtrl, Room, RoomState,
    config::SyncSettings,
    ruma::{
        api::client::filter::FilterDefinition,
        events::room::{
            member::StrippedRoomMemberEvent,
            message::{MessageType, OriginalSyncRoomMessageEvent},
        },
    },
};
use tokio::time::{Duration, sleep};

use crate::matrix::{MatrixError, is_credential_error, session::MatrixSession};

const SYNC_RETRY_DELAY: Duration = Duration::from_secs(10);
const MAX_JOIN_DELAY_SECONDS: u64 = 3600;

pub struct MatrixSync {
    client: Client,
    session: Arc<MatrixSession>,
}

impl MatrixSync {
    pub fn new(client: &Client, session: Arc<MatrixSession>) -> Self {
        MatrixSync {
            client: client.to_owned(),
            session,
        }
    }

    /// Syncs until the homeserver rejects the credentials.
    ///
    /// `on_message` receives the body, room id, sender id and event id of
    /// every text message posted in a joined room after start-up.
    pub async fn sync<F>(&self, on_message: F) -> Result<(), MatrixError>
    where
        F: Fn(String, String, String, String) + Send + Sync + 'static + Clone,
    {
        info!("start syncing");

        self.client.add_event_handler(auto_join_rooms);

        let filter = FilterDefinition::with_lazy_loading();
        let mut sync_settings = SyncSettings::default().filter(filter.into());
        if let Some(sync_token) = self.session.sync_token().await {
            sync_settings = sync_settings.token(sync_token);
        }

        // Catch up first so messages sent while offline are not handled
        let response = loop {
            match self.client.sync_once(sync_settings.clone()).await {
                Ok(response) => break response,
                Err(e) if is_credential_error(e.client_api_error_kind()) => {
                    return Err(MatrixError::from_sdk(e, "initial sync"));
                }
                Err(e) => {
                    error!("initial sync failed: {}, retrying", e);
                    sleep(SYNC_RETRY_DELAY).await;
                }
            }
        };
        if let Err(e) = self
            .session
            .persist_sync_token(response.next_batch.clone())
            .await
        {
            error!("failed to persist sync token: {:#}", e);
        }

        let on_message = Arc::new(on_message);
        self.client.add_event_handler({
            let on_message = Arc::clone(&on_message);
            move |event: OriginalSyncRoomMessageEvent, room: Room| {
                let on_message = Arc::clone(&on_message);
                async move { on_room_message(event, room, &on_message).await }
            }
        });

        sync_settings = sync_settings.token(response.next_batch);
        let session = Arc::clone(&self.session);
        self.client
            .sync_with_result_callback(sync_settings, |sync_result| {
                let session = Arc::clone(&session);
                async move {
                    match sync_result {
                        Ok(response) => {
                            if let Err(e) = session.persist_sync_token(response.next_batch).await {
                                error!("failed to persist sync token: {:#}", e);
                            }
                        }
                        Err(e) if is_credential_error(e.client_api_error_kind()) => return Err(e),
                        Err(e) => {
                            warn!("sync failed: {}, retrying", e);
                            sleep(SYNC_RETRY_DELAY).await;
                        }
                    }
                    Ok(LoopCtrl::Continue)
                }
            })
            .await
            .map_err(|e| MatrixError::from_sdk(e, "sync"))
    }
}

async fn auto_join_rooms(room_member: StrippedRoomMemberEvent, client: Client, room: Room) {
    let Some(user_id) = client.user_id() else {
        warn!("could not get user id from client");
        return;
    };

    if room_member.state_key != user_id {
        return;
    }

    tokio::spawn(async move {
        info!("auto joining room {}", room.room_id());
        let mut delay = 2;

        // Invites can arrive before the room accepts the join
        while let Err(err) = room.join().await {
            error!(
                "failed to join room {} ({err:?}), retrying in {delay}s",
                room.room_id()
            );

            sleep(Duration::from_secs(delay)).await;
            delay *= 2;

            if delay > MAX_JOIN_DELAY_SECONDS {
                error!("can't join room {} ({err:?})", room.room_id());
                return;
            }
        }
        info!("joined room {}", room.room_id());
    });
}

async fn on_room_message<F>(event: OriginalSyncRoomMessageEvent, room: Room, on_message: &Arc<F>)
where
    F: Fn(String, String, String, String) + Send + Sync + 'static,
{
    if room.state() != RoomState::Joined {
        return;
    }

    if &*event.sender == room.own_user_id() {
        return;
    }

    let MessageType::Text(text_content) = event.content.msgtype else {
        return;
    };

    on_message(
        text_content.body,
        room.room_id().to_string(),
        event.sender.to_string(),
        event.event_id.to_string(),
    );
}

//! Matrix client wrapper for bot messaging and synchronization.

use std::{path::Path, sync::Arc};

use log::{error, info, warn};
use matrix_sdk::{
    Client, RoomState,
    ruma::{
        EventId, RoomId, UserId,
        api::client::error::ErrorKind,
        events::{
            StateEventType,
            room::message::{AddMentions, ForwardThread, ReplyMetadata, RoomMessageEventContent},
        },
    },
};

use crate::{
    announce::{Announcer, SendError},
    matrix::{MatrixError, UserCredentials, login::setup_client, session::MatrixSession, sync::MatrixSync},
};

/// High-level Matrix client used by the bot.
///
/// Wraps the SDK client, runs the sync loop and posts announcements and
/// command replies.
pub struct MatrixClient {
    matrix_sync: MatrixSync,
    client: Client,
}

impl MatrixClient {
    /// Logs in, or restores the session stored in `session_dir`.
    ///
    /// # Errors
    ///
    /// [`MatrixError::CredentialInvalid`] when the homeserver rejects the
    /// credentials.
    pub async fn new(
        credentials: &UserCredentials,
        session_dir: &Path,
    ) -> Result<Self, MatrixError> {
        let session = Arc::new(MatrixSession::load(session_dir).await);
        let client = setup_client(credentials, &session).await?;

        if let Err(e) = client.account().set_display_name(Some("Codewatch")).await {
            warn!("failed to set display name: {}", e);
        }

        let matrix_sync = MatrixSync::new(&client, session);

        Ok(MatrixClient {
            matrix_sync,
            client,
        })
    }

    /// Runs the sync loop, handing every text message to `on_message`.
    ///
    /// Only returns on a sync failure that retrying cannot fix.
    pub async fn sync<F>(&self, on_message: F) -> Result<(), MatrixError>
    where
        F: Fn(String, String, String, String) + Send + Sync + 'static + Clone,
    {
        let result = self.matrix_sync.sync(on_message).await;
        match &result {
            Ok(()) => info!("matrix sync ended"),
            Err(e) => error!("matrix sync ended with error: {}", e),
        }
        result
    }

    /// Replies to `event_id` with a Markdown `body`.
    ///
    /// Falls back to a plain message when the ids cannot be parsed.
    pub async fn send_reply(&self, room_id: &str, sender_id: &str, event_id: &str, body: &str) {
        let content = RoomMessageEventContent::text_markdown(body);
        let content = match (UserId::parse(sender_id), EventId::parse(event_id)) {
            (Ok(sender), Ok(event)) => content.make_reply_to(
                ReplyMetadata::new(&event, &sender, None),
                ForwardThread::No,
                AddMentions::No,
            ),
            _ => {
                warn!("cannot reply to {} from {}, sending a plain message", event_id, sender_id);
                content
            }
        };

        if let Err(e) = self.send_content(room_id, content).await {
            error!("failed to reply in {}: {}", room_id, e);
        }
    }

    /// Whether `user_id` may change the power levels of `room_id`.
    ///
    /// Unknown rooms and members, or a failed member lookup, count as no.
    pub async fn can_moderate(&self, room_id: &str, user_id: &str) -> bool {
        let (Ok(room_id), Ok(user_id)) = (RoomId::parse(room_id), UserId::parse(user_id)) else {
            return false;
        };
        let Some(room) = self.client.get_room(&room_id) else {
            return false;
        };

        match room.get_member(&user_id).await {
            Ok(Some(member)) => member.can_send_state(StateEventType::RoomPowerLevels),
            Ok(None) => false,
            Err(e) => {
                warn!("cannot check power level of {} in {}: {}", user_id, room_id, e);
                false
            }
        }
    }

    async fn send_content(
        &self,
        room_id: &str,
        content: RoomMessageEventContent,
    ) -> Result<(), SendError> {
        let Ok(parsed_room_id) = RoomId::parse(room_id) else {
            return Err(SendError::Unreachable(format!("invalid room id {}", room_id)));
        };

        let Some(room) = self.client.get_room(&parsed_room_id) else {
            return Err(SendError::Unreachable("unknown room".to_string()));
        };
        if room.state() != RoomState::Joined {
            return Err(SendError::Unreachable(format!("room is {:?}", room.state())));
        }

        match room.send(content).await {
            Ok(_) => Ok(()),
            Err(e) => Err(classify_send_error(e.client_api_error_kind(), e.to_string())),
        }
    }
}

impl Announcer for MatrixClient {
    async fn send(&self, channel_id: &str, body: &str) -> Result<(), SendError> {
        self.send_content(channel_id, RoomMessageEventContent::text_markdown(body))
            .await
    }
}

fn classify_send_error(kind: Option<&ErrorKind>, message: String) -> SendError {
    match kind {
        Some(ErrorKind::Forbidden { .. } | ErrorKind::NotFound) => SendError::Unreachable(message),
        _ => SendError::Transient(message),
    }
}

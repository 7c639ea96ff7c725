//! Persistence of the Matrix login session and sync token.
//!
//! The session directory holds two entries: `session`, a JSON document with
//! the access token and the last sync token, and `sqlite`, the matrix-sdk
//! state store.

use std::path::{Path, PathBuf};

use log::{debug, trace, warn};
use matrix_sdk::authentication::matrix;
use serde::{Deserialize, Serialize};
use tokio::{fs, sync::Mutex};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Session {
    user_session: matrix::MatrixSession,

    #[serde(skip_serializing_if = "Option::is_none")]
    sync_token: Option<String>,
}

/// Session files of the bot account.
pub struct MatrixSession {
    session: Mutex<Option<Session>>,
    sqlite_path: PathBuf,
    session_path: PathBuf,
}

impl MatrixSession {
    /// Reads the session stored in `dir`, if any.
    ///
    /// An unreadable session file is ignored and the bot logs in again.
    pub async fn load(dir: &Path) -> MatrixSession {
        let sqlite_path = dir.join("sqlite");
        let session_path = dir.join("session");

        let session = match fs::read_to_string(&session_path).await {
            Ok(data) => match serde_json::from_str::<Session>(&data) {
                Ok(session) => Some(session),
                Err(e) => {
                    warn!("ignoring unreadable session {}: {}", session_path.display(), e);
                    None
                }
            },
            Err(_) => None,
        };
        debug!("found user session: {}", session.is_some());

        MatrixSession {
            session: Mutex::new(session),
            sqlite_path,
            session_path,
        }
    }

    pub fn sqlite_path(&self) -> &Path {
        &self.sqlite_path
    }

    pub async fn user_session(&self) -> Option<matrix::MatrixSession> {
        self.session
            .lock()
            .await
            .as_ref()
            .map(|session| session.user_session.clone())
    }

    pub async fn sync_token(&self) -> Option<String> {
        self.session
            .lock()
            .await
            .as_ref()
            .and_then(|session| session.sync_token.clone())
    }

    /// Stores a fresh login, forgetting any previous sync token.
    pub async fn persist_user_session(
        &self,
        user_session: &matrix::MatrixSession,
    ) -> anyhow::Result<()> {
        trace!("persist user session");

        let mut session = self.session.lock().await;
        let fresh = Session {
            user_session: user_session.clone(),
            sync_token: None,
        };
        self.write(&fresh).await?;
        *session = Some(fresh);

        Ok(())
    }

    pub async fn persist_sync_token(&self, sync_token: String) -> anyhow::Result<()> {
        trace!("persist sync token {}", sync_token);

        let mut session = self.session.lock().await;
        let Some(current) = session.as_mut() else {
            anyhow::bail!("no user session to attach the sync token to");
        };
        current.sync_token = Some(sync_token);
        self.write(current).await
    }

    async fn write(&self, session: &Session) -> anyhow::Result<()> {
        let tmp_path = self.session_path.with_extension("tmp");
        fs::write(&tmp_path, serde_json::to_string(session)?).await?;
        fs::rename(&tmp_path, &self.session_path).await?;
        Ok(())
    }
}

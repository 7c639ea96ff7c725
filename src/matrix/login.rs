//! Creation of the logged-in Matrix client.

use anyhow::{Context, anyhow};
use log::{debug, info};
use matrix_sdk::{Client, ruma::OwnedUserId};

use crate::matrix::{MatrixError, UserCredentials, session::MatrixSession};

/// Builds a client on the sqlite store of `session` and authenticates it.
///
/// The stored session is restored when there is one. Otherwise the bot logs
/// in with its password and the new session is persisted.
///
/// # Errors
///
/// [`MatrixError::CredentialInvalid`] when the homeserver rejects the
/// password, any other failure as [`MatrixError::Other`].
pub async fn setup_client(
    credentials: &UserCredentials,
    session: &MatrixSession,
) -> Result<Client, MatrixError> {
    let user_id = OwnedUserId::try_from(credentials.user_id.as_str())
        .map_err(|e| anyhow!("invalid user id {}: {}", credentials.user_id, e))?;

    let client = Client::builder()
        .server_name(user_id.server_name())
        .sqlite_store(session.sqlite_path(), Some(&credentials.passphrase))
        .build()
        .await
        .context("failed to build the matrix client")?;
    debug!("matrix client created");

    if let Some(user_session) = session.user_session().await {
        info!("restoring matrix session of {}", user_session.meta.user_id);
        client
            .restore_session(user_session)
            .await
            .map_err(|e| MatrixError::from_sdk(e, "session restore"))?;
        return Ok(client);
    }

    info!("logging in as {}", user_id);
    client
        .matrix_auth()
        .login_username(&user_id, &credentials.password)
        .initial_device_display_name("codewatch bot")
        .send()
        .await
        .map_err(|e| MatrixError::from_sdk(e, "login"))?;

    let user_session = client
        .matrix_auth()
        .session()
        .ok_or_else(|| anyhow!("no session after login"))?;
    session
        .persist_user_session(&user_session)
        .await
        .context("failed to persist the user session")?;

    info!("matrix client setup complete");
    Ok(client)
}

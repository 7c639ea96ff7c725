//! Matrix protocol integration for the bot.
//!
//! - `client` - [`MatrixClient`], message sending and the [`Announcer`](crate::announce::Announcer) implementation
//! - `login` - Login or session restoration
//! - `session` - Session and sync token persistence
//! - `sync` - Sync loop, auto-join and message delivery

mod client;
mod login;
mod session;
mod sync;

use matrix_sdk::ruma::api::client::error::ErrorKind;
use thiserror::Error;

pub use crate::matrix::client::MatrixClient;

/// User credentials for a Matrix account
#[derive(Debug, Clone)]
pub struct UserCredentials {
    /// User ID of the matrix account
    pub user_id: String,
    /// Password of the matrix account
    pub password: String,
    /// Passphrase encrypting the local store
    pub passphrase: String,
}

/// Failure of the Matrix connection.
#[derive(Debug, Error)]
pub enum MatrixError {
    /// The homeserver refused the credentials or the stored session.
    ///
    /// Retrying does not help, an operator has to act.
    #[error("credentials rejected: {0}")]
    CredentialInvalid(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl MatrixError {
    /// Wraps an SDK error raised while doing `action`.
    pub fn from_sdk(error: matrix_sdk::Error, action: &str) -> Self {
        if is_credential_error(error.client_api_error_kind()) {
            MatrixError::CredentialInvalid(format!("{}: {}", action, error))
        } else {
            MatrixError::Other(anyhow::Error::new(error).context(action.to_string()))
        }
    }
}

/// Whether the homeserver answered with an error only an operator can fix.
pub fn is_credential_error(kind: Option<&ErrorKind>) -> bool {
    matches!(
        kind,
        Some(ErrorKind::Forbidden { .. } | ErrorKind::UnknownToken { .. } | ErrorKind::UserDeactivated)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_errors() {
        assert!(is_credential_error(Some(&ErrorKind::forbidden())));
        assert!(is_credential_error(Some(&ErrorKind::UnknownToken { soft_logout: false })));
        assert!(is_credential_error(Some(&ErrorKind::UserDeactivated)));
    }

    #[test]
    fn test_other_errors() {
        assert!(!is_credential_error(Some(&ErrorKind::NotFound)));
        assert!(!is_credential_error(None));
    }
}

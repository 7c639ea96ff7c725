//! Layout of the data directory.
//!
//! ```text
//! <data>/
//! ├── channels.json   subscriptions and cursors
//! ├── pending.json    codes held for missing rewards
//! └── session/
//!     ├── session     Matrix login and sync token
//!     └── sqlite/     matrix-sdk store
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context;
use tokio::fs;

/// Directories used by the bot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPaths {
    /// Directory of the tracking state documents
    pub state: PathBuf,
    /// Directory of the Matrix session
    pub session: PathBuf,
}

impl DataPaths {
    pub fn new(root: &Path) -> Self {
        DataPaths {
            state: root.to_path_buf(),
            session: root.join("session"),
        }
    }
}

/// Creates the data directories under `root` if they are missing.
pub async fn prepare_data_dir(root: &Path) -> anyhow::Result<DataPaths> {
    let paths = DataPaths::new(root);

    fs::create_dir_all(&paths.session)
        .await
        .with_context(|| format!("cannot create data directory {}", paths.session.display()))?;

    Ok(paths)
}

//! Persistence layer for the tracking state.
//!
//! This module provides the [`StateStore`] saving the channel table and the
//! pending table as two JSON documents of the data directory. Writes go
//! through a temporary file renamed over the previous document, so a crash
//! leaves either the old or the new version on disk.

use std::{
    io,
    path::{Path, PathBuf},
};

use anyhow::Context;
use chrono::Utc;
use log::{error, info, warn};
use serde::{Serialize, de::DeserializeOwned};
use tokio::fs;

use crate::tracker::state::{ChannelTable, PendingTable};

const CHANNELS_FILE: &str = "channels.json";
const PENDING_FILE: &str = "pending.json";

/// Handles loading and persisting the tracking state.
///
/// A missing document loads as an empty table. A document that cannot be
/// read or parsed is moved aside under `<name>.corrupt-<timestamp>` before
/// starting from an empty table. Loading only fails when that move fails.
///
/// # Examples
///
/// ```no_run
/// let store = StateStore::new(Path::new("/var/lib/codewatch"));
/// let channels = store.load_channels().await?;
/// store.persist_channels(&channels).await?;
/// ```
#[derive(Clone, Debug)]
pub struct StateStore {
    channels_path: PathBuf,
    pending_path: PathBuf,
}

impl StateStore {
    /// Creates a store keeping its documents in `dir`.
    pub fn new(dir: &Path) -> Self {
        StateStore {
            channels_path: dir.join(CHANNELS_FILE),
            pending_path: dir.join(PENDING_FILE),
        }
    }

    pub async fn load_channels(&self) -> anyhow::Result<ChannelTable> {
        load_document(&self.channels_path).await
    }

    pub async fn load_pending(&self) -> anyhow::Result<PendingTable> {
        load_document(&self.pending_path).await
    }

    pub async fn persist_channels(&self, channels: &ChannelTable) -> anyhow::Result<()> {
        persist_document(&self.channels_path, channels).await
    }

    pub async fn persist_pending(&self, pending: &PendingTable) -> anyhow::Result<()> {
        persist_document(&self.pending_path, pending).await
    }
}

async fn load_document<T: DeserializeOwned + Default>(path: &Path) -> anyhow::Result<T> {
    let serialized = match fs::read(path).await {
        Ok(serialized) => serialized,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            warn!("no persisted state at {}, starting empty", path.display());
            return Ok(T::default());
        }
        Err(e) => {
            error!("failed to read {}: {}", path.display(), e);
            back_up_corrupt(path).await?;
            return Ok(T::default());
        }
    };

    match serde_json::from_slice(&serialized) {
        Ok(document) => {
            info!("loaded persisted state from {}", path.display());
            Ok(document)
        }
        Err(e) => {
            error!("failed to parse {}: {}", path.display(), e);
            back_up_corrupt(path).await?;
            Ok(T::default())
        }
    }
}

/// Moves an unreadable document aside so it can be inspected later.
///
/// Fails when the document cannot be moved, the empty state would otherwise
/// overwrite it on the next flush.
async fn back_up_corrupt(path: &Path) -> anyhow::Result<PathBuf> {
    let backup = path.with_file_name(format!(
        "{}.corrupt-{}",
        path.file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default(),
        Utc::now().format("%Y%m%dT%H%M%S%.3fZ")
    ));

    fs::rename(path, &backup)
        .await
        .with_context(|| format!("failed to back up unreadable {}", path.display()))?;
    warn!("unreadable state backed up to {}", backup.display());

    Ok(backup)
}

async fn persist_document<T: Serialize>(path: &Path, document: &T) -> anyhow::Result<()> {
    let serialized = serde_json::to_string_pretty(document).context("failed to serialize state")?;

    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, serialized.as_bytes())
        .await
        .with_context(|| format!("failed to write {}", tmp.display()))?;
    fs::File::open(&tmp)
        .await?
        .sync_all()
        .await
        .with_context(|| format!("failed to sync {}", tmp.display()))?;
    fs::rename(&tmp, path)
        .await
        .with_context(|| format!("failed to replace {}", path.display()))?;

    Ok(())
}

//! Seen-set stores: the record of post ids that were already processed.
//!
//! Every store upholds one rule: an id is recorded at most once, and
//! `mark_seen` reports whether this call was the one that recorded it.

use crate::error::CoreError;
use async_trait::async_trait;
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

#[async_trait]
pub trait SeenStore: Send + Sync {
    async fn contains(&self, post_id: &str) -> Result<bool, CoreError>;

    /// Records `post_id`. Returns `false` if it was already present.
    async fn mark_seen(&self, post_id: &str) -> Result<bool, CoreError>;

    async fn len(&self) -> Result<usize, CoreError>;
}

/// Post ids are Reddit base36 ids: non-empty, no whitespace.
pub fn validate_id(post_id: &str) -> Result<(), CoreError> {
    if post_id.is_empty() || post_id.chars().any(char::is_whitespace) {
        return Err(CoreError::InvalidInput {
            message: format!("invalid post id {:?}", post_id),
        });
    }
    Ok(())
}

fn lock_error() -> CoreError {
    CoreError::Internal {
        message: "seen-set lock poisoned".to_string(),
    }
}

/// Seen-set that lives only as long as the process.
#[derive(Debug, Default)]
pub struct MemorySeenStore {
    ids: Mutex<HashSet<String>>,
}

impl MemorySeenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SeenStore for MemorySeenStore {
    async fn contains(&self, post_id: &str) -> Result<bool, CoreError> {
        let ids = self.ids.lock().map_err(|_| lock_error())?;
        Ok(ids.contains(post_id))
    }

    async fn mark_seen(&self, post_id: &str) -> Result<bool, CoreError> {
        validate_id(post_id)?;
        let mut ids = self.ids.lock().map_err(|_| lock_error())?;
        Ok(ids.insert(post_id.to_string()))
    }

    async fn len(&self) -> Result<usize, CoreError> {
        Ok(self.ids.lock().map_err(|_| lock_error())?.len())
    }
}

/// Append-only file with one post id per line.
#[derive(Debug)]
pub struct FileSeenStore {
    path: PathBuf,
    ids: Mutex<HashSet<String>>,
}

impl FileSeenStore {
    /// Loads the ids stored at `path`. A missing file is an empty set.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let path = path.as_ref().to_path_buf();
        let ids = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => parse_ids(&contents),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No seen-set file at {}, starting empty", path.display());
                HashSet::new()
            }
            Err(e) => return Err(CoreError::Io(e)),
        };

        info!("Loaded {} seen post ids from {}", ids.len(), path.display());
        Ok(Self {
            path,
            ids: Mutex::new(ids),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn append(&self, post_id: &str) -> std::io::Result<()> {
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(format!("{}\n", post_id).as_bytes()).await?;
        file.flush().await
    }
}

fn parse_ids(contents: &str) -> HashSet<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

#[async_trait]
impl SeenStore for FileSeenStore {
    async fn contains(&self, post_id: &str) -> Result<bool, CoreError> {
        let ids = self.ids.lock().map_err(|_| lock_error())?;
        Ok(ids.contains(post_id))
    }

    async fn mark_seen(&self, post_id: &str) -> Result<bool, CoreError> {
        validate_id(post_id)?;
        {
            let mut ids = self.ids.lock().map_err(|_| lock_error())?;
            if !ids.insert(post_id.to_string()) {
                return Ok(false);
            }
        }

        if let Err(e) = self.append(post_id).await {
            // Keep memory and file in agreement.
            if let Ok(mut ids) = self.ids.lock() {
                ids.remove(post_id);
            }
            return Err(CoreError::Io(e));
        }
        Ok(true)
    }

    async fn len(&self) -> Result<usize, CoreError> {
        Ok(self.ids.lock().map_err(|_| lock_error())?.len())
    }
}

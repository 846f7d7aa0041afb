//! Persisted dedup state.
//!
//! Two retention policies share the [`DedupStore`] capability: a growing set of
//! every id ever seen, and a single pointer to the last delivered id. Both are
//! stored as one small JSON file that is always rewritten whole.

mod last_id;
mod seen_set;

use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::StateError;

pub use last_id::LastId;
pub use seen_set::SeenSet;

/// Which retention policy a store implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupPolicy {
    /// Every processed id is kept forever; many new posts per run are detected.
    SeenSet,
    /// Only the last delivered id is kept; only the newest post is considered.
    LastId,
}

impl DedupPolicy {
    /// State file used when no explicit path is configured.
    #[must_use]
    pub fn default_state_file(self) -> &'static str {
        match self {
            Self::SeenSet => "seen_posts.json",
            Self::LastId => "last_id.json",
        }
    }
}

impl fmt::Display for DedupPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SeenSet => f.write_str("seen-set"),
            Self::LastId => f.write_str("last-id"),
        }
    }
}

impl FromStr for DedupPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "seen-set" | "seen_set" | "set" => Ok(Self::SeenSet),
            "last-id" | "last_id" | "pointer" => Ok(Self::LastId),
            other => Err(format!("must be 'seen-set' or 'last-id', got '{other}'")),
        }
    }
}

/// Capability shared by both dedup policies.
#[async_trait]
pub trait DedupStore: Send + Sync {
    /// The retention policy this store implements.
    fn policy(&self) -> DedupPolicy;

    /// Whether `id` has not been processed yet. Never mutates state.
    fn is_new(&self, id: &str) -> bool;

    /// Record `id` as processed. Marking a known id is a no-op.
    fn mark_seen(&mut self, id: &str);

    /// Replace in-memory state with the backing file.
    ///
    /// A missing, empty or corrupt file yields empty state; this never fails.
    async fn load(&mut self);

    /// Write the whole state to the backing file atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    async fn save(&self) -> Result<(), StateError>;

    /// Path of the backing file.
    fn path(&self) -> &Path;
}

/// Build an (unloaded) store for the given policy.
#[must_use]
pub fn open_store(policy: DedupPolicy, path: impl Into<PathBuf>) -> Box<dyn DedupStore> {
    match policy {
        DedupPolicy::SeenSet => Box::new(SeenSet::new(path)),
        DedupPolicy::LastId => Box::new(LastId::new(path)),
    }
}

/// Read and decode a state file, treating every failure as "no state".
pub(crate) async fn read_state<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "No state file yet, starting empty");
            return None;
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "State file unreadable, starting empty");
            return None;
        }
    };

    if bytes.iter().all(u8::is_ascii_whitespace) {
        warn!(path = %path.display(), "State file is empty, starting empty");
        return None;
    }

    match serde_json::from_slice(&bytes) {
        Ok(state) => Some(state),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "State file corrupt, starting empty");
            None
        }
    }
}

/// Write `bytes` to a sibling temp file and rename it over `path`.
pub(crate) async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StateError> {
    let io_err = |source| StateError::Io {
        path: path.display().to_string(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    tokio::fs::write(&tmp_path, bytes).await.map_err(io_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(io_err)?;
    Ok(())
}

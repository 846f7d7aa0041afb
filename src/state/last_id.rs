use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::{read_state, write_atomic, DedupPolicy, DedupStore};
use crate::error::StateError;

#[derive(Debug, Serialize, Deserialize)]
struct Record {
    #[serde(default)]
    last_id: Option<Value>,
}

/// Pointer to the id of the last delivered post.
///
/// Only "same as last time" is detected; posts landing between runs are not.
#[derive(Debug, Clone)]
pub struct LastId {
    path: PathBuf,
    last_id: Option<String>,
}

impl LastId {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last_id: None,
        }
    }

    #[must_use]
    pub fn last_id(&self) -> Option<&str> {
        self.last_id.as_deref()
    }
}

#[async_trait]
impl DedupStore for LastId {
    fn policy(&self) -> DedupPolicy {
        DedupPolicy::LastId
    }

    fn is_new(&self, id: &str) -> bool {
        self.last_id.as_deref() != Some(id)
    }

    fn mark_seen(&mut self, id: &str) {
        self.last_id = Some(id.to_string());
    }

    async fn load(&mut self) {
        let record: Option<Record> = read_state(&self.path).await;
        // Older writers stored numeric ids
        self.last_id = record
            .and_then(|r| r.last_id)
            .and_then(|value| match value {
                Value::String(s) if !s.is_empty() => Some(s),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            });
        debug!(path = %self.path.display(), last_id = ?self.last_id, "Loaded last id");
    }

    async fn save(&self) -> Result<(), StateError> {
        let record = Record {
            last_id: self.last_id.clone().map(Value::String),
        };
        let json = serde_json::to_vec(&record)?;
        write_atomic(&self.path, &json).await
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

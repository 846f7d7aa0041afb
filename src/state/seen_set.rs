use std::collections::HashSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use super::{read_state, write_atomic, DedupPolicy, DedupStore};
use crate::error::StateError;

/// Set of every post id processed so far.
///
/// Ids are never removed. The file keeps insertion order, which is the order
/// posts were processed in.
#[derive(Debug, Clone)]
pub struct SeenSet {
    path: PathBuf,
    ids: Vec<String>,
    index: HashSet<String>,
}

impl SeenSet {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ids: Vec::new(),
            index: HashSet::new(),
        }
    }

    /// Ids in the order they were first seen.
    #[must_use]
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[async_trait]
impl DedupStore for SeenSet {
    fn policy(&self) -> DedupPolicy {
        DedupPolicy::SeenSet
    }

    fn is_new(&self, id: &str) -> bool {
        !self.index.contains(id)
    }

    fn mark_seen(&mut self, id: &str) {
        if self.index.insert(id.to_string()) {
            self.ids.push(id.to_string());
        }
    }

    async fn load(&mut self) {
        self.ids.clear();
        self.index.clear();

        let stored: Vec<String> = read_state(&self.path).await.unwrap_or_default();
        for id in &stored {
            self.mark_seen(id);
        }
        debug!(path = %self.path.display(), count = self.ids.len(), "Loaded seen ids");
    }

    async fn save(&self) -> Result<(), StateError> {
        let json = serde_json::to_vec(&self.ids)?;
        write_atomic(&self.path, &json).await
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

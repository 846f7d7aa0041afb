//! Fetch sources: where raw post payloads come from.

mod api;
mod page;

use std::str::FromStr;

use async_trait::async_trait;

use crate::constants::MAX_FETCH_LIMIT;
use crate::error::FetchError;
use crate::post::RawPost;

pub use api::{ApiSource, ClientCredentials};
pub use page::PageSource;

/// Order in which a source returns its posts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedOrder {
    NewestFirst,
    OldestFirst,
}

impl FromStr for FeedOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "newest-first" | "newest_first" | "newest" => Ok(Self::NewestFirst),
            "oldest-first" | "oldest_first" | "oldest" => Ok(Self::OldestFirst),
            other => Err(format!("must be 'newest-first' or 'oldest-first', got '{other}'")),
        }
    }
}

/// What to fetch in one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// Account handle without the leading `@`.
    pub account: String,
    pub limit: u32,
    pub include_replies: bool,
}

impl FetchRequest {
    /// Requested batch size clamped to `1..=MAX_FETCH_LIMIT`.
    #[must_use]
    pub fn clamped_limit(&self) -> u32 {
        self.limit.clamp(1, MAX_FETCH_LIMIT)
    }
}

/// A place posts can be fetched from.
#[async_trait]
pub trait FetchSource: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Order of the returned batch. Must be the same on every call.
    fn order(&self) -> FeedOrder;

    /// Fetch up to `request.clamped_limit()` raw posts.
    ///
    /// An empty feed is `Ok(vec![])`, never an error.
    ///
    /// # Errors
    ///
    /// Returns a [`FetchError`] if the source cannot be reached or its response
    /// cannot be understood.
    async fn fetch(&self, request: &FetchRequest) -> Result<Vec<RawPost>, FetchError>;
}

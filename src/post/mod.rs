//! Canonical post records and the normalizer that produces them.

mod api;
mod html;
mod permalink;
mod text;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::MalformedPost;

pub use api::normalize_status;
pub use html::normalize_fragment;
pub use permalink::canonical_permalink;
pub use text::{html_to_text, LinkText};

/// A raw post payload as handed over by a fetch source.
#[derive(Debug, Clone, PartialEq)]
pub enum RawPost {
    /// Markup of a single post container from a server-rendered page.
    HtmlFragment(String),
    /// A status object from the REST API.
    ApiJson(Value),
}

/// Which shape a raw payload has.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    HtmlFragment,
    ApiJson,
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HtmlFragment => f.write_str("html-fragment"),
            Self::ApiJson => f.write_str("api-json"),
        }
    }
}

impl RawPost {
    #[must_use]
    pub fn format(&self) -> SourceFormat {
        match self {
            Self::HtmlFragment(_) => SourceFormat::HtmlFragment,
            Self::ApiJson(_) => SourceFormat::ApiJson,
        }
    }
}

/// One attached media item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
    pub preview_url: Option<String>,
}

/// A post flattened into the shape shared by every source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedPost {
    /// Stable identity within the source.
    pub id: String,
    pub url: Option<String>,
    pub created_at: DateTime<Utc>,
    /// `created_at` is the fetch time because the real one could not be parsed.
    #[serde(default)]
    pub synthetic_timestamp: bool,
    /// Date text as displayed on the page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_label: Option<String>,
    pub text: String,
    pub raw_html: String,
    #[serde(default)]
    pub media: Vec<MediaItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replies_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reblogs_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favourites_count: Option<u64>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_reblog: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_text: Option<String>,
}

/// Normalize a raw payload, stamping fallbacks with the current time.
///
/// `Ok(None)` means the post cannot be identified yet and should be skipped.
///
/// # Errors
///
/// Returns [`MalformedPost`] if an API payload has no derivable identity.
pub fn normalize(raw: &RawPost) -> Result<Option<NormalizedPost>, MalformedPost> {
    normalize_at(raw, Utc::now())
}

/// Normalize a raw payload with an explicit fetch time.
///
/// # Errors
///
/// Returns [`MalformedPost`] if an API payload has no derivable identity.
pub fn normalize_at(
    raw: &RawPost,
    fetched_at: DateTime<Utc>,
) -> Result<Option<NormalizedPost>, MalformedPost> {
    match raw {
        RawPost::HtmlFragment(html) => Ok(normalize_fragment(html, fetched_at)),
        RawPost::ApiJson(value) => normalize_status(value, fetched_at).map(Some),
    }
}

//! Normalization of statuses returned by the Mastodon-compatible REST API.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use super::text::{html_to_text, LinkText};
use super::{MediaItem, NormalizedPost};
use crate::error::MalformedPost;

/// The subset of an API status the relay cares about.
#[derive(Debug, Deserialize)]
struct Status {
    id: Option<Value>,
    url: Option<String>,
    created_at: Option<String>,
    language: Option<String>,
    content: Option<String>,
    replies_count: Option<u64>,
    reblogs_count: Option<u64>,
    favourites_count: Option<u64>,
    media_attachments: Option<Vec<Attachment>>,
    reblog: Option<Box<Status>>,
    account: Option<Account>,
}

#[derive(Debug, Deserialize)]
struct Attachment {
    id: Option<Value>,
    #[serde(rename = "type")]
    kind: Option<String>,
    url: Option<String>,
    remote_url: Option<String>,
    preview_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Account {
    acct: Option<String>,
}

/// Normalize one status object.
///
/// # Errors
///
/// Returns [`MalformedPost`] if the value is not a status object or carries no
/// usable id.
pub fn normalize_status(
    value: &Value,
    fetched_at: DateTime<Utc>,
) -> Result<NormalizedPost, MalformedPost> {
    let status = Status::deserialize(value)
        .map_err(|e| MalformedPost::new(format!("not a status object: {e}")))?;

    let id = status
        .id
        .as_ref()
        .and_then(identity_string)
        .ok_or_else(|| MalformedPost::new("status has no id"))?;

    let raw_html = status.content.clone().unwrap_or_default();
    let created_at = status
        .created_at
        .as_deref()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc));

    let media = status
        .media_attachments
        .iter()
        .flatten()
        .filter_map(|attachment| {
            let url = attachment
                .url
                .clone()
                .or_else(|| attachment.remote_url.clone())
                .filter(|url| !url.is_empty())?;
            Some(MediaItem {
                id: attachment.id.as_ref().and_then(identity_string),
                kind: attachment
                    .kind
                    .clone()
                    .unwrap_or_else(|| "media".to_string()),
                url,
                preview_url: attachment.preview_url.clone(),
            })
        })
        .collect();

    let mut post = NormalizedPost {
        id,
        url: status.url.clone(),
        created_at: created_at.unwrap_or(fetched_at),
        synthetic_timestamp: created_at.is_none(),
        date_label: None,
        text: html_to_text(&raw_html, LinkText::HrefExceptTags),
        raw_html,
        media,
        language: status.language.clone(),
        replies_count: status.replies_count,
        reblogs_count: status.reblogs_count,
        favourites_count: status.favourites_count,
        is_reblog: false,
        original_author: None,
        original_url: None,
        original_text: None,
    };

    if let Some(original) = &status.reblog {
        post.is_reblog = true;
        post.original_author = original.account.as_ref().and_then(|a| a.acct.clone());
        post.original_url = original.url.clone();
        post.original_text = Some(html_to_text(
            original.content.as_deref().unwrap_or_default(),
            LinkText::HrefExceptTags,
        ));
    }

    Ok(post)
}

/// Render an id that may arrive as a string or a number.
fn identity_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

//! Post output: JSON on stdout and an optional on-disk archive of new posts.

use std::path::Path;

use serde_json::Value;

use crate::error::StateError;
use crate::post::NormalizedPost;
use crate::state::{read_state, write_atomic};

/// Render posts as a JSON array.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn render_posts(posts: &[NormalizedPost], pretty: bool) -> serde_json::Result<String> {
    if pretty {
        serde_json::to_string_pretty(posts)
    } else {
        serde_json::to_string(posts)
    }
}

/// Append posts to a JSON array file, rewriting it whole.
///
/// Existing entries are kept as-is; an unreadable archive starts over empty.
/// Returns the number of entries in the archive afterwards.
///
/// # Errors
///
/// Returns an error if the archive cannot be written.
pub async fn append_to_archive(path: &Path, posts: &[NormalizedPost]) -> Result<usize, StateError> {
    let mut entries: Vec<Value> = read_state(path).await.unwrap_or_default();
    for post in posts {
        entries.push(serde_json::to_value(post)?);
    }

    let json = serde_json::to_vec_pretty(&entries)?;
    write_atomic(path, &json).await?;
    Ok(entries.len())
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    use super::*;

    fn post(id: &str) -> NormalizedPost {
        NormalizedPost {
            id: id.to_string(),
            url: None,
            created_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            synthetic_timestamp: false,
            date_label: None,
            text: format!("post {id}"),
            raw_html: String::new(),
            media: Vec::new(),
            language: None,
            replies_count: None,
            reblogs_count: None,
            favourites_count: None,
            is_reblog: false,
            original_author: None,
            original_url: None,
            original_text: None,
        }
    }

    #[test]
    fn test_render_compact() {
        let json = render_posts(&[post("1")], false).unwrap();
        assert!(json.starts_with(r#"[{"id":"1""#));
        assert!(!json.contains('\n'));
    }

    #[test]
    fn test_render_empty() {
        assert_eq!(render_posts(&[], false).unwrap(), "[]");
    }

    #[tokio::test]
    async fn test_archive_accumulates() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("posts.json");

        assert_eq!(append_to_archive(&path, &[post("1")]).await.unwrap(), 1);
        assert_eq!(append_to_archive(&path, &[post("2"), post("3")]).await.unwrap(), 3);

        let stored: Vec<NormalizedPost> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let ids: Vec<&str> = stored.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["1", "2", "3"]);
    }
}

//! Delivery message formatting.

use crate::constants::EMPTY_TEXT_PLACEHOLDER;
use crate::post::NormalizedPost;

/// Render a post as the plain-text body of a delivery message.
///
/// Layout: a header naming the platform and account, the post text (or a
/// placeholder), the reshared post when present, media links, and the permalink.
/// Sections are separated by blank lines.
#[must_use]
pub fn format_message(post: &NormalizedPost, platform: &str, username: &str) -> String {
    let mut sections = vec![format!("{platform} update from @{username}")];

    let text = post.text.trim();
    if !text.is_empty() {
        sections.push(text.to_string());
    } else if !post.is_reblog {
        sections.push(EMPTY_TEXT_PLACEHOLDER.to_string());
    }

    if post.is_reblog {
        let mut lines = vec![match &post.original_author {
            Some(author) => format!("Reposted from @{author}:"),
            None => "Reposted:".to_string(),
        }];
        if let Some(original) = post.original_text.as_deref().filter(|t| !t.trim().is_empty()) {
            lines.push(original.trim().to_string());
        }
        if let Some(url) = &post.original_url {
            lines.push(format!("Original: {url}"));
        }
        sections.push(lines.join("\n"));
    }

    let media: Vec<String> = post
        .media
        .iter()
        .filter_map(|item| {
            let url = Some(item.url.as_str())
                .filter(|u| !u.is_empty())
                .or(item.preview_url.as_deref())?;
            Some(format!("- {}: {url}", item.kind))
        })
        .collect();
    if !media.is_empty() {
        sections.push(format!("Media:\n{}", media.join("\n")));
    }

    if let Some(url) = &post.url {
        sections.push(format!("Link: {url}"));
    }

    sections.join("\n\n")
}

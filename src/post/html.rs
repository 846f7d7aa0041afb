//! Normalization of posts scraped from a server-rendered profile page.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use super::permalink::canonical_permalink;
use super::text::{html_to_text, LinkText};
use super::{MediaItem, NormalizedPost};

static VIEW_BUTTON: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("button.view-button[onclick]").unwrap());
static VIEW_LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a.view-button[href]").unwrap());
static CONTENT: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".post-content").unwrap());
static VIDEO: LazyLock<Selector> = LazyLock::new(|| Selector::parse("video").unwrap());
static VIDEO_SOURCE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("source[src]").unwrap());
static IMAGE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".post-media img[src]").unwrap());
static DATE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".post-date-bottom").unwrap());

static WINDOW_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"window\.open\(\s*['"]([^'"]+)['"]"#).unwrap());

/// Accepted date layouts, tried in order.
const DATE_FORMATS: [&str; 2] = ["%b %d, %Y %I:%M %p", "%B %d, %Y %I:%M %p"];

/// Normalize one post fragment (the markup of a single `.social-post`).
///
/// Returns `None` when the fragment has no permalink yet; the page renders the
/// call-to-action lazily, so such posts are picked up on a later run.
#[must_use]
pub fn normalize_fragment(html: &str, fetched_at: DateTime<Utc>) -> Option<NormalizedPost> {
    let fragment = Html::parse_fragment(html);
    let root = fragment.root_element();

    let permalink = extract_permalink(root)?;
    let id = canonical_permalink(&permalink);

    let (text, raw_html) = root
        .select(&CONTENT)
        .next()
        .map(|content| {
            let inner = content.inner_html();
            (html_to_text(&inner, LinkText::Href), content.html())
        })
        .unwrap_or_default();

    let date_label = root.select(&DATE).next().map(|el| {
        el.text()
            .collect::<String>()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    });
    let parsed = date_label.as_deref().and_then(parse_page_date);

    Some(NormalizedPost {
        url: Some(id.clone()),
        id,
        created_at: parsed.unwrap_or(fetched_at),
        synthetic_timestamp: parsed.is_none(),
        date_label,
        text,
        raw_html,
        media: extract_media(root).into_iter().collect(),
        language: None,
        replies_count: None,
        reblogs_count: None,
        favourites_count: None,
        is_reblog: false,
        original_author: None,
        original_url: None,
        original_text: None,
    })
}

fn extract_permalink(root: ElementRef<'_>) -> Option<String> {
    let from_button = root.select(&VIEW_BUTTON).find_map(|button| {
        let onclick = button.value().attr("onclick")?;
        WINDOW_OPEN
            .captures(onclick)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    });

    from_button
        .or_else(|| {
            root.select(&VIEW_LINK)
                .find_map(|link| link.value().attr("href").map(str::to_string))
        })
        .filter(|url| !url.trim().is_empty())
}

/// Pick at most one media item: a video wins over any image.
fn extract_media(root: ElementRef<'_>) -> Option<MediaItem> {
    if let Some(video) = root.select(&VIDEO).next() {
        let src = video
            .select(&VIDEO_SOURCE)
            .find_map(|source| source.value().attr("src"))
            .or_else(|| video.value().attr("src"))
            .filter(|src| !src.is_empty())?;
        return Some(MediaItem {
            id: None,
            kind: "video".to_string(),
            url: src.to_string(),
            preview_url: video.value().attr("poster").map(str::to_string),
        });
    }

    let img = root.select(&IMAGE).next()?;
    let src = img.value().attr("src").filter(|src| !src.is_empty())?;
    Some(MediaItem {
        id: None,
        kind: "image".to_string(),
        url: src.to_string(),
        preview_url: None,
    })
}

/// Parse a page date label such as `Jan 5, 2025 • 3:04 PM`.
///
/// The page does not state a zone; times are taken as UTC.
pub(crate) fn parse_page_date(label: &str) -> Option<DateTime<Utc>> {
    // The bullet separator sometimes arrives double-encoded
    let cleaned = label.replace("â€¢", " ").replace('•', " ");
    let cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(&cleaned, fmt).ok())
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    const POST: &str = r#"
        <div class="social-post">
          <div class="post-content">
            <p>Big news <a class="content-link" href="https://example.com/story">example.com/st…</a></p>
          </div>
          <div class="post-media"><img src="https://cdn.example.com/photo.jpg"></div>
          <div class="post-date-bottom">Jan 5, 2025 • 3:04 PM</div>
          <button class="view-button" onclick="window.open('https://truthsocial.com/@someone/114000000000000001', '_blank')">View</button>
        </div>
    "#;

    #[test]
    fn test_normalize_full_post() {
        let post = normalize_fragment(POST, now()).expect("post should be identifiable");

        assert_eq!(post.id, "https://truthsocial.com/@someone/114000000000000001");
        assert_eq!(post.url.as_deref(), Some(post.id.as_str()));
        assert_eq!(post.text, "Big news https://example.com/story");
        assert!(post.raw_html.contains("content-link"));
        assert_eq!(post.media.len(), 1);
        assert_eq!(post.media[0].kind, "image");
        assert_eq!(post.media[0].url, "https://cdn.example.com/photo.jpg");
        assert!(!post.synthetic_timestamp);
        assert_eq!(
            post.created_at,
            Utc.with_ymd_and_hms(2025, 1, 5, 15, 4, 0).unwrap()
        );
        assert!(!post.is_reblog);
    }

    #[test]
    fn test_missing_permalink_is_skipped() {
        let html = r#"<div class="social-post"><div class="post-content"><p>Loading</p></div></div>"#;
        assert!(normalize_fragment(html, now()).is_none());
    }

    #[test]
    fn test_button_without_window_open_is_skipped() {
        let html = r#"<div class="social-post"><button class="view-button" onclick="doSomething()">View</button></div>"#;
        assert!(normalize_fragment(html, now()).is_none());
    }

    #[test]
    fn test_anchor_call_to_action() {
        let html = r#"<div class="social-post"><a class="view-button" href="https://truthsocial.com/@a/posts/2">View</a></div>"#;
        let post = normalize_fragment(html, now()).unwrap();
        assert_eq!(post.id, "https://truthsocial.com/@a/posts/2");
        assert_eq!(post.text, "");
    }

    #[test]
    fn test_video_wins_over_image() {
        let html = r#"
            <div class="social-post">
              <div class="post-media">
                <video poster="https://cdn.example.com/poster.jpg"><source src="https://cdn.example.com/clip.mp4"></video>
                <img src="https://cdn.example.com/still.jpg">
              </div>
              <button class="view-button" onclick="window.open('https://truthsocial.com/@a/3')">View</button>
            </div>
        "#;
        let post = normalize_fragment(html, now()).unwrap();
        assert_eq!(post.media.len(), 1);
        assert_eq!(post.media[0].kind, "video");
        assert_eq!(post.media[0].url, "https://cdn.example.com/clip.mp4");
        assert_eq!(
            post.media[0].preview_url.as_deref(),
            Some("https://cdn.example.com/poster.jpg")
        );
    }

    #[test]
    fn test_video_without_source_yields_no_media() {
        let html = r#"
            <div class="social-post">
              <div class="post-media"><video></video><img src="https://cdn.example.com/still.jpg"></div>
              <button class="view-button" onclick="window.open('https://truthsocial.com/@a/4')">View</button>
            </div>
        "#;
        let post = normalize_fragment(html, now()).unwrap();
        assert!(post.media.is_empty());
    }

    #[test]
    fn test_unparseable_date_falls_back_to_fetch_time() {
        let html = r#"
            <div class="social-post">
              <div class="post-date-bottom">3 hours ago</div>
              <button class="view-button" onclick="window.open('https://truthsocial.com/@a/5')">View</button>
            </div>
        "#;
        let post = normalize_fragment(html, now()).unwrap();
        assert!(post.synthetic_timestamp);
        assert_eq!(post.created_at, now());
        assert_eq!(post.date_label.as_deref(), Some("3 hours ago"));
    }

    #[test]
    fn test_parse_page_date_formats() {
        let expected = Utc.with_ymd_and_hms(2025, 1, 5, 15, 4, 0).unwrap();
        assert_eq!(parse_page_date("Jan 5, 2025 3:04 PM"), Some(expected));
        assert_eq!(parse_page_date("January 5, 2025 3:04 PM"), Some(expected));
        assert_eq!(parse_page_date("Jan 5, 2025 â€¢ 3:04 PM"), Some(expected));
        assert_eq!(parse_page_date("yesterday"), None);
    }

    #[test]
    fn test_identity_is_stable() {
        let first = normalize_fragment(POST, now()).unwrap();
        let second = normalize_fragment(POST, now()).unwrap();
        assert_eq!(first.id, second.id);
    }
}

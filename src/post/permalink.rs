use url::Url;

/// Query parameters that vary between links to the same post.
const TRACKING_PARAMS: &[&str] = &[
    "fbclid", "gclid", "igshid", "ref", "ref_src", "referrer", "share", "source", "s", "t",
];

/// Canonicalise a post permalink so it can serve as a stable identity.
///
/// Strings that do not parse as http(s) URLs are returned trimmed but otherwise
/// untouched.
#[must_use]
pub fn canonical_permalink(url: &str) -> String {
    let trimmed = url.trim();
    let Ok(mut parsed) = Url::parse(trimmed) else {
        return trimmed.to_string();
    };

    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return trimmed.to_string();
    }

    if parsed.scheme() == "http" {
        let _ = parsed.set_scheme("https");
    }

    // Url::parse already lowercases the host; only the port needs handling
    if parsed.port() == Some(443) || parsed.port() == Some(80) {
        let _ = parsed.set_port(None);
    }

    let kept: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if kept.is_empty() {
        parsed.set_query(None);
    } else {
        parsed.query_pairs_mut().clear().extend_pairs(kept);
    }

    parsed.set_fragment(None);

    let path = parsed.path().to_string();
    if path.ends_with('/') && path.len() > 1 {
        parsed.set_path(path.trim_end_matches('/'));
    }

    parsed.to_string()
}

fn is_tracking_param(key: &str) -> bool {
    let lower = key.to_lowercase();
    TRACKING_PARAMS.contains(&lower.as_str()) || lower.starts_with("utm_")
}

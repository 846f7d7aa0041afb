//! Shared constants used across the application.

use std::time::Duration;

/// User agent string used for requests to the post source.
///
/// The source sits behind bot protection that rejects obvious non-browser clients.
pub const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36";

/// User agent string used for webhook deliveries.
pub const RELAY_USER_AGENT: &str = concat!("post-relay/", env!("CARGO_PKG_VERSION"));

/// Largest page of statuses the source API will return in one request.
pub const MAX_FETCH_LIMIT: u32 = 40;

/// Per-request timeout for fetch and delivery calls.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(20);

/// Default base URL of the post source.
pub const DEFAULT_SOURCE_BASE_URL: &str = "https://truthsocial.com";

/// Default account to follow.
pub const DEFAULT_ACCOUNT: &str = "realDonaldTrump";

/// Default label used in the delivery message header.
pub const DEFAULT_PLATFORM_LABEL: &str = "Truth Social";

/// Environment variable consulted for the webhook URL when none is given literally.
pub const DEFAULT_WEBHOOK_ENV: &str = "LARK_WEBHOOK_URL";

/// CSS selector for the post container on a server-rendered profile page.
pub const DEFAULT_PAGE_CONTAINER_SELECTOR: &str = "#socialPostsContainer";

/// Body used in delivery messages for posts without any text.
pub const EMPTY_TEXT_PLACEHOLDER: &str = "[Post contains only media or formatting]";

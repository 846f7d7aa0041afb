use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use scraper::{Html, Selector};
use tracing::debug;

use super::{FeedOrder, FetchRequest, FetchSource};
use crate::constants::BROWSER_USER_AGENT;
use crate::error::FetchError;
use crate::post::RawPost;

/// Server-rendered profile page source.
///
/// The page is fetched over plain HTTP; the post container is located with a
/// CSS selector and split into one fragment per `.social-post`.
pub struct PageSource {
    client: reqwest::Client,
    page_url: String,
    container: Selector,
    post: Selector,
    order: FeedOrder,
}

impl PageSource {
    /// Create a page source.
    ///
    /// `page_url` may contain an `{account}` placeholder that is replaced with
    /// the requested account on each fetch.
    ///
    /// # Errors
    ///
    /// Returns an error if the selector is invalid or the HTTP client cannot be
    /// built.
    pub fn new(
        page_url: &str,
        container_selector: &str,
        order: FeedOrder,
        timeout: Duration,
    ) -> Result<Self> {
        let container = Selector::parse(container_selector)
            .map_err(|e| anyhow!("Invalid container selector '{container_selector}': {e:?}"))?;
        let post = Selector::parse("div.social-post")
            .map_err(|e| anyhow!("Failed to create selector: {e:?}"))?;

        let client = reqwest::Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            page_url: page_url.to_string(),
            container,
            post,
            order,
        })
    }

    /// Split the page into post fragments, keeping at most `limit` of the newest.
    fn extract_posts(&self, body: &str, limit: usize) -> Result<Vec<RawPost>, FetchError> {
        let document = Html::parse_document(body);
        let container = document.select(&self.container).next().ok_or_else(|| {
            FetchError::Markup(format!("post container not found at {}", self.page_url))
        })?;

        let mut fragments: Vec<String> = container.select(&self.post).map(|el| el.html()).collect();

        match self.order {
            FeedOrder::NewestFirst => fragments.truncate(limit),
            FeedOrder::OldestFirst => {
                let skip = fragments.len().saturating_sub(limit);
                fragments.drain(..skip);
            }
        }

        Ok(fragments.into_iter().map(RawPost::HtmlFragment).collect())
    }
}

/// Substitute the percent-encoded account into a page URL template.
fn account_url(template: &str, account: &str) -> String {
    template.replace("{account}", &urlencoding::encode(account))
}

#[async_trait]
impl FetchSource for PageSource {
    fn name(&self) -> &'static str {
        "page"
    }

    fn order(&self) -> FeedOrder {
        self.order
    }

    async fn fetch(&self, request: &FetchRequest) -> Result<Vec<RawPost>, FetchError> {
        let url = account_url(&self.page_url, &request.account);
        if request.include_replies {
            debug!("Page source cannot filter replies; include_replies has no effect");
        }

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(&url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url,
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(&url, e))?;

        self.extract_posts(&body, request.clamped_limit() as usize)
    }
}

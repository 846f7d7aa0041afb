use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::{FeedOrder, FetchRequest, FetchSource};
use crate::constants::BROWSER_USER_AGENT;
use crate::error::FetchError;
use crate::post::RawPost;

/// OAuth client credentials exchanged for a read-only app token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AccountResponse {
    id: Option<Value>,
}

/// Mastodon-compatible REST API source.
///
/// Each fetch obtains at most one bearer token, resolves the account handle to
/// an id and lists its most recent statuses, newest first.
pub struct ApiSource {
    client: reqwest::Client,
    base_url: String,
    credentials: Option<ClientCredentials>,
}

impl ApiSource {
    /// Create an API source rooted at `base_url` (e.g. `https://truthsocial.com`).
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        base_url: &str,
        timeout: Duration,
        credentials: Option<ClientCredentials>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    /// Exchange client credentials for a bearer token, if any are configured.
    async fn obtain_token(&self) -> Result<Option<String>, FetchError> {
        let Some(credentials) = &self.credentials else {
            return Ok(None);
        };

        let url = format!("{}/oauth/token", self.base_url);
        let params = [
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.as_str()),
            ("grant_type", "client_credentials"),
            ("scope", "read"),
        ];

        let response = self
            .client
            .post(&url)
            .form(&params)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(&url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Auth(format!("token endpoint returned HTTP {status}")));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| FetchError::Auth(format!("unreadable token response: {e}")))?;

        token
            .access_token
            .filter(|t| !t.is_empty())
            .map(Some)
            .ok_or_else(|| FetchError::Auth("token response did not contain access_token".into()))
    }

    async fn get_json(&self, url: &str, token: Option<&str>) -> Result<Value, FetchError> {
        let mut request = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.json().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout {
                    url: url.to_string(),
                }
            } else {
                FetchError::Decode {
                    url: url.to_string(),
                    message: e.to_string(),
                }
            }
        })
    }

    /// Resolve an account handle to its id.
    async fn lookup_account(&self, token: Option<&str>, acct: &str) -> Result<String, FetchError> {
        let url = format!(
            "{}/api/v1/accounts/lookup?acct={}",
            self.base_url,
            urlencoding::encode(acct)
        );

        let value = match self.get_json(&url, token).await {
            Err(FetchError::Status { status: 404, .. }) => {
                return Err(FetchError::AccountNotFound(acct.to_string()))
            }
            other => other?,
        };

        let account = AccountResponse::deserialize(&value).map_err(|e| FetchError::Decode {
            url: url.clone(),
            message: e.to_string(),
        })?;

        match account.id {
            Some(Value::String(id)) if !id.is_empty() => Ok(id),
            Some(Value::Number(id)) => Ok(id.to_string()),
            _ => Err(FetchError::AccountNotFound(acct.to_string())),
        }
    }

    async fn list_statuses(
        &self,
        token: Option<&str>,
        account_id: &str,
        limit: u32,
        include_replies: bool,
    ) -> Result<Vec<Value>, FetchError> {
        let mut url = format!(
            "{}/api/v1/accounts/{}/statuses?limit={limit}",
            self.base_url,
            urlencoding::encode(account_id)
        );
        if !include_replies {
            url.push_str("&exclude_replies=true");
        }

        match self.get_json(&url, token).await? {
            Value::Array(statuses) => Ok(statuses),
            other => Err(FetchError::Decode {
                url,
                message: format!("expected a list of statuses, got {}", json_kind(&other)),
            }),
        }
    }
}

#[async_trait]
impl FetchSource for ApiSource {
    fn name(&self) -> &'static str {
        "api"
    }

    fn order(&self) -> FeedOrder {
        FeedOrder::NewestFirst
    }

    async fn fetch(&self, request: &FetchRequest) -> Result<Vec<RawPost>, FetchError> {
        let limit = request.clamped_limit();
        let token = self.obtain_token().await?;
        let account_id = self
            .lookup_account(token.as_deref(), &request.account)
            .await?;
        debug!(account = %request.account, account_id = %account_id, "Resolved account");

        let statuses = self
            .list_statuses(token.as_deref(), &account_id, limit, request.include_replies)
            .await?;

        Ok(statuses
            .into_iter()
            .take(limit as usize)
            .map(RawPost::ApiJson)
            .collect())
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

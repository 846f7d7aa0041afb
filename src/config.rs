use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::constants::{
    DEFAULT_ACCOUNT, DEFAULT_HTTP_TIMEOUT, DEFAULT_PAGE_CONTAINER_SELECTOR,
    DEFAULT_PLATFORM_LABEL, DEFAULT_SOURCE_BASE_URL, DEFAULT_WEBHOOK_ENV, MAX_FETCH_LIMIT,
};
use crate::pipeline::RelayOptions;
use crate::source::{ClientCredentials, FeedOrder};
use crate::state::DedupPolicy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
    #[error("failed to parse {name} as integer: {source}")]
    ParseInt {
        name: String,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("failed to parse {name} as boolean: {value}")]
    ParseBool { name: String, value: String },
}

/// Where posts are fetched from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Mastodon-compatible REST API
    Api,
    /// Server-rendered HTML profile page
    Page,
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "api" => Ok(Self::Api),
            "page" | "html" => Ok(Self::Page),
            other => Err(format!("must be 'api' or 'page', got '{other}'")),
        }
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Source
    pub source_kind: SourceKind,
    pub source_base_url: String,
    pub page_url: Option<String>,
    pub page_container_selector: String,
    pub page_feed_order: FeedOrder,
    pub oauth_client_id: Option<String>,
    pub oauth_client_secret: Option<String>,
    pub http_timeout: Duration,

    // Account
    pub account: String,
    pub fetch_limit: u32,
    pub include_replies: bool,
    pub platform_label: String,

    // Dedup state
    pub dedup_policy: DedupPolicy,
    pub state_path: Option<PathBuf>,

    // Delivery
    pub webhook_url: Option<String>,
    pub webhook_env: String,

    // Output
    pub archive_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if an environment variable is present but invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            // Source
            source_kind: parse_env("SOURCE_KIND", SourceKind::Api)?,
            source_base_url: env_or_default("SOURCE_BASE_URL", DEFAULT_SOURCE_BASE_URL),
            page_url: optional_env("PAGE_URL"),
            page_container_selector: env_or_default(
                "PAGE_CONTAINER_SELECTOR",
                DEFAULT_PAGE_CONTAINER_SELECTOR,
            ),
            page_feed_order: parse_env("PAGE_FEED_ORDER", FeedOrder::OldestFirst)?,
            oauth_client_id: optional_env("OAUTH_CLIENT_ID"),
            oauth_client_secret: optional_env("OAUTH_CLIENT_SECRET"),
            http_timeout: Duration::from_secs(parse_env_u64(
                "HTTP_TIMEOUT_SECS",
                DEFAULT_HTTP_TIMEOUT.as_secs(),
            )?),

            // Account
            account: env_or_default("ACCOUNT", DEFAULT_ACCOUNT),
            fetch_limit: parse_env_u32("FETCH_LIMIT", 10)?,
            include_replies: parse_env_bool("INCLUDE_REPLIES", false)?,
            platform_label: env_or_default("PLATFORM_LABEL", DEFAULT_PLATFORM_LABEL),

            // Dedup state
            dedup_policy: parse_env("DEDUP_POLICY", DedupPolicy::SeenSet)?,
            state_path: optional_env("STATE_PATH").map(PathBuf::from),

            // Delivery
            webhook_url: optional_env("WEBHOOK_URL"),
            webhook_env: std::env::var("WEBHOOK_ENV")
                .unwrap_or_else(|_| DEFAULT_WEBHOOK_ENV.to_string()),

            // Output
            archive_path: optional_env("ARCHIVE_PATH").map(PathBuf::from),
        })
    }

    /// Configuration for tests: API source, seen-set state in `state_path`,
    /// no webhook.
    #[must_use]
    pub fn for_testing(source_base_url: &str, state_path: PathBuf) -> Self {
        Self {
            source_kind: SourceKind::Api,
            source_base_url: source_base_url.to_string(),
            page_url: None,
            page_container_selector: DEFAULT_PAGE_CONTAINER_SELECTOR.to_string(),
            page_feed_order: FeedOrder::OldestFirst,
            oauth_client_id: None,
            oauth_client_secret: None,
            http_timeout: Duration::from_secs(5),
            account: "testuser".to_string(),
            fetch_limit: 10,
            include_replies: false,
            platform_label: DEFAULT_PLATFORM_LABEL.to_string(),
            dedup_policy: DedupPolicy::SeenSet,
            state_path: Some(state_path),
            webhook_url: None,
            webhook_env: String::new(),
            archive_path: None,
        }
    }

    /// Validate that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let account = self.account.trim_start_matches('@');
        if account.is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "ACCOUNT".to_string(),
                message: "cannot be empty".to_string(),
            });
        }
        if account.chars().any(char::is_whitespace) {
            return Err(ConfigError::InvalidValue {
                name: "ACCOUNT".to_string(),
                message: format!("must not contain whitespace, got '{account}'"),
            });
        }
        if self.fetch_limit == 0 || self.fetch_limit > MAX_FETCH_LIMIT {
            return Err(ConfigError::InvalidValue {
                name: "FETCH_LIMIT".to_string(),
                message: format!("must be between 1 and {MAX_FETCH_LIMIT}"),
            });
        }
        if self.http_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                name: "HTTP_TIMEOUT_SECS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        match self.source_kind {
            SourceKind::Api => {
                if url::Url::parse(&self.source_base_url).is_err() {
                    return Err(ConfigError::InvalidValue {
                        name: "SOURCE_BASE_URL".to_string(),
                        message: format!("not a valid URL: '{}'", self.source_base_url),
                    });
                }
                if self.oauth_client_id.is_some() != self.oauth_client_secret.is_some() {
                    return Err(ConfigError::InvalidValue {
                        name: "OAUTH_CLIENT_ID".to_string(),
                        message: "OAUTH_CLIENT_ID and OAUTH_CLIENT_SECRET must be set together"
                            .to_string(),
                    });
                }
            }
            SourceKind::Page => {
                if self.page_url.is_none() {
                    return Err(ConfigError::MissingEnvVar("PAGE_URL".to_string()));
                }
            }
        }
        Ok(())
    }

    /// Account handle without a leading `@`.
    #[must_use]
    pub fn account_handle(&self) -> &str {
        self.account.trim_start_matches('@')
    }

    /// State file path, falling back to the policy's default file name.
    #[must_use]
    pub fn state_file(&self) -> PathBuf {
        self.state_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(self.dedup_policy.default_state_file()))
    }

    /// OAuth client credentials, when both halves are configured.
    #[must_use]
    pub fn credentials(&self) -> Option<ClientCredentials> {
        Some(ClientCredentials {
            client_id: self.oauth_client_id.clone()?,
            client_secret: self.oauth_client_secret.clone()?,
        })
    }

    /// Webhook to deliver to.
    ///
    /// An explicit URL wins; otherwise the variable named by `webhook_env` is
    /// read. An empty `webhook_env` disables the lookup.
    #[must_use]
    pub fn resolve_webhook(&self) -> Option<String> {
        if let Some(url) = &self.webhook_url {
            return Some(url.clone());
        }
        if self.webhook_env.is_empty() {
            return None;
        }
        optional_env(&self.webhook_env)
    }

    /// Per-run options for the pipeline.
    #[must_use]
    pub fn relay_options(&self) -> RelayOptions {
        RelayOptions {
            account: self.account_handle().to_string(),
            limit: self.fetch_limit,
            include_replies: self.include_replies,
            platform_label: self.platform_label.clone(),
        }
    }
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_or_default(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_env<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr<Err = String>,
{
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|message| ConfigError::InvalidValue {
            name: name.to_string(),
            message,
        }),
        _ => Ok(default),
    }
}

fn parse_env_u64(name: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_u32(name: &str, default: u32) -> Result<u32, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_bool(name: &str, default: bool) -> Result<bool, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => match val.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::ParseBool {
                name: name.to_string(),
                value: val,
            }),
        },
        _ => Ok(default),
    }
}

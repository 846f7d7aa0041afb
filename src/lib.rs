//! Post relay library.
//!
//! Polls one account on a social platform (REST API or server-rendered
//! profile page), normalizes its posts, keeps a persisted record of what was
//! already processed, and forwards new posts to a chat webhook.

// Allow raw string hashes for safety - they're harmless and prevent issues if content changes
#![allow(clippy::needless_raw_string_hashes)]

pub mod config;
pub mod constants;
pub mod error;
pub mod message;
pub mod output;
pub mod pipeline;
pub mod post;
pub mod sink;
pub mod source;
pub mod state;

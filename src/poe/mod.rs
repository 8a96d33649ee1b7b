//! Path of Exile character-window API access
//!
//! - `client`: rate-limit aware HTTP client
//! - `rate_limit`: parsing of the `X-Rate-Limit-*` response headers
//! - `models`: typed views used to validate fetched documents

mod client;
mod models;
mod rate_limit;

pub use client::{build_http_client, Endpoint, PoeClient};
pub use models::{ErrorEnvelope, Item, ItemsResponse, PassiveSkillsResponse, PoeCharacter};
pub use rate_limit::{RateLimitRule, RateLimitState, RateLimitWindow};

use std::time::Duration;
use thiserror::Error;

/// Errors returned by the character-window API client
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Upstream error {status} (code {code}): {message}")]
    Upstream {
        status: u16,
        code: i64,
        message: String,
    },

    #[error("Could not decode error response for status {status}: {source}")]
    ErrorEnvelope {
        status: u16,
        source: serde_json::Error,
    },

    #[error("Malformed {resource} document: {source}")]
    Decode {
        resource: &'static str,
        source: serde_json::Error,
    },

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl ApiError {
    /// Retry hint carried by a rate-limit error
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

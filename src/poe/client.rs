//! HTTP client for the character-window API
//!
//! This module handles all requests to the API, including:
//! - Building HTTP clients with the contact-bearing user agent
//! - Rate-limit header inspection on every response
//! - Error classification (rate limited, upstream error envelope, transport)
//!
//! No request is ever retried here; the next fetch cycle is the retry.

use crate::config::{ApiConfig, UserAgentConfig};
use crate::poe::models::{ErrorEnvelope, PoeCharacter};
use crate::poe::rate_limit::RateLimitState;
use crate::poe::ApiError;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::{Client, StatusCode};
use std::fmt;
use std::time::Duration;
use tracing::instrument;
use url::Url;

/// Resources exposed by the character-window API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Characters,
    PassiveSkills,
    Items,
}

impl Endpoint {
    pub fn path(&self) -> &'static str {
        match self {
            Self::Characters => "/character-window/get-characters",
            Self::PassiveSkills => "/character-window/get-passive-skills",
            Self::Items => "/character-window/get-items",
        }
    }

    pub fn resource(&self) -> &'static str {
        match self {
            Self::Characters => "characters",
            Self::PassiveSkills => "passive skills",
            Self::Items => "items",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.resource())
    }
}

/// Builds an HTTP client with the tracker's identification headers
///
/// Every request carries `Accept: application/json` and a user agent of the
/// form `Name/Version (contact: email)`.
pub fn build_http_client(
    user_agent: &UserAgentConfig,
    timeout: Duration,
) -> Result<Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

    Client::builder()
        .user_agent(user_agent.header_value())
        .default_headers(headers)
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Client for the character-window API
#[derive(Debug, Clone)]
pub struct PoeClient {
    client: Client,
    base_url: Url,
}

impl PoeClient {
    /// Creates a client from configuration
    pub fn new(api: &ApiConfig, user_agent: &UserAgentConfig) -> Result<Self, ApiError> {
        let client = build_http_client(user_agent, Duration::from_secs(api.timeout_secs))?;
        Self::with_client(client, &api.base_url)
    }

    /// Creates a client around an existing `reqwest::Client`
    pub fn with_client(client: Client, base_url: &str) -> Result<Self, ApiError> {
        Ok(Self {
            client,
            base_url: Url::parse(base_url)?,
        })
    }

    /// Fetches the raw `get-items` document for a character
    pub async fn get_items(
        &self,
        account: &str,
        character: &str,
        realm: &str,
    ) -> Result<Vec<u8>, ApiError> {
        self.request(
            Endpoint::Items,
            &[
                ("accountName", account),
                ("character", character),
                ("realm", realm),
            ],
        )
        .await
    }

    /// Fetches the raw `get-passive-skills` document for a character
    pub async fn get_passive_skills(
        &self,
        account: &str,
        character: &str,
        realm: &str,
    ) -> Result<Vec<u8>, ApiError> {
        self.request(
            Endpoint::PassiveSkills,
            &[
                ("accountName", account),
                ("character", character),
                ("realm", realm),
            ],
        )
        .await
    }

    /// Fetches the raw `get-characters` document for an account
    pub async fn get_characters_raw(&self, account: &str, realm: &str) -> Result<Vec<u8>, ApiError> {
        self.request(
            Endpoint::Characters,
            &[("accountName", account), ("realm", realm)],
        )
        .await
    }

    /// Lists the characters of an account
    pub async fn get_characters(
        &self,
        account: &str,
        realm: &str,
    ) -> Result<Vec<PoeCharacter>, ApiError> {
        let body = self.get_characters_raw(account, realm).await?;
        serde_json::from_slice(&body).map_err(|source| ApiError::Decode {
            resource: Endpoint::Characters.resource(),
            source,
        })
    }

    /// Issues one GET request and classifies the response
    ///
    /// | Condition | Result |
    /// |-----------|--------|
    /// | 2xx/3xx | body bytes |
    /// | 429 | `RateLimited` with the `Retry-After` hint, body ignored |
    /// | other 4xx/5xx | `Upstream` from the error envelope |
    /// | undecodable error body | `ErrorEnvelope` |
    /// | network failure | `Transport` |
    #[instrument(name = "poe_client", skip_all, fields(%endpoint))]
    async fn request(&self, endpoint: Endpoint, params: &[(&str, &str)]) -> Result<Vec<u8>, ApiError> {
        let mut url = self.base_url.join(endpoint.path())?;
        url.query_pairs_mut().extend_pairs(params);

        tracing::debug!("GET {}", url);
        let response = self.client.get(url).send().await?;

        let rate_limit = RateLimitState::from_headers(response.headers());
        if let Some(retry_after) = rate_limit.retry_after.filter(|wait| !wait.is_zero()) {
            tracing::warn!(
                retry_after_secs = retry_after.as_secs(),
                rules = ?rate_limit.rule_names(),
                "Rate limited, should retry after {:?}",
                retry_after
            );
        } else if rate_limit.should_back_off() {
            tracing::warn!(rules = ?rate_limit.rule_names(), "Rate limit restriction active");
        }

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ApiError::RateLimited {
                retry_after: rate_limit.retry_after,
            });
        }

        if status.is_client_error() || status.is_server_error() {
            let body = response.bytes().await?;
            let envelope: ErrorEnvelope =
                serde_json::from_slice(&body).map_err(|source| ApiError::ErrorEnvelope {
                    status: status.as_u16(),
                    source,
                })?;
            return Err(ApiError::Upstream {
                status: status.as_u16(),
                code: envelope.error.code,
                message: envelope.error.message,
            });
        }

        let body = response.bytes().await?;
        tracing::debug!(bytes = body.len(), "Received {}", endpoint);
        Ok(body.to_vec())
    }
}

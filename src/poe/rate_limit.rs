//! Rate-limit header parsing
//!
//! The character-window API reports its quotas through a family of headers:
//!
//! | Header | Example |
//! |--------|---------|
//! | `X-Rate-Limit-Policy` | `character-window-request-limit` |
//! | `X-Rate-Limit-Rules` | `account,ip` |
//! | `X-Rate-Limit-<rule>` | `45:60:60,240:240:900` (max hits : period : restriction) |
//! | `X-Rate-Limit-<rule>-State` | `1:60:0,1:240:0` (current hits : period : restricted for) |
//! | `Retry-After` | `5` (seconds) |
//!
//! Parsing never fails: missing or malformed values are left empty.

use reqwest::header::HeaderMap;
use std::time::Duration;

/// One window of a rate-limit rule, as reported by either the limit or the state header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitWindow {
    /// Maximum hits (limit header) or current hits (state header)
    pub hits: u32,
    /// Window length in seconds
    pub period: u32,
    /// Restriction length (limit header) or remaining restriction (state header), in seconds
    pub restriction: u32,
}

impl RateLimitWindow {
    fn parse(raw: &str) -> Option<Self> {
        let mut parts = raw.trim().split(':');
        let hits = parts.next()?.trim().parse().ok()?;
        let period = parts.next()?.trim().parse().ok()?;
        let restriction = parts.next()?.trim().parse().ok()?;
        if parts.next().is_some() {
            return None;
        }
        Some(Self {
            hits,
            period,
            restriction,
        })
    }
}

/// A named quota dimension (e.g. `account`, `ip`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitRule {
    pub name: String,
    pub limits: Vec<RateLimitWindow>,
    pub state: Vec<RateLimitWindow>,
}

impl RateLimitRule {
    /// True when any state window reports an active restriction
    pub fn is_restricted(&self) -> bool {
        self.state.iter().any(|w| w.restriction > 0)
    }
}

/// Rate-limit information derived from a single response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RateLimitState {
    pub policy: Option<String>,
    pub rules: Vec<RateLimitRule>,
    pub retry_after: Option<Duration>,
}

impl RateLimitState {
    /// Parses rate-limit information from response headers
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let policy = header_str(headers, "x-rate-limit-policy")
            .filter(|p| !p.is_empty())
            .map(str::to_string);

        let rules = header_str(headers, "x-rate-limit-rules")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(|name| RateLimitRule {
                        name: name.to_string(),
                        limits: parse_windows(header_str(
                            headers,
                            &format!("x-rate-limit-{}", name),
                        )),
                        state: parse_windows(header_str(
                            headers,
                            &format!("x-rate-limit-{}-state", name),
                        )),
                    })
                    .collect()
            })
            .unwrap_or_default();

        let retry_after = header_str(headers, "retry-after")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);

        Self {
            policy,
            rules,
            retry_after,
        }
    }

    /// Names of the rules reported by the response
    pub fn rule_names(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.name.as_str()).collect()
    }

    pub fn rule(&self, name: &str) -> Option<&RateLimitRule> {
        self.rules.iter().find(|r| r.name == name)
    }

    /// True when the caller should wait before issuing another request
    pub fn should_back_off(&self) -> bool {
        self.retry_after.is_some_and(|wait| !wait.is_zero())
            || self.rules.iter().any(RateLimitRule::is_restricted)
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn parse_windows(raw: Option<&str>) -> Vec<RateLimitWindow> {
    raw.map(|value| value.split(',').filter_map(RateLimitWindow::parse).collect())
        .unwrap_or_default()
}

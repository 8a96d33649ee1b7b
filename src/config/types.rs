use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for Exile Tracker
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub fetcher: FetcherConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub renderer: RendererConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub publisher: PublisherConfig,
}

/// Fetch cycle configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FetcherConfig {
    /// Minutes between two fetch cycles
    #[serde(rename = "interval-minutes", default = "default_interval_minutes")]
    pub interval_minutes: u64,

    /// Delay between two characters of the same cycle (milliseconds)
    #[serde(rename = "pacing-ms", default = "default_pacing_ms")]
    pub pacing_ms: u64,

    /// Realm passed to the character-window API
    #[serde(default = "default_realm")]
    pub realm: String,
}

impl FetcherConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes.saturating_mul(60))
    }

    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            interval_minutes: default_interval_minutes(),
            pacing_ms: default_pacing_ms(),
            realm: default_realm(),
        }
    }
}

/// Character-window API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(rename = "base-url", default = "default_base_url")]
    pub base_url: String,

    /// Request timeout (seconds)
    #[serde(rename = "timeout-secs", default = "default_api_timeout")]
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_api_timeout(),
        }
    }
}

/// Identification sent with every outbound request
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    #[serde(rename = "client-name")]
    pub client_name: String,

    #[serde(rename = "client-version")]
    pub client_version: String,

    /// Email address the API operators can reach us at
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats the header value: `Name/Version (contact: email)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (contact: {})",
            self.client_name, self.client_version, self.contact_email
        )
    }
}

/// Headless Path of Building invocation
#[derive(Debug, Clone, Deserialize)]
pub struct RendererConfig {
    /// Checkout of Path of Building (contains `src/` and `runtime/`)
    #[serde(rename = "engine-root")]
    pub engine_root: PathBuf,

    #[serde(default = "default_interpreter")]
    pub interpreter: PathBuf,

    /// Entry script, relative to `<engine-root>/src`
    #[serde(default = "default_script")]
    pub script: String,

    /// Parent directory for per-character scratch directories
    #[serde(rename = "scratch-dir", default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,

    #[serde(rename = "timeout-secs", default = "default_render_timeout")]
    pub timeout_secs: u64,
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// Build-sharing site configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PublisherConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Site id: `pobb.in`, `poe.ninja` or `poedb.tw`
    #[serde(default = "default_site")]
    pub site: String,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            site: default_site(),
        }
    }
}

fn default_interval_minutes() -> u64 {
    30
}

fn default_pacing_ms() -> u64 {
    2000
}

fn default_realm() -> String {
    "pc".to_string()
}

fn default_base_url() -> String {
    "https://www.pathofexile.com".to_string()
}

fn default_api_timeout() -> u64 {
    10
}

fn default_interpreter() -> PathBuf {
    PathBuf::from("/usr/bin/luajit")
}

fn default_script() -> String {
    "HeadlessWrapper.lua".to_string()
}

fn default_scratch_dir() -> PathBuf {
    PathBuf::from("./scratch")
}

fn default_render_timeout() -> u64 {
    120
}

fn default_enabled() -> bool {
    true
}

fn default_site() -> String {
    "poe.ninja".to_string()
}

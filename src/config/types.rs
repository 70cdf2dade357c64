use crate::model::Provider;
use crate::transport::RetryPolicy;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for favsync
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub files: FilesConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub http: HttpConfig,
    pub furaffinity: Option<FurAffinityConfig>,
    pub inkbunny: Option<InkbunnyConfig>,
}

impl Config {
    /// Returns true if the config has a section for the provider
    pub fn has_provider(&self, provider: Provider) -> bool {
        match provider {
            Provider::FurAffinity => self.furaffinity.is_some(),
            Provider::Inkbunny => self.inkbunny.is_some(),
        }
    }

    /// Providers that have a config section, in a stable order
    pub fn configured_providers(&self) -> Vec<Provider> {
        Provider::ALL
            .into_iter()
            .filter(|p| self.has_provider(*p))
            .collect()
    }
}

/// Local media tree
#[derive(Debug, Clone, Deserialize)]
pub struct FilesConfig {
    /// Root of `<dir>/<provider>/...` and `<dir>/<provider>-thumbnails/...`
    pub dir: PathBuf,
}

/// Document store location
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file
    pub path: PathBuf,
}

/// Run-loop behavior
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SyncConfig {
    /// Consecutive already-seen items tolerated before a run stops
    #[serde(default = "default_max_dup_count")]
    pub max_dup_count: u32,

    /// Pause between items (milliseconds)
    #[serde(default = "default_item_delay_ms")]
    pub item_delay_ms: u64,

    /// Consecutive failed listing page fetches tolerated before the listing ends
    #[serde(default = "default_max_page_failures")]
    pub max_page_failures: u32,

    /// Pause before fetching a failed listing page again (milliseconds)
    #[serde(default = "default_page_retry_delay_ms")]
    pub page_retry_delay_ms: u64,

    /// Thumbnails generated at once by the backfill
    #[serde(default = "default_media_concurrency")]
    pub media_concurrency: usize,
}

impl SyncConfig {
    pub fn item_delay(&self) -> Duration {
        Duration::from_millis(self.item_delay_ms)
    }

    pub fn page_retry_delay(&self) -> Duration {
        Duration::from_millis(self.page_retry_delay_ms)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_dup_count: default_max_dup_count(),
            item_delay_ms: default_item_delay_ms(),
            max_page_failures: default_max_page_failures(),
            page_retry_delay_ms: default_page_retry_delay_ms(),
            media_concurrency: default_media_concurrency(),
        }
    }
}

/// HTTP client settings
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct HttpConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Timeout for listing and detail requests (seconds)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Longest silence tolerated while waiting for a download's headers or
    /// its next body chunk (seconds)
    #[serde(default = "default_download_stall_secs")]
    pub download_stall_secs: u64,
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn download_stall(&self) -> Duration {
        Duration::from_secs(self.download_stall_secs)
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
            download_stall_secs: default_download_stall_secs(),
        }
    }
}

/// Retry budget for one class of request
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct RetrySettings {
    pub attempts: u32,
    pub delay_ms: u64,
}

impl RetrySettings {
    pub const fn new(attempts: u32, delay_ms: u64) -> Self {
        Self { attempts, delay_ms }
    }

    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.attempts, Duration::from_millis(self.delay_ms))
    }
}

/// FurAffinity credentials and endpoints
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FurAffinityConfig {
    /// Whose favorites to mirror
    pub username: String,

    /// Values of the `a` and `b` session cookies
    pub cookie_a: String,
    pub cookie_b: String,

    #[serde(default = "default_furaffinity_url")]
    pub base_url: String,

    #[serde(default = "default_furaffinity_listing_retry")]
    pub listing_retry: RetrySettings,

    #[serde(default = "default_furaffinity_detail_retry")]
    pub detail_retry: RetrySettings,

    #[serde(default = "default_download_retry")]
    pub download_retry: RetrySettings,
}

/// Inkbunny credentials and endpoints
///
/// Either `username`/`password` (a login call fetches a session) or a ready
/// `sid`/`user-id` pair must be present.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct InkbunnyConfig {
    pub username: Option<String>,
    pub password: Option<String>,
    pub sid: Option<String>,
    pub user_id: Option<i64>,

    #[serde(default = "default_inkbunny_url")]
    pub base_url: String,

    #[serde(default = "default_inkbunny_listing_retry")]
    pub listing_retry: RetrySettings,

    #[serde(default = "default_inkbunny_detail_retry")]
    pub detail_retry: RetrySettings,

    #[serde(default = "default_download_retry")]
    pub download_retry: RetrySettings,
}

fn default_max_dup_count() -> u32 {
    10
}

fn default_item_delay_ms() -> u64 {
    1000
}

fn default_max_page_failures() -> u32 {
    5
}

fn default_page_retry_delay_ms() -> u64 {
    10_000
}

fn default_media_concurrency() -> usize {
    4
}

fn default_user_agent() -> String {
    format!("favsync/{}", env!("CARGO_PKG_VERSION"))
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_download_stall_secs() -> u64 {
    60
}

fn default_furaffinity_url() -> String {
    "https://www.furaffinity.net".to_string()
}

fn default_inkbunny_url() -> String {
    "https://inkbunny.net".to_string()
}

fn default_furaffinity_listing_retry() -> RetrySettings {
    RetrySettings::new(3, 1000)
}

fn default_furaffinity_detail_retry() -> RetrySettings {
    RetrySettings::new(5, 10_000)
}

fn default_inkbunny_listing_retry() -> RetrySettings {
    RetrySettings::new(3, 1000)
}

fn default_inkbunny_detail_retry() -> RetrySettings {
    RetrySettings::new(10, 5000)
}

fn default_download_retry() -> RetrySettings {
    RetrySettings::new(3, 5000)
}

use serde::Deserialize;

use crate::strategies::StrategyKind;
use crate::token::TokenRules;
use crate::utils::constants::*;

/// ================================
/// Full fetcher configuration
/// ================================
#[derive(Debug, Deserialize, Clone, Default)]
pub struct FetcherConfig {
    #[serde(default)]
    pub settings: SettingsConfig,
    #[serde(default)]
    pub browser: BrowserSettings,
    #[serde(default)]
    pub login: LoginConfig,
    #[serde(default)]
    pub acquisition: AcquisitionConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

/// ================================
/// Global settings
/// ================================
#[derive(Debug, Deserialize, Clone, Default)]
pub struct SettingsConfig {
    pub retry: Option<RetryConfig>,
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetryConfig {
    pub attempts: Option<u32>,
    /// will be mutiply by 2 on every attempt until max_delay_ms
    pub base_delay_ms: Option<u64>,
    /// invariant: >= base_delay_ms
    pub max_delay_ms: Option<u64>,
}

/// ================================
/// Logging
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String, // allowed: trace, debug, info, warn, error
    pub format: LogFormat,
}

impl LoggingConfig {
    pub fn new(level: String, format: LogFormat) -> Self {
        Self { level, format }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self::new("info".to_owned(), LogFormat::from_env())
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Compact,
}

impl LogFormat {
    pub fn from_env() -> Self {
        match std::env::var("LOG_FORMAT")
            .unwrap_or_else(|_| "compact".to_string())
            .to_lowercase()
            .as_str()
        {
            "json" => LogFormat::Json,
            _ => LogFormat::Compact,
        }
    }
}

/// ================================
/// Browser session
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct BrowserSettings {
    /// Primary binary; auto-discovered when absent
    pub executable: Option<String>,
    /// Tried once when the primary binary fails to launch
    #[serde(default = "default_fallback_executable")]
    pub fallback_executable: Option<String>,
    #[serde(default = "default_true")]
    pub headless: bool,
    #[serde(default = "default_window_width")]
    pub window_width: u32,
    #[serde(default = "default_window_height")]
    pub window_height: u32,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            executable: None,
            fallback_executable: default_fallback_executable(),
            headless: true,
            window_width: default_window_width(),
            window_height: default_window_height(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

/// ================================
/// Login
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct LoginConfig {
    #[serde(default = "default_login_url")]
    pub url: String,
    #[serde(default = "default_username_selector")]
    pub username_selector: String,
    #[serde(default = "default_password_selector")]
    pub password_selector: String,
    #[serde(default = "default_submit_selector")]
    pub submit_selector: String,
    /// Bound for the login form to appear
    #[serde(default = "default_field_timeout_ms")]
    pub field_timeout_ms: u64,
    #[serde(default)]
    pub post_login: PostLoginSignal,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Environment variables holding the learner credentials
    #[serde(default = "default_username_env")]
    pub username_env: String,
    #[serde(default = "default_password_env")]
    pub password_env: String,
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            url: default_login_url(),
            username_selector: default_username_selector(),
            password_selector: default_password_selector(),
            submit_selector: default_submit_selector(),
            field_timeout_ms: default_field_timeout_ms(),
            post_login: PostLoginSignal::default(),
            poll_interval_ms: default_poll_interval_ms(),
            username_env: default_username_env(),
            password_env: default_password_env(),
        }
    }
}

/// What tells us the login went through.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PostLoginSignal {
    /// Current URL contains `marker` within `timeout_ms`
    UrlContains { marker: String, timeout_ms: u64 },
    /// Fixed delay, no readiness check
    Delay { delay_ms: u64 },
}

impl Default for PostLoginSignal {
    fn default() -> Self {
        PostLoginSignal::UrlContains {
            marker: DEFAULT_REDIRECT_MARKER.to_owned(),
            timeout_ms: default_redirect_timeout_ms(),
        }
    }
}

/// ================================
/// Token acquisition
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct AcquisitionConfig {
    /// Tried in order, first token wins
    #[serde(default = "default_strategies")]
    pub strategies: Vec<StrategyKind>,
    /// Page visited by the network strategy to trigger authorised API calls
    #[serde(default = "default_authenticated_url")]
    pub authenticated_url: String,
    #[serde(default = "default_network_settle_ms")]
    pub network_settle_ms: u64,
    #[serde(default = "default_redirect_marker")]
    pub redirect_marker: String,
    #[serde(default = "default_redirect_timeout_ms")]
    pub redirect_timeout_ms: u64,
    #[serde(default = "default_conventional_keys")]
    pub storage_keys: Vec<String>,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default)]
    pub token: TokenRules,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            strategies: default_strategies(),
            authenticated_url: default_authenticated_url(),
            network_settle_ms: default_network_settle_ms(),
            redirect_marker: default_redirect_marker(),
            redirect_timeout_ms: default_redirect_timeout_ms(),
            storage_keys: default_conventional_keys(),
            poll_interval_ms: default_poll_interval_ms(),
            token: TokenRules::default(),
        }
    }
}

/// ================================
/// Persistence
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct PersistenceConfig {
    /// `collection/document`, relative to the database root
    #[serde(default = "default_document_path")]
    pub document_path: String,
    #[serde(default = "default_source_tag")]
    pub source_tag: String,
    #[serde(default = "default_ttl_hours")]
    pub ttl_hours: i64,
    #[serde(default = "default_database")]
    pub database: String,
    /// Overrides the public Firestore endpoint
    pub base_url: Option<String>,
    #[serde(default = "default_http_timeout_ms")]
    pub http_timeout_ms: u64,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            document_path: default_document_path(),
            source_tag: default_source_tag(),
            ttl_hours: default_ttl_hours(),
            database: default_database(),
            base_url: None,
            http_timeout_ms: default_http_timeout_ms(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_fallback_executable() -> Option<String> {
    Some(DEFAULT_FALLBACK_EXECUTABLE.to_owned())
}
fn default_window_width() -> u32 {
    DEFAULT_WINDOW_WIDTH
}
fn default_window_height() -> u32 {
    DEFAULT_WINDOW_HEIGHT
}
fn default_request_timeout_ms() -> u64 {
    30_000
}
fn default_login_url() -> String {
    DEFAULT_LOGIN_URL.to_owned()
}
fn default_username_selector() -> String {
    DEFAULT_USERNAME_SELECTOR.to_owned()
}
fn default_password_selector() -> String {
    DEFAULT_PASSWORD_SELECTOR.to_owned()
}
fn default_submit_selector() -> String {
    DEFAULT_SUBMIT_SELECTOR.to_owned()
}
fn default_username_env() -> String {
    ENV_USERNAME.to_owned()
}
fn default_password_env() -> String {
    ENV_PASSWORD.to_owned()
}
fn default_field_timeout_ms() -> u64 {
    10_000
}
fn default_poll_interval_ms() -> u64 {
    250
}
fn default_strategies() -> Vec<StrategyKind> {
    vec![StrategyKind::Network, StrategyKind::Storage, StrategyKind::UrlRedirect]
}
fn default_authenticated_url() -> String {
    DEFAULT_AUTHENTICATED_URL.to_owned()
}
fn default_network_settle_ms() -> u64 {
    5_000
}
fn default_redirect_marker() -> String {
    DEFAULT_REDIRECT_MARKER.to_owned()
}
fn default_redirect_timeout_ms() -> u64 {
    30_000
}
fn default_conventional_keys() -> Vec<String> {
    CONVENTIONAL_TOKEN_KEYS.iter().map(|k| k.to_string()).collect()
}
fn default_document_path() -> String {
    DEFAULT_DOCUMENT_PATH.to_owned()
}
fn default_source_tag() -> String {
    DEFAULT_SOURCE_TAG.to_owned()
}
fn default_ttl_hours() -> i64 {
    DEFAULT_TTL_HOURS
}
fn default_database() -> String {
    "(default)".to_owned()
}
fn default_http_timeout_ms() -> u64 {
    10_000
}

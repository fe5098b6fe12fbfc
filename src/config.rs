//! Client configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). Command-line flags may override the
//! API base and origin after loading.

use std::time::Duration;

/// Default base URL of the handshake API.
pub const DEFAULT_API_BASE: &str = "https://slack.com/api";

/// Default `Origin` header sent on the socket upgrade.
pub const DEFAULT_ORIGIN: &str = "http://localhost/";

/// Top-level client configuration.
///
/// Loaded once at startup via [`ClientConfig::from_env`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL the API method name is appended to.
    pub api_base: String,

    /// `Origin` header used when opening the socket.
    pub origin: String,

    /// Seconds between keepalive pings.
    pub ping_interval_secs: u64,

    /// Capacity of the inbound message queue.
    pub inbound_queue_capacity: usize,

    /// Capacity of the outbound message queue.
    pub outbound_queue_capacity: usize,

    /// Attempts per outbound message before the session gives up.
    pub max_send_attempts: u32,

    /// Base delay in milliseconds before a failed send is re-enqueued.
    pub send_backoff_ms: u64,

    /// Timeout in seconds for the handshake request.
    pub http_timeout_secs: u64,

    /// Emit logs as JSON lines.
    pub log_json: bool,
}

impl ClientConfig {
    /// Loads configuration from environment variables.
    ///
    /// Falls back to defaults when a variable is not set or cannot be
    /// parsed. Calls `dotenvy::dotenv().ok()` to optionally load a `.env`
    /// file.
    #[must_use]
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let api_base =
            std::env::var("RTM_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string());
        let origin = std::env::var("RTM_ORIGIN").unwrap_or_else(|_| DEFAULT_ORIGIN.to_string());

        Self {
            api_base,
            origin,
            ping_interval_secs: parse_env("RTM_PING_INTERVAL_SECS", 10),
            inbound_queue_capacity: parse_env("RTM_INBOUND_QUEUE_CAPACITY", 256),
            outbound_queue_capacity: parse_env("RTM_OUTBOUND_QUEUE_CAPACITY", 64),
            max_send_attempts: parse_env("RTM_MAX_SEND_ATTEMPTS", 5),
            send_backoff_ms: parse_env("RTM_SEND_BACKOFF_MS", 250),
            http_timeout_secs: parse_env("RTM_HTTP_TIMEOUT_SECS", 30),
            log_json: parse_env_bool("RTM_LOG_JSON", false),
        }
    }

    /// Timeout applied to the handshake request.
    #[must_use]
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs.max(1))
    }

    /// Builds the settings the session loop runs with.
    ///
    /// Zero values are clamped: the interval to one second, capacities
    /// and the attempt limit to one.
    #[must_use]
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            ping_interval: Duration::from_secs(self.ping_interval_secs.max(1)),
            inbound_capacity: self.inbound_queue_capacity.max(1),
            outbound_capacity: self.outbound_queue_capacity.max(1),
            max_send_attempts: self.max_send_attempts.max(1),
            send_backoff: Duration::from_millis(self.send_backoff_ms),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            origin: DEFAULT_ORIGIN.to_string(),
            ping_interval_secs: 10,
            inbound_queue_capacity: 256,
            outbound_queue_capacity: 64,
            max_send_attempts: 5,
            send_backoff_ms: 250,
            http_timeout_secs: 30,
            log_json: false,
        }
    }
}

/// Settings for a single session loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Interval between keepalive pings.
    pub ping_interval: Duration,
    /// Bound of the inbound queue fed by the receive task.
    pub inbound_capacity: usize,
    /// Bound of the outbound queue drained by the session loop.
    pub outbound_capacity: usize,
    /// Attempts per outbound message before the session terminates.
    pub max_send_attempts: u32,
    /// Base of the exponential re-enqueue delay after a failed send.
    pub send_backoff: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        ClientConfig::default().session_config()
    }
}

/// Parses an environment variable as `T`, returning `default` on missing
/// or invalid values.
fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Parses an environment variable as a boolean. Accepts `"true"`, `"1"`,
/// `"false"`, `"0"` (case-insensitive). Returns `default` otherwise.
fn parse_env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key).ok().as_deref().map(str::to_ascii_lowercase).as_deref() {
        Some("true" | "1") => true,
        Some("false" | "0") => false,
        _ => default,
    }
}

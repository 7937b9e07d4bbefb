use serde::{Deserialize, Serialize};

/// Root configuration, shared by both binaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server configuration (backend binary only)
    #[serde(default)]
    pub server: ServerConfig,

    /// Message broker configuration (stream-processor binary only)
    #[serde(default)]
    pub broker: BrokerConfig,

    /// Storage backend configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Windowing / reconstruction configuration
    #[serde(default)]
    pub window: WindowConfig,

    /// Emitter (dataflow -> backend) configuration
    #[serde(default)]
    pub emitter: EmitterConfig,

    /// Root-cause-analysis call-out configuration
    #[serde(default)]
    pub rca: RcaConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from the bundled defaults, an optional file, and
    /// environment overrides (prefix `OTEL_PIPE`, `__`-nested).
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path =
            std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config/local.toml".to_string());

        config::Config::builder()
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            .add_source(config::File::with_name(&config_path).required(false))
            .add_source(
                config::Environment::with_prefix("OTEL_PIPE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_http_port")]
    pub http_port: u16,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            http_port: default_http_port(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    #[serde(default = "default_broker_host")]
    pub host: String,

    #[serde(default = "default_broker_port")]
    pub port: u16,

    #[serde(default = "default_broker_user")]
    pub user: String,

    #[serde(default = "default_broker_password")]
    pub password: String,

    #[serde(default = "default_queue_name")]
    pub queue_name: String,

    #[serde(default = "default_prefetch")]
    pub prefetch_count: u16,

    #[serde(default = "default_inactivity_timeout_ms")]
    pub inactivity_timeout_ms: u64,

    #[serde(default = "default_backoff_floor_secs")]
    pub backoff_floor_secs: u64,

    #[serde(default = "default_backoff_ceiling_secs")]
    pub backoff_ceiling_secs: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: default_broker_host(),
            port: default_broker_port(),
            user: default_broker_user(),
            password: default_broker_password(),
            queue_name: default_queue_name(),
            prefetch_count: default_prefetch(),
            inactivity_timeout_ms: default_inactivity_timeout_ms(),
            backoff_floor_secs: default_backoff_floor_secs(),
            backoff_ceiling_secs: default_backoff_ceiling_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    #[default]
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    #[serde(default = "default_window_secs")]
    pub length_secs: i64,

    #[serde(default = "default_log_buffer_cap")]
    pub log_buffer_cap: usize,

    #[serde(default = "default_log_buffer_ttl_secs")]
    pub log_buffer_ttl_secs: i64,

    #[serde(default = "default_redaction_emit_every")]
    pub redaction_emit_every: u64,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            length_secs: default_window_secs(),
            log_buffer_cap: default_log_buffer_cap(),
            log_buffer_ttl_secs: default_log_buffer_ttl_secs(),
            redaction_emit_every: default_redaction_emit_every(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmitterConfig {
    #[serde(default = "default_backend_url")]
    pub backend_url: String,

    #[serde(default = "default_emit_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            backend_url: default_backend_url(),
            timeout_secs: default_emit_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RcaConfig {
    /// Environment variable holding the Gemini API key; RCA is disabled when unset.
    #[serde(default = "default_rca_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_rca_model")]
    pub model: String,

    #[serde(default = "default_rca_timeout_secs")]
    pub timeout_secs: u64,

    /// Base URL of the `generateContent` REST API; overridable so tests can
    /// point the client at a mock server instead of the real Gemini host.
    #[serde(default = "default_rca_base_url")]
    pub base_url: String,
}

impl Default for RcaConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_rca_api_key_env(),
            model: default_rca_model(),
            timeout_secs: default_rca_timeout_secs(),
            base_url: default_rca_base_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub json_logs: bool,

    #[serde(default = "default_service_name")]
    pub service_name: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
            service_name: default_service_name(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8000
}

fn default_request_timeout() -> u64 {
    30
}

fn default_broker_host() -> String {
    "localhost".to_string()
}

fn default_broker_port() -> u16 {
    5672
}

fn default_broker_user() -> String {
    "telemetry".to_string()
}

fn default_broker_password() -> String {
    "telemetry_password".to_string()
}

fn default_queue_name() -> String {
    "otel-telemetry".to_string()
}

fn default_prefetch() -> u16 {
    1
}

fn default_inactivity_timeout_ms() -> u64 {
    500
}

fn default_backoff_floor_secs() -> u64 {
    1
}

fn default_backoff_ceiling_secs() -> u64 {
    30
}

fn default_db_path() -> String {
    "telemetry.db".to_string()
}

fn default_window_secs() -> i64 {
    10
}

fn default_log_buffer_cap() -> usize {
    50
}

fn default_log_buffer_ttl_secs() -> i64 {
    60
}

fn default_redaction_emit_every() -> u64 {
    5
}

fn default_backend_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_emit_timeout_secs() -> u64 {
    1
}

fn default_rca_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

fn default_rca_model() -> String {
    "gemini-2.5-flash-lite".to_string()
}

fn default_rca_timeout_secs() -> u64 {
    10
}

fn default_rca_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_service_name() -> String {
    "otel-telemetry-pipeline".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        assert_eq!(default_http_port(), 8000);
        assert_eq!(default_prefetch(), 1);
        assert_eq!(default_window_secs(), 10);
        assert_eq!(default_log_buffer_cap(), 50);
    }

    #[test]
    fn test_storage_backend_default() {
        assert_eq!(StorageBackend::default(), StorageBackend::Sqlite);
    }
}

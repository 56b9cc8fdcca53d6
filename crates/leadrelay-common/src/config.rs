//! Configuration for LeadRelay

use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Dispatcher configuration
    #[serde(default)]
    pub dispatcher: DispatcherConfig,

    /// WhatsApp channel configuration
    #[serde(default)]
    pub whatsapp: WhatsAppConfig,

    /// SMTP channel configuration
    #[serde(default)]
    pub smtp: SmtpConfig,

    /// API configuration
    #[serde(default)]
    pub api: ApiConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Hostname
    #[serde(default = "default_hostname")]
    pub hostname: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            hostname: default_hostname(),
        }
    }
}

fn default_hostname() -> String {
    "localhost".to_string()
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    20
}

fn default_min_connections() -> u32 {
    5
}

/// Dispatcher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// Seconds between dispatch ticks
    #[serde(default = "default_tick_interval")]
    pub tick_interval_secs: u64,

    /// Maximum messages fetched per tick
    #[serde(default = "default_batch_size")]
    pub batch_size: i64,

    /// Maximum concurrent channel sends within a tick
    #[serde(default = "default_concurrency")]
    pub concurrency_limit: usize,

    /// Per-message send timeout in seconds
    #[serde(default = "default_send_timeout")]
    pub send_timeout_secs: u64,

    /// Maximum delivery attempts before a message is marked failed
    #[serde(default = "default_max_attempts")]
    pub max_attempts: i32,

    /// Base delay for exponential retry backoff, in seconds
    #[serde(default = "default_retry_base")]
    pub retry_base_secs: i64,

    /// Upper bound on a single retry delay, in seconds
    #[serde(default = "default_retry_cap")]
    pub retry_cap_secs: i64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: default_tick_interval(),
            batch_size: default_batch_size(),
            concurrency_limit: default_concurrency(),
            send_timeout_secs: default_send_timeout(),
            max_attempts: default_max_attempts(),
            retry_base_secs: default_retry_base(),
            retry_cap_secs: default_retry_cap(),
        }
    }
}

fn default_tick_interval() -> u64 {
    60
}

fn default_batch_size() -> i64 {
    200
}

fn default_concurrency() -> usize {
    10
}

fn default_send_timeout() -> u64 {
    30
}

fn default_max_attempts() -> i32 {
    5
}

fn default_retry_base() -> i64 {
    60
}

fn default_retry_cap() -> i64 {
    3600
}

/// WhatsApp Cloud API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhatsAppConfig {
    /// Graph API access token
    #[serde(default)]
    pub access_token: String,

    /// WhatsApp phone number ID
    #[serde(default)]
    pub phone_number_id: String,

    /// Graph API base URL (overridable for testing)
    #[serde(default = "default_whatsapp_api_base")]
    pub api_base: String,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            access_token: String::new(),
            phone_number_id: String::new(),
            api_base: default_whatsapp_api_base(),
        }
    }
}

fn default_whatsapp_api_base() -> String {
    "https://graph.facebook.com/v18.0".to_string()
}

/// SMTP configuration for the email channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    /// SMTP relay host
    #[serde(default = "default_smtp_host")]
    pub host: String,

    /// SMTP port
    #[serde(default = "default_smtp_port")]
    pub port: u16,

    /// SMTP username
    pub username: Option<String>,

    /// SMTP password
    pub password: Option<String>,

    /// From address for outbound campaign mail
    #[serde(default = "default_from_address")]
    pub from_address: String,

    /// Use STARTTLS
    #[serde(default = "default_starttls")]
    pub use_starttls: bool,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: default_smtp_host(),
            port: default_smtp_port(),
            username: None,
            password: None,
            from_address: default_from_address(),
            use_starttls: default_starttls(),
        }
    }
}

fn default_smtp_host() -> String {
    "localhost".to_string()
}

fn default_smtp_port() -> u16 {
    587
}

fn default_from_address() -> String {
    "campaigns@localhost".to_string()
}

fn default_starttls() -> bool {
    true
}

/// API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// API server port
    #[serde(default = "default_api_port")]
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            port: default_api_port(),
        }
    }
}

fn default_api_port() -> u16 {
    8080
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log filter directive, EnvFilter syntax
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

fn default_log_filter() -> String {
    "info,leadrelay=debug".to_string()
}

impl Config {
    /// Load configuration from file
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Load configuration from default locations
    pub fn load() -> crate::Result<Self> {
        let paths = [
            std::path::PathBuf::from("./config.toml"),
            std::path::PathBuf::from("/etc/leadrelay/config.toml"),
        ];

        for path in paths {
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        Err(crate::Error::Config(
            "No configuration file found".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_dispatcher_config() {
        let d = DispatcherConfig::default();
        assert_eq!(d.tick_interval_secs, 60);
        assert_eq!(d.max_attempts, 5);
        assert_eq!(d.concurrency_limit, 10);
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[server]
hostname = "crm.example.com"

[database]
url = "postgres://localhost/leadrelay"

[dispatcher]
tick_interval_secs = 30
concurrency_limit = 4

[whatsapp]
access_token = "token"
phone_number_id = "12345"

[smtp]
host = "smtp.example.com"
port = 587
"#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.hostname, "crm.example.com");
        assert_eq!(config.database.url, "postgres://localhost/leadrelay");
        assert_eq!(config.dispatcher.tick_interval_secs, 30);
        assert_eq!(config.dispatcher.max_attempts, 5);
        assert_eq!(config.whatsapp.phone_number_id, "12345");
        assert_eq!(config.smtp.port, 587);
    }
}

use crate::intake::{IntakeChannel, IntakeSettings};
use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the kiosk and its intake channels.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub backend: BackendConfig,
    pub notifications: NotificationConfig,
    pub intake: IntakeConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let backend = BackendConfig {
            base_url: env::var("BACKEND_BASE_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:5000/api/v1".to_string()),
            token: env::var("BACKEND_TOKEN").ok().filter(|token| !token.trim().is_empty()),
            timeout: env_millis("BACKEND_TIMEOUT_MS", Duration::from_secs(10))?,
        };

        let notifications = NotificationConfig {
            base_url: env::var("NOTIFICATION_BASE_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:4000/api".to_string()),
            max_batch: env_usize("NOTIFY_MAX_BATCH", 25)?.max(1),
        };

        let intake = IntakeConfig {
            attendance: load_intake_settings(IntakeChannel::Attendance)?,
            assistant_login: load_intake_settings(IntakeChannel::AssistantLogin)?,
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            backend,
            notifications,
            intake,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// REST backend that records attendance and assistant logins.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub base_url: String,
    pub token: Option<String>,
    pub timeout: Duration,
}

/// Reminder bot endpoint.
#[derive(Debug, Clone)]
pub struct NotificationConfig {
    pub base_url: String,
    pub max_batch: usize,
}

#[derive(Debug, Clone)]
pub struct IntakeConfig {
    pub attendance: IntakeSettings,
    pub assistant_login: IntakeSettings,
}

impl IntakeConfig {
    pub fn settings_for(&self, channel: IntakeChannel) -> &IntakeSettings {
        match channel {
            IntakeChannel::Attendance => &self.attendance,
            IntakeChannel::AssistantLogin => &self.assistant_login,
        }
    }
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            attendance: IntakeSettings::for_channel(IntakeChannel::Attendance),
            assistant_login: IntakeSettings::for_channel(IntakeChannel::AssistantLogin),
        }
    }
}

fn env_prefix(channel: IntakeChannel) -> &'static str {
    match channel {
        IntakeChannel::Attendance => "ATTENDANCE",
        IntakeChannel::AssistantLogin => "ASSISTANT_LOGIN",
    }
}

fn load_intake_settings(channel: IntakeChannel) -> Result<IntakeSettings, ConfigError> {
    let prefix = env_prefix(channel);
    let defaults = IntakeSettings::for_channel(channel);

    Ok(IntakeSettings {
        mode: defaults.mode,
        window: env_millis(&format!("{prefix}_WINDOW_MS"), defaults.window)?,
        gate_cooldown: env_millis(&format!("{prefix}_GATE_COOLDOWN_MS"), defaults.gate_cooldown)?,
        scan_length_threshold: env_usize(
            &format!("{prefix}_SCAN_LENGTH_THRESHOLD"),
            defaults.scan_length_threshold,
        )?,
        scan_settle: env_millis(&format!("{prefix}_SCAN_SETTLE_MS"), defaults.scan_settle)?,
        display_ttl: env_millis(&format!("{prefix}_DISPLAY_TTL_MS"), defaults.display_ttl)?,
        notify_on_success: env_flag(
            &format!("{prefix}_NOTIFY_ON_SUCCESS"),
            defaults.notify_on_success,
        )?,
    })
}

fn env_millis(key: &str, default: Duration) -> Result<Duration, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|_| ConfigError::InvalidNumber {
                key: key.to_string(),
            }),
        Err(_) => Ok(default),
    }
}

fn env_usize(key: &str, default: usize) -> Result<usize, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<usize>()
            .map_err(|_| ConfigError::InvalidNumber {
                key: key.to_string(),
            }),
        Err(_) => Ok(default),
    }
}

fn env_flag(key: &str, default: bool) -> Result<bool, ConfigError> {
    let Ok(raw) = env::var(key) else {
        return Ok(default);
    };

    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidFlag {
            key: key.to_string(),
        }),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { key: String },
    InvalidFlag { key: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { key } => {
                write!(f, "{key} must be a non-negative integer")
            }
            ConfigError::InvalidFlag { key } => write!(f, "{key} must be true or false"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidNumber { .. }
            | ConfigError::InvalidFlag { .. } => None,
        }
    }
}

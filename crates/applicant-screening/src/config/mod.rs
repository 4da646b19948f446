use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

const DEFAULT_IDENFY_BASE_URL: &str = "https://ivs.idenfy.com";
const DEFAULT_CHECKR_BASE_URL: &str = "https://api.checkr.com";
const DEFAULT_CHECKR_PACKAGE: &str = "tasker_standard";
const DEFAULT_DISCLOSURE_VERSION: &str = "fcra-2024-01";

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

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub screening: ScreeningConfig,
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
        let screening = ScreeningConfig::from_env(environment)?;

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            screening,
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

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Credentials and policy dials for the screening subsystem.
///
/// Provider blocks are `None` when their credentials are absent, which selects the
/// sandbox providers outside production.
#[derive(Debug, Clone)]
pub struct ScreeningConfig {
    pub idenfy: Option<IdenfyConfig>,
    pub checkr: Option<CheckrConfig>,
    pub identity_requires_consent: bool,
    pub auto_monitoring: bool,
    pub disclosure_version: String,
    pub admin_users: Vec<String>,
}

impl ScreeningConfig {
    fn from_env(environment: AppEnvironment) -> Result<Self, ConfigError> {
        let idenfy = match non_empty_var("IDENFY_API_KEY") {
            Some(api_key) => Some(IdenfyConfig {
                base_url: non_empty_var("IDENFY_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_IDENFY_BASE_URL.to_string()),
                api_key,
                api_secret: non_empty_var("IDENFY_API_SECRET")
                    .ok_or(ConfigError::MissingSecret("IDENFY_API_SECRET"))?,
                callback_signing_key: non_empty_var("IDENFY_CALLBACK_SIGNING_KEY")
                    .ok_or(ConfigError::MissingSecret("IDENFY_CALLBACK_SIGNING_KEY"))?,
            }),
            None if environment == AppEnvironment::Production => {
                return Err(ConfigError::MissingSecret("IDENFY_API_KEY"));
            }
            None => None,
        };

        let checkr = match non_empty_var("CHECKR_API_KEY") {
            Some(api_key) => Some(CheckrConfig {
                base_url: non_empty_var("CHECKR_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_CHECKR_BASE_URL.to_string()),
                api_key,
                package: non_empty_var("CHECKR_PACKAGE")
                    .unwrap_or_else(|| DEFAULT_CHECKR_PACKAGE.to_string()),
                work_location_country: non_empty_var("CHECKR_WORK_LOCATION_COUNTRY")
                    .unwrap_or_else(|| "US".to_string()),
            }),
            None if environment == AppEnvironment::Production => {
                return Err(ConfigError::MissingSecret("CHECKR_API_KEY"));
            }
            None => None,
        };

        let admin_users = non_empty_var("SCREENING_ADMIN_USERS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|value| !value.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            idenfy,
            checkr,
            identity_requires_consent: flag_var("SCREENING_IDENTITY_REQUIRES_CONSENT", false)?,
            auto_monitoring: flag_var("SCREENING_AUTO_MONITORING", false)?,
            disclosure_version: non_empty_var("SCREENING_DISCLOSURE_VERSION")
                .unwrap_or_else(|| DEFAULT_DISCLOSURE_VERSION.to_string()),
            admin_users,
        })
    }
}

/// Identity-document verification provider credentials.
#[derive(Clone)]
pub struct IdenfyConfig {
    pub base_url: String,
    pub api_key: String,
    pub api_secret: String,
    pub callback_signing_key: String,
}

impl fmt::Debug for IdenfyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdenfyConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("api_secret", &"<redacted>")
            .field("callback_signing_key", &"<redacted>")
            .finish()
    }
}

/// Criminal background-check provider credentials.
#[derive(Clone)]
pub struct CheckrConfig {
    pub base_url: String,
    pub api_key: String,
    pub package: String,
    pub work_location_country: String,
}

impl fmt::Debug for CheckrConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckrConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("package", &self.package)
            .field("work_location_country", &self.work_location_country)
            .finish()
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn flag_var(name: &'static str, default: bool) -> Result<bool, ConfigError> {
    match non_empty_var(name) {
        None => Ok(default),
        Some(raw) => match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidFlag(name)),
        },
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidFlag(&'static str),
    MissingSecret(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidFlag(name) => {
                write!(f, "{name} must be one of true/false/1/0/yes/no/on/off")
            }
            ConfigError::MissingSecret(name) => write!(f, "{name} must be set"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidFlag(_)
            | ConfigError::MissingSecret(_) => None,
        }
    }
}

use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

const DEFAULT_EMAIL_DOMAIN: &str = "vertexuniversity.edu.eu";
const DEFAULT_PASSWORD_LENGTH: usize = 12;
const MIN_PASSWORD_LENGTH: usize = 12;
const DEFAULT_IDENTIFIER_ATTEMPTS: u32 = 32;

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
    pub workflow: WorkflowConfig,
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

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            workflow: WorkflowConfig::from_env()?,
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

/// Knobs for identifier provisioning and the approval catalog source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowConfig {
    /// Institutional mail domain appended to generated student addresses.
    pub email_domain: String,
    pub temporary_password_length: usize,
    /// Upper bound on collision retries when issuing student numbers and transaction ids.
    pub identifier_attempts: u32,
    pub approval_catalog: Option<PathBuf>,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            email_domain: DEFAULT_EMAIL_DOMAIN.to_string(),
            temporary_password_length: DEFAULT_PASSWORD_LENGTH,
            identifier_attempts: DEFAULT_IDENTIFIER_ATTEMPTS,
            approval_catalog: None,
        }
    }
}

impl WorkflowConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let email_domain = match env::var("SIS_EMAIL_DOMAIN") {
            Ok(value) if value.trim().is_empty() => return Err(ConfigError::InvalidEmailDomain),
            Ok(value) => value.trim().trim_start_matches('@').to_ascii_lowercase(),
            Err(_) => defaults.email_domain,
        };

        let temporary_password_length = match env::var("SIS_TEMP_PASSWORD_LENGTH") {
            Ok(raw) => raw
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|length| *length >= MIN_PASSWORD_LENGTH)
                .ok_or(ConfigError::InvalidPasswordLength {
                    minimum: MIN_PASSWORD_LENGTH,
                })?,
            Err(_) => defaults.temporary_password_length,
        };

        let identifier_attempts = match env::var("SIS_IDENTIFIER_ATTEMPTS") {
            Ok(raw) => raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|attempts| *attempts >= 1)
                .ok_or(ConfigError::InvalidIdentifierAttempts)?,
            Err(_) => defaults.identifier_attempts,
        };

        let approval_catalog = env::var("SIS_APPROVAL_CATALOG")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            email_domain,
            temporary_password_length,
            identifier_attempts,
            approval_catalog,
        })
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidEmailDomain,
    InvalidPasswordLength { minimum: usize },
    InvalidIdentifierAttempts,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidEmailDomain => write!(f, "SIS_EMAIL_DOMAIN must not be empty"),
            ConfigError::InvalidPasswordLength { minimum } => write!(
                f,
                "SIS_TEMP_PASSWORD_LENGTH must be an integer of at least {minimum}"
            ),
            ConfigError::InvalidIdentifierAttempts => {
                write!(f, "SIS_IDENTIFIER_ATTEMPTS must be a positive integer")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

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
    pub rate_limit: RateLimitConfig,
    pub auth: AuthConfig,
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

        let window_secs = env::var("APP_RATE_LIMIT_WINDOW_SECS")
            .unwrap_or_else(|_| "900".to_string())
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidRateLimit)?;
        let max_requests = env::var("APP_RATE_LIMIT_MAX_REQUESTS")
            .unwrap_or_else(|_| "100".to_string())
            .parse::<usize>()
            .map_err(|_| ConfigError::InvalidRateLimit)?;

        let auth = AuthConfig {
            admin_token: env::var("APP_ADMIN_TOKEN").ok().filter(|t| !t.is_empty()),
            staff_token: env::var("APP_STAFF_TOKEN").ok().filter(|t| !t.is_empty()),
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            rate_limit: RateLimitConfig {
                window: Duration::from_secs(window_secs),
                max_requests,
            },
            auth,
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

/// Sliding-window bounds applied per client address.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub window: Duration,
    pub max_requests: usize,
}

/// Bearer tokens seeded at startup for the staff review surface.
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    pub admin_token: Option<String>,
    pub staff_token: Option<String>,
}

/// Well-known parameter names resolved through the [`ParameterCache`].
pub mod keys {
    pub const ADMIN_EMAIL: &str = "ADMIN_EMAIL";
    pub const ADMIN_PHONE: &str = "ADMIN_PHONE";
    pub const EMAIL_FROM: &str = "EMAIL_FROM";
    pub const FRONTEND_URL: &str = "FRONTEND_URL";
}

/// Source of named runtime parameters (notification addresses, contact
/// numbers). Deployments back this with a secrets manager; tests and local
/// runs read the environment.
pub trait ParameterSource: Send + Sync {
    fn fetch(&self) -> Result<HashMap<String, String>, ConfigError>;
}

/// Reads `APP_`-prefixed parameters from the process environment.
#[derive(Debug, Default)]
pub struct EnvParameterSource;

impl ParameterSource for EnvParameterSource {
    fn fetch(&self) -> Result<HashMap<String, String>, ConfigError> {
        let mut values = HashMap::new();
        for key in [
            keys::ADMIN_EMAIL,
            keys::ADMIN_PHONE,
            keys::EMAIL_FROM,
            keys::FRONTEND_URL,
        ] {
            if let Ok(value) = env::var(format!("APP_{key}")) {
                if !value.trim().is_empty() {
                    values.insert(key.to_string(), value);
                }
            }
        }
        Ok(values)
    }
}

struct CacheState {
    values: HashMap<String, String>,
    refreshed_at: Option<Instant>,
}

/// Caching parameter provider with an explicit TTL and refresh method.
///
/// Injected into the services that need runtime parameters instead of being
/// read through process-global state, so the caching contract stays visible
/// at construction sites.
pub struct ParameterCache {
    source: Arc<dyn ParameterSource>,
    ttl: Duration,
    state: Mutex<CacheState>,
}

impl ParameterCache {
    pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

    pub fn new(source: Arc<dyn ParameterSource>, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            state: Mutex::new(CacheState {
                values: HashMap::new(),
                refreshed_at: None,
            }),
        }
    }

    /// Look up a parameter, refreshing the cache when the TTL has lapsed.
    pub fn get(&self, key: &str) -> Option<String> {
        let mut state = self.state.lock().expect("parameter cache mutex poisoned");
        let stale = state
            .refreshed_at
            .map_or(true, |at| at.elapsed() >= self.ttl);
        if stale {
            match self.source.fetch() {
                Ok(values) => {
                    state.values = values;
                    state.refreshed_at = Some(Instant::now());
                }
                Err(err) => {
                    tracing::warn!(%err, "parameter refresh failed, serving cached values");
                }
            }
        }
        state.values.get(key).cloned()
    }

    /// Force a refresh regardless of the TTL.
    pub fn refresh(&self) -> Result<(), ConfigError> {
        let values = self.source.fetch()?;
        let mut state = self.state.lock().expect("parameter cache mutex poisoned");
        state.values = values;
        state.refreshed_at = Some(Instant::now());
        Ok(())
    }

    /// A populated admin contact is the minimum viable parameter set.
    pub fn is_healthy(&self) -> bool {
        self.get(keys::ADMIN_EMAIL).is_some()
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidRateLimit,
    InvalidHost { source: std::net::AddrParseError },
    ParameterSource { message: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidRateLimit => {
                write!(f, "APP_RATE_LIMIT_* values must be positive integers")
            }
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::ParameterSource { message } => {
                write!(f, "parameter source failure: {message}")
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

use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_OLLAMA_BASE_URL: &str = "http://127.0.0.1:11434";
const DEFAULT_OLLAMA_TIMEOUT_SECS: u64 = 300;
const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 15 * 60;
const DEFAULT_RATE_LIMIT_MAX_REQUESTS: u32 = 100;

#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub ollama: OllamaConfig,
    pub smtp: Option<SmtpConfig>,
    pub tls: TlsConfig,
    pub cors: CorsConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OllamaConfig {
    pub base_url: String,
    /// Upper bound on a single generation call.
    pub request_timeout_secs: u64,
}

impl OllamaConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Present only when both credentials are set; absence disables email.
#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub from_email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TlsConfig {
    pub enabled: bool,
    pub cert_path: Option<PathBuf>,
    pub key_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub enum CorsConfig {
    AllowAll,
    AllowOrigins(Vec<String>),
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub window_secs: u64,
    pub max_requests: u32,
    /// Key on `X-Forwarded-For` instead of the peer address.
    pub trust_proxy: bool,
}

impl RelayConfig {
    pub fn load() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        Self::from_source(common_config, |key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_source<F>(common: core_config::Config, lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let ollama = OllamaConfig {
            base_url: get("OLLAMA_BASE_URL")
                .unwrap_or_else(|| DEFAULT_OLLAMA_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            request_timeout_secs: parse_or(
                get("OLLAMA_TIMEOUT_SECS"),
                "OLLAMA_TIMEOUT_SECS",
                DEFAULT_OLLAMA_TIMEOUT_SECS,
            )?,
        };

        let smtp = match (get("EMAIL_USER"), get("EMAIL_PASS")) {
            (Some(user), Some(password)) => Some(SmtpConfig {
                host: get("SMTP_HOST").unwrap_or_else(|| "smtp.gmail.com".to_string()),
                port: parse_or(get("SMTP_PORT"), "SMTP_PORT", 587)?,
                from_email: get("EMAIL_FROM").unwrap_or_else(|| user.clone()),
                user,
                password,
            }),
            _ => None,
        };

        let tls = TlsConfig {
            enabled: parse_or(get("TLS_ENABLED"), "TLS_ENABLED", false)?,
            cert_path: get("SSL_CERT_PATH").map(PathBuf::from),
            key_path: get("SSL_KEY_PATH").map(PathBuf::from),
        };
        tls.validate()?;

        let cors = CorsConfig::parse(get("ALLOWED_ORIGINS").as_deref());

        let rate_limit = RateLimitConfig {
            window_secs: parse_or(
                get("RATE_LIMIT_WINDOW_SECS"),
                "RATE_LIMIT_WINDOW_SECS",
                DEFAULT_RATE_LIMIT_WINDOW_SECS,
            )?,
            max_requests: parse_or(
                get("RATE_LIMIT_MAX_REQUESTS"),
                "RATE_LIMIT_MAX_REQUESTS",
                DEFAULT_RATE_LIMIT_MAX_REQUESTS,
            )?,
            trust_proxy: parse_or(get("TRUST_PROXY"), "TRUST_PROXY", false)?,
        };

        Ok(RelayConfig {
            common,
            ollama,
            smtp,
            tls,
            cors,
            rate_limit,
        })
    }
}

impl TlsConfig {
    fn validate(&self) -> Result<(), AppError> {
        if self.enabled {
            if self.cert_path.is_none() {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "SSL_CERT_PATH is required when TLS_ENABLED is true"
                )));
            }
            if self.key_path.is_none() {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "SSL_KEY_PATH is required when TLS_ENABLED is true"
                )));
            }
        } else if self.cert_path.is_some() || self.key_path.is_some() {
            tracing::warn!("Certificate paths are set but TLS_ENABLED is false; serving plain HTTP");
        }
        Ok(())
    }
}

impl CorsConfig {
    /// Parses a comma-separated origin list; empty or `*` allows everything.
    pub fn parse(raw: Option<&str>) -> Self {
        let origins: Vec<String> = raw
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(str::to_string)
            .collect();

        if origins.is_empty() || origins.iter().any(|o| o == "*") {
            CorsConfig::AllowAll
        } else {
            CorsConfig::AllowOrigins(origins)
        }
    }
}

fn parse_or<T>(value: Option<String>, key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        Some(raw) => raw.trim().parse().map_err(|e| {
            AppError::ConfigError(anyhow::anyhow!("{} has an invalid value '{}': {}", key, raw, e))
        }),
        None => Ok(default),
    }
}

use secrecy::{ExposeSecret, Secret};
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::services::{AuthorityConfig, DURATION_CEILING_MINUTES};

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Dev,
    Prod,
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" | "development" => Ok(Environment::Dev),
            "prod" | "production" => Ok(Environment::Prod),
            other => Err(format!("Unknown ENVIRONMENT: {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FarmAccessConfig {
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub security: SecurityConfig,
    pub grants: GrantConfig,
    pub records: RecordsConfig,
}

#[derive(Debug, Clone)]
pub struct SecurityConfig {
    pub admin_api_key: Secret<String>,
    pub allowed_origins: Vec<String>,
    /// Requests per minute per IP on bearer-secret routes.
    pub access_rate_limit_per_minute: u32,
}

#[derive(Debug, Clone)]
pub struct GrantConfig {
    pub default_duration_minutes: i64,
    pub max_duration_minutes: i64,
    pub sweep_interval_seconds: u64,
    pub audit_permission_denied: bool,
}

impl GrantConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds.max(1))
    }

    pub fn authority_config(&self) -> AuthorityConfig {
        AuthorityConfig {
            default_duration_minutes: self.default_duration_minutes,
            max_duration_minutes: self.max_duration_minutes,
            audit_permission_denied: self.audit_permission_denied,
        }
    }
}

impl GrantConfig {
    fn validate(&self) -> Result<(), AppError> {
        if !(1..=DURATION_CEILING_MINUTES).contains(&self.max_duration_minutes) {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "GRANT_MAX_DURATION_MINUTES must be between 1 and {}",
                DURATION_CEILING_MINUTES
            )));
        }
        if !(1..=self.max_duration_minutes).contains(&self.default_duration_minutes) {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "GRANT_DEFAULT_DURATION_MINUTES must be between 1 and GRANT_MAX_DURATION_MINUTES"
            )));
        }
        Ok(())
    }
}

impl SecurityConfig {
    fn validate(&self) -> Result<(), AppError> {
        if self.admin_api_key.expose_secret().trim().is_empty() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "ADMIN_API_KEY must not be empty"
            )));
        }
        Ok(())
    }
}

impl Default for GrantConfig {
    fn default() -> Self {
        let authority = AuthorityConfig::default();
        Self {
            default_duration_minutes: authority.default_duration_minutes,
            max_duration_minutes: authority.max_duration_minutes,
            sweep_interval_seconds: 60,
            audit_permission_denied: authority.audit_permission_denied,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RecordsConfig {
    /// JSON fixture to seed the in-memory record store from.
    pub store_path: Option<String>,
}

impl FarmAccessConfig {
    pub fn load() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;

        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;
        let is_prod = environment == Environment::Prod;

        let grants = GrantConfig {
            default_duration_minutes: parse_env("GRANT_DEFAULT_DURATION_MINUTES", 60)?,
            max_duration_minutes: parse_env("GRANT_MAX_DURATION_MINUTES", 24 * 60)?,
            sweep_interval_seconds: parse_env("SWEEP_INTERVAL_SECONDS", 60)?,
            audit_permission_denied: parse_env("AUDIT_PERMISSION_DENIED", true)?,
        };

        grants.validate()?;

        let config = FarmAccessConfig {
            common: common_config,
            environment,
            service_name: get_env("SERVICE_NAME", Some("farm-access-service"), false)?,
            log_level: get_env("LOG_LEVEL", Some("info"), false)?,
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|s| !s.is_empty()),
            security: SecurityConfig {
                admin_api_key: Secret::new(get_env(
                    "ADMIN_API_KEY",
                    Some("dev-admin-key"),
                    is_prod,
                )?),
                allowed_origins: get_env(
                    "ALLOWED_ORIGINS",
                    Some("http://localhost:3000"),
                    false,
                )?
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
                access_rate_limit_per_minute: parse_env("ACCESS_RATE_LIMIT_PER_MINUTE", 60)?,
            },
            grants,
            records: RecordsConfig {
                store_path: env::var("RECORD_STORE_PATH").ok().filter(|s| !s.is_empty()),
            },
        };

        config.security.validate()?;

        tracing::debug!(
            environment = ?config.environment,
            max_duration_minutes = config.grants.max_duration_minutes,
            "Configuration loaded"
        );

        Ok(config)
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

fn parse_env<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|e: T::Err| {
            AppError::ConfigError(anyhow::anyhow!("Invalid value for {}: {}", key, e))
        }),
        Err(_) => Ok(default),
    }
}

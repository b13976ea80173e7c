use crate::error::{AppError, AppResult};
use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use uuid::Uuid;

/// Configuration key holding the illustrative secret setting.
pub const SECRET_MESSAGE_KEY: &str = "SecretMessage";

/// Longest accepted authentication cookie lifetime (one year)
pub const MAX_EXPIRATION_HOURS: i64 = 365 * 24;

/// Longest accepted HSTS max-age (one hundred years)
pub const MAX_HSTS_MAX_AGE_DAYS: u64 = 36_500;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub environment: HostEnvironment,
    pub server: ServerConfig,
    pub secret_message: Option<String>,
    pub database: DatabaseConfig,
    pub cors: CorsConfig,
    pub auth: AuthConfig,
    pub web: WebConfig,
}

/// Hosting environment name (`Development`, `Staging`, `Production`, ...)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HostEnvironment {
    pub name: String,
}

impl HostEnvironment {
    pub const DEVELOPMENT: &'static str = "Development";
    pub const PRODUCTION: &'static str = "Production";

    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn development() -> Self {
        Self::new(Self::DEVELOPMENT)
    }

    pub fn production() -> Self {
        Self::new(Self::PRODUCTION)
    }

    pub fn is_development(&self) -> bool {
        self.name.eq_ignore_ascii_case(Self::DEVELOPMENT)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Name of the in-memory store every context binds to
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    /// The single origin allowed by the CORS policy
    pub allowed_origin: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Name of the authentication cookie
    pub cookie_name: String,

    /// HMAC key used to sign authentication cookie tokens
    pub signing_key: String,

    /// Authentication cookie lifetime in hours
    pub expiration_hours: i64,

    /// Whether sign-in requires a confirmed account
    pub require_confirmed_account: bool,

    /// bcrypt cost factor for stored password hashes
    pub password_hash_cost: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebConfig {
    /// Root directory for static assets
    pub static_root: PathBuf,

    /// Port used when redirecting HTTP requests to HTTPS
    pub https_port: Option<u16>,

    /// Max-age of the Strict-Transport-Security header, in days
    pub hsts_max_age_days: u64,

    /// Honor `X-Forwarded-Proto`; only enable behind a proxy that sets it
    pub trust_forwarded_proto: bool,
}

impl Config {
    /// Load configuration from environment variables (and `.env` if present)
    pub fn from_env() -> AppResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_source(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_source<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = HostEnvironment::new(
            lookup("APP_ENVIRONMENT").unwrap_or_else(|| HostEnvironment::PRODUCTION.to_string()),
        );

        let host = lookup("SERVER_HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let port = parse_or(&lookup, "SERVER_PORT", 5000u16)?;

        // Absent secret is not an error
        let secret_message = lookup(SECRET_MESSAGE_KEY);

        let database_name =
            lookup("DATABASE_NAME").unwrap_or_else(|| "ConferenceTracker".to_string());

        let allowed_origin =
            lookup("CORS_ALLOWED_ORIGIN").unwrap_or_else(|| "http://pluralsight.com".to_string());

        let cookie_name =
            lookup("AUTH_COOKIE_NAME").unwrap_or_else(|| ".ConferenceTracker.Identity".to_string());
        let signing_key = match lookup("AUTH_SIGNING_KEY") {
            Some(key) => key,
            None => {
                tracing::warn!(
                    "AUTH_SIGNING_KEY not set; using a per-process key. Sign-ins will not survive a restart."
                );
                format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
            }
        };
        let expiration_hours = parse_or(&lookup, "AUTH_EXPIRATION_HOURS", 336i64)?;
        let password_hash_cost = parse_or(&lookup, "PASSWORD_HASH_COST", bcrypt::DEFAULT_COST)?;

        let static_root = PathBuf::from(lookup("STATIC_ROOT").unwrap_or_else(|| "wwwroot".to_string()));
        let https_port = match lookup("HTTPS_PORT") {
            Some(value) => Some(
                value
                    .parse()
                    .map_err(|_| AppError::Configuration("Invalid HTTPS_PORT".to_string()))?,
            ),
            None => None,
        };
        let hsts_max_age_days = parse_or(&lookup, "HSTS_MAX_AGE_DAYS", 30u64)?;
        let trust_forwarded_proto = parse_or(&lookup, "TRUST_FORWARDED_PROTO", false)?;

        let config = Config {
            environment,
            server: ServerConfig { host, port },
            secret_message,
            database: DatabaseConfig {
                name: database_name,
            },
            cors: CorsConfig { allowed_origin },
            auth: AuthConfig {
                cookie_name,
                signing_key,
                expiration_hours,
                require_confirmed_account: true,
                password_hash_cost,
            },
            web: WebConfig {
                static_root,
                https_port,
                hsts_max_age_days,
                trust_forwarded_proto,
            },
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> AppResult<()> {
        if self.server.port == 0 {
            return Err(AppError::Configuration(
                "SERVER_PORT must be greater than 0".to_string(),
            ));
        }

        if self.web.https_port == Some(0) {
            return Err(AppError::Configuration(
                "HTTPS_PORT must be greater than 0".to_string(),
            ));
        }

        if self.database.name.trim().is_empty() {
            return Err(AppError::Configuration(
                "DATABASE_NAME cannot be empty".to_string(),
            ));
        }

        if self.cors.allowed_origin.trim().is_empty() {
            return Err(AppError::Configuration(
                "CORS_ALLOWED_ORIGIN cannot be empty".to_string(),
            ));
        }

        if self.auth.signing_key.len() < 32 {
            return Err(AppError::Configuration(
                "AUTH_SIGNING_KEY must be at least 32 characters for security".to_string(),
            ));
        }

        if !(1..=MAX_EXPIRATION_HOURS).contains(&self.auth.expiration_hours) {
            return Err(AppError::Configuration(format!(
                "AUTH_EXPIRATION_HOURS must be between 1 and {}",
                MAX_EXPIRATION_HOURS
            )));
        }

        if !(4..=31).contains(&self.auth.password_hash_cost) {
            return Err(AppError::Configuration(
                "PASSWORD_HASH_COST must be between 4 and 31".to_string(),
            ));
        }

        if !(1..=MAX_HSTS_MAX_AGE_DAYS).contains(&self.web.hsts_max_age_days) {
            return Err(AppError::Configuration(format!(
                "HSTS_MAX_AGE_DAYS must be between 1 and {}",
                MAX_HSTS_MAX_AGE_DAYS
            )));
        }

        Ok(())
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> AppResult<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(value) => value
            .parse()
            .map_err(|_| AppError::Configuration(format!("Invalid {}", key))),
        None => Ok(default),
    }
}

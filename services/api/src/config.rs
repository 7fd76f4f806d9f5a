//! services/api/src/config.rs
//!
//! Portal settings, read once from the environment. A `.env` file in the working
//! directory is honoured outside of tests.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::Level;
use validator::Validate;

use crate::validation::{field_errors, mobile_format, pan_format};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("environment variable {0} is not set")]
    MissingVar(String),
    #[error("environment variable {0} is invalid: {1}")]
    InvalidValue(String, String),
}

#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    /// `postgres://...`, or `memory://` for a throwaway in-process store.
    pub database_url: String,
    pub log_level: Level,
    pub jwt_secret: String,
    pub jwt_ttl_hours: i64,
    pub upload_dir: PathBuf,
    /// Allowed CORS origin, also the base of password-reset links.
    pub frontend_url: String,
    pub otp_ttl_minutes: i64,
    pub reset_token_ttl_minutes: i64,
    pub max_failed_attempts: i32,
    pub lockout_minutes: i64,
    /// Count failed password logins and lock the account like OTP verification does.
    pub login_lockout_enabled: bool,
    pub rate_limit_max: u32,
    pub rate_limit_window_secs: u64,
    pub auth_rate_limit_max: u32,
    /// Key rate limits on `x-forwarded-for`. Only safe behind a proxy that sets it.
    pub trust_proxy: bool,
    pub mail_relay_url: Option<String>,
    pub mail_from: String,
    pub csrf_token_ttl_secs: u64,
}

impl Config {
    /// Reads every setting, falling back to development defaults where one is optional.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Server, store and logging ---
        let bind_address = parse_var::<SocketAddr>("BIND_ADDRESS", "0.0.0.0:5000")?;

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let raw_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = raw_level.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue("RUST_LOG".to_string(), format!("unknown level '{raw_level}'"))
        })?;

        let upload_dir = std::env::var("UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./uploads"));

        let frontend_url = std::env::var("FRONTEND_URL")
            .unwrap_or_else(|_| "http://localhost:3000".to_string())
            .trim_end_matches('/')
            .to_string();

        // --- Load Auth Settings ---
        let jwt_secret = std::env::var("JWT_SECRET")
            .map_err(|_| ConfigError::MissingVar("JWT_SECRET".to_string()))?;
        if jwt_secret.len() < 16 {
            return Err(ConfigError::InvalidValue(
                "JWT_SECRET".to_string(),
                "must be at least 16 characters".to_string(),
            ));
        }

        // --- Load Mail Settings ---
        let mail_relay_url = std::env::var("MAIL_RELAY_URL").ok().filter(|s| !s.is_empty());
        let mail_from = std::env::var("MAIL_FROM")
            .unwrap_or_else(|_| "no-reply@clientportal.local".to_string());

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            jwt_secret,
            jwt_ttl_hours: parse_var("JWT_TTL_HOURS", "24")?,
            upload_dir,
            frontend_url,
            otp_ttl_minutes: parse_var("OTP_TTL_MINUTES", "10")?,
            reset_token_ttl_minutes: parse_var("RESET_TOKEN_TTL_MINUTES", "10")?,
            max_failed_attempts: parse_var("MAX_FAILED_ATTEMPTS", "5")?,
            lockout_minutes: parse_var("LOCKOUT_MINUTES", "30")?,
            login_lockout_enabled: parse_var("LOGIN_LOCKOUT_ENABLED", "false")?,
            rate_limit_max: parse_var("RATE_LIMIT_MAX", "100")?,
            rate_limit_window_secs: parse_var("RATE_LIMIT_WINDOW_SECS", "900")?,
            auth_rate_limit_max: parse_var("AUTH_RATE_LIMIT_MAX", "5")?,
            trust_proxy: parse_var("TRUST_PROXY", "false")?,
            mail_relay_url,
            mail_from,
            csrf_token_ttl_secs: parse_var("CSRF_TOKEN_TTL_SECS", "7200")?,
        })
    }

    pub fn uses_memory_store(&self) -> bool {
        self.database_url.starts_with("memory://")
    }
}

/// Credentials for the first administrator, from `ADMIN_EMAIL`, `ADMIN_MOBILE`,
/// `ADMIN_PAN` and `ADMIN_PASSWORD`.
#[derive(Clone, Debug, Validate)]
pub struct AdminSeed {
    #[validate(email(message = "not an email address"))]
    pub email: String,
    #[validate(custom(function = "mobile_format", message = "not a mobile number"))]
    pub mobile: String,
    #[validate(custom(function = "pan_format", message = "not a PAN"))]
    pub pan: String,
    #[validate(length(min = 8, message = "shorter than 8 characters"))]
    pub password: String,
}

impl AdminSeed {
    /// `Ok(None)` when none of the variables are set; an error when only some are.
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        let names = ["ADMIN_EMAIL", "ADMIN_MOBILE", "ADMIN_PAN", "ADMIN_PASSWORD"];
        let values: Vec<Option<String>> = names
            .iter()
            .map(|name| std::env::var(name).ok().filter(|v| !v.trim().is_empty()))
            .collect();
        if values.iter().all(Option::is_none) {
            return Ok(None);
        }
        if let Some(i) = values.iter().position(Option::is_none) {
            return Err(ConfigError::MissingVar(names[i].to_string()));
        }
        let mut values = values.into_iter().flatten();
        let mut next = || values.next().unwrap_or_default();
        Self {
            email: next(),
            mobile: next(),
            pan: next(),
            password: next(),
        }
        .checked()
        .map(Some)
    }

    /// Names the variable behind the first field that fails validation.
    fn checked(self) -> Result<Self, ConfigError> {
        if let Err(errors) = self.validate() {
            if let Some(first) = field_errors(&errors).into_iter().next() {
                return Err(ConfigError::InvalidValue(
                    format!("ADMIN_{}", first.field.to_uppercase()),
                    first.message,
                ));
            }
        }
        Ok(self)
    }
}

/// Reads `name`, falling back to `default`, and parses it.
fn parse_var<T: FromStr>(name: &str, default: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    let raw = std::env::var(name).unwrap_or_else(|_| default.to_string());
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_var_uses_default_when_unset() {
        let value: u32 = parse_var("CLIENT_PORTAL_TEST_UNSET_VAR", "42").unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn parse_var_reports_the_variable_name() {
        let err = parse_var::<u32>("CLIENT_PORTAL_TEST_UNSET_VAR", "many").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(name, _) if name == "CLIENT_PORTAL_TEST_UNSET_VAR"));
    }

    #[test]
    fn admin_seed_names_the_bad_variable() {
        let seed = AdminSeed {
            email: "admin@portal.test".to_string(),
            mobile: "9876543210".to_string(),
            pan: "ADMIN".to_string(),
            password: "long-enough".to_string(),
        };
        let err = seed.clone().checked().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(name, _) if name == "ADMIN_PAN"));

        let fixed = AdminSeed {
            pan: "admin1234a".to_string(),
            ..seed
        };
        assert!(fixed.checked().is_ok());
    }
}

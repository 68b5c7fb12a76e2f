//! Runtime settings, read from the environment (and `.env` via `dotenvy`).

use std::env;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Clone, Debug)]
pub struct Settings {
    pub database_url: String,
    pub port: u16,
    /// Signs session tokens.
    pub secret_key: String,
    /// Absolute origin used to build gateway success and cancel URLs.
    pub public_base_url: String,
    pub currency: String,
    pub session_ttl_hours: i64,
    /// Sets the `Secure` attribute on cookies.
    pub secure_cookies: bool,
    pub stripe: StripeSettings,
    pub nats_url: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct StripeSettings {
    pub secret_key: Option<String>,
    pub publishable_key: Option<String>,
    pub webhook_secret: Option<String>,
}

fn optional(name: &str) -> Option<String> {
    env::var(name).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    optional(name).ok_or(ConfigError::Missing(name))
}

fn parsed<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match optional(name) {
        Some(v) => v.parse().map_err(|e: T::Err| ConfigError::Invalid { name, reason: e.to_string() }),
        None => Ok(default),
    }
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = parsed("PORT", 8083u16)?;
        let secret_key = required("SECRET_KEY")?;
        if secret_key.len() < 32 {
            return Err(ConfigError::Invalid { name: "SECRET_KEY", reason: "must be at least 32 characters".to_string() });
        }
        let session_ttl_hours = parsed("SESSION_TTL_HOURS", 336i64)?;
        if session_ttl_hours <= 0 {
            return Err(ConfigError::Invalid { name: "SESSION_TTL_HOURS", reason: "must be positive".to_string() });
        }
        let public_base_url = optional("PUBLIC_BASE_URL")
            .unwrap_or_else(|| format!("http://localhost:{port}"))
            .trim_end_matches('/')
            .to_string();
        Ok(Self {
            database_url: required("DATABASE_URL")?,
            port,
            secret_key,
            secure_cookies: public_base_url.starts_with("https://"),
            public_base_url,
            currency: optional("CURRENCY").unwrap_or_else(|| "usd".to_string()).to_lowercase(),
            session_ttl_hours,
            stripe: StripeSettings {
                secret_key: optional("STRIPE_SECRET_KEY"),
                publishable_key: optional("STRIPE_PUBLISHABLE_KEY"),
                webhook_secret: optional("STRIPE_WEBHOOK_SECRET"),
            },
            nats_url: optional("NATS_URL"),
        })
    }

    /// Settings for tests and local tooling that never touch the database.
    pub fn for_tests() -> Self {
        Self {
            database_url: String::new(),
            port: 0,
            secret_key: "test-secret-key-test-secret-key-0123456789".to_string(),
            public_base_url: "http://testserver".to_string(),
            currency: "usd".to_string(),
            session_ttl_hours: 1,
            secure_cookies: false,
            stripe: StripeSettings { publishable_key: Some("pk_test_storefront".to_string()), ..Default::default() },
            nats_url: None,
        }
    }

    pub fn url(&self, path: &str) -> String { format!("{}{}", self.public_base_url, path) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_join() {
        let s = Settings::for_tests();
        assert_eq!(s.url("/order/success"), "http://testserver/order/success");
    }
}

//! Configuration module - environment variable parsing

use std::env;

/// Client configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Supabase project URL
    pub supabase_url: String,
    /// Supabase anonymous key (sent as `apikey` on every request)
    pub supabase_anon_key: String,
    /// Supabase JWT secret; when set, access tokens are signature-checked locally
    pub supabase_jwt_secret: Option<String>,

    /// Credentials used by the `basket` binary to sign in
    pub email: Option<String>,
    pub password: Option<String>,
}

impl Config {
    /// Build a config directly, without touching the environment
    pub fn new(supabase_url: impl Into<String>, supabase_anon_key: impl Into<String>) -> Self {
        Self {
            log_level: "info".to_string(),
            supabase_url: supabase_url.into().trim_end_matches('/').to_string(),
            supabase_anon_key: supabase_anon_key.into(),
            supabase_jwt_secret: None,
            email: None,
            password: None,
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let supabase_url =
            env::var("SUPABASE_URL").map_err(|_| ConfigError::Missing("SUPABASE_URL"))?;
        if !supabase_url.starts_with("http://") && !supabase_url.starts_with("https://") {
            return Err(ConfigError::InvalidUrl(supabase_url));
        }

        let mut config = Self::new(
            supabase_url,
            env::var("SUPABASE_ANON_KEY").map_err(|_| ConfigError::Missing("SUPABASE_ANON_KEY"))?,
        );

        config.log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        config.supabase_jwt_secret = non_empty_var("SUPABASE_JWT_SECRET");
        config.email = non_empty_var("BASKET_EMAIL");
        config.password = non_empty_var("BASKET_PASSWORD");

        Ok(config)
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid Supabase URL: {0}")]
    InvalidUrl(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_strips_trailing_slash() {
        let config = Config::new("https://abc.supabase.co/", "anon");
        assert_eq!(config.supabase_url, "https://abc.supabase.co");
        assert_eq!(config.log_level, "info");
        assert!(config.supabase_jwt_secret.is_none());
    }
}

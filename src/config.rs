//! Process configuration, read once at startup.

use chrono::Duration;

/// Minimum accepted length of `JWT_SECRET`.
pub const MIN_SECRET_LEN: usize = 32;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Signing and cookie policy shared by the token service and the gate.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub issuer: String,
    pub audience: String,
    pub secret: String,
    /// Access token lifetime.
    pub token_expiry: Duration,
    /// Refresh token and refresh cookie lifetime.
    pub refresh_expiry: Duration,
    pub cookie_name: String,
    pub cookie_path: String,
    pub cookie_domain: String,
}

impl AuthConfig {
    pub fn new(
        secret: impl Into<String>,
        issuer: impl Into<String>,
        audience: impl Into<String>,
        cookie_domain: impl Into<String>,
    ) -> Self {
        Self {
            issuer: issuer.into(),
            audience: audience.into(),
            secret: secret.into(),
            token_expiry: Duration::minutes(15),
            refresh_expiry: Duration::hours(24),
            cookie_name: "__Secure-refresh_token".into(),
            cookie_path: "/".into(),
            cookie_domain: cookie_domain.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub bind_addr: String,
    /// Browser origin allowed by CORS, if any.
    pub frontend_url: Option<String>,
    pub db_max_connections: u32,
    pub auth: AuthConfig,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn from_lookup<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |var: &'static str| {
            get(var)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(var))
        };

        let secret = required("JWT_SECRET")?;
        if secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::Invalid {
                var: "JWT_SECRET",
                reason: format!("must be at least {MIN_SECRET_LEN} characters long"),
            });
        }

        let db_max_connections = match get("DB_MAX_CONNECTIONS") {
            Some(raw) => raw.parse::<u32>().ok().filter(|n| *n > 0).ok_or_else(|| ConfigError::Invalid {
                var: "DB_MAX_CONNECTIONS",
                reason: format!("expected a positive integer, got {raw:?}"),
            })?,
            None => 5,
        };

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8080".into()),
            frontend_url: get("FRONTEND_URL").filter(|v| !v.is_empty()),
            db_max_connections,
            auth: AuthConfig::new(
                secret,
                required("JWT_ISSUER")?,
                required("JWT_AUDIENCE")?,
                required("COOKIE_DOMAIN")?,
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |k| map.get(k).cloned()
    }

    const FULL: &[(&str, &str)] = &[
        ("DATABASE_URL", "postgres://memes@localhost/memes"),
        ("JWT_SECRET", "0123456789abcdef0123456789abcdef"),
        ("JWT_ISSUER", "memes.example"),
        ("JWT_AUDIENCE", "memes.example"),
        ("COOKIE_DOMAIN", "localhost"),
    ];

    #[test]
    fn loads_with_defaults() {
        let s = Settings::from_lookup(env(FULL)).unwrap();
        assert_eq!(s.bind_addr, "0.0.0.0:8080");
        assert_eq!(s.db_max_connections, 5);
        assert!(s.frontend_url.is_none());
        assert_eq!(s.auth.token_expiry, Duration::minutes(15));
        assert_eq!(s.auth.refresh_expiry, Duration::hours(24));
        assert_eq!(s.auth.cookie_domain, "localhost");
    }

    #[test]
    fn missing_secret_is_reported() {
        let pairs: Vec<_> = FULL.iter().copied().filter(|(k, _)| *k != "JWT_SECRET").collect();
        let err = Settings::from_lookup(env(&pairs)).unwrap_err();
        assert_eq!(err, ConfigError::Missing("JWT_SECRET"));
    }

    #[test]
    fn short_secret_is_rejected() {
        let mut pairs = FULL.to_vec();
        pairs[1] = ("JWT_SECRET", "short");
        let err = Settings::from_lookup(env(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "JWT_SECRET", .. }));
    }

    #[test]
    fn bad_pool_size_is_rejected() {
        let mut pairs = FULL.to_vec();
        pairs.push(("DB_MAX_CONNECTIONS", "zero"));
        assert!(Settings::from_lookup(env(&pairs)).is_err());
    }
}

//! Runtime configuration read from the environment.

use std::{net::IpAddr, str::FromStr, time::Duration};

use secrecy::SecretString;
use thiserror::Error;
use utils::assets::default_database_path;

pub const DEFAULT_PORT: u16 = 3001;
pub const DEFAULT_JWT_AUDIENCE: &str = "authenticated";
pub const DEFAULT_BUCKET: &str = "obra";
pub const DEFAULT_WEATHER_URL: &str = "https://api.open-meteo.com/v1/forecast";
pub const DEFAULT_WEATHER_TTL_SECS: u64 = 1800;
pub const DEFAULT_CURRENCY: &str = "MXN";
// Head office, Ciudad de México
pub const DEFAULT_LATITUDE: f64 = 19.4326;
pub const DEFAULT_LONGITUDE: f64 = -99.1332;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} must be a valid {expected}, got {value:?}")]
    Invalid {
        key: &'static str,
        expected: &'static str,
        value: String,
    },
}

#[derive(Debug)]
pub struct Config {
    pub database_url: String,
    pub host: IpAddr,
    pub port: u16,
    pub jwt_secret: Option<SecretString>,
    pub jwt_audience: String,
    pub storage_url: Option<String>,
    pub storage_bucket: String,
    pub weather_url: String,
    pub weather_ttl: Duration,
    pub default_latitude: f64,
    pub default_longitude: f64,
    pub currency: String,
    pub sentry_dsn: Option<String>,
}

impl Config {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                tracing::warn!(error = %e, "Ignoring unreadable .env file");
            }
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        Ok(Self {
            database_url: get("OBRA_DATABASE_URL").unwrap_or(defaults.database_url),
            host: parse(&get, "HOST", "ip address")?.unwrap_or(defaults.host),
            port: parse(&get, "PORT", "port number")?.unwrap_or(defaults.port),
            jwt_secret: get("OBRA_JWT_SECRET").map(SecretString::from),
            jwt_audience: get("OBRA_JWT_AUDIENCE").unwrap_or(defaults.jwt_audience),
            storage_url: get("OBRA_STORAGE_URL").map(|u| u.trim_end_matches('/').to_string()),
            storage_bucket: get("OBRA_STORAGE_BUCKET").unwrap_or(defaults.storage_bucket),
            weather_url: get("OBRA_WEATHER_URL").unwrap_or(defaults.weather_url),
            weather_ttl: parse(&get, "OBRA_WEATHER_TTL_SECS", "number of seconds")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.weather_ttl),
            default_latitude: parse(&get, "OBRA_DEFAULT_LAT", "latitude")?
                .unwrap_or(defaults.default_latitude),
            default_longitude: parse(&get, "OBRA_DEFAULT_LON", "longitude")?
                .unwrap_or(defaults.default_longitude),
            currency: get("OBRA_CURRENCY").unwrap_or(defaults.currency),
            sentry_dsn: get("SENTRY_DSN"),
        })
    }

    /// In-memory database and a known signing secret.
    pub fn for_tests(jwt_secret: &str) -> Self {
        Self {
            database_url: "sqlite::memory:".into(),
            jwt_secret: Some(SecretString::from(jwt_secret.to_string())),
            storage_url: Some("https://storage.test".into()),
            ..Self::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: format!("sqlite://{}", default_database_path().to_string_lossy()),
            host: IpAddr::from([127, 0, 0, 1]),
            port: DEFAULT_PORT,
            jwt_secret: None,
            jwt_audience: DEFAULT_JWT_AUDIENCE.into(),
            storage_url: None,
            storage_bucket: DEFAULT_BUCKET.into(),
            weather_url: DEFAULT_WEATHER_URL.into(),
            weather_ttl: Duration::from_secs(DEFAULT_WEATHER_TTL_SECS),
            default_latitude: DEFAULT_LATITUDE,
            default_longitude: DEFAULT_LONGITUDE,
            currency: DEFAULT_CURRENCY.into(),
            sentry_dsn: None,
        }
    }
}

fn parse<T, G>(get: &G, key: &'static str, expected: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(None),
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid {
                key,
                expected,
                value,
            }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.jwt_audience, "authenticated");
        assert_eq!(config.storage_bucket, "obra");
        assert_eq!(config.weather_ttl, Duration::from_secs(1800));
        assert_eq!(config.currency, "MXN");
        assert!(config.jwt_secret.is_none());
        assert!(config.database_url.starts_with("sqlite://"));
    }

    #[test]
    fn values_are_read_and_trimmed() {
        let config = Config::from_lookup(lookup(&[
            ("PORT", "8080"),
            ("HOST", "0.0.0.0"),
            ("OBRA_JWT_SECRET", " s3cret "),
            ("OBRA_STORAGE_URL", "https://cdn.example.mx/"),
            ("OBRA_DEFAULT_LAT", "25.67"),
            ("SENTRY_DSN", "   "),
        ]))
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.host.to_string(), "0.0.0.0");
        assert_eq!(config.jwt_secret.as_ref().map(|s| s.expose_secret()), Some("s3cret"));
        assert_eq!(config.storage_url.as_deref(), Some("https://cdn.example.mx"));
        assert_eq!(config.default_latitude, 25.67);
        assert!(config.sentry_dsn.is_none());
    }

    #[test]
    fn malformed_numbers_are_reported() {
        let err = Config::from_lookup(lookup(&[("PORT", "eighty")])).unwrap_err();
        assert!(err.to_string().contains("PORT"));

        let err = Config::from_lookup(lookup(&[("OBRA_WEATHER_TTL_SECS", "-1")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "OBRA_WEATHER_TTL_SECS", .. }));
    }
}

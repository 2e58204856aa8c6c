//! Database configuration from the environment
//!
//! URI resolution order:
//! 1. `MONGO_URI` verbatim
//! 2. `CLOUD_MONGO=1`: `mongodb+srv://` URI from `MONGO_USER`, `MONGO_PASSWD`
//!    and `MONGO_HOST`
//! 3. `mongodb://localhost:27017` without auth

use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_LOCAL_URI: &str = "mongodb://localhost:27017";
pub const DEFAULT_DB_NAME: &str = "seDB";
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;
const DEFAULT_CLOUD_USER: &str = "geoctl";

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    MissingVar(&'static str),

    #[error("invalid value for {var}: {value:?} ({reason})")]
    InvalidValue {
        var: &'static str,
        value: String,
        reason: &'static str,
    },
}

/// Which rule produced the connection URI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UriSource {
    Override,
    Cloud,
    Local,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DbConfig {
    pub uri: String,
    pub source: UriSource,
    pub db_name: String,
    pub op_timeout: Duration,
    /// Store `country_code` as `state_code` for cities that lack one
    pub city_state_fallback: bool,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            uri: DEFAULT_LOCAL_URI.to_string(),
            source: UriSource::Local,
            db_name: DEFAULT_DB_NAME.to_string(),
            op_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            city_state_fallback: false,
        }
    }
}

impl DbConfig {
    /// Resolve from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Resolve from an arbitrary variable lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let (uri, source) = if let Some(uri) = get("MONGO_URI") {
            (uri, UriSource::Override)
        } else if flag("CLOUD_MONGO", get("CLOUD_MONGO"))? {
            let user = get("MONGO_USER").unwrap_or_else(|| DEFAULT_CLOUD_USER.to_string());
            let password = get("MONGO_PASSWD").ok_or(ConfigError::MissingVar("MONGO_PASSWD"))?;
            let host = get("MONGO_HOST").ok_or(ConfigError::MissingVar("MONGO_HOST"))?;
            (cloud_uri(&user, &password, &host), UriSource::Cloud)
        } else {
            (DEFAULT_LOCAL_URI.to_string(), UriSource::Local)
        };

        let op_timeout = match get("DB_TIMEOUT_SECS") {
            None => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::InvalidValue {
                        var: "DB_TIMEOUT_SECS",
                        value: raw,
                        reason: "expected a positive number of seconds",
                    })
                }
            },
        };

        Ok(Self {
            uri,
            source,
            db_name: get("DB_NAME").unwrap_or_else(|| DEFAULT_DB_NAME.to_string()),
            op_timeout,
            city_state_fallback: flag("CITY_STATE_FALLBACK", get("CITY_STATE_FALLBACK"))?,
        })
    }

    /// The URI with any password replaced by `***`, for logs.
    pub fn redacted_uri(&self) -> String {
        redact(&self.uri)
    }
}

fn cloud_uri(user: &str, password: &str, host: &str) -> String {
    format!(
        "mongodb+srv://{}:{}@{}/?retryWrites=true&w=majority",
        urlencoding::encode(user),
        urlencoding::encode(password),
        host
    )
}

fn flag(var: &'static str, value: Option<String>) -> Result<bool, ConfigError> {
    let Some(value) = value else {
        return Ok(false);
    };
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            var,
            value,
            reason: "expected 1/0, true/false or yes/no",
        }),
    }
}

fn redact(uri: &str) -> String {
    let Some(scheme_end) = uri.find("://").map(|i| i + 3) else {
        return uri.to_string();
    };
    let rest = &uri[scheme_end..];
    let authority_end = rest.find('/').unwrap_or(rest.len());
    let Some(at) = rest[..authority_end].rfind('@') else {
        return uri.to_string();
    };
    let userinfo = &rest[..at];
    let user = userinfo.split(':').next().unwrap_or_default();
    format!("{}{}:***{}", &uri[..scheme_end], user, &rest[at..])
}

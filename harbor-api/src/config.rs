//! API Configuration Module
//!
//! Bind address, token lifetime and log format. Loaded from environment
//! variables with defaults suitable for local development.

use std::net::SocketAddr;
use std::str::FromStr;

use chrono::Duration;
use harbor_core::ConfigError;

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            _ => Err(ConfigError::InvalidValue {
                field: "HARBOR_LOG_FORMAT".to_string(),
                value: s.to_string(),
                reason: "expected 'json' or 'pretty'".to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Address the HTTP server listens on.
    pub bind_addr: SocketAddr,

    /// Lifetime of newly issued Team tokens.
    pub token_ttl: Duration,

    pub log_format: LogFormat,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            token_ttl: Duration::days(365),
            log_format: LogFormat::Json,
        }
    }
}

impl ApiConfig {
    /// Create ApiConfig from environment variables.
    ///
    /// Environment variables:
    /// - `HARBOR_API_BIND`: listen host (default: 0.0.0.0)
    /// - `PORT` or `HARBOR_API_PORT`: listen port (default: 3000)
    /// - `HARBOR_TOKEN_TTL_DAYS`: token lifetime in days (default: 365)
    /// - `HARBOR_LOG_FORMAT`: "json" or "pretty" (default: json)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let host = lookup("HARBOR_API_BIND").unwrap_or_else(|| "0.0.0.0".to_string());
        let port_str = lookup("PORT")
            .or_else(|| lookup("HARBOR_API_PORT"))
            .unwrap_or_else(|| "3000".to_string());
        let port = port_str.parse::<u16>().map_err(|_| ConfigError::InvalidValue {
            field: "PORT".to_string(),
            value: port_str.clone(),
            reason: "expected a port number".to_string(),
        })?;

        let addr = format!("{}:{}", host, port);
        let bind_addr = addr
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue {
                field: "HARBOR_API_BIND".to_string(),
                value: addr.clone(),
                reason: e.to_string(),
            })?;

        let token_ttl = match lookup("HARBOR_TOKEN_TTL_DAYS") {
            Some(value) => match value.parse::<i64>() {
                Ok(days) if days > 0 => Duration::days(days),
                _ => {
                    return Err(ConfigError::InvalidValue {
                        field: "HARBOR_TOKEN_TTL_DAYS".to_string(),
                        value,
                        reason: "expected a positive number of days".to_string(),
                    })
                }
            },
            None => Duration::days(365),
        };

        let log_format = match lookup("HARBOR_LOG_FORMAT") {
            Some(value) => value.parse()?,
            None => LogFormat::Json,
        };

        Ok(Self {
            bind_addr,
            token_ttl,
            log_format,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ApiConfig::from_lookup(lookup_from(&[])).expect("defaults are valid");
        assert_eq!(config.bind_addr, ApiConfig::default().bind_addr);
        assert_eq!(config.token_ttl, Duration::days(365));
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_port_precedence() {
        let config = ApiConfig::from_lookup(lookup_from(&[
            ("PORT", "8080"),
            ("HARBOR_API_PORT", "9090"),
            ("HARBOR_API_BIND", "127.0.0.1"),
        ]))
        .expect("valid config");
        assert_eq!(config.bind_addr, SocketAddr::from(([127, 0, 0, 1], 8080)));

        let config = ApiConfig::from_lookup(lookup_from(&[("HARBOR_API_PORT", "9090")]))
            .expect("valid config");
        assert_eq!(config.bind_addr.port(), 9090);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(ApiConfig::from_lookup(lookup_from(&[("PORT", "http")])).is_err());
        assert!(ApiConfig::from_lookup(lookup_from(&[("HARBOR_TOKEN_TTL_DAYS", "0")])).is_err());
        assert!(ApiConfig::from_lookup(lookup_from(&[("HARBOR_LOG_FORMAT", "xml")])).is_err());
    }

    #[test]
    fn test_log_format_parse() {
        assert_eq!("Pretty".parse::<LogFormat>(), Ok(LogFormat::Pretty));
    }
}

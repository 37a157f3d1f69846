//! Gateway configuration
//!
//! Resolved in three steps: an optional TOML file (or built-in defaults),
//! then environment overrides, then validation.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use boxoffice_core::{env_prefix, ServiceIdentity, WELL_KNOWN_SERVICES};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::Validate;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid value for {var}: {value:?}")]
    InvalidEnv { var: String, value: String },

    #[error("Invalid config: {0}")]
    Invalid(String),
}

fn default_name() -> String {
    "gateway".to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_request_timeout_ms() -> u64 {
    3000
}

fn default_cors_origin() -> String {
    "http://localhost:5173".to_string()
}

fn default_service_host() -> String {
    "127.0.0.1".to_string()
}

fn default_services() -> Vec<ServiceConfig> {
    WELL_KNOWN_SERVICES
        .iter()
        .map(|(name, port)| ServiceConfig {
            name: name.to_string(),
            host: default_service_host(),
            port: *port,
        })
        .collect()
}

/// Top-level gateway configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct GatewayConfig {
    /// Name the gateway reports for itself in health reports
    #[serde(default = "default_name")]
    #[validate(length(min = 1))]
    pub name: String,

    /// HTTP bind host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP bind port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Bound on every downstream call, pings included
    #[serde(default = "default_request_timeout_ms")]
    #[validate(range(min = 1))]
    pub request_timeout_ms: u64,

    /// Browser origin allowed to call the API with credentials
    #[serde(default = "default_cors_origin")]
    #[validate(length(min = 1))]
    pub cors_origin: String,

    #[serde(default = "default_services")]
    #[validate(nested)]
    pub services: Vec<ServiceConfig>,
}

/// One downstream service reachable over a socket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ServiceConfig {
    #[validate(length(min = 1))]
    pub name: String,
    #[serde(default = "default_service_host")]
    pub host: String,
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            host: default_host(),
            port: default_port(),
            request_timeout_ms: default_request_timeout_ms(),
            cors_origin: default_cors_origin(),
            services: default_services(),
        }
    }
}

impl GatewayConfig {
    /// Load from a TOML file; missing keys take their defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// File (or defaults), then process environment, then validation
    pub fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply_env(|var| std::env::var(var).ok())?;
        config.check()?;
        Ok(config)
    }

    /// Apply overrides looked up by variable name.
    ///
    /// Recognised: `GATEWAY_PORT`, `FRONTEND_URL`, `REQUEST_TIMEOUT_MS`, and
    /// per service `<NAME>_TCP_HOST` / `<NAME>_TCP_PORT`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = parse_var(&lookup, "GATEWAY_PORT")? {
            self.port = port;
        }
        if let Some(origin) = lookup("FRONTEND_URL") {
            self.cors_origin = origin;
        }
        if let Some(timeout) = parse_var(&lookup, "REQUEST_TIMEOUT_MS")? {
            self.request_timeout_ms = timeout;
        }

        for service in &mut self.services {
            let prefix = env_prefix(&service.name);
            if let Some(host) = lookup(&format!("{}_TCP_HOST", prefix)) {
                service.host = host;
            }
            if let Some(port) = parse_var(&lookup, &format!("{}_TCP_PORT", prefix))? {
                service.port = port;
            }
        }

        Ok(())
    }

    /// Field rules plus unique service names
    pub fn check(&self) -> Result<(), ConfigError> {
        self.validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        let mut seen = HashSet::new();
        for service in &self.services {
            if !seen.insert(service.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate service name: {}",
                    service.name
                )));
            }
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn identities(&self) -> Vec<ServiceIdentity> {
        self.services
            .iter()
            .map(|s| ServiceIdentity::tcp(&s.name, &s.host, s.port))
            .collect()
    }
}

fn parse_var<F, T>(lookup: &F, var: &str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv {
                var: var.to_string(),
                value,
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serial_test::serial;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var: &str| map.get(var).cloned()
    }

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.port, 3000);
        assert_eq!(config.name, "gateway");
        assert_eq!(config.request_timeout(), Duration::from_secs(3));
        assert_eq!(config.cors_origin, "http://localhost:5173");

        let names: Vec<&str> = config.services.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["catalog", "media", "search"]);
        assert_eq!(config.services[0].port, 4011);
        assert!(config.check().is_ok());
    }

    #[test]
    fn load_partial_file() {
        let file = write_config(
            r#"
port = 8080
request_timeout_ms = 500

[[services]]
name = "catalog"
port = 5011

[[services]]
name = "tickets"
host = "tickets.internal"
port = 5020
"#,
        );

        let config = GatewayConfig::load(file.path()).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.name, "gateway");
        assert_eq!(config.request_timeout_ms, 500);
        assert_eq!(
            config.identities(),
            vec![
                ServiceIdentity::tcp("catalog", "127.0.0.1", 5011),
                ServiceIdentity::tcp("tickets", "tickets.internal", 5020),
            ]
        );
    }

    #[test]
    fn load_missing_file() {
        let err = GatewayConfig::load(Path::new("/nonexistent/boxoffice.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn load_invalid_toml() {
        let file = write_config("port = \"not a number\"");
        let err = GatewayConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn env_overrides() {
        let mut config = GatewayConfig::default();
        config
            .apply_env(env(&[
                ("GATEWAY_PORT", "4000"),
                ("FRONTEND_URL", "https://tickets.example.com"),
                ("REQUEST_TIMEOUT_MS", "250"),
                ("MEDIA_TCP_PORT", "6012"),
                ("SEARCH_TCP_HOST", "search.internal"),
            ]))
            .unwrap();

        assert_eq!(config.port, 4000);
        assert_eq!(config.cors_origin, "https://tickets.example.com");
        assert_eq!(config.request_timeout_ms, 250);
        assert_eq!(config.services[0].port, 4011);
        assert_eq!(config.services[1].port, 6012);
        assert_eq!(config.services[2].host, "search.internal");
    }

    #[test]
    fn env_override_rejects_garbage() {
        let mut config = GatewayConfig::default();
        let err = config
            .apply_env(env(&[("CATALOG_TCP_PORT", "eleven")]))
            .unwrap_err();
        match err {
            ConfigError::InvalidEnv { var, value } => {
                assert_eq!(var, "CATALOG_TCP_PORT");
                assert_eq!(value, "eleven");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn check_rejects_zero_timeout() {
        let config = GatewayConfig {
            request_timeout_ms: 0,
            ..GatewayConfig::default()
        };
        assert!(matches!(config.check(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn check_rejects_duplicate_and_empty_names() {
        let mut config = GatewayConfig::default();
        config.services[1].name = "catalog".to_string();
        let err = config.check().unwrap_err();
        assert!(err.to_string().contains("duplicate service name: catalog"));

        let mut config = GatewayConfig::default();
        config.services[0].name = String::new();
        assert!(matches!(config.check(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    #[serial]
    fn resolve_reads_process_environment() {
        std::env::set_var("GATEWAY_PORT", "3999");
        std::env::set_var("CATALOG_TCP_PORT", "4999");
        let result = GatewayConfig::resolve(None);
        std::env::remove_var("GATEWAY_PORT");
        std::env::remove_var("CATALOG_TCP_PORT");

        let config = result.unwrap();
        assert_eq!(config.port, 3999);
        assert_eq!(config.services[0].port, 4999);
    }

    #[test]
    #[serial]
    fn resolve_validates_after_overrides() {
        std::env::set_var("REQUEST_TIMEOUT_MS", "0");
        let result = GatewayConfig::resolve(None);
        std::env::remove_var("REQUEST_TIMEOUT_MS");

        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }
}

//! Configuration management for Tollgate.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::error::{Result, TollgateError};
use crate::ratelimit::RulesConfig;

/// Prefix for environment overrides, e.g. `TOLLGATE__SERVER__LISTEN_ADDR`.
const ENV_PREFIX: &str = "TOLLGATE";

/// Main configuration for the Tollgate service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TollgateConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Rate limit rules
    #[serde(default)]
    pub rules: RulesConfig,
}

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the line protocol listener binds to
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Seconds between idle-key sweeps, 0 to disable
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

impl ServerConfig {
    /// Interval between sweeps, or `None` when sweeping is disabled.
    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval_secs > 0).then(|| Duration::from_secs(self.sweep_interval_secs))
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8181))
}

fn default_sweep_interval() -> u64 {
    60
}

impl TollgateConfig {
    /// Load configuration from a YAML file path.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration file");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| TollgateError::Config(e.to_string()))
    }

    /// Load configuration from an optional YAML file, then apply
    /// `TOLLGATE__`-prefixed environment overrides.
    ///
    /// Only the `server` section can be overridden from the environment.
    /// Rules always come from the file, so resource names keep their case.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, environment())
    }

    fn load_with_env(path: Option<&Path>, env: ::config::Environment) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        let overrides: EnvOverrides = ::config::Config::builder()
            .add_source(env)
            .build()?
            .try_deserialize()?;
        overrides.server.apply(&mut config.server);

        Ok(config)
    }
}

fn environment() -> ::config::Environment {
    ::config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}

/// Settings that may be set from the environment.
#[derive(Debug, Default, Deserialize)]
struct EnvOverrides {
    #[serde(default)]
    server: ServerOverrides,
}

#[derive(Debug, Default, Deserialize)]
struct ServerOverrides {
    listen_addr: Option<SocketAddr>,
    sweep_interval_secs: Option<u64>,
}

impl ServerOverrides {
    fn apply(self, server: &mut ServerConfig) {
        if let Some(listen_addr) = self.listen_addr {
            server.listen_addr = listen_addr;
        }
        if let Some(secs) = self.sweep_interval_secs {
            server.sweep_interval_secs = secs;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::LimitPolicy;

    #[test]
    fn test_defaults() {
        let config = TollgateConfig::default();
        assert_eq!(config.server.listen_addr, "127.0.0.1:8181".parse().unwrap());
        assert_eq!(config.server.sweep_interval(), Some(Duration::from_secs(60)));
        assert_eq!(config.rules.default, LimitPolicy::default());
    }

    #[test]
    fn test_from_yaml() {
        let yaml = r#"
server:
  listen_addr: "0.0.0.0:9000"
  sweep_interval_secs: 0
rules:
  resources:
    login:
      algorithm: sliding_log
      max_requests: 3
      window_ms: 60000
"#;
        let config = TollgateConfig::from_yaml(yaml).unwrap();

        assert_eq!(config.server.listen_addr.port(), 9000);
        assert_eq!(config.server.sweep_interval(), None);
        assert_eq!(config.rules.resources["login"].algorithm(), "sliding_log");
        assert_eq!(config.rules.default, LimitPolicy::default());
    }

    #[test]
    fn test_empty_yaml_is_default() {
        let config = TollgateConfig::from_yaml("{}").unwrap();
        assert_eq!(config, TollgateConfig::default());
    }

    #[test]
    fn test_invalid_yaml() {
        let result = TollgateConfig::from_yaml("server: [not, a, map]");
        assert!(matches!(result, Err(TollgateError::Config(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = TollgateConfig::from_file("/nonexistent/tollgate.yaml");
        assert!(matches!(result, Err(TollgateError::Io(_))));
    }

    fn write_temp(name: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!(
            "tollgate-{}-{}.yaml",
            name,
            std::process::id()
        ));
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn env_vars(vars: &[(&str, &str)]) -> ::config::Environment {
        let mut map = ::config::Map::new();
        for (name, value) in vars {
            map.insert(name.to_string(), value.to_string());
        }
        environment().source(Some(map))
    }

    #[test]
    fn test_load_file() {
        let path = write_temp(
            "load",
            "rules:\n  default:\n    algorithm: token_bucket\n    capacity: 7\n    refill_rate: 1.5\n",
        );

        let config = TollgateConfig::load_with_env(Some(path.as_path()), env_vars(&[])).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(
            config.rules.default,
            LimitPolicy::TokenBucket {
                capacity: 7,
                refill_rate: 1.5
            }
        );
        assert_eq!(config.server, ServerConfig::default());
    }

    #[test]
    fn test_load_keeps_resource_name_case() {
        let path = write_temp(
            "case",
            "rules:\n  resources:\n    LoginAPI:\n      algorithm: sliding_log\n      max_requests: 3\n      window_ms: 60000\n",
        );

        let loaded = TollgateConfig::load(Some(path.as_path())).unwrap();
        let parsed = TollgateConfig::from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();

        let names: Vec<&str> = loaded.rules.resources.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["LoginAPI"]);
        assert_eq!(loaded.rules, parsed.rules);
    }

    #[test]
    fn test_env_overrides_server_settings() {
        let path = write_temp(
            "env",
            "server:\n  listen_addr: \"127.0.0.1:7000\"\n  sweep_interval_secs: 30\nrules:\n  resources:\n    Search:\n      algorithm: token_bucket\n      capacity: 2\n      refill_rate: 1.0\n",
        );

        let env = env_vars(&[
            ("TOLLGATE__SERVER__LISTEN_ADDR", "0.0.0.0:9000"),
            ("TOLLGATE__SERVER__SWEEP_INTERVAL_SECS", "0"),
        ]);
        let config = TollgateConfig::load_with_env(Some(path.as_path()), env).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.server.listen_addr, "0.0.0.0:9000".parse().unwrap());
        assert_eq!(config.server.sweep_interval(), None);
        assert!(config.rules.resources.contains_key("Search"));
    }

    #[test]
    fn test_env_overrides_without_file() {
        let env = env_vars(&[("TOLLGATE__SERVER__SWEEP_INTERVAL_SECS", "5")]);
        let config = TollgateConfig::load_with_env(None, env).unwrap();

        assert_eq!(config.server.sweep_interval(), Some(Duration::from_secs(5)));
        assert_eq!(config.server.listen_addr, ServerConfig::default().listen_addr);
        assert_eq!(config.rules, RulesConfig::default());
    }

    #[test]
    fn test_env_override_rejects_bad_value() {
        let env = env_vars(&[("TOLLGATE__SERVER__LISTEN_ADDR", "not-an-address")]);
        let result = TollgateConfig::load_with_env(None, env);
        assert!(matches!(result, Err(TollgateError::Config(_))));
    }
}

//! Proxy configuration.
//!
//! Loaded from a TOML file, with an environment-variable fallback for
//! container deployments.

use crate::error::{ProxyError, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    /// Parsed for compatibility; connection caps are not enforced.
    pub max_connections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:6380".to_string(),
            max_connections: 1000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClusterConfig {
    pub nodes: Vec<String>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            nodes: vec!["127.0.0.1:6379".to_string()],
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct AuthConfig {
    pub enabled: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// One `[tenants.<username>]` table.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
pub struct TenantConfig {
    pub prefix: String,
    #[serde(default)]
    pub password_hash: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub rate_limit: Option<u32>,
    #[serde(default)]
    pub max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub cluster: ClusterConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
    pub tenants: HashMap<String, TenantConfig>,
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ProxyError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml(&content)?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| ProxyError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Build a config from environment variables.
    ///
    /// `TENANT_MAP` holds comma separated `username:prefix:password` entries;
    /// a `:` is appended to prefixes that don't already end with one.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Config::default();

        if let Some(addr) = lookup("PROXY_LISTEN_ADDR") {
            config.server.listen_addr = addr;
        }
        if let Some(nodes) = lookup("REDIS_CLUSTER_NODES") {
            config.cluster.nodes = nodes
                .split(',')
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(enabled) = lookup("AUTH_ENABLED") {
            config.auth.enabled = enabled.eq_ignore_ascii_case("true");
        }
        if let Some(level) = lookup("LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Some(map) = lookup("TENANT_MAP") {
            for entry in map.split(',').map(str::trim).filter(|e| !e.is_empty()) {
                let mut parts = entry.splitn(3, ':');
                let (Some(username), Some(prefix), Some(password)) =
                    (parts.next(), parts.next(), parts.next())
                else {
                    return Err(ProxyError::Config(format!(
                        "TENANT_MAP entry '{}' must be username:prefix:password",
                        entry
                    )));
                };
                let mut prefix = prefix.to_string();
                if !prefix.ends_with(':') {
                    prefix.push(':');
                }
                config.tenants.insert(
                    username.to_string(),
                    TenantConfig {
                        prefix,
                        password: Some(password.to_string()),
                        ..Default::default()
                    },
                );
            }
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.listen_addr.is_empty() {
            return Err(ProxyError::Config("server.listen_addr is required".to_string()));
        }
        if self.cluster.nodes.is_empty() {
            return Err(ProxyError::Config(
                "at least one cluster node is required".to_string(),
            ));
        }
        for (username, tenant) in &self.tenants {
            if tenant.prefix.is_empty() {
                return Err(ProxyError::Config(format!(
                    "tenant '{}' needs a non-empty prefix",
                    username
                )));
            }
            let has_hash = tenant.password_hash.as_deref().is_some_and(|h| !h.is_empty());
            let has_password = tenant.password.as_deref().is_some_and(|p| !p.is_empty());
            if !has_hash && !has_password {
                return Err(ProxyError::Config(format!(
                    "tenant '{}' needs password_hash or password",
                    username
                )));
            }
        }
        Ok(())
    }
}

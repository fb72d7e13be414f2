//! Tenants and the read-only directory they are resolved from.

pub mod auth;

pub use auth::{
    hash_password, hash_password_with, validate_hash, AuthError, Authenticator, HashError,
    HashScheme,
};

use crate::config::TenantConfig;
use crate::error::{ProxyError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// A tenant whose keys live under `key_prefix`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tenant {
    pub username: String,
    pub key_prefix: String,
    /// Argon2 PHC string. Takes precedence over `password`.
    pub password_hash: Option<String>,
    /// Plaintext secret, accepted but discouraged.
    pub password: Option<String>,
    pub rate_limit: Option<u32>,
    pub max_connections: Option<u32>,
}

impl Tenant {
    pub fn new(username: impl Into<String>, key_prefix: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            key_prefix: key_prefix.into(),
            password_hash: None,
            password: None,
            rate_limit: None,
            max_connections: None,
        }
    }

    pub fn with_password_hash(mut self, hash: impl Into<String>) -> Self {
        self.password_hash = Some(hash.into());
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    fn from_config(username: &str, cfg: &TenantConfig) -> Self {
        Self {
            username: username.to_string(),
            key_prefix: cfg.prefix.clone(),
            password_hash: cfg.password_hash.clone().filter(|h| !h.is_empty()),
            password: cfg.password.clone().filter(|p| !p.is_empty()),
            rate_limit: cfg.rate_limit,
            max_connections: cfg.max_connections,
        }
    }
}

/// Username → tenant mapping, built once at startup and never mutated.
///
/// Shared behind an `Arc`; reads need no locking.
#[derive(Debug, Default)]
pub struct TenantDirectory {
    tenants: HashMap<String, Arc<Tenant>>,
}

impl TenantDirectory {
    /// Build the directory, rejecting empty prefixes, duplicate usernames and
    /// unparseable password hashes.
    pub fn new(tenants: impl IntoIterator<Item = Tenant>) -> Result<Self> {
        let mut map = HashMap::new();
        for tenant in tenants {
            if tenant.username.is_empty() {
                return Err(ProxyError::TenantDirectory(
                    "tenant username must not be empty".to_string(),
                ));
            }
            if tenant.key_prefix.is_empty() {
                return Err(ProxyError::TenantDirectory(format!(
                    "tenant '{}' has an empty key prefix",
                    tenant.username
                )));
            }
            if let Some(hash) = &tenant.password_hash {
                validate_hash(hash).map_err(|e| {
                    ProxyError::TenantDirectory(format!(
                        "tenant '{}' has an invalid password hash: {}",
                        tenant.username, e
                    ))
                })?;
            } else if tenant.password.is_some() {
                warn!(
                    "Tenant '{}' uses a plaintext password; configure password_hash instead",
                    tenant.username
                );
            }

            let username = tenant.username.clone();
            if map.insert(username.clone(), Arc::new(tenant)).is_some() {
                return Err(ProxyError::TenantDirectory(format!(
                    "duplicate tenant '{}'",
                    username
                )));
            }
        }
        Ok(Self { tenants: map })
    }

    pub fn from_config(tenants: &HashMap<String, TenantConfig>) -> Result<Self> {
        Self::new(
            tenants
                .iter()
                .map(|(username, cfg)| Tenant::from_config(username, cfg)),
        )
    }

    pub fn resolve(&self, username: &str) -> Option<Arc<Tenant>> {
        self.tenants.get(username).cloned()
    }

    pub fn len(&self) -> usize {
        self.tenants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tenants.is_empty()
    }
}

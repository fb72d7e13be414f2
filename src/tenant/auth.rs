use crate::session::{Binding, ConnectionId, SessionStore};
use crate::tenant::{Tenant, TenantDirectory};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use std::sync::{Arc, OnceLock};
use thiserror::Error;

/// Why an authentication attempt failed.
///
/// The variants are for logs only; clients always see the same
/// credential error regardless of cause.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("unknown tenant '{0}'")]
    UnknownTenant(String),

    #[error("bad credential for tenant '{0}'")]
    BadCredential(String),

    #[error("tenant '{0}' has no credential configured")]
    NoCredentialConfigured(String),

    #[error("connection already authenticated")]
    AlreadyAuthenticated,

    #[error("connection closed during authentication")]
    SessionClosed,
}

impl AuthError {
    /// Whether the failure came from the supplied username or password.
    pub fn is_credential_failure(&self) -> bool {
        matches!(
            self,
            AuthError::UnknownTenant(_)
                | AuthError::BadCredential(_)
                | AuthError::NoCredentialConfigured(_)
        )
    }
}

#[derive(Error, Debug)]
pub enum HashError {
    #[error("argon2: {0}")]
    Argon2(String),

    #[error("bcrypt: {0}")]
    Bcrypt(#[from] bcrypt::BcryptError),
}

/// Algorithm and work factor for newly generated hashes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashScheme {
    /// Argon2id using `m_cost` KiB of memory and `t_cost` iterations.
    Argon2 { m_cost: u32, t_cost: u32 },
    /// bcrypt at `cost` (4 to 31).
    Bcrypt { cost: u32 },
}

impl Default for HashScheme {
    fn default() -> Self {
        HashScheme::Argon2 {
            m_cost: Params::DEFAULT_M_COST,
            t_cost: Params::DEFAULT_T_COST,
        }
    }
}

/// Hash `password` into an Argon2id PHC string suitable for `password_hash`.
pub fn hash_password(password: &str) -> Result<String, HashError> {
    hash_password_with(password, HashScheme::default())
}

pub fn hash_password_with(password: &str, scheme: HashScheme) -> Result<String, HashError> {
    match scheme {
        HashScheme::Argon2 { m_cost, t_cost } => {
            let params = Params::new(m_cost, t_cost, Params::DEFAULT_P_COST, None)
                .map_err(|e| HashError::Argon2(e.to_string()))?;
            let salt = SaltString::encode_b64(&rand::random::<[u8; 16]>())
                .map_err(|e| HashError::Argon2(e.to_string()))?;
            let hash = Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
                .hash_password(password.as_bytes(), &salt)
                .map_err(|e| HashError::Argon2(e.to_string()))?;
            Ok(hash.to_string())
        }
        HashScheme::Bcrypt { cost } => Ok(bcrypt::hash(password, cost)?),
    }
}

/// `$2a$`, `$2b$`, `$2x$` and `$2y$` strings are bcrypt; anything else must be PHC.
pub fn is_bcrypt_hash(hash: &str) -> bool {
    ["$2a$", "$2b$", "$2x$", "$2y$"]
        .iter()
        .any(|marker| hash.starts_with(marker))
}

/// Check that a stored hash is one the authenticator can verify.
pub fn validate_hash(hash: &str) -> Result<(), HashError> {
    if is_bcrypt_hash(hash) {
        hash.parse::<bcrypt::HashParts>()?;
    } else {
        PasswordHash::new(hash).map_err(|e| HashError::Argon2(e.to_string()))?;
    }
    Ok(())
}

/// Hash checked for unknown usernames so they cost the same as a wrong password.
fn dummy_hash() -> Option<&'static str> {
    static DUMMY: OnceLock<Option<String>> = OnceLock::new();
    DUMMY
        .get_or_init(|| hash_password("tenant-proxy-dummy-credential").ok())
        .as_deref()
}

fn verify_hash(password: &[u8], hash: &str) -> bool {
    if is_bcrypt_hash(hash) {
        return bcrypt::verify(password, hash).unwrap_or(false);
    }
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default().verify_password(password, &parsed).is_ok(),
        Err(_) => false,
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Checks tenant credentials and binds the session on success.
#[derive(Debug, Clone)]
pub struct Authenticator {
    directory: Arc<TenantDirectory>,
    sessions: Arc<SessionStore>,
}

impl Authenticator {
    pub fn new(directory: Arc<TenantDirectory>, sessions: Arc<SessionStore>) -> Self {
        Self {
            directory,
            sessions,
        }
    }

    /// Authenticate `conn` as `username`.
    ///
    /// Session state changes only on success. A connection that is already
    /// bound is rejected without checking the credentials.
    pub fn authenticate(
        &self,
        conn: ConnectionId,
        username: &str,
        password: &[u8],
    ) -> Result<Arc<Tenant>, AuthError> {
        if self.sessions.lookup(conn).is_some() {
            return Err(AuthError::AlreadyAuthenticated);
        }

        let Some(tenant) = self.directory.resolve(username) else {
            if let Some(hash) = dummy_hash() {
                let _ = verify_hash(password, hash);
            }
            return Err(AuthError::UnknownTenant(username.to_string()));
        };

        let valid = if let Some(hash) = &tenant.password_hash {
            verify_hash(password, hash)
        } else if let Some(secret) = &tenant.password {
            constant_time_eq(secret.as_bytes(), password)
        } else {
            return Err(AuthError::NoCredentialConfigured(username.to_string()));
        };
        if !valid {
            return Err(AuthError::BadCredential(username.to_string()));
        }

        match self.sessions.bind(conn, &tenant.username) {
            Binding::Bound => Ok(tenant),
            Binding::AlreadyBound => Err(AuthError::AlreadyAuthenticated),
            Binding::NoSession => Err(AuthError::SessionClosed),
        }
    }
}

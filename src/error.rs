use thiserror::Error;

/// Errors that abort startup or tear down a single client connection.
///
/// Per-command failures never surface as `ProxyError`; the router turns them
/// into error replies so the connection stays usable.
#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Tenant directory error: {0}")]
    TenantDirectory(String),

    #[error("Cluster error: {0}")]
    Cluster(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<redis::RedisError> for ProxyError {
    fn from(err: redis::RedisError) -> Self {
        ProxyError::Cluster(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ProxyError>;

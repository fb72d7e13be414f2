//! Cluster access for rewritten commands.
//!
//! The proxy does not track slot ownership itself. Commands go to a
//! [`ClusterTransport`], a black box that either answers or reports a
//! redirection; the [`ClusterExecutor`] follows a single redirection hop over
//! a short-lived [`DirectConnection`].
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │              ClusterExecutor                │
//! │   (MOVED / ASK detection, one-hop retry)    │
//! └─────────────────────────────────────────────┘
//!          │                          │
//!          ▼                          ▼
//! ┌──────────────────┐     ┌──────────────────────┐
//! │ ClusterTransport │     │   DirectConnection   │
//! │ (slot-aware)     │     │ (one node, one use)  │
//! └──────────────────┘     └──────────────────────┘
//! ```

mod executor;
mod transport;

pub use self::executor::ClusterExecutor;
pub use self::transport::RedisClusterTransport;

use crate::command::Command;
use crate::protocol::RespValue;
use async_trait::async_trait;
use std::fmt;

/// Command sent to the target node before an ASK-redirected command.
pub const ASKING: &str = "ASKING";

/// A failure reported by the cluster or a redirection target.
///
/// `message` is the upstream error text, e.g. `MOVED 3999 127.0.0.1:6381`
/// or `WRONGTYPE Operation against a key holding the wrong kind of value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamError {
    pub message: String,
}

impl UpstreamError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The redirection this error signals, if any.
    pub fn redirect(&self) -> Option<Redirect> {
        Redirect::parse(&self.message)
    }
}

impl fmt::Display for UpstreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for UpstreamError {}

/// A slot redirection signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Redirect {
    /// The slot now lives on `addr`.
    Moved { slot: u16, addr: String },
    /// Ask `addr` for this one request while the slot migrates.
    Ask { slot: u16, addr: String },
}

impl Redirect {
    /// Parse `MOVED <slot> <host>:<port>` or `ASK <slot> <host>:<port>`.
    ///
    /// A `:` directly after the keyword is tolerated.
    pub fn parse(message: &str) -> Option<Redirect> {
        let mut parts = message.split_whitespace();
        let kind = parts.next()?.trim_end_matches(':');
        let slot = parts.next()?.parse::<u16>().ok()?;
        let addr = parts.next()?;

        let (host, port) = addr.rsplit_once(':')?;
        if host.is_empty() || port.parse::<u16>().is_err() {
            return None;
        }
        let addr = addr.to_string();

        if kind.eq_ignore_ascii_case("MOVED") {
            Some(Redirect::Moved { slot, addr })
        } else if kind.eq_ignore_ascii_case("ASK") {
            Some(Redirect::Ask { slot, addr })
        } else {
            None
        }
    }

    pub fn slot(&self) -> u16 {
        match self {
            Redirect::Moved { slot, .. } | Redirect::Ask { slot, .. } => *slot,
        }
    }

    pub fn addr(&self) -> &str {
        match self {
            Redirect::Moved { addr, .. } | Redirect::Ask { addr, .. } => addr,
        }
    }

    pub fn is_ask(&self) -> bool {
        matches!(self, Redirect::Ask { .. })
    }
}

/// Slot-aware access to the cluster.
#[async_trait]
pub trait ClusterTransport: Send + Sync {
    /// Run `command` on whichever node the transport routes it to.
    async fn execute(&self, command: &Command) -> Result<RespValue, UpstreamError>;

    /// Open a connection to a single node, used for one redirected command.
    async fn open_direct(&self, addr: &str) -> Result<Box<dyn DirectConnection>, UpstreamError>;
}

/// A connection to one node. Closed when dropped.
#[async_trait]
pub trait DirectConnection: Send {
    async fn execute(&mut self, command: &Command) -> Result<RespValue, UpstreamError>;
}

//! Tenant-isolating proxy for Redis Cluster.
//!
//! Clients authenticate as a tenant with `AUTH username password`; from then
//! on every key they send is transparently prefixed with the tenant's key
//! prefix before the command reaches the shared cluster, so tenants never
//! see each other's data.

pub mod cluster;
pub mod command;
pub mod config;
pub mod error;
pub mod protocol;
pub mod router;
pub mod server;
pub mod session;
pub mod tenant;

pub use config::Config;
pub use error::{ProxyError, Result};
pub use router::Router;
pub use server::Server;

use super::{ClusterTransport, DirectConnection, UpstreamError};
use crate::command::Command;
use crate::error::{ProxyError, Result};
use crate::protocol::RespValue;
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::cluster::ClusterClient;
use redis::cluster_async::ClusterConnection;
use tracing::{debug, info};

/// [`ClusterTransport`] backed by the `redis` crate's async cluster client.
pub struct RedisClusterTransport {
    conn: ClusterConnection,
}

impl RedisClusterTransport {
    /// Connect to the cluster through the given seed nodes and check it
    /// answers a PING.
    pub async fn connect(nodes: &[String]) -> Result<Self> {
        if nodes.is_empty() {
            return Err(ProxyError::Cluster(
                "no Redis cluster nodes provided".to_string(),
            ));
        }

        let client = ClusterClient::new(nodes.iter().map(|n| node_url(n)).collect::<Vec<_>>())?;
        let mut conn = client.get_async_connection().await?;
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        info!("Connected to Redis cluster via {:?} ({})", nodes, pong);

        Ok(Self { conn })
    }
}

#[async_trait]
impl ClusterTransport for RedisClusterTransport {
    async fn execute(&self, command: &Command) -> std::result::Result<RespValue, UpstreamError> {
        let mut conn = self.conn.clone();
        to_redis_cmd(command)
            .query_async::<_, redis::Value>(&mut conn)
            .await
            .map(RespValue::from)
            .map_err(upstream_error)
    }

    async fn open_direct(
        &self,
        addr: &str,
    ) -> std::result::Result<Box<dyn DirectConnection>, UpstreamError> {
        let client = redis::Client::open(node_url(addr)).map_err(upstream_error)?;
        let conn = client
            .get_multiplexed_tokio_connection()
            .await
            .map_err(upstream_error)?;
        debug!("Opened direct connection to {}", addr);
        Ok(Box::new(RedisDirectConnection {
            addr: addr.to_string(),
            conn,
        }))
    }
}

struct RedisDirectConnection {
    addr: String,
    conn: MultiplexedConnection,
}

#[async_trait]
impl DirectConnection for RedisDirectConnection {
    async fn execute(&mut self, command: &Command) -> std::result::Result<RespValue, UpstreamError> {
        to_redis_cmd(command)
            .query_async::<_, redis::Value>(&mut self.conn)
            .await
            .map(RespValue::from)
            .map_err(upstream_error)
    }
}

impl Drop for RedisDirectConnection {
    fn drop(&mut self) {
        debug!("Closing direct connection to {}", self.addr);
    }
}

fn node_url(addr: &str) -> String {
    if addr.starts_with("redis://") || addr.starts_with("rediss://") {
        addr.to_string()
    } else {
        format!("redis://{}/", addr)
    }
}

fn to_redis_cmd(command: &Command) -> redis::Cmd {
    let mut cmd = redis::Cmd::new();
    for arg in command.args() {
        cmd.arg(arg.as_ref());
    }
    cmd
}

/// Rebuild the server's `CODE detail` text so redirections and error codes
/// reach the executor and the client unchanged.
fn upstream_error(err: redis::RedisError) -> UpstreamError {
    match (err.code(), err.detail()) {
        (Some(code), Some(detail)) => UpstreamError::new(format!("{} {}", code, detail)),
        (Some(code), None) => UpstreamError::new(code),
        _ => UpstreamError::new(format!("ERR {}", err)),
    }
}

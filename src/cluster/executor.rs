use super::{ClusterTransport, Redirect, UpstreamError, ASKING};
use crate::command::Command;
use crate::protocol::RespValue;
use std::sync::Arc;
use tracing::{debug, warn};

/// Runs rewritten commands against the cluster, following at most one
/// MOVED/ASK redirection.
#[derive(Clone)]
pub struct ClusterExecutor {
    transport: Arc<dyn ClusterTransport>,
}

impl ClusterExecutor {
    pub fn new(transport: Arc<dyn ClusterTransport>) -> Self {
        Self { transport }
    }

    /// Execute `command`.
    ///
    /// Values and non-redirection errors are returned as-is. On a redirection
    /// the command is retried once on the named node and that attempt's
    /// outcome is returned, even if it is another redirection.
    pub async fn execute(&self, command: &Command) -> Result<RespValue, UpstreamError> {
        match self.transport.execute(command).await {
            Err(err) => match err.redirect() {
                Some(redirect) => self.follow(redirect, command).await,
                None => Err(err),
            },
            ok => ok,
        }
    }

    async fn follow(
        &self,
        redirect: Redirect,
        command: &Command,
    ) -> Result<RespValue, UpstreamError> {
        warn!(
            "Redirecting {} to {} for slot {} ({})",
            command.name_upper(),
            redirect.addr(),
            redirect.slot(),
            if redirect.is_ask() { "ASK" } else { "MOVED" }
        );

        // dropped on every return path below, which closes it
        let mut conn = self.transport.open_direct(redirect.addr()).await?;

        if redirect.is_ask() {
            conn.execute(&Command::from_parts([ASKING])).await?;
        }

        let result = conn.execute(command).await;
        if let Err(err) = &result {
            debug!("Redirected command to {} failed: {}", redirect.addr(), err);
        }
        result
    }
}

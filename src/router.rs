//! Per-command orchestration: authentication gate, rewriting, execution.

use crate::cluster::{ClusterExecutor, ClusterTransport};
use crate::command::{is_keyspace_wide, rewrite, strip_reply_keys, Command};
use crate::protocol::RespValue;
use crate::session::{ConnectionId, SessionStore};
use crate::tenant::{AuthError, Authenticator, TenantDirectory};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

pub const NOAUTH_ERROR: &str = "NOAUTH Authentication required.";
pub const WRONGPASS_ERROR: &str = "WRONGPASS invalid username-password pair";
pub const ALREADY_AUTHENTICATED_ERROR: &str = "ERR connection already authenticated";

/// Routes each client command to the right place.
///
/// Cheap to clone; clones share sessions, tenants and the cluster transport.
#[derive(Clone)]
pub struct Router {
    sessions: Arc<SessionStore>,
    directory: Arc<TenantDirectory>,
    authenticator: Arc<Authenticator>,
    executor: ClusterExecutor,
    auth_required: bool,
}

impl Router {
    pub fn new(
        directory: Arc<TenantDirectory>,
        transport: Arc<dyn ClusterTransport>,
        auth_required: bool,
    ) -> Self {
        let sessions = Arc::new(SessionStore::new());
        let authenticator = Arc::new(Authenticator::new(
            Arc::clone(&directory),
            Arc::clone(&sessions),
        ));
        Self {
            sessions,
            directory,
            authenticator,
            executor: ClusterExecutor::new(transport),
            auth_required,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub fn connect(&self) -> ConnectionId {
        self.sessions.create()
    }

    pub fn disconnect(&self, conn: ConnectionId) {
        self.sessions.remove(conn);
    }

    /// Handle one command from `conn` and produce its reply.
    ///
    /// Never fails: every problem becomes an error reply for this command only.
    pub async fn handle(&self, conn: ConnectionId, command: Command) -> RespValue {
        let start = Instant::now();
        let name = command.name_upper();

        let reply = self.dispatch(conn, &name, command).await;

        debug!(
            "Command: {}, Connection: {}, Duration: {:?}",
            name,
            conn,
            start.elapsed()
        );
        reply
    }

    async fn dispatch(&self, conn: ConnectionId, name: &str, command: Command) -> RespValue {
        if command.is_empty() {
            return RespValue::error("ERR empty command");
        }

        match name {
            "AUTH" => return self.auth(conn, command).await,
            "QUIT" => return RespValue::ok(),
            _ => {}
        }

        let prefix = match self.sessions.lookup(conn) {
            Some(username) => match self.directory.resolve(&username) {
                Some(tenant) => tenant.key_prefix.clone(),
                None => {
                    error!("Session {} bound to unknown tenant '{}'", conn, username);
                    return RespValue::error("ERR internal error: tenant not found");
                }
            },
            None if self.auth_required => return RespValue::error(NOAUTH_ERROR),
            None => String::new(),
        };

        if name == "PING" {
            return ping(&command);
        }
        if is_keyspace_wide(name) {
            warn!(
                "Connection {} sent {}, which reaches every tenant's keys",
                conn, name
            );
        }

        let rewritten = rewrite(&command, prefix.as_bytes());
        match self.executor.execute(&rewritten).await {
            Ok(value) => strip_reply_keys(name, value, prefix.as_bytes()),
            Err(err) => RespValue::Error(err.message),
        }
    }

    async fn auth(&self, conn: ConnectionId, command: Command) -> RespValue {
        let args = command.into_args();
        if args.len() != 3 {
            return RespValue::error("ERR wrong number of arguments for 'auth' command");
        }

        let username = String::from_utf8_lossy(&args[1]).into_owned();
        let password = args[2].clone();
        let authenticator = Arc::clone(&self.authenticator);
        let user = username.clone();

        // password hashing is CPU bound
        let outcome = tokio::task::spawn_blocking(move || {
            authenticator.authenticate(conn, &user, &password)
        })
        .await;

        match outcome {
            Ok(Ok(tenant)) => {
                info!("Connection {} authenticated as tenant '{}'", conn, tenant.username);
                RespValue::ok()
            }
            Ok(Err(AuthError::AlreadyAuthenticated)) => {
                warn!("Connection {} attempted to re-authenticate as '{}'", conn, username);
                RespValue::error(ALREADY_AUTHENTICATED_ERROR)
            }
            Ok(Err(err)) if err.is_credential_failure() => {
                warn!("Authentication failed on connection {}: {}", conn, err);
                RespValue::error(WRONGPASS_ERROR)
            }
            Ok(Err(err)) => {
                debug!("Authentication on connection {} abandoned: {}", conn, err);
                RespValue::error(format!("ERR {}", err))
            }
            Err(err) => {
                error!("Authentication task failed: {}", err);
                RespValue::error("ERR internal error during authentication")
            }
        }
    }
}

fn ping(command: &Command) -> RespValue {
    match command.args() {
        [_] => RespValue::simple_string("PONG"),
        [_, message] => RespValue::bulk_string(message.clone()),
        _ => RespValue::error("ERR wrong number of arguments for 'ping' command"),
    }
}

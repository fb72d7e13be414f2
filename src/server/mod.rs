pub mod connection;

use self::connection::Connection;
use crate::error::Result;
use crate::router::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};

/// Accepts client connections and hands each one to its own task.
pub struct Server {
    addr: String,
    router: Router,
    shutdown: watch::Receiver<bool>,
}

impl Server {
    /// Create a server that stops accepting once `shutdown` turns `true`.
    pub fn new(addr: String, router: Router, shutdown: watch::Receiver<bool>) -> Self {
        Self {
            addr,
            router,
            shutdown,
        }
    }

    /// Bind the listening socket and serve until shutdown.
    pub async fn run(&mut self) -> Result<()> {
        let listener = TcpListener::bind(&self.addr).await?;
        info!("Tenant proxy listening on {}", listener.local_addr()?);
        self.serve(listener).await
    }

    /// Serve connections from an already bound listener.
    pub async fn serve(&mut self, listener: TcpListener) -> Result<()> {
        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        let router = self.router.clone();
                        let shutdown = self.shutdown.clone();
                        tokio::spawn(async move {
                            let mut conn = Connection::new(stream, addr, router);
                            if let Err(e) = conn.handle(shutdown).await {
                                error!("Connection error from {}: {}", addr, e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                    }
                },
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        info!("Listener on {} shutting down", self.addr);
                        return Ok(());
                    }
                }
            }
        }
    }
}

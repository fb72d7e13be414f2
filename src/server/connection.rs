use crate::error::Result;
use crate::protocol::{RespCodec, RespValue};
use crate::router::Router;
use crate::session::ConnectionId;
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio_util::codec::Framed;
use tracing::{debug, info};

/// One client connection. Commands are handled strictly one after another,
/// so replies go out in arrival order.
pub struct Connection {
    framed: Framed<TcpStream, RespCodec>,
    addr: SocketAddr,
    router: Router,
}

impl Connection {
    pub fn new(stream: TcpStream, addr: SocketAddr, router: Router) -> Self {
        Self {
            framed: Framed::new(stream, RespCodec::new()),
            addr,
            router,
        }
    }

    pub async fn handle(&mut self, shutdown: watch::Receiver<bool>) -> Result<()> {
        let id = self.router.connect();
        info!("New connection from {} (ID: {})", self.addr, id);

        let result = self.serve(id, shutdown).await;

        self.router.disconnect(id);
        info!("Connection closed from {} (ID: {})", self.addr, id);
        result
    }

    async fn serve(&mut self, id: ConnectionId, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        loop {
            let frame = tokio::select! {
                frame = self.framed.next() => frame,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        debug!("Closing connection {} for shutdown", id);
                        return Ok(());
                    }
                    continue;
                }
            };

            let command = match frame {
                Some(Ok(command)) => command,
                Some(Err(e)) => {
                    // tell the client why before dropping it
                    let _ = self
                        .framed
                        .send(RespValue::error(format!("ERR {}", e)))
                        .await;
                    return Err(e);
                }
                None => return Ok(()),
            };

            let quit = command.is("QUIT");
            let reply = self.router.handle(id, command).await;
            let close = quit && !reply.is_error();
            self.framed.send(reply).await?;
            if close {
                return Ok(());
            }
        }
    }
}

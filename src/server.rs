//! Gateway-facing UDP service.
//!
//! Every datagram is a prost-encoded [`RouterRequest`]; every answer a
//! [`RouterReply`] carrying the same correlation id. Each request runs in
//! its own task under a deadline, and expiring that deadline drops the
//! task together with all its outstanding collaborator calls.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use prost::Message;
use tokio::net::UdpSocket;

use crate::compiled::core::{DataRouterRes, RouterReply, RouterRequest, Status};
use crate::constants::MAX_DATAGRAM_SIZE;
use crate::error::RouterError;
use crate::router::Router;

pub struct GatewayBridge {
    socket: Arc<UdpSocket>,
    router: Arc<Router>,
    request_timeout: Duration,
}

impl GatewayBridge {
    pub async fn bind(
        addr: SocketAddr,
        router: Arc<Router>,
        request_timeout: Duration,
    ) -> std::io::Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        Ok(Self {
            socket: Arc::new(socket),
            router,
            request_timeout,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Serves gateways until `shutdown` resolves.
    pub async fn run(&self, shutdown: impl Future<Output = ()>) -> std::io::Result<()> {
        tokio::pin!(shutdown);
        let mut buffer = vec![0u8; MAX_DATAGRAM_SIZE];

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("gateway bridge stopping");
                    return Ok(());
                }
                received = self.socket.recv_from(&mut buffer) => {
                    let (size, peer) = match received {
                        Ok(received) => received,
                        Err(e) => {
                            tracing::warn!("receive failed: {e}");
                            continue;
                        }
                    };
                    match RouterRequest::decode(&buffer[..size]) {
                        Ok(request) => {
                            tokio::spawn(Self::serve(
                                self.socket.clone(),
                                self.router.clone(),
                                self.request_timeout,
                                request,
                                peer,
                            ));
                        }
                        Err(e) => {
                            tracing::debug!(%peer, "undecodable request: {e}");
                            let reply = reply_for(0, Err(RouterError::from(e)));
                            Self::send_reply(&self.socket, reply, peer).await;
                        }
                    }
                }
            }
        }
    }

    async fn serve(
        socket: Arc<UdpSocket>,
        router: Arc<Router>,
        request_timeout: Duration,
        request: RouterRequest,
        peer: SocketAddr,
    ) {
        let id = request.id;
        let outcome = match tokio::time::timeout(request_timeout, router.handle(request)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(RouterError::operational(format!(
                "request timed out after {request_timeout:?}"
            ))),
        };
        if let Err(e) = &outcome {
            tracing::debug!(%peer, id, "request failed: {e}");
        }
        Self::send_reply(&socket, reply_for(id, outcome), peer).await;
    }

    async fn send_reply(socket: &UdpSocket, reply: RouterReply, peer: SocketAddr) {
        if let Err(e) = socket.send_to(&reply.encode_to_vec(), peer).await {
            tracing::warn!(%peer, "failed to send reply: {e}");
        }
    }
}

/// Wire form of a routing outcome.
pub fn reply_for(id: u32, outcome: Result<Option<DataRouterRes>, RouterError>) -> RouterReply {
    match outcome {
        Ok(data) => RouterReply {
            id,
            status: Status::Ok as i32,
            data,
            reason: String::new(),
        },
        Err(e) => RouterReply {
            id,
            status: e.status() as i32,
            data: None,
            reason: e.reason().to_string(),
        },
    }
}

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};

use prost::Message;
use tokio::net::UdpSocket;

use crate::compiled::core::{BrokerReply, BrokerRequest, DataBrokerReq, DataBrokerRes, Status};
use crate::constants::MAX_DATAGRAM_SIZE;
use crate::error::RouterError;

use super::Broker;

/// Broker reached with one request/reply datagram exchange per uplink.
///
/// Every exchange uses its own ephemeral socket, so replies never need to
/// be demultiplexed. The caller bounds the wait.
#[derive(Clone, Debug)]
pub struct UdpBroker {
    name: String,
    address: SocketAddr,
}

impl UdpBroker {
    pub fn new(name: impl Into<String>, address: SocketAddr) -> Self {
        Self {
            name: name.into(),
            address,
        }
    }

    async fn connect(&self) -> Result<UdpSocket, RouterError> {
        let local: SocketAddr = if self.address.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local).await?;
        socket.connect(self.address).await?;
        Ok(socket)
    }
}

#[async_trait::async_trait]
impl Broker for UdpBroker {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle_data(&self, req: &DataBrokerReq) -> Result<Option<DataBrokerRes>, RouterError> {
        let socket = self.connect().await?;
        let id: u32 = rand::random();
        let request = BrokerRequest {
            id,
            data: Some(req.clone()),
        };
        socket.send(&request.encode_to_vec()).await?;

        let mut buffer = vec![0u8; MAX_DATAGRAM_SIZE];
        loop {
            let size = socket.recv(&mut buffer).await?;
            let reply = match BrokerReply::decode(&buffer[..size]) {
                Ok(reply) => reply,
                Err(e) => {
                    tracing::warn!(broker = %self.name, "discarding undecodable reply: {e}");
                    continue;
                }
            };
            if reply.id != id {
                tracing::debug!(
                    broker = %self.name,
                    expected = id,
                    got = reply.id,
                    "discarding stale reply"
                );
                continue;
            }

            let status = Status::try_from(reply.status).map_err(|_| {
                RouterError::operational(format!(
                    "broker {} replied with unknown status {}",
                    self.name, reply.status
                ))
            })?;
            if let Some(err) = RouterError::from_status(status, reply.reason) {
                return Err(err);
            }
            return Ok(reply.data);
        }
    }
}

//! Backend nodes owning device sessions.

pub mod udp;

use crate::compiled::core::{DataBrokerReq, DataBrokerRes};
use crate::error::RouterError;

pub use udp::UdpBroker;

#[async_trait::async_trait]
pub trait Broker: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Hands an uplink to the broker.
    ///
    /// `Ok(None)` means the broker accepted the frame without scheduling a
    /// downlink; `Err(RouterError::NotFound(_))` means it does not own the
    /// device.
    async fn handle_data(&self, req: &DataBrokerReq) -> Result<Option<DataBrokerRes>, RouterError>;
}

//! Address index and gateway status storage, consumed by the router.

pub mod memory;

use crate::compiled::core::StatsMetadata;
use crate::error::RouterError;
use crate::lorawan::{DevAddr, GatewayId};

pub use memory::MemoryStorage;

/// A broker known to own a device address. `broker_index` refers to the
/// position of the broker in the router's roster.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Entry {
    pub dev_addr: DevAddr,
    pub broker_index: usize,
}

#[async_trait::async_trait]
pub trait Storage: Send + Sync {
    /// Brokers owning `dev_addr`. Fails with `NotFound` for an address that
    /// was never observed.
    async fn lookup(&self, dev_addr: &DevAddr) -> Result<Vec<Entry>, RouterError>;

    /// Last status reported by a gateway.
    async fn lookup_stats(&self, gateway_id: &GatewayId) -> Result<StatsMetadata, RouterError>;

    /// Records a gateway status report.
    async fn update_stats(
        &self,
        gateway_id: &GatewayId,
        metadata: StatsMetadata,
    ) -> Result<(), RouterError>;
}

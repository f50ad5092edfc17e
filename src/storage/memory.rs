use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::compiled::core::StatsMetadata;
use crate::error::RouterError;
use crate::lorawan::{DevAddr, GatewayId};

use super::{Entry, Storage};

#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    entries: Vec<SnapshotEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotEntry {
    /// Big-endian hex, e.g. "26011bda".
    dev_addr: String,
    broker_index: usize,
}

/// Address index and gateway status cache held in memory.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RwLock<HashMap<DevAddr, Vec<Entry>>>,
    gateways: RwLock<HashMap<GatewayId, StatsMetadata>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares `broker_index` as an owner of `dev_addr`.
    pub async fn insert(&self, dev_addr: DevAddr, broker_index: usize) {
        let mut entries = self.entries.write().await;
        let owners = entries.entry(dev_addr).or_default();
        let entry = Entry { dev_addr, broker_index };
        if !owners.contains(&entry) {
            owners.push(entry);
        }
    }

    /// Loads an address index snapshot written by [`MemoryStorage::save`].
    pub async fn load<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        let snapshot: Snapshot = serde_json::from_str(&content)?;

        let storage = Self::new();
        for e in snapshot.entries {
            let addr = u32::from_str_radix(&e.dev_addr, 16).map_err(|err| {
                std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("invalid device address {:?}: {err}", e.dev_addr),
                )
            })?;
            storage.insert(DevAddr::from(addr), e.broker_index).await;
        }
        Ok(storage)
    }

    pub async fn save<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let entries = self.entries.read().await;
        let mut snapshot = Snapshot::default();
        for e in entries.values().flatten() {
            snapshot.entries.push(SnapshotEntry {
                dev_addr: e.dev_addr.to_string(),
                broker_index: e.broker_index,
            });
        }
        snapshot
            .entries
            .sort_by(|a, b| (&a.dev_addr, a.broker_index).cmp(&(&b.dev_addr, b.broker_index)));

        let content = serde_json::to_string_pretty(&snapshot)?;
        tokio::fs::write(path, content).await
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.values().map(Vec::len).sum()
    }
}

#[async_trait::async_trait]
impl Storage for MemoryStorage {
    async fn lookup(&self, dev_addr: &DevAddr) -> Result<Vec<Entry>, RouterError> {
        match self.entries.read().await.get(dev_addr) {
            Some(owners) if !owners.is_empty() => Ok(owners.clone()),
            _ => Err(RouterError::not_found(format!("unknown device address {dev_addr}"))),
        }
    }

    async fn lookup_stats(&self, gateway_id: &GatewayId) -> Result<StatsMetadata, RouterError> {
        self.gateways
            .read()
            .await
            .get(gateway_id)
            .cloned()
            .ok_or_else(|| RouterError::not_found(format!("no status for gateway {gateway_id}")))
    }

    async fn update_stats(
        &self,
        gateway_id: &GatewayId,
        metadata: StatsMetadata,
    ) -> Result<(), RouterError> {
        let mut gateways = self.gateways.write().await;
        let merged = match gateways.remove(gateway_id) {
            // keep the last known position when a report carries none
            Some(previous) => StatsMetadata {
                latitude: metadata.latitude.or(previous.latitude),
                longitude: metadata.longitude.or(previous.longitude),
                altitude: metadata.altitude.or(previous.altitude),
                ..metadata
            },
            None => metadata,
        };
        gateways.insert(*gateway_id, merged);
        Ok(())
    }
}

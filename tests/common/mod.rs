//! Shared collaborators for the routing tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use lora_router::broker::Broker;
use lora_router::compiled::core::{DataBrokerReq, DataBrokerRes, DataRouterReq, Metadata, StatsMetadata};
use lora_router::dutycycle::{Cycles, DutyManager, SubBand};
use lora_router::error::RouterError;
use lora_router::lorawan::{DevAddr, GatewayId};
use lora_router::router::Timeouts;
use lora_router::stats::CountingMeter;
use lora_router::storage::{Entry, Storage};
use lora_router::Router;

pub const GATEWAY: GatewayId = GatewayId::new([0xaa, 0x55, 0x5a, 0x00, 0x00, 0x00, 0x01, 0x01]);

/// Unconfirmed data-up frame for `dev_addr`, port 1, three bytes of payload.
pub fn uplink_frame(dev_addr: DevAddr) -> Vec<u8> {
    let mut frame = vec![0x40];
    frame.extend_from_slice(&dev_addr.to_wire());
    frame.extend_from_slice(&[0x00, 0x01, 0x00]); // FCtrl, FCnt
    frame.push(0x01); // FPort
    frame.extend_from_slice(&[0xde, 0xad, 0xbe]);
    frame.extend_from_slice(&[0x01, 0x02, 0x03, 0x04]); // MIC
    frame
}

pub fn uplink(dev_addr: DevAddr, frequency: f32) -> DataRouterReq {
    DataRouterReq {
        payload: uplink_frame(dev_addr),
        metadata: Some(Metadata {
            frequency,
            data_rate: "SF7BW125".to_string(),
            coding_rate: "4/5".to_string(),
            payload_size: 15,
            rssi: -42,
            lsnr: 7.5,
            ..Default::default()
        }),
        gateway_id: GATEWAY.as_bytes().to_vec(),
    }
}

pub fn downlink(tag: u8) -> DataBrokerRes {
    DataBrokerRes {
        payload: vec![0x60, tag, tag, tag],
        metadata: Some(Metadata {
            frequency: 869.525,
            data_rate: "SF9BW125".to_string(),
            coding_rate: "4/5".to_string(),
            payload_size: 4,
            ..Default::default()
        }),
    }
}

#[derive(Default)]
pub struct MockStorage {
    pub entries: HashMap<DevAddr, Vec<Entry>>,
    pub location: Option<StatsMetadata>,
    pub fail_lookup: bool,
    pub lookup_delay: Duration,
    pub stats_delay: Duration,
    pub lookups: AtomicUsize,
    pub stats_lookups: AtomicUsize,
    pub stats_updates: Mutex<Vec<(GatewayId, StatsMetadata)>>,
}

impl MockStorage {
    pub fn with_owner(dev_addr: DevAddr, broker_index: usize) -> Self {
        let mut storage = Self::default();
        storage.entries.insert(
            dev_addr,
            vec![Entry {
                dev_addr,
                broker_index,
            }],
        );
        storage
    }

    pub fn calls(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
            + self.stats_lookups.load(Ordering::SeqCst)
            + self.stats_updates.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl Storage for MockStorage {
    async fn lookup(&self, dev_addr: &DevAddr) -> Result<Vec<Entry>, RouterError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.lookup_delay).await;
        if self.fail_lookup {
            return Err(RouterError::operational("database unreachable"));
        }
        self.entries
            .get(dev_addr)
            .cloned()
            .ok_or_else(|| RouterError::not_found(format!("unknown device {dev_addr}")))
    }

    async fn lookup_stats(&self, gateway_id: &GatewayId) -> Result<StatsMetadata, RouterError> {
        self.stats_lookups.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.stats_delay).await;
        self.location
            .clone()
            .ok_or_else(|| RouterError::not_found(format!("unknown gateway {gateway_id}")))
    }

    async fn update_stats(&self, gateway_id: &GatewayId, metadata: StatsMetadata) -> Result<(), RouterError> {
        self.stats_updates.lock().unwrap().push((*gateway_id, metadata));
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Usage {
    pub gateway_id: GatewayId,
    pub frequency: f64,
    pub size: u32,
    pub data_rate: String,
    pub coding_rate: String,
}

#[derive(Default)]
pub struct MockDutyManager {
    pub cycles: Cycles,
    pub fail_lookup: bool,
    pub fail_update: bool,
    pub lookup_delay: Duration,
    pub update_delay: Duration,
    pub lookups: AtomicUsize,
    pub usages: Mutex<Vec<Usage>>,
}

impl MockDutyManager {
    pub fn with_usage(usage: &[(SubBand, u32)]) -> Self {
        Self {
            cycles: usage.iter().copied().collect(),
            ..Default::default()
        }
    }

    pub fn usages(&self) -> Vec<Usage> {
        self.usages.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.lookups.load(Ordering::SeqCst) + self.usages.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl DutyManager for MockDutyManager {
    async fn lookup(&self, _gateway_id: &GatewayId) -> Result<Cycles, RouterError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.lookup_delay).await;
        if self.fail_lookup {
            return Err(RouterError::operational("duty-cycle backend unreachable"));
        }
        Ok(self.cycles.clone())
    }

    async fn update(
        &self,
        gateway_id: &GatewayId,
        frequency: f64,
        size: u32,
        data_rate: &str,
        coding_rate: &str,
    ) -> Result<(), RouterError> {
        tokio::time::sleep(self.update_delay).await;
        if self.fail_update {
            return Err(RouterError::operational("duty-cycle backend unreachable"));
        }
        self.usages.lock().unwrap().push(Usage {
            gateway_id: *gateway_id,
            frequency,
            size,
            data_rate: data_rate.to_string(),
            coding_rate: coding_rate.to_string(),
        });
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub enum Reply {
    Downlink(DataBrokerRes),
    Accept,
    NotFound,
    Fail,
}

pub struct MockBroker {
    name: String,
    reply: Reply,
    delay: Duration,
    received: Mutex<Vec<DataBrokerReq>>,
}

impl MockBroker {
    pub fn new(name: impl Into<String>, reply: Reply) -> Arc<Self> {
        Self::delayed(name, reply, Duration::ZERO)
    }

    pub fn delayed(name: impl Into<String>, reply: Reply, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            reply,
            delay,
            received: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.received.lock().unwrap().len()
    }

    pub fn received(&self) -> Vec<DataBrokerReq> {
        self.received.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Broker for MockBroker {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle_data(&self, req: &DataBrokerReq) -> Result<Option<DataBrokerRes>, RouterError> {
        self.received.lock().unwrap().push(req.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.reply {
            Reply::Downlink(res) => Ok(Some(res.clone())),
            Reply::Accept => Ok(None),
            Reply::NotFound => Err(RouterError::not_found(format!("{} does not own the device", self.name))),
            Reply::Fail => Err(RouterError::operational(format!("{} crashed", self.name))),
        }
    }
}

pub struct Harness {
    pub storage: Arc<MockStorage>,
    pub manager: Arc<MockDutyManager>,
    pub brokers: Vec<Arc<MockBroker>>,
    pub meter: Arc<CountingMeter>,
    pub router: Router,
}

impl Harness {
    pub fn new(storage: MockStorage, manager: MockDutyManager, brokers: Vec<Arc<MockBroker>>) -> Self {
        Self::with_timeouts(storage, manager, brokers, Timeouts::default())
    }

    pub fn with_timeouts(
        storage: MockStorage,
        manager: MockDutyManager,
        brokers: Vec<Arc<MockBroker>>,
        timeouts: Timeouts,
    ) -> Self {
        let storage = Arc::new(storage);
        let manager = Arc::new(manager);
        let meter = Arc::new(CountingMeter::new());
        let roster: Vec<Arc<dyn Broker>> = brokers.iter().map(|b| b.clone() as Arc<dyn Broker>).collect();
        let router = Router::new(storage.clone(), manager.clone(), roster, meter.clone(), timeouts);
        Self {
            storage,
            manager,
            brokers,
            meter,
            router,
        }
    }

    pub fn broker_calls(&self) -> Vec<usize> {
        self.brokers.iter().map(|b| b.calls()).collect()
    }

    pub fn total_broker_calls(&self) -> usize {
        self.broker_calls().iter().sum()
    }
}

/// `count` brokers that do not own anything.
pub fn strangers(count: usize) -> Vec<Arc<MockBroker>> {
    (0..count)
        .map(|i| MockBroker::new(format!("broker-{i}"), Reply::NotFound))
        .collect()
}

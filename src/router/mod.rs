//! Uplink routing.
//!
//! The [`Router`] validates what a gateway forwards, finds the broker(s)
//! owning the device, attaches gateway location and duty-cycle window
//! states, dispatches the frame, and turns the winning broker answer into
//! the downlink handed back to the gateway. It keeps no state across
//! requests; every shared state lives in the injected collaborators.

pub mod dispatch;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::broker::Broker;
use crate::compiled::core::{
    router_request, DataBrokerReq, DataBrokerRes, DataRouterReq, DataRouterRes, RouterRequest,
    StatsReq,
};
use crate::dutycycle::{self, Cycles, DutyManager};
use crate::error::{Result, RouterError};
use crate::lorawan::{self, GatewayId};
use crate::stats::{self, Meter};
use crate::storage::Storage;

pub use dispatch::{has_downlink, Dispatched, Dispatcher, RoutePath};

/// Deadlines applied to collaborator calls.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Timeouts {
    /// Address index and gateway status lookups.
    pub lookup: Duration,
    /// Duty-cycle snapshot and update.
    pub duty: Duration,
    /// Aggregate wait for broker answers.
    pub dispatch: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            lookup: Duration::from_millis(500),
            duty: Duration::from_millis(500),
            dispatch: Duration::from_secs(2),
        }
    }
}

async fn bounded<T>(
    limit: Duration,
    what: &str,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(limit, fut).await {
        Ok(res) => res,
        Err(_) => Err(RouterError::operational(format!(
            "{what} timed out after {limit:?}"
        ))),
    }
}

pub struct Router {
    storage: Arc<dyn Storage>,
    manager: Arc<dyn DutyManager>,
    dispatcher: Dispatcher,
    meter: Arc<dyn Meter>,
    timeouts: Timeouts,
}

impl Router {
    pub fn new(
        storage: Arc<dyn Storage>,
        manager: Arc<dyn DutyManager>,
        brokers: Vec<Arc<dyn Broker>>,
        meter: Arc<dyn Meter>,
        timeouts: Timeouts,
    ) -> Self {
        Self {
            storage,
            manager,
            dispatcher: Dispatcher::new(brokers, timeouts.dispatch),
            meter,
            timeouts,
        }
    }

    pub fn brokers(&self) -> &[Arc<dyn Broker>] {
        self.dispatcher.brokers()
    }

    /// Entry point for a decoded gateway request. Stats reports answer `None`.
    pub async fn handle(&self, req: RouterRequest) -> Result<Option<DataRouterRes>> {
        match req.kind {
            None => Err(RouterError::structural("invalid nil request")),
            Some(router_request::Kind::Stats(stats)) => {
                self.handle_stats(stats).await.map(|_| None)
            }
            Some(router_request::Kind::Data(data)) => self.handle_data(data).await,
        }
    }

    /// Records a gateway status report.
    pub async fn handle_stats(&self, req: StatsReq) -> Result<()> {
        let gateway_id = GatewayId::try_from(req.gateway_id.as_slice())?;
        let metadata = req
            .metadata
            .ok_or_else(|| RouterError::structural("missing mandatory metadata"))?;

        self.meter.mark(stats::STAT_IN);
        bounded(
            self.timeouts.lookup,
            "gateway status update",
            self.storage.update_stats(&gateway_id, metadata),
        )
        .await
        .map_err(RouterError::into_operational)
    }

    /// Routes an uplink and returns the downlink to emit, if any.
    pub async fn handle_data(&self, req: DataRouterReq) -> Result<Option<DataRouterRes>> {
        tracing::debug!("handling uplink packet");
        self.meter.mark(stats::UPLINK_IN);

        // Validate coming data
        let gateway_id = GatewayId::try_from(req.gateway_id.as_slice())?;
        let mut metadata = req
            .metadata
            .ok_or_else(|| RouterError::structural("missing mandatory metadata"))?;
        let frame = lorawan::validate_data(&req.payload)?;
        let dev_addr = frame.fhdr.dev_addr;

        // Lookup for an existing broker
        let lookup = self.storage.lookup(&dev_addr);
        let owners = match bounded(self.timeouts.lookup, "address lookup", lookup).await {
            Ok(entries) => Some(entries),
            Err(e) if e.is_not_found() => None,
            Err(e) => {
                tracing::warn!(%dev_addr, "address lookup failed: {e}");
                return Err(RouterError::operational(format!(
                    "address lookup failed: {}",
                    e.reason()
                )));
            }
        };

        // Gateway location, best effort
        let location = self.storage.lookup_stats(&gateway_id);
        match bounded(self.timeouts.lookup, "gateway status lookup", location).await {
            Ok(gmeta) => {
                metadata.latitude = gmeta.latitude;
                metadata.longitude = gmeta.longitude;
                metadata.altitude = gmeta.altitude;
            }
            Err(e) => tracing::debug!(gateway = %gateway_id, "no gateway location: {e}"),
        }

        // Duty-cycle window states
        let snapshot = self.manager.lookup(&gateway_id);
        let cycles = match bounded(self.timeouts.duty, "duty-cycle lookup", snapshot).await {
            Ok(cycles) => cycles,
            Err(e) => {
                tracing::debug!(
                    gateway = %gateway_id,
                    "unable to get duty-cycles, assuming none: {e}"
                );
                Cycles::new()
            }
        };
        let (rx1, rx2) = match dutycycle::window_states(&cycles, metadata.frequency as f64) {
            Ok(states) => states,
            Err(e) => {
                self.meter.mark(stats::UPLINK_NOT_SUPPORTED);
                return Err(e);
            }
        };
        metadata.duty_rx1 = rx1 as u32;
        metadata.duty_rx2 = rx2 as u32;

        let bpacket = DataBrokerReq {
            payload: req.payload,
            metadata: Some(metadata),
        };

        // Send packet to broker(s)
        let outcome = self.dispatcher.dispatch(&bpacket, owners.as_deref()).await;
        self.meter.mark(stats::UPLINK_OUT);
        let dispatched = match outcome {
            Ok(dispatched) => dispatched,
            Err(e) => {
                if e.is_not_found() {
                    self.meter.mark(stats::UPLINK_NEGATIVE_BROKER_RESPONSE);
                } else {
                    self.meter.mark(stats::UPLINK_BAD_BROKER_RESPONSE);
                }
                tracing::debug!(%dev_addr, "routing failed: {e}");
                return Err(e);
            }
        };
        tracing::debug!(%dev_addr, path = ?dispatched.path, "uplink dispatched");

        self.handle_data_down(dispatched.response, &gateway_id).await
    }

    /// Checks a broker answer, records the downlink airtime for the gateway
    /// and builds the reply.
    async fn handle_data_down(
        &self,
        res: Option<DataBrokerRes>,
        gateway_id: &GatewayId,
    ) -> Result<Option<DataRouterRes>> {
        let Some(res) = res.filter(has_downlink) else {
            return Ok(None);
        };

        let Some(metadata) = res.metadata.as_ref() else {
            self.meter.mark(stats::UPLINK_BAD_BROKER_RESPONSE);
            return Err(RouterError::structural("missing mandatory metadata in response"));
        };

        let size = match metadata.payload_size {
            0 => res.payload.len() as u32,
            n => n,
        };
        bounded(
            self.timeouts.duty,
            "duty-cycle update",
            self.manager.update(
                gateway_id,
                metadata.frequency as f64,
                size,
                &metadata.data_rate,
                &metadata.coding_rate,
            ),
        )
        .await
        .map_err(|e| {
            RouterError::operational(format!(
                "unable to record downlink duty-cycle: {}",
                e.reason()
            ))
        })?;

        Ok(Some(DataRouterRes {
            payload: res.payload,
            metadata: res.metadata,
        }))
    }
}

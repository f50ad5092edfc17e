//! Broker selection and fan-out.
//!
//! ```text
//! lookup ──NotFound──▶ Broadcast ─────────────────────────┐
//!    │                                                     ▼
//!    └──entries──▶ Unicast ──NotFound──▶ FallbackBroadcast ──▶ Responded | Failed
//!                     └───────────────────────────────────────┘
//! ```
//!
//! A fan-out is polled concurrently in the caller's task, so dropping the
//! caller cancels every outstanding broker call.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::time::Instant;

use crate::broker::Broker;
use crate::compiled::core::{DataBrokerReq, DataBrokerRes};
use crate::error::RouterError;
use crate::storage::Entry;

/// Path an uplink took through the broker roster.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoutePath {
    /// Sent to the brokers known to own the device.
    Unicast,
    /// Unknown device, sent to every broker.
    Broadcast,
    /// Owners rejected the device (or were stale), sent to every broker.
    FallbackBroadcast,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Dispatched {
    pub path: RoutePath,
    /// The winning answer; `None` when no downlink is scheduled.
    pub response: Option<DataBrokerRes>,
}

/// Whether a broker answer carries something to emit.
pub fn has_downlink(res: &DataBrokerRes) -> bool {
    !res.payload.is_empty()
}

pub struct Dispatcher {
    brokers: Vec<Arc<dyn Broker>>,
    timeout: Duration,
}

impl Dispatcher {
    pub fn new(brokers: Vec<Arc<dyn Broker>>, timeout: Duration) -> Self {
        Self { brokers, timeout }
    }

    pub fn brokers(&self) -> &[Arc<dyn Broker>] {
        &self.brokers
    }

    /// Routes `req` to the owners listed in `owners`, or to every broker when
    /// the device is unknown (`None`).
    ///
    /// A `NotFound` from the owners triggers exactly one full broadcast. Any
    /// other failure is returned as is. Unicast and fallback share a single
    /// deadline.
    pub async fn dispatch(
        &self,
        req: &DataBrokerReq,
        owners: Option<&[Entry]>,
    ) -> Result<Dispatched, RouterError> {
        let deadline = Instant::now() + self.timeout;

        let Some(owners) = owners else {
            tracing::debug!(brokers = self.brokers.len(), "unknown device, broadcasting");
            return self.broadcast(req, RoutePath::Broadcast, deadline).await;
        };

        let recipients = self.recipients(owners);
        if recipients.is_empty() {
            tracing::warn!("no valid broker for device entries, broadcasting");
            return self
                .broadcast(req, RoutePath::FallbackBroadcast, deadline)
                .await;
        }

        match self.send(req, &recipients, deadline).await {
            Err(e) if e.is_not_found() => {
                // Might be a collision on the device address
                tracing::debug!("owners rejected the device, falling back to broadcast");
                self.broadcast(req, RoutePath::FallbackBroadcast, deadline)
                    .await
            }
            other => other.map(|response| Dispatched {
                path: RoutePath::Unicast,
                response,
            }),
        }
    }

    async fn broadcast(
        &self,
        req: &DataBrokerReq,
        path: RoutePath,
        deadline: Instant,
    ) -> Result<Dispatched, RouterError> {
        let all: Vec<&Arc<dyn Broker>> = self.brokers.iter().collect();
        let response = self.send(req, &all, deadline).await?;
        Ok(Dispatched { path, response })
    }

    /// Brokers referenced by `owners`, deduplicated, stale indexes dropped.
    fn recipients(&self, owners: &[Entry]) -> Vec<&Arc<dyn Broker>> {
        let mut seen = HashSet::new();
        let mut recipients = Vec::new();
        for entry in owners {
            match self.brokers.get(entry.broker_index) {
                Some(broker) => {
                    if seen.insert(entry.broker_index) {
                        recipients.push(broker);
                    }
                }
                None => tracing::warn!(
                    dev_addr = %entry.dev_addr,
                    index = entry.broker_index,
                    brokers = self.brokers.len(),
                    "stale broker index"
                ),
            }
        }
        recipients
    }

    /// Sends to all `brokers` concurrently and picks one outcome.
    ///
    /// The first answer carrying a downlink with its radio metadata wins
    /// immediately. Otherwise, once every broker answered: an acceptance
    /// without downlink gives `Ok(None)`, then the first hard failure (a
    /// downlink lacking metadata counts as one), then `NotFound`. Past the
    /// deadline the remaining calls are dropped.
    async fn send(
        &self,
        req: &DataBrokerReq,
        brokers: &[&Arc<dyn Broker>],
        deadline: Instant,
    ) -> Result<Option<DataBrokerRes>, RouterError> {
        if brokers.is_empty() {
            return Err(RouterError::not_found("no broker available"));
        }

        let mut pending: FuturesUnordered<_> = brokers
            .iter()
            .map(|broker| async move { (broker.name(), broker.handle_data(req).await) })
            .collect();

        let mut accepted = false;
        let mut failure: Option<RouterError> = None;
        let mut timed_out = false;

        loop {
            match tokio::time::timeout_at(deadline, pending.next()).await {
                Ok(Some((name, outcome))) => match outcome {
                    Ok(Some(res)) if has_downlink(&res) => {
                        if res.metadata.is_some() {
                            tracing::debug!(broker = name, "broker answered with a downlink");
                            return Ok(Some(res));
                        }
                        tracing::warn!(broker = name, "downlink without metadata");
                        failure.get_or_insert(RouterError::structural(
                            "missing mandatory metadata in response",
                        ));
                    }
                    Ok(_) => accepted = true,
                    Err(e) if e.is_not_found() => {
                        tracing::debug!(broker = name, "broker does not own the device");
                    }
                    Err(e) => {
                        tracing::warn!(broker = name, "broker failed: {e}");
                        failure.get_or_insert(e);
                    }
                },
                Ok(None) => break,
                Err(_) => {
                    timed_out = true;
                    break;
                }
            }
        }

        if accepted {
            return Ok(None);
        }
        if timed_out {
            return Err(RouterError::operational(format!(
                "no usable broker answer within {:?}",
                self.timeout
            )));
        }
        match failure {
            Some(e) => Err(e),
            None => Err(RouterError::not_found("no broker claimed the device")),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::compiled::core::Metadata;
    use crate::lorawan::DevAddr;

    enum Reply {
        Downlink(u8),
        Bare(u8),
        Accept,
        NotFound,
        Fail,
    }

    struct MockBroker {
        name: String,
        reply: Reply,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl MockBroker {
        fn new(name: &str, reply: Reply) -> Arc<Self> {
            Self::delayed(name, reply, Duration::ZERO)
        }

        fn delayed(name: &str, reply: Reply, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                reply,
                delay,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl Broker for MockBroker {
        fn name(&self) -> &str {
            &self.name
        }

        async fn handle_data(
            &self,
            _req: &DataBrokerReq,
        ) -> Result<Option<DataBrokerRes>, RouterError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            match self.reply {
                Reply::Downlink(tag) => Ok(Some(DataBrokerRes {
                    payload: vec![tag],
                    metadata: Some(Metadata::default()),
                })),
                Reply::Bare(tag) => Ok(Some(DataBrokerRes {
                    payload: vec![tag],
                    metadata: None,
                })),
                Reply::Accept => Ok(None),
                Reply::NotFound => Err(RouterError::not_found(self.name.clone())),
                Reply::Fail => Err(RouterError::operational(self.name.clone())),
            }
        }
    }

    fn dispatcher(brokers: &[Arc<MockBroker>]) -> Dispatcher {
        let brokers = brokers.iter().map(|b| b.clone() as Arc<dyn Broker>).collect();
        Dispatcher::new(brokers, Duration::from_millis(200))
    }

    fn entry(index: usize) -> Entry {
        Entry {
            dev_addr: DevAddr::from(0x0102_0304),
            broker_index: index,
        }
    }

    fn request() -> DataBrokerReq {
        DataBrokerReq {
            payload: vec![0x40],
            metadata: Some(Metadata::default()),
        }
    }

    #[tokio::test]
    async fn test_unicast_reaches_owner_only() {
        let brokers = [
            MockBroker::new("b0", Reply::NotFound),
            MockBroker::new("b1", Reply::Downlink(1)),
            MockBroker::new("b2", Reply::NotFound),
        ];
        let d = dispatcher(&brokers);

        let out = d.dispatch(&request(), Some(&[entry(1)])).await.unwrap();
        assert_eq!(out.path, RoutePath::Unicast);
        assert_eq!(out.response.unwrap().payload, vec![1]);
        assert_eq!(brokers.iter().map(|b| b.calls()).collect::<Vec<_>>(), vec![0, 1, 0]);
    }

    #[tokio::test]
    async fn test_unknown_device_broadcasts_to_all() {
        let brokers = [
            MockBroker::new("b0", Reply::NotFound),
            MockBroker::new("b1", Reply::NotFound),
            MockBroker::new("b2", Reply::Downlink(2)),
        ];
        let d = dispatcher(&brokers);

        let out = d.dispatch(&request(), None).await.unwrap();
        assert_eq!(out.path, RoutePath::Broadcast);
        assert_eq!(out.response.unwrap().payload, vec![2]);
        assert!(brokers.iter().all(|b| b.calls() == 1));
    }

    #[tokio::test]
    async fn test_stale_owner_falls_back_once() {
        let brokers = [
            MockBroker::new("b0", Reply::NotFound),
            MockBroker::new("b1", Reply::NotFound),
        ];
        let d = dispatcher(&brokers);

        let err = d.dispatch(&request(), Some(&[entry(1)])).await.unwrap_err();
        assert!(err.is_not_found());
        // one unicast + one broadcast for b1, one broadcast for b0
        assert_eq!(brokers[0].calls(), 1);
        assert_eq!(brokers[1].calls(), 2);
    }

    #[tokio::test]
    async fn test_unicast_failure_does_not_fall_back() {
        let brokers = [
            MockBroker::new("b0", Reply::Downlink(0)),
            MockBroker::new("b1", Reply::Fail),
        ];
        let d = dispatcher(&brokers);

        let err = d.dispatch(&request(), Some(&[entry(1)])).await.unwrap_err();
        assert!(matches!(err, RouterError::Operational(_)));
        assert_eq!(brokers[0].calls(), 0);
    }

    #[tokio::test]
    async fn test_out_of_range_index_broadcasts() {
        let brokers = [
            MockBroker::new("b0", Reply::Accept),
            MockBroker::new("b1", Reply::NotFound),
        ];
        let d = dispatcher(&brokers);

        let out = d.dispatch(&request(), Some(&[entry(7)])).await.unwrap();
        assert_eq!(out.path, RoutePath::FallbackBroadcast);
        assert_eq!(out.response, None);
        assert!(brokers.iter().all(|b| b.calls() == 1));
    }

    #[tokio::test]
    async fn test_duplicate_entries_contact_owner_once() {
        let brokers = [MockBroker::new("b0", Reply::Accept)];
        let d = dispatcher(&brokers);

        let out = d.dispatch(&request(), Some(&[entry(0), entry(0)])).await.unwrap();
        assert_eq!(out.response, None);
        assert_eq!(brokers[0].calls(), 1);
    }

    #[tokio::test]
    async fn test_first_downlink_wins() {
        let brokers = [
            MockBroker::delayed("slow", Reply::Downlink(9), Duration::from_millis(100)),
            MockBroker::delayed("fast", Reply::Downlink(1), Duration::from_millis(5)),
        ];
        let d = dispatcher(&brokers);

        let out = d.dispatch(&request(), None).await.unwrap();
        assert_eq!(out.response.unwrap().payload, vec![1]);
    }

    #[tokio::test]
    async fn test_downlink_beats_earlier_acceptance() {
        let brokers = [
            MockBroker::new("accept", Reply::Accept),
            MockBroker::delayed("owner", Reply::Downlink(3), Duration::from_millis(20)),
        ];
        let d = dispatcher(&brokers);

        let out = d.dispatch(&request(), None).await.unwrap();
        assert_eq!(out.response.unwrap().payload, vec![3]);
    }

    #[tokio::test]
    async fn test_failure_preferred_over_not_found() {
        let brokers = [MockBroker::new("b0", Reply::NotFound), MockBroker::new("b1", Reply::Fail)];
        let d = dispatcher(&brokers);

        let err = d.dispatch(&request(), None).await.unwrap_err();
        assert!(matches!(err, RouterError::Operational(r) if r == "b1"));
    }

    #[tokio::test]
    async fn test_timeout_without_answer_is_operational() {
        let brokers = [
            MockBroker::new("b0", Reply::NotFound),
            MockBroker::delayed("b1", Reply::Downlink(1), Duration::from_secs(5)),
        ];
        let d = dispatcher(&brokers);

        let err = d.dispatch(&request(), None).await.unwrap_err();
        assert!(matches!(err, RouterError::Operational(_)));
    }

    #[tokio::test]
    async fn test_timeout_after_acceptance_is_empty() {
        let brokers = [
            MockBroker::new("b0", Reply::Accept),
            MockBroker::delayed("b1", Reply::Fail, Duration::from_secs(5)),
        ];
        let d = dispatcher(&brokers);

        let out = d.dispatch(&request(), None).await.unwrap();
        assert_eq!(out.response, None);
    }

    #[tokio::test]
    async fn test_no_brokers_is_not_found() {
        let d = Dispatcher::new(Vec::new(), Duration::from_millis(50));
        let err = d.dispatch(&request(), None).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_downlink_without_metadata_does_not_win() {
        let brokers = [
            MockBroker::new("bare", Reply::Bare(8)),
            MockBroker::delayed("owner", Reply::Downlink(7), Duration::from_millis(20)),
        ];
        let d = dispatcher(&brokers);

        let out = d.dispatch(&request(), None).await.unwrap();
        let res = out.response.unwrap();
        assert_eq!(res.payload, vec![7]);
        assert!(res.metadata.is_some());
    }

    #[tokio::test]
    async fn test_downlink_without_metadata_alone_is_structural() {
        let brokers = [
            MockBroker::new("bare", Reply::Bare(8)),
            MockBroker::new("b1", Reply::NotFound),
        ];
        let d = dispatcher(&brokers);

        let err = d.dispatch(&request(), None).await.unwrap_err();
        assert!(matches!(err, RouterError::Structural(_)));
    }

    #[tokio::test]
    async fn test_fallback_shares_the_unicast_deadline() {
        let brokers = [
            MockBroker::delayed("stale", Reply::NotFound, Duration::from_millis(60)),
            MockBroker::delayed("owner", Reply::Downlink(1), Duration::from_millis(60)),
        ];
        let brokers_dyn = brokers.iter().map(|b| b.clone() as Arc<dyn Broker>).collect();
        let d = Dispatcher::new(brokers_dyn, Duration::from_millis(100));

        let started = Instant::now();
        let err = d.dispatch(&request(), Some(&[entry(0)])).await.unwrap_err();
        assert!(matches!(err, RouterError::Operational(_)));
        assert!(started.elapsed() < Duration::from_millis(150));
        assert_eq!(brokers[1].calls(), 1);
    }
}

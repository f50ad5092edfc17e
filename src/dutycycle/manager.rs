use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::RouterError;
use crate::lorawan::GatewayId;

use super::{airtime, Cycles, DutyManager, SubBand};

#[derive(Debug)]
struct DutyEntry {
    until: Instant,
    on_air: HashMap<SubBand, Duration>,
}

/// Duty-cycle manager keeping every gateway's usage in memory.
///
/// Usage is accumulated over a fixed window starting at the first
/// transmission; once the window expires the next transmission opens a
/// fresh one. Updates are serialized behind a single lock so concurrent
/// accounting never loses airtime.
#[derive(Debug)]
pub struct MemoryDutyManager {
    cycle_length: Duration,
    entries: Mutex<HashMap<GatewayId, DutyEntry>>,
}

impl MemoryDutyManager {
    pub fn new(cycle_length: Duration) -> Self {
        Self {
            cycle_length,
            entries: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait::async_trait]
impl DutyManager for MemoryDutyManager {
    async fn lookup(&self, gateway_id: &GatewayId) -> Result<Cycles, RouterError> {
        let entries = self.entries.lock().await;
        let mut cycles = Cycles::new();

        let Some(entry) = entries.get(gateway_id) else {
            return Ok(cycles);
        };
        if entry.until <= Instant::now() {
            return Ok(cycles);
        }

        let cycle = self.cycle_length.as_secs_f64();
        for (band, toa) in entry.on_air.iter() {
            let used = 100.0 * toa.as_secs_f64() / (cycle * band.max_duty());
            cycles.insert(*band, used as u32);
        }
        Ok(cycles)
    }

    async fn update(
        &self,
        gateway_id: &GatewayId,
        frequency: f64,
        size: u32,
        data_rate: &str,
        coding_rate: &str,
    ) -> Result<(), RouterError> {
        let band = SubBand::from_frequency(frequency)?;
        let toa = airtime::time_on_air(size, data_rate, coding_rate)?;

        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        match entries.get_mut(gateway_id) {
            Some(entry) if entry.until > now => {
                *entry.on_air.entry(band).or_default() += toa;
            }
            Some(entry) => {
                entry.until = now + self.cycle_length;
                entry.on_air = HashMap::from([(band, toa)]);
            }
            None => {
                entries.insert(
                    *gateway_id,
                    DutyEntry {
                        until: now + self.cycle_length,
                        on_air: HashMap::from([(band, toa)]),
                    },
                );
            }
        }

        tracing::trace!(gateway = %gateway_id, ?band, ?toa, "recorded downlink airtime");
        Ok(())
    }
}

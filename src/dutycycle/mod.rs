//! Regulatory duty-cycle classification for EU863-870.
//!
//! Every frequency maps to one ETSI subband with its own transmit budget.
//! A [`DutyManager`] tracks how much of that budget each gateway already
//! spent; the router only needs the resulting discretized [`State`].

pub mod airtime;
pub mod manager;

use std::collections::HashMap;

use crate::error::RouterError;
use crate::lorawan::GatewayId;

pub use manager::MemoryDutyManager;

/// ETSI EN 300 220 subbands used by LoRaWAN in Europe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SubBand {
    /// 865.0 - 868.0 MHz, 1%
    EuropeG,
    /// 868.0 - 868.6 MHz, 1%
    EuropeG1,
    /// 868.7 - 869.2 MHz, 0.1%
    EuropeG2,
    /// 869.4 - 869.65 MHz, 10%
    EuropeG3,
    /// 869.7 - 870.0 MHz, 1%
    EuropeG4,
}

/// Subband of the second receive window, whatever the uplink frequency.
pub const RX2_SUB_BAND: SubBand = SubBand::EuropeG3;

impl SubBand {
    /// Returns the subband a frequency (MHz) belongs to.
    pub fn from_frequency(freq: f64) -> Result<Self, RouterError> {
        match freq {
            f if (865.0..868.0).contains(&f) => Ok(SubBand::EuropeG),
            f if (868.0..868.6).contains(&f) => Ok(SubBand::EuropeG1),
            f if (868.7..869.2).contains(&f) => Ok(SubBand::EuropeG2),
            f if (869.4..869.65).contains(&f) => Ok(SubBand::EuropeG3),
            f if (869.7..870.0).contains(&f) => Ok(SubBand::EuropeG4),
            _ => Err(RouterError::structural(format!(
                "unsupported frequency: {freq} MHz"
            ))),
        }
    }

    /// Maximum fraction of time a transmitter may spend on air.
    pub fn max_duty(&self) -> f64 {
        match self {
            SubBand::EuropeG | SubBand::EuropeG1 | SubBand::EuropeG4 => 0.01,
            SubBand::EuropeG2 => 0.001,
            SubBand::EuropeG3 => 0.1,
        }
    }
}

/// Discretized availability of a subband.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u32)]
pub enum State {
    HighlyAvailable = 0,
    Available = 1,
    Warning = 2,
    Blocked = 3,
}

impl State {
    /// Classifies a usage expressed in percent of the subband budget.
    pub fn from_duty(duty: u32) -> Self {
        match duty {
            d if d >= 100 => State::Blocked,
            d if d > 85 => State::Warning,
            d if d > 30 => State::Available,
            _ => State::HighlyAvailable,
        }
    }
}

/// Percent of each subband budget already used by a gateway.
/// A missing subband means no usage.
pub type Cycles = HashMap<SubBand, u32>;

/// Window states attached to an uplink: RX1 follows the uplink subband,
/// RX2 always follows [`RX2_SUB_BAND`].
pub fn window_states(cycles: &Cycles, frequency: f64) -> Result<(State, State), RouterError> {
    let rx1_band = SubBand::from_frequency(frequency)?;
    let duty = |band: SubBand| cycles.get(&band).copied().unwrap_or(0);
    Ok((
        State::from_duty(duty(rx1_band)),
        State::from_duty(duty(RX2_SUB_BAND)),
    ))
}

/// Per-gateway duty-cycle bookkeeping.
#[async_trait::async_trait]
pub trait DutyManager: Send + Sync {
    /// Current usage snapshot for a gateway.
    async fn lookup(&self, gateway_id: &GatewayId) -> Result<Cycles, RouterError>;

    /// Records a transmission emitted by a gateway.
    async fn update(
        &self,
        gateway_id: &GatewayId,
        frequency: f64,
        size: u32,
        data_rate: &str,
        coding_rate: &str,
    ) -> Result<(), RouterError>;
}

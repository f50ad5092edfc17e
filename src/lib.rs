//! Routing tier of a LoRaWAN network server.
//!
//! Gateways forward uplinks and status reports to the [`Router`], which
//! validates them, looks up the broker(s) in charge of the device, fans the
//! frame out, and hands the chosen downlink back while keeping per-gateway
//! duty-cycle accounting up to date.

pub mod broker;
pub mod compiled;
pub mod config;
pub mod dutycycle;
pub mod error;
pub mod lorawan;
pub mod router;
pub mod server;
pub mod stats;
pub mod storage;

pub mod constants {
    pub const MAX_DATAGRAM_SIZE: usize = 2048;

    pub const DEFAULT_CONFIG_PATH: &str = "router.toml";
}

pub use error::{Result, RouterError};
pub use router::Router;
pub use server::GatewayBridge;

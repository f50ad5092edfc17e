//! LoRaWAN identifiers and the uplink frame validator.

pub mod frame;

use std::fmt;

use crate::error::RouterError;

pub use frame::{validate_data, FCtrl, FHdr, MHdr, MType, Frame};

/// Gateway identifier (EUI64). Always exactly 8 bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GatewayId([u8; 8]);

impl GatewayId {
    pub const fn new(bytes: [u8; 8]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }
}

impl TryFrom<&[u8]> for GatewayId {
    type Error = RouterError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let arr: [u8; 8] = bytes.try_into().map_err(|_| {
            RouterError::structural(format!("invalid gateway identifier: {} bytes", bytes.len()))
        })?;
        Ok(Self(arr))
    }
}

impl fmt::Display for GatewayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

/// Device address carried in the frame header. Not globally unique.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DevAddr([u8; 4]);

impl DevAddr {
    /// Builds an address from its big-endian (display order) bytes.
    pub const fn new(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    /// Builds an address from the little-endian wire representation.
    pub fn from_wire(bytes: [u8; 4]) -> Self {
        let mut be = bytes;
        be.reverse();
        Self(be)
    }

    pub fn to_wire(self) -> [u8; 4] {
        let mut le = self.0;
        le.reverse();
        le
    }

    pub fn as_u32(&self) -> u32 {
        u32::from_be_bytes(self.0)
    }
}

impl From<u32> for DevAddr {
    fn from(v: u32) -> Self {
        Self(v.to_be_bytes())
    }
}

impl fmt::Display for DevAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.as_u32())
    }
}

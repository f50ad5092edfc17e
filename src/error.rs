//! Error taxonomy shared by the router and its collaborators.

use thiserror::Error;

use crate::compiled::core::Status;

/// Result type alias for routing operations.
pub type Result<T> = std::result::Result<T, RouterError>;

/// Kind of a failure, as seen by the gateway deciding whether to retransmit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Nature {
    /// Caller or input error, never retried.
    Structural,
    /// Backend malfunction, the gateway may retransmit.
    Operational,
    /// Absence rather than failure (unknown device, stale routing entry).
    NotFound,
}

/// Errors raised while routing an uplink or a stats report.
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("structural error: {0}")]
    Structural(String),

    #[error("operational error: {0}")]
    Operational(String),

    #[error("not found: {0}")]
    NotFound(String),
}

impl RouterError {
    pub fn structural(reason: impl Into<String>) -> Self {
        Self::Structural(reason.into())
    }

    pub fn operational(reason: impl Into<String>) -> Self {
        Self::Operational(reason.into())
    }

    pub fn not_found(reason: impl Into<String>) -> Self {
        Self::NotFound(reason.into())
    }

    pub fn nature(&self) -> Nature {
        match self {
            Self::Structural(_) => Nature::Structural,
            Self::Operational(_) => Nature::Operational,
            Self::NotFound(_) => Nature::NotFound,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Re-labels anything that is not already structural as operational.
    pub fn into_operational(self) -> Self {
        match self {
            Self::Structural(_) => self,
            Self::Operational(_) => self,
            Self::NotFound(reason) => Self::Operational(reason),
        }
    }

    pub fn reason(&self) -> &str {
        match self {
            Self::Structural(r) | Self::Operational(r) | Self::NotFound(r) => r,
        }
    }
}

impl RouterError {
    /// Wire status carrying this error's nature.
    pub fn status(&self) -> Status {
        match self {
            Self::Structural(_) => Status::Structural,
            Self::Operational(_) => Status::Operational,
            Self::NotFound(_) => Status::NotFound,
        }
    }

    /// Rebuilds an error from a wire status, `None` on `Status::Ok`.
    pub fn from_status(status: Status, reason: String) -> Option<Self> {
        match status {
            Status::Ok => None,
            Status::Structural => Some(Self::Structural(reason)),
            Status::Operational => Some(Self::Operational(reason)),
            Status::NotFound => Some(Self::NotFound(reason)),
        }
    }
}

impl From<std::io::Error> for RouterError {
    fn from(e: std::io::Error) -> Self {
        Self::Operational(e.to_string())
    }
}

impl From<prost::DecodeError> for RouterError {
    fn from(e: prost::DecodeError) -> Self {
        Self::Structural(e.to_string())
    }
}

//! Just enough PHYPayload parsing to route an uplink.
//!
//! ```text
//! PHYPayload = MHDR(1) | MACPayload | MIC(4)
//! MACPayload = FHDR | [FPort(1) | FRMPayload]
//! FHDR       = DevAddr(4, LE) | FCtrl(1) | FCnt(2, LE) | FOpts(0..15)
//! ```
//!
//! The MIC is kept but never verified here.

use crate::error::RouterError;

use super::DevAddr;

const MIC_LEN: usize = 4;
const FHDR_MIN_LEN: usize = 7;
/// MHDR + minimal FHDR + MIC
pub const MIN_DATA_FRAME_LEN: usize = 1 + FHDR_MIN_LEN + MIC_LEN;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MType {
    JoinRequest,
    JoinAccept,
    UnconfirmedDataUp,
    UnconfirmedDataDown,
    ConfirmedDataUp,
    ConfirmedDataDown,
    RejoinRequest,
    Proprietary,
}

impl MType {
    fn from_bits(bits: u8) -> Self {
        match bits & 0x07 {
            0 => MType::JoinRequest,
            1 => MType::JoinAccept,
            2 => MType::UnconfirmedDataUp,
            3 => MType::UnconfirmedDataDown,
            4 => MType::ConfirmedDataUp,
            5 => MType::ConfirmedDataDown,
            6 => MType::RejoinRequest,
            _ => MType::Proprietary,
        }
    }

    pub fn is_data_up(&self) -> bool {
        matches!(self, MType::UnconfirmedDataUp | MType::ConfirmedDataUp)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MHdr {
    pub mtype: MType,
    pub major: u8,
}

impl MHdr {
    pub fn from_byte(b: u8) -> Self {
        Self {
            mtype: MType::from_bits(b >> 5),
            major: b & 0x03,
        }
    }
}

/// Uplink frame control octet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct FCtrl {
    pub adr: bool,
    pub adr_ack_req: bool,
    pub ack: bool,
    pub class_b: bool,
    pub fopts_len: u8,
}

impl FCtrl {
    pub fn from_byte(b: u8) -> Self {
        Self {
            adr: b & 0x80 != 0,
            adr_ack_req: b & 0x40 != 0,
            ack: b & 0x20 != 0,
            class_b: b & 0x10 != 0,
            fopts_len: b & 0x0f,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FHdr {
    pub dev_addr: DevAddr,
    pub fctrl: FCtrl,
    pub fcnt: u16,
    pub fopts: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub mhdr: MHdr,
    pub fhdr: FHdr,
    pub fport: Option<u8>,
    pub frm_payload: Vec<u8>,
    pub mic: [u8; MIC_LEN],
}

/// Parses an uplink data frame, failing with a structural error when the
/// payload is not a well-formed LoRaWAN R1 data uplink.
pub fn validate_data(payload: &[u8]) -> Result<Frame, RouterError> {
    if payload.len() < MIN_DATA_FRAME_LEN {
        return Err(RouterError::structural(format!(
            "frame too short: {} bytes",
            payload.len()
        )));
    }

    let mhdr = MHdr::from_byte(payload[0]);
    if mhdr.major != 0 {
        return Err(RouterError::structural(format!(
            "unsupported LoRaWAN major version {}",
            mhdr.major
        )));
    }
    if !mhdr.mtype.is_data_up() {
        return Err(RouterError::structural(format!(
            "not an uplink data frame: {:?}",
            mhdr.mtype
        )));
    }

    let (mac, mic) = payload[1..].split_at(payload.len() - 1 - MIC_LEN);
    let mut mic_bytes = [0u8; MIC_LEN];
    mic_bytes.copy_from_slice(mic);

    let dev_addr = DevAddr::from_wire([mac[0], mac[1], mac[2], mac[3]]);
    let fctrl = FCtrl::from_byte(mac[4]);
    let fcnt = u16::from_le_bytes([mac[5], mac[6]]);

    let fopts_end = FHDR_MIN_LEN + fctrl.fopts_len as usize;
    if mac.len() < fopts_end {
        return Err(RouterError::structural("truncated frame options"));
    }
    let fopts = mac[FHDR_MIN_LEN..fopts_end].to_vec();

    let (fport, frm_payload) = match mac[fopts_end..].split_first() {
        Some((port, data)) => (Some(*port), data.to_vec()),
        None => (None, Vec::new()),
    };
    if fport == Some(0) && !fopts.is_empty() {
        return Err(RouterError::structural(
            "mac commands present in both frame options and port 0 payload",
        ));
    }

    Ok(Frame {
        mhdr,
        fhdr: FHdr { dev_addr, fctrl, fcnt, fopts },
        fport,
        frm_payload,
        mic: mic_bytes,
    })
}

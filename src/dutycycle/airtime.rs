//https://github.com/mcbor/lorasim/blob/main/loraDir.py
use std::time::Duration;

use crate::error::RouterError;

/// Time on air in milliseconds. `bw` in kHz, `cr` from 1 (4/5) to 4 (4/8).
fn airtime(sf: u32, cr: u32, pl: u32, bw: u32) -> f64 {
    let mut header_disabled = 0_u32; // implicit header disabled (H=0) or not (H=1)
    let mut data_rate_optimization = 0_u32; // low data rate optimization enabled (=1) or not (=0)
    let npream = 8_u32; // number of preamble symbol

    if bw == 125 && (sf == 11 || sf == 12) {
        data_rate_optimization = 1; // low data rate optimization mandated for BW125 with SF11 and SF12
    }
    if sf == 6 {
        header_disabled = 1; // can only have implicit header with SF6
    }

    let tsym = (2.0f64).powi(sf as i32) / bw as f64;
    let tpream = (npream as f64 + 4.25) * tsym;

    // 28 + 16 (CRC on)
    let v1 = ((8.0f64 * (pl as f64) - 4.0f64 * (sf as f64) + 44f64 - 20.0f64 * header_disabled as f64)
        / (4.0f64 * ((sf as f64) - 2.0f64 * data_rate_optimization as f64)))
        .ceil()
        * ((cr as f64) + 4.0f64);
    let payload_symb_nb = 8.0 + (if v1 > 0.0 { v1 } else { 0.0 });
    let tpayload = payload_symb_nb * tsym;
    tpream + tpayload
}

/// Parses a LoRa data rate such as `SF7BW125` into (spreading factor, bandwidth kHz).
pub fn parse_data_rate(datr: &str) -> Result<(u32, u32), RouterError> {
    let invalid = || RouterError::structural(format!("invalid data rate: {datr:?}"));

    let rest = datr.strip_prefix("SF").ok_or_else(invalid)?;
    let (sf, bw) = rest.split_once("BW").ok_or_else(invalid)?;
    let sf: u32 = sf.parse().map_err(|_| invalid())?;
    let bw: u32 = bw.parse().map_err(|_| invalid())?;

    if !(6..=12).contains(&sf) || ![125, 250, 500].contains(&bw) {
        return Err(invalid());
    }
    Ok((sf, bw))
}

/// Parses a LoRa coding rate such as `4/5` into the `cr` term of the airtime formula.
pub fn parse_coding_rate(codr: &str) -> Result<u32, RouterError> {
    match codr {
        "4/5" => Ok(1),
        "4/6" => Ok(2),
        "4/7" => Ok(3),
        "4/8" => Ok(4),
        _ => Err(RouterError::structural(format!("invalid coding rate: {codr:?}"))),
    }
}

/// Time needed to emit a PHYPayload of `size` bytes.
pub fn time_on_air(size: u32, datr: &str, codr: &str) -> Result<Duration, RouterError> {
    let (sf, bw) = parse_data_rate(datr)?;
    let cr = parse_coding_rate(codr)?;
    Ok(Duration::from_secs_f64(airtime(sf, cr, size, bw) / 1000.0))
}

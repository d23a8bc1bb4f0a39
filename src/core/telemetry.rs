//! Telemetry frame decoding for the safety band
//! This module turns the raw value of one characteristic notification into
//! the three safety flags reported by the band.

use serde::Serialize;
use thiserror::Error;

/// Length of a telemetry frame in bytes: `[temperature, heart_rate, fall]`.
pub const FRAME_LEN: usize = 3;

/// Byte value the band sends for an "ok" flag. Any other value is unsafe.
pub const FLAG_OK: u8 = 0x01;

/// One decoded telemetry notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TelemetryFrame {
    /// Body temperature within range
    pub temperature_ok: bool,
    /// Heart rate within range
    pub heart_rate_ok: bool,
    /// No fall detected
    pub fall_ok: bool,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("expected a {expected}-byte telemetry frame, got {actual} bytes")]
    WrongLength { expected: usize, actual: usize },
}

/// Decodes a raw notification payload.
///
/// The payload carries no header or checksum, so the length is the only
/// integrity gate. Each flag is strictly `byte == 0x01`; zero and garbage
/// both decode as unsafe.
pub fn decode(raw: &[u8]) -> Result<TelemetryFrame, DecodeError> {
    let [temperature, heart_rate, fall] = raw else {
        return Err(DecodeError::WrongLength {
            expected: FRAME_LEN,
            actual: raw.len(),
        });
    };

    Ok(TelemetryFrame {
        temperature_ok: *temperature == FLAG_OK,
        heart_rate_ok: *heart_rate == FLAG_OK,
        fall_ok: *fall == FLAG_OK,
    })
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants::CURRENT_SIGN_POSITIVE;
use crate::error::Result;

/// Serial session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// A requested current together with its on-wire form
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurrentCommand {
    pub amps: f64,
    /// `[magHi, magLo, 0x00, sign]`
    pub bytes: [u8; 4],
}

impl CurrentCommand {
    /// Magnitude in device counts
    pub fn magnitude(&self) -> u16 {
        u16::from_be_bytes([self.bytes[0], self.bytes[1]])
    }

    pub fn is_positive(&self) -> bool {
        self.bytes[3] == CURRENT_SIGN_POSITIVE
    }
}

/// Field polarity as reported by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldSign {
    Positive,
    Negative,
}

/// Decoded reply to a field query
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldReading {
    pub raw: [u8; 3],
    /// Unsigned magnitude in millitesla
    pub magnitude_mt: f64,
    pub sign: FieldSign,
}

impl FieldReading {
    /// Signed field in millitesla. Zero is always `0.0`, never `-0.0`.
    pub fn value_mt(&self) -> f64 {
        match self.sign {
            _ if self.magnitude_mt == 0.0 => 0.0,
            FieldSign::Positive => self.magnitude_mt,
            FieldSign::Negative => -self.magnitude_mt,
        }
    }
}

/// Field reading taken while a current is being held
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSample {
    pub at: DateTime<Utc>,
    /// Time since the set-value exchange completed
    pub elapsed: Duration,
    pub reading: FieldReading,
}

/// Outcome of [`crate::Magnet::stop_and_query_field`].
///
/// The stop command has been written by the time this value exists; only the
/// follow-up reading may be missing.
#[derive(Debug)]
pub struct StopReading {
    pub stopped_at: DateTime<Utc>,
    pub field: Result<FieldReading>,
}

/// Parameters for a single pulse
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PulseRequest {
    pub amps: f64,
    pub duration_sec: f64,
    /// Offset of the hold phase relative to the set command, may be negative
    pub startup_delay_sec: f64,
}

impl PulseRequest {
    pub fn new(amps: f64, duration_sec: f64) -> Self {
        PulseRequest {
            amps,
            duration_sec,
            startup_delay_sec: 0.0,
        }
    }

    pub fn with_startup_delay(mut self, startup_delay_sec: f64) -> Self {
        self.startup_delay_sec = startup_delay_sec;
        self
    }
}

/// Everything observed during one pulse
#[derive(Debug)]
pub struct PulseReport {
    pub request: PulseRequest,
    pub command: CurrentCommand,
    pub started_at: DateTime<Utc>,
    pub stopped_at: DateTime<Utc>,
    /// Wall-clock length of the hold phase
    pub hold_elapsed: Duration,
    pub samples: Vec<FieldSample>,
    pub poll_failures: usize,
    /// Reading taken after the stop. An error here still means the magnet was stopped.
    pub final_field: Result<FieldReading>,
}

impl PulseReport {
    pub fn final_field_mt(&self) -> Option<f64> {
        self.final_field.as_ref().ok().map(FieldReading::value_mt)
    }
}

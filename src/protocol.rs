use chrono::Utc;
use log::{debug, info, warn};
use std::time::Duration;

use crate::codec::{decode_field, CurrentEncoder};
use crate::config::{MagnetConfig, Timing};
use crate::constants::*;
use crate::error::{MagnetError, Result};
use crate::transport::{SerialSession, Transport};
use crate::types::*;

/// Main electromagnet protocol interface
pub struct Magnet<T: Transport = SerialSession> {
    transport: T,
    encoder: CurrentEncoder,
    timing: Timing,
}

impl Magnet<SerialSession> {
    /// Validate `config` and open its serial port
    pub fn connect(config: &MagnetConfig) -> Result<Self> {
        config.validate()?;
        let session = SerialSession::connect(&config.port, config.timing.read_timeout())?;
        Ok(Self::with_transport(session, config))
    }

    /// Release the serial port. Idempotent.
    pub fn disconnect(&mut self) {
        self.transport.disconnect();
    }

    pub fn state(&self) -> ConnectionState {
        self.transport.state()
    }
}

impl<T: Transport> Magnet<T> {
    /// Drive the magnet over an already established transport
    pub fn with_transport(transport: T, config: &MagnetConfig) -> Self {
        Magnet {
            transport,
            encoder: CurrentEncoder::new(config.calibration),
            timing: config.timing,
        }
    }

    pub fn encoder(&self) -> &CurrentEncoder {
        &self.encoder
    }

    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    fn send(&mut self, command: &[u8]) -> Result<()> {
        self.transport.write_bytes(command)
    }

    /// Send the liveness probe. No reply is expected.
    pub fn ready_check(&mut self) -> Result<()> {
        debug!("Ready check");
        self.send(&[READY_CMD])
    }

    /// Run the set-value exchange for an already encoded current.
    ///
    /// On [`MagnetError::AckMismatch`] the device may or may not have applied
    /// the value; re-issue the exchange or verify with [`query_field`](Self::query_field).
    pub fn set_value(&mut self, command: &CurrentCommand) -> Result<()> {
        debug!("Set value: {:02X?} ({} A)", command.bytes, command.amps);

        self.send(&[START_CMD])?;
        self.send(&[SET_VALUE_CMD])?;
        for byte in command.bytes {
            self.send(&[byte])?;
        }
        self.send(&[END_VALUE_CMD])?;

        let timeout = self.timing.read_timeout();
        match self.transport.read_bytes(1, timeout) {
            Ok(reply) if reply == [ACK_BYTE] => Ok(()),
            Ok(reply) => Err(MagnetError::AckMismatch {
                expected: ACK_BYTE,
                received: reply.first().copied(),
            }),
            Err(MagnetError::Timeout) => Err(MagnetError::AckMismatch {
                expected: ACK_BYTE,
                received: None,
            }),
            Err(e) => Err(e),
        }
    }

    /// De-energise the magnet. No acknowledgment is read.
    pub fn stop(&mut self) -> Result<()> {
        debug!("Stop");
        self.send(&[STOP_CMD])
    }

    /// Read the present field without changing the output
    pub fn query_field(&mut self) -> Result<FieldReading> {
        let timeout = self.timing.read_timeout();
        self.query_field_within(timeout)
    }

    pub(crate) fn query_field_within(&mut self, timeout: Duration) -> Result<FieldReading> {
        self.send(&[QUERY_FIELD_CMD])?;
        let reply = self.transport.read_bytes(FIELD_REPLY_LEN, timeout)?;
        let reading = decode_field(&reply)?;
        debug!("Field: {} mT", reading.value_mt());
        Ok(reading)
    }

    /// Encode `amps` and apply it. Nothing is sent if encoding fails.
    pub fn set_current(&mut self, amps: f64) -> Result<CurrentCommand> {
        let command = self.encoder.encode(amps)?;
        info!("Setting current to {} A", amps);
        self.set_value(&command)?;
        Ok(command)
    }

    /// Stop, then read the field.
    ///
    /// Only a failure to send the stop is returned as `Err`. Once the stop is
    /// out, a failed reading is reported inside [`StopReading::field`].
    pub fn stop_and_query_field(&mut self) -> Result<StopReading> {
        self.stop()?;
        let stopped_at = Utc::now();

        let field = self.query_field();
        match &field {
            Ok(reading) => info!("Field after stop: {} mT", reading.value_mt()),
            Err(e) => warn!("Stopped, but field query failed: {}", e),
        }

        Ok(StopReading { stopped_at, field })
    }
}

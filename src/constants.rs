//! Protocol constants for Holmarc electromagnet communication.
//!
//! This module defines the command bytes and serial port configuration of the
//! one supported protocol dialect. These are properties of the wire format and
//! are deliberately not part of [`crate::config::MagnetConfig`].

/// Liveness probe sent before other operations
pub const READY_CMD: u8 = 0x64;

/// Opens a set-value exchange
pub const START_CMD: u8 = 0x1E;

/// Announces the 4-byte current value
pub const SET_VALUE_CMD: u8 = 0x2C;

/// Terminates a set-value exchange
pub const END_VALUE_CMD: u8 = 0x00;

/// Acknowledgment byte returned after a set-value exchange
pub const ACK_BYTE: u8 = 0x12;

/// De-energise the magnet
pub const STOP_CMD: u8 = 0x2B;

/// Request a 3-byte field reading
pub const QUERY_FIELD_CMD: u8 = 0x0A;

/// Length of a field query reply
pub const FIELD_REPLY_LEN: usize = 3;

/// Length of an encoded current value
pub const CURRENT_VALUE_LEN: usize = 4;

/// Current sign byte: positive current
pub const CURRENT_SIGN_POSITIVE: u8 = 0x01;

/// Current sign byte: negative current
pub const CURRENT_SIGN_NEGATIVE: u8 = 0x00;

/// Field sign byte: positive field (opposite of the current convention)
pub const FIELD_SIGN_POSITIVE: u8 = 0x00;

/// Field sign byte: negative field (opposite of the current convention)
pub const FIELD_SIGN_NEGATIVE: u8 = 0x01;

/// Field magnitudes are reported in tenths of a millitesla
pub const FIELD_COUNTS_PER_MT: f64 = 10.0;

/// Baud rate (19200 bps)
pub const BAUD_RATE: u32 = 19200;

/// Data bits configuration
pub const DATA_BITS: serialport::DataBits = serialport::DataBits::Eight;

/// Parity configuration
pub const PARITY: serialport::Parity = serialport::Parity::None;

/// Stop bits configuration
pub const STOP_BITS: serialport::StopBits = serialport::StopBits::One;

/// Flow control configuration
pub const FLOW_CONTROL: serialport::FlowControl = serialport::FlowControl::None;

/// Default read timeout in milliseconds
pub const TIMEOUT_MS: u64 = 2000;

/// Default interval between hold-phase field polls
pub const POLL_INTERVAL_MS: u64 = 250;

/// Current-to-counts slope measured from the 0.1 A and 4.0 A captures
pub const DEFAULT_COUNTS_PER_AMP: f64 = (1299.0 - 35.0) / (4.0 - 0.1);

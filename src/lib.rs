//! # Holmarc Magnet Library
//!
//! A Rust library for driving Holmarc EM-series electromagnet power supplies via
//! serial communication. The command set was reverse-engineered from packet
//! captures of the vendor control software.
//!
//! ## Features
//!
//! - Open and own a 19200 baud, 8-N-1 serial session to the supply
//! - Encode currents into the 4-byte set-value payload using a configurable calibration
//! - Decode 3-byte field replies into millitesla
//! - Set a current, hold it while polling the field, then always stop
//! - Sweep a list of currents to map current onto field
//!
//! ## Example
//!
//! ```no_run
//! use holmarc_magnet::{Magnet, MagnetConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = MagnetConfig {
//!         port: "/dev/ttyUSB0".to_string(),
//!         ..MagnetConfig::default()
//!     };
//!     let mut magnet = Magnet::connect(&config)?;
//!     let report = magnet.pulse(1.0, 2.0)?;
//!     println!("Field after pulse: {:?} mT", report.final_field_mt());
//!     magnet.disconnect();
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod config;
pub mod constants;
pub mod error;
pub mod protocol;
pub mod pulse;
pub mod transport;
pub mod types;

#[cfg(test)]
mod mock_transport;

pub use codec::{decode_field, encode_current, CurrentEncoder};
pub use config::{Calibration, MagnetConfig, Timing};
pub use error::{MagnetError, Result};
pub use protocol::Magnet;
pub use transport::{SerialSession, Transport};
pub use types::*;

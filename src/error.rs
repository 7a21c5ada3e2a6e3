//! Error types for electromagnet protocol operations.

use thiserror::Error;

/// Result type alias for magnet operations.
pub type Result<T> = std::result::Result<T, MagnetError>;

/// Error types for electromagnet communication.
#[derive(Error, Debug)]
pub enum MagnetError {
    /// Port is held by another session or process
    #[error("Serial port {port} is busy (is the vendor control software still running?)")]
    PortBusy {
        /// Port that could not be claimed
        port: String,
    },

    /// Port could not be opened
    #[error("Serial port {port} is unavailable: {source}")]
    PortUnavailable {
        /// Port that failed to open
        port: String,
        /// Underlying serial port error
        #[source]
        source: serialport::Error,
    },

    /// Port identifier is not usable
    #[error("Invalid port identifier: {0:?}")]
    InvalidPort(String),

    /// Operation attempted on a closed session
    #[error("Session is not connected")]
    NotConnected,

    /// Serial port communication error
    #[error("Serial port error: {0}")]
    SerialPort(#[from] serialport::Error),

    /// General I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Communication timeout (no response from the device)
    #[error("Communication timeout")]
    Timeout,

    /// Reply had the wrong length or content
    #[error("Malformed response: expected {expected}, got {actual:02X?}")]
    MalformedResponse {
        /// Description of the expected reply
        expected: String,
        /// Raw bytes actually received
        actual: Vec<u8>,
    },

    /// Set-value exchange was not acknowledged
    #[error("Acknowledgment mismatch: expected {expected:#04x}, got {}", fmt_ack(.received))]
    AckMismatch {
        /// Expected acknowledgment byte
        expected: u8,
        /// Byte received instead, `None` if nothing arrived
        received: Option<u8>,
    },

    /// Requested current cannot be encoded
    #[error("Current {amps} A cannot be encoded: {reason}")]
    EncodingRange {
        /// Requested current
        amps: f64,
        /// Why it was rejected
        reason: String,
    },

    /// Request parameters are invalid
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Configuration file could not be parsed
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

fn fmt_ack(received: &Option<u8>) -> String {
    match received {
        Some(byte) => format!("{byte:#04x}"),
        None => "no reply".to_string(),
    }
}

impl MagnetError {
    /// True for failures to establish a session.
    pub fn is_connect_error(&self) -> bool {
        matches!(
            self,
            MagnetError::PortBusy { .. }
                | MagnetError::PortUnavailable { .. }
                | MagnetError::InvalidPort(_)
        )
    }

    /// True for failures the caller may reasonably retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, MagnetError::Timeout | MagnetError::AckMismatch { .. })
    }
}

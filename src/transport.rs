//! Serial session management and the byte-level [`Transport`] seam.

use log::{info, trace, warn};
use serialport::SerialPort;
use std::collections::BTreeSet;
use std::io::{ErrorKind, Read, Write};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::codec::hex;
use crate::constants::*;
use crate::error::{MagnetError, Result};
use crate::types::ConnectionState;

/// Blocking byte channel to the device, one request in flight at a time.
pub trait Transport {
    /// Write all of `bytes`.
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()>;

    /// Read up to `count` bytes, waiting at most `timeout` in total.
    ///
    /// Returns [`MagnetError::Timeout`] when nothing arrives. A reply that is
    /// cut short is returned as is; callers check its length.
    fn read_bytes(&mut self, count: usize, timeout: Duration) -> Result<Vec<u8>>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        (**self).write_bytes(bytes)
    }

    fn read_bytes(&mut self, count: usize, timeout: Duration) -> Result<Vec<u8>> {
        (**self).read_bytes(count, timeout)
    }
}

/// Port names currently held by a live session in this process
static CLAIMED_PORTS: Mutex<BTreeSet<String>> = Mutex::new(BTreeSet::new());

/// Exclusive in-process claim on a port name, released on drop
#[derive(Debug)]
struct PortClaim {
    port: String,
}

impl PortClaim {
    fn acquire(port: &str) -> Result<Self> {
        let mut claimed = CLAIMED_PORTS.lock().unwrap_or_else(|e| e.into_inner());
        if !claimed.insert(port.to_string()) {
            return Err(MagnetError::PortBusy {
                port: port.to_string(),
            });
        }
        Ok(PortClaim {
            port: port.to_string(),
        })
    }
}

impl Drop for PortClaim {
    fn drop(&mut self) {
        let mut claimed = CLAIMED_PORTS.lock().unwrap_or_else(|e| e.into_inner());
        claimed.remove(&self.port);
    }
}

/// An open serial connection to one electromagnet power supply.
///
/// Owned by exactly one caller. The port is released on [`disconnect`](Self::disconnect)
/// or when the session is dropped.
pub struct SerialSession {
    port_name: String,
    port: Option<Box<dyn SerialPort>>,
    state: ConnectionState,
    claim: Option<PortClaim>,
}

impl std::fmt::Debug for SerialSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialSession")
            .field("port_name", &self.port_name)
            .field("state", &self.state)
            .finish()
    }
}

impl SerialSession {
    /// Open `port_name` at 19200 baud, 8-N-1, without flow control.
    ///
    /// Fails with [`MagnetError::PortBusy`] if another session in this process
    /// holds the port, or the OS reports it as taken (typically because the
    /// vendor software still has it open).
    pub fn connect(port_name: &str, timeout: Duration) -> Result<Self> {
        if port_name.trim().is_empty() {
            return Err(MagnetError::InvalidPort(port_name.to_string()));
        }

        let claim = PortClaim::acquire(port_name).map_err(|e| {
            warn!("{} is already held by another session", port_name);
            e
        })?;

        let mut session = SerialSession {
            port_name: port_name.to_string(),
            port: None,
            state: ConnectionState::Connecting,
            claim: Some(claim),
        };

        info!("Connecting to {} at {} baud...", port_name, BAUD_RATE);
        let opened = serialport::new(port_name, BAUD_RATE)
            .data_bits(DATA_BITS)
            .parity(PARITY)
            .stop_bits(STOP_BITS)
            .flow_control(FLOW_CONTROL)
            .timeout(timeout)
            .open();

        let port = match opened {
            Ok(port) => port,
            Err(e) => {
                session.disconnect();
                return Err(classify_open_error(port_name, e));
            }
        };

        if let Err(e) = port.clear(serialport::ClearBuffer::All) {
            session.disconnect();
            return Err(e.into());
        }

        session.port = Some(port);
        session.state = ConnectionState::Connected;
        info!("Connected to {}", port_name);
        Ok(session)
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Release the port. Safe to call any number of times.
    pub fn disconnect(&mut self) {
        let was_open = self.port.take().is_some();
        self.claim = None;
        self.state = ConnectionState::Disconnected;
        if was_open {
            info!("Disconnected from {}", self.port_name);
        }
    }

    fn port_mut(&mut self) -> Result<&mut Box<dyn SerialPort>> {
        self.port.as_mut().ok_or(MagnetError::NotConnected)
    }
}

impl Drop for SerialSession {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl Transport for SerialSession {
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let port = self.port_mut()?;
        // Drop stale replies so they are never mistaken for this command's answer
        port.clear(serialport::ClearBuffer::Input)?;
        trace!("Sending:  {}", hex(bytes));
        port.write_all(bytes)?;
        port.flush()?;
        Ok(())
    }

    fn read_bytes(&mut self, count: usize, timeout: Duration) -> Result<Vec<u8>> {
        let port = self.port_mut()?;
        let deadline = Instant::now() + timeout;
        let mut buffer = vec![0u8; count];
        let mut filled = 0;

        while filled < count {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            port.set_timeout(remaining)?;
            match port.read(&mut buffer[filled..]) {
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::TimedOut => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        buffer.truncate(filled);
        trace!("Received: {}", hex(&buffer));
        if count > 0 && buffer.is_empty() {
            return Err(MagnetError::Timeout);
        }
        Ok(buffer)
    }
}

fn classify_open_error(port_name: &str, error: serialport::Error) -> MagnetError {
    use serialport::ErrorKind as Kind;

    let busy = matches!(
        error.kind(),
        Kind::Io(ErrorKind::PermissionDenied) | Kind::Io(ErrorKind::AddrInUse)
    ) || error.description.to_lowercase().contains("busy");

    match error.kind() {
        Kind::InvalidInput => MagnetError::InvalidPort(port_name.to_string()),
        _ if busy => {
            warn!(
                "{} is busy. Is the device plugged in and is the vendor software closed?",
                port_name
            );
            MagnetError::PortBusy {
                port: port_name.to_string(),
            }
        }
        _ => MagnetError::PortUnavailable {
            port: port_name.to_string(),
            source: error,
        },
    }
}

//! Runtime configuration: port selection, calibration and timing.
//!
//! Everything here may legitimately differ between units or setups. Wire
//! format constants live in [`crate::constants`] instead.
//!
//! ```toml
//! port = "/dev/ttyUSB0"
//!
//! [calibration]
//! counts_per_amp = 324.1
//! offset_counts = 0.0
//! max_amps = 4.0
//!
//! [timing]
//! read_timeout_ms = 2000
//! poll_interval_ms = 250
//! startup_delay_sec = -0.05
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::constants::{DEFAULT_COUNTS_PER_AMP, POLL_INTERVAL_MS, TIMEOUT_MS};
use crate::error::{MagnetError, Result};

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MagnetConfig {
    /// Serial resource identifier, e.g. `/dev/ttyUSB0` or `COM5`
    pub port: String,
    pub calibration: Calibration,
    pub timing: Timing,
}

impl Default for MagnetConfig {
    fn default() -> Self {
        MagnetConfig {
            port: "/dev/ttyUSB0".to_string(),
            calibration: Calibration::default(),
            timing: Timing::default(),
        }
    }
}

impl MagnetConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: MagnetConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.port.trim().is_empty() {
            return Err(MagnetError::Config("port must not be empty".to_string()));
        }
        self.calibration.validate()?;
        self.timing.validate()
    }
}

/// Linear amps-to-counts mapping of one particular unit.
///
/// `counts = offset_counts + counts_per_amp * |amps|`, rounded to the nearest
/// integer. The default slope comes from packet captures of a single device
/// and is not guaranteed to hold for other units or firmware.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Calibration {
    pub counts_per_amp: f64,
    pub offset_counts: f64,
    /// Optional rating limit; larger magnitudes are rejected before encoding
    pub max_amps: Option<f64>,
}

impl Default for Calibration {
    fn default() -> Self {
        Calibration {
            counts_per_amp: DEFAULT_COUNTS_PER_AMP,
            offset_counts: 0.0,
            max_amps: None,
        }
    }
}

impl Calibration {
    /// Derive a calibration from two captured `(amps, counts)` pairs.
    pub fn from_points(a: (f64, f64), b: (f64, f64)) -> Result<Self> {
        let (amps_a, counts_a) = a;
        let (amps_b, counts_b) = b;
        if ![amps_a, counts_a, amps_b, counts_b].iter().all(|v| v.is_finite()) {
            return Err(MagnetError::Config("calibration points must be finite".to_string()));
        }
        if amps_a.abs() == amps_b.abs() {
            return Err(MagnetError::Config(
                "calibration points need two distinct current magnitudes".to_string(),
            ));
        }

        let counts_per_amp = (counts_b - counts_a) / (amps_b.abs() - amps_a.abs());
        let calibration = Calibration {
            counts_per_amp,
            offset_counts: counts_a - counts_per_amp * amps_a.abs(),
            max_amps: None,
        };
        calibration.validate()?;
        Ok(calibration)
    }

    pub fn with_max_amps(mut self, max_amps: f64) -> Self {
        self.max_amps = Some(max_amps);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.counts_per_amp.is_finite() || self.counts_per_amp <= 0.0 {
            return Err(MagnetError::Config(format!(
                "counts_per_amp must be positive, got {}",
                self.counts_per_amp
            )));
        }
        if !self.offset_counts.is_finite() {
            return Err(MagnetError::Config("offset_counts must be finite".to_string()));
        }
        if let Some(max) = self.max_amps {
            if !max.is_finite() || max <= 0.0 {
                return Err(MagnetError::Config(format!("max_amps must be positive, got {max}")));
            }
        }
        Ok(())
    }
}

/// Timeouts and hold-phase pacing
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timing {
    pub read_timeout_ms: u64,
    /// Zero disables polling during the hold phase
    pub poll_interval_ms: u64,
    /// Compensates measured device latency; may be negative
    pub startup_delay_sec: f64,
}

impl Default for Timing {
    fn default() -> Self {
        Timing {
            read_timeout_ms: TIMEOUT_MS,
            poll_interval_ms: POLL_INTERVAL_MS,
            startup_delay_sec: 0.0,
        }
    }
}

impl Timing {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn poll_interval(&self) -> Option<Duration> {
        (self.poll_interval_ms > 0).then(|| Duration::from_millis(self.poll_interval_ms))
    }

    pub fn validate(&self) -> Result<()> {
        if self.read_timeout_ms == 0 {
            return Err(MagnetError::Config("read_timeout_ms must be non-zero".to_string()));
        }
        if !self.startup_delay_sec.is_finite() {
            return Err(MagnetError::Config("startup_delay_sec must be finite".to_string()));
        }
        Ok(())
    }
}

//! Pulse Example
//!
//! Pulses the electromagnet once and reports the field seen during and after the hold.
//!
//! Usage:
//!   cargo run --example pulse -- /dev/ttyUSB0 1.0 2.0   # port, amps, seconds
//!   cargo run --example pulse -- magnet.toml -0.5 1.5   # TOML config instead of a port
//!
//! Set RUST_LOG environment variable to control logging:
//!   RUST_LOG=trace cargo run --example pulse -- COM5 1.0 2.0

use holmarc_magnet::{Magnet, MagnetConfig, MagnetError, Result};
use log::{error, info};

fn parse_arg(value: Option<String>, default: f64, name: &str) -> Result<f64> {
    match value {
        Some(text) => text
            .parse()
            .map_err(|_| MagnetError::InvalidRequest(format!("{name} must be a number, got {text:?}"))),
        None => Ok(default),
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let target = args.next().unwrap_or_else(|| MagnetConfig::default().port);
    let amps = parse_arg(args.next(), 1.0, "amps")?;
    let seconds = parse_arg(args.next(), 2.0, "seconds")?;

    let config = if target.ends_with(".toml") {
        MagnetConfig::load(&target)?
    } else {
        MagnetConfig {
            port: target,
            ..MagnetConfig::default()
        }
    };

    let mut magnet = match Magnet::connect(&config) {
        Ok(magnet) => magnet,
        Err(e) if e.is_connect_error() => {
            error!("Could not connect: {}", e);
            error!("Is the device plugged in and is the vendor software closed?");
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    let report = magnet.pulse(amps, seconds)?;
    info!(
        "Held {} A for {:.3} s, {} samples, {} failed polls",
        report.command.amps,
        report.hold_elapsed.as_secs_f64(),
        report.samples.len(),
        report.poll_failures
    );
    for sample in &report.samples {
        info!("  t={:>6.3} s  {:>8.1} mT", sample.elapsed.as_secs_f64(), sample.reading.value_mt());
    }
    match &report.final_field {
        Ok(reading) => info!("Field after pulse: {} mT", reading.value_mt()),
        Err(e) => error!("Magnet stopped, but the final reading failed: {}", e),
    }

    magnet.disconnect();
    Ok(())
}

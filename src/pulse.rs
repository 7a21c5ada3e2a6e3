//! The set, hold, stop workflow built on top of the command exchanges.
//!
//! Whatever happens while the current is held, the stop command is sent
//! exactly once before [`Magnet::pulse`] returns. Polling during the hold is
//! purely observational and never ends it early.

use chrono::Utc;
use log::{info, warn};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{MagnetError, Result};
use crate::protocol::Magnet;
use crate::transport::Transport;
use crate::types::{FieldSample, PulseReport, PulseRequest};

/// Hold-phase schedule resolved from a request
#[derive(Debug, Clone, Copy)]
struct HoldPlan {
    /// Total hold length, `duration + startup_delay`
    hold: Duration,
    /// When polling starts, relative to the end of the set-value exchange
    first_poll: Duration,
}

impl HoldPlan {
    fn new(request: &PulseRequest) -> Result<Self> {
        if !request.duration_sec.is_finite() || request.duration_sec < 0.0 {
            return Err(MagnetError::InvalidRequest(format!(
                "pulse duration must be a non-negative number of seconds, got {}",
                request.duration_sec
            )));
        }
        if !request.startup_delay_sec.is_finite() {
            return Err(MagnetError::InvalidRequest(format!(
                "startup delay must be finite, got {}",
                request.startup_delay_sec
            )));
        }

        let plan = HoldPlan {
            hold: seconds(request.duration_sec + request.startup_delay_sec)?,
            first_poll: seconds(request.startup_delay_sec)?,
        };
        if Instant::now().checked_add(plan.hold).is_none() {
            return Err(MagnetError::InvalidRequest(format!(
                "hold of {:?} cannot be scheduled",
                plan.hold
            )));
        }
        Ok(plan)
    }
}

/// Non-negative seconds as a `Duration`, negative values clamp to zero
fn seconds(value: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(value.max(0.0))
        .map_err(|e| MagnetError::InvalidRequest(format!("{value} s is not a usable duration: {e}")))
}

struct HoldOutcome {
    samples: Vec<FieldSample>,
    poll_failures: usize,
    elapsed: Duration,
}

impl<T: Transport> Magnet<T> {
    /// Apply `amps` for `duration_sec`, then stop and read the field.
    ///
    /// Uses the configured startup delay. See [`run_pulse`](Self::run_pulse).
    pub fn pulse(&mut self, amps: f64, duration_sec: f64) -> Result<PulseReport> {
        let request =
            PulseRequest::new(amps, duration_sec).with_startup_delay(self.timing().startup_delay_sec);
        self.run_pulse(request)
    }

    /// Run one pulse.
    ///
    /// Invalid requests and unencodable currents fail before any byte is sent.
    /// If the set-value exchange fails after being sent, a stop is still
    /// issued and the set error is returned. Once the hold has started the
    /// only `Err` is a failure to send the stop itself; a failed final reading
    /// is reported in [`PulseReport::final_field`].
    pub fn run_pulse(&mut self, request: PulseRequest) -> Result<PulseReport> {
        let plan = HoldPlan::new(&request)?;
        let command = self.encoder().encode(request.amps)?;

        info!(
            "Pulsing magnet to {} A for {} s (startup delay {} s)",
            request.amps, request.duration_sec, request.startup_delay_sec
        );
        self.ready_check()?;

        let started_at = Utc::now();
        if let Err(e) = self.set_value(&command) {
            warn!("Set value failed ({}), sending stop", e);
            if let Err(stop_err) = self.stop() {
                warn!("Stop after failed set value also failed: {}", stop_err);
            }
            return Err(e);
        }

        let hold = self.hold(plan);
        let stop = self.stop_and_query_field()?;

        let report = PulseReport {
            request,
            command,
            started_at,
            stopped_at: stop.stopped_at,
            hold_elapsed: hold.elapsed,
            samples: hold.samples,
            poll_failures: hold.poll_failures,
            final_field: stop.field,
        };

        match report.final_field_mt() {
            Some(mt) => info!("Pulse complete, field after pulse: {} mT", mt),
            None => info!("Pulse complete, field after pulse unavailable"),
        }
        Ok(report)
    }

    /// Pulse each current in turn, e.g. to map currents onto fields.
    ///
    /// Stops at the first pulse that returns an error.
    pub fn sweep(&mut self, currents: &[f64], hold_sec: f64) -> Result<Vec<PulseReport>> {
        info!("Sweeping {} currents, {} s each", currents.len(), hold_sec);
        currents
            .iter()
            .map(|&amps| self.pulse(amps, hold_sec))
            .collect()
    }

    fn hold(&mut self, plan: HoldPlan) -> HoldOutcome {
        let start = Instant::now();
        // Unrepresentable holds are rejected in HoldPlan::new; fall back to stopping at once
        let deadline = start.checked_add(plan.hold).unwrap_or(start);
        let mut samples = Vec::new();
        let mut poll_failures = 0;

        let Some(interval) = self.timing().poll_interval() else {
            thread::sleep(plan.hold);
            return HoldOutcome {
                samples,
                poll_failures,
                elapsed: start.elapsed(),
            };
        };

        thread::sleep(plan.first_poll.min(plan.hold));
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }

            let timeout = remaining.min(self.timing().read_timeout());
            match self.query_field_within(timeout) {
                Ok(reading) => samples.push(FieldSample {
                    at: Utc::now(),
                    elapsed: start.elapsed(),
                    reading,
                }),
                Err(e) => {
                    poll_failures += 1;
                    warn!("Field poll during hold failed: {}", e);
                }
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            thread::sleep(interval.min(remaining));
        }

        HoldOutcome {
            samples,
            poll_failures,
            elapsed: start.elapsed(),
        }
    }
}

use thiserror::Error;

use super::envelope::EnvelopeLimits;
use super::time::TICK_MS;

/// Guarded transitions must be re-evaluated at least this often.
pub const MIN_REVALIDATE_HZ: u32 = 20;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("revalidate_hz {0} below the required minimum")]
    RevalidateTooSlow(u32),
    #[error("dwell bounds inverted: min {min}ms > max {max}ms")]
    DwellBoundsInverted { min: u64, max: u64 },
    #[error("red_stop_ms {red_stop_ms} shorter than one guard period {tick_ms}ms")]
    RedStopUnreachable { red_stop_ms: u64, tick_ms: u64 },
    #[error("{0} timeout must be non-zero")]
    ZeroTimeout(&'static str),
    #[error("{0} limit must be positive")]
    NonPositiveLimit(&'static str),
    #[error("{0} speed cap outside (0.0, 1.0] m/s")]
    SpeedCapOutOfRange(&'static str),
    #[error("impedance {0} band requires 0 <= min <= max")]
    ImpedanceBandInvalid(&'static str),
}

/// All tunables the controller recognizes. Parsed/loaded elsewhere; the
/// kernel only validates self-consistency at construction and refuses to
/// start on a bad set.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerConfig {
    /// Max latency from RED hazard to halt command.
    pub red_stop_ms: u64,
    /// Guard re-evaluation rate for the control tick.
    pub revalidate_hz: u32,
    pub limits: EnvelopeLimits,
    /// Suppress new engagement this long after a contact cycle ends.
    pub cooldown_ms: u64,
    /// Default TTL handed to consent producers; each record still carries
    /// its own.
    pub consent_ttl_ms: u64,
    /// Max disagreement between the hazard and veto clock sources before
    /// the tick is treated as RED.
    pub clock_drift_budget_ms: u64,
    pub verify_timeout_ms: u64,
    pub approach_timeout_ms: u64,
    pub precontact_timeout_ms: u64,
    pub release_timeout_ms: u64,
    pub retreat_timeout_ms: u64,
    pub escape_timeout_ms: u64,
    /// Require an explicit operator acknowledgement before SAFE_HOLD may
    /// release back to IDLE.
    pub operator_ack_required: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            red_stop_ms: 100,
            revalidate_hz: (1_000 / TICK_MS) as u32,
            limits: EnvelopeLimits::default(),
            cooldown_ms: 10_000,
            consent_ttl_ms: 60_000,
            clock_drift_budget_ms: 5,
            // 100 guard periods at the 50ms budget.
            verify_timeout_ms: 5_000,
            approach_timeout_ms: 10_000,
            precontact_timeout_ms: 2_000,
            release_timeout_ms: 2_000,
            retreat_timeout_ms: 5_000,
            escape_timeout_ms: 1_000,
            operator_ack_required: true,
        }
    }
}

impl ControllerConfig {
    pub fn tick_period_ms(&self) -> u64 {
        1_000 / self.revalidate_hz as u64
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.revalidate_hz < MIN_REVALIDATE_HZ {
            return Err(ConfigError::RevalidateTooSlow(self.revalidate_hz));
        }
        if self.limits.dwell_ms_min > self.limits.dwell_ms_max {
            return Err(ConfigError::DwellBoundsInverted {
                min: self.limits.dwell_ms_min,
                max: self.limits.dwell_ms_max,
            });
        }
        // The RED guard can only fire on a tick boundary, so the stop
        // budget must cover at least one full period.
        if self.red_stop_ms < self.tick_period_ms() {
            return Err(ConfigError::RedStopUnreachable {
                red_stop_ms: self.red_stop_ms,
                tick_ms: self.tick_period_ms(),
            });
        }
        for (ms, name) in [
            (self.verify_timeout_ms, "verify"),
            (self.approach_timeout_ms, "approach"),
            (self.precontact_timeout_ms, "precontact"),
            (self.release_timeout_ms, "release"),
            (self.retreat_timeout_ms, "retreat"),
            (self.escape_timeout_ms, "escape"),
        ] {
            if ms == 0 {
                return Err(ConfigError::ZeroTimeout(name));
            }
        }
        for (v, name) in [
            (self.limits.max_force_n, "force"),
            (self.limits.max_torque_nm, "torque"),
            (self.limits.max_temp_c, "temperature"),
            (self.limits.max_current_a, "current"),
        ] {
            if v <= 0.0 {
                return Err(ConfigError::NonPositiveLimit(name));
            }
        }
        for (v, name) in [
            (self.limits.approach_speed_mps, "approach"),
            (self.limits.release_speed_mps, "release"),
        ] {
            if !(v > 0.0 && v <= 1.0) {
                return Err(ConfigError::SpeedCapOutOfRange(name));
            }
        }
        for (band, name) in [
            (&self.limits.impedance_normal, "normal"),
            (&self.limits.impedance_tangential, "tangential"),
        ] {
            if band.min < 0.0 || band.min > band.max {
                return Err(ConfigError::ImpedanceBandInvalid(name));
            }
        }
        Ok(())
    }
}

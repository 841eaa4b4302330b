use serde::{Deserialize, Serialize};

use super::hazard::{HazardLevel, HazardView};
use super::plan::{ContactPlan, ImpedanceBand};
use super::time::MonotonicMs;

/// Configured operating limits for contact. These are the hard caps the
/// veto channels and the envelope evaluator enforce; the planner also reads
/// them to choose values strictly inside.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeLimits {
    pub max_force_n: f64,
    pub max_torque_nm: f64,
    pub max_temp_c: f64,
    pub max_current_a: f64,
    pub dwell_ms_min: u64,
    pub dwell_ms_max: u64,
    pub approach_speed_mps: f64,
    pub release_speed_mps: f64,
    pub impedance_normal: ImpedanceBand,
    pub impedance_tangential: ImpedanceBand,
}

impl Default for EnvelopeLimits {
    fn default() -> Self {
        Self {
            max_force_n: 1.2,
            max_torque_nm: 0.8,
            max_temp_c: 41.0,
            max_current_a: 2.0,
            dwell_ms_min: 1_000,
            dwell_ms_max: 3_000,
            approach_speed_mps: 0.15,
            release_speed_mps: 0.20,
            impedance_normal: ImpedanceBand::new(0.3, 0.6),
            impedance_tangential: ImpedanceBand::new(0.1, 0.3),
        }
    }
}

/// Measured signals sampled once per tick. `hazard_views` carries each
/// independent sensor's classification of the active region; the evaluator
/// combines them with the most-conservative rule.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorFrame {
    pub force_peak_n: f64,
    pub torque_nm: f64,
    pub temp_c: f64,
    pub current_a: f64,
    pub hazard_views: Vec<HazardView>,
    pub sampled_at_ms: MonotonicMs,
}

impl SensorFrame {
    /// A quiescent frame: no load, ambient temperature, all views Green.
    pub fn quiescent(sampled_at_ms: MonotonicMs) -> Self {
        Self {
            force_peak_n: 0.0,
            torque_nm: 0.0,
            temp_c: 22.0,
            current_a: 0.0,
            hazard_views: Vec::new(),
            sampled_at_ms,
        }
    }
}

/// Result of one envelope evaluation. Recomputed every tick; nothing here
/// persists across ticks.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvelopeStatus {
    pub risk_ok: bool,
    pub impedance_ok: bool,
    pub force_ok: bool,
    pub torque_ok: bool,
    pub temp_ok: bool,
    pub current_ok: bool,
    pub effective_hazard: HazardLevel,
    pub force_peak_n: f64,
    pub torque_nm: f64,
    pub temp_c: f64,
    pub current_a: f64,
}

impl EnvelopeStatus {
    /// Any measured over-limit condition. Risk and impedance are gating
    /// conditions, not violations; they block entry rather than force escape.
    pub fn violated(&self) -> bool {
        !(self.force_ok && self.torque_ok && self.temp_ok && self.current_ok)
    }

    pub fn breach_detail(&self) -> Option<String> {
        if self.violated() {
            let mut parts = Vec::new();
            if !self.force_ok {
                parts.push(format!("overforce {:.3}N", self.force_peak_n));
            }
            if !self.torque_ok {
                parts.push(format!("overtorque {:.3}Nm", self.torque_nm));
            }
            if !self.temp_ok {
                parts.push(format!("overtemp {:.1}C", self.temp_c));
            }
            if !self.current_ok {
                parts.push(format!("overcurrent {:.2}A", self.current_a));
            }
            Some(parts.join(", "))
        } else {
            None
        }
    }
}

/// Stateless evaluator. Owns no readings and no history; dwell accumulation
/// lives in the controller state.
#[derive(Debug, Default)]
pub struct RiskEvaluator;

impl RiskEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// Pure function: sensors + plan + limits -> EnvelopeStatus.
    ///
    /// When independent sensors disagree on the hazard classification, the
    /// more restrictive one wins (thermal RED beats optical GREEN).
    pub fn evaluate(
        &self,
        sensors: &SensorFrame,
        plan: Option<&ContactPlan>,
        limits: &EnvelopeLimits,
    ) -> EnvelopeStatus {
        let effective_hazard = sensors
            .hazard_views
            .iter()
            .fold(HazardLevel::Green, |acc, v| {
                HazardLevel::most_conservative(acc, v.level)
            });

        let impedance_ok = match plan {
            Some(p) => {
                limits.impedance_normal.contains(&p.impedance_normal)
                    && limits.impedance_tangential.contains(&p.impedance_tangential)
            }
            // No plan means nothing to hold an impedance against.
            None => true,
        };

        EnvelopeStatus {
            risk_ok: effective_hazard != HazardLevel::Red,
            impedance_ok,
            force_ok: sensors.force_peak_n <= limits.max_force_n,
            torque_ok: sensors.torque_nm <= limits.max_torque_nm,
            temp_ok: sensors.temp_c <= limits.max_temp_c,
            current_ok: sensors.current_a <= limits.max_current_a,
            effective_hazard,
            force_peak_n: sensors.force_peak_n,
            torque_nm: sensors.torque_nm,
            temp_c: sensors.temp_c,
            current_a: sensors.current_a,
        }
    }
}

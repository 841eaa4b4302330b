use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::consent::ConsentMode;
use super::geometry::{Pose, Vector3};
use super::hazard::HazardLevel;
use super::time::MonotonicMs;

/// Opaque reference to an accepted plan. This is all the motion layer and
/// the audit trail ever see of a plan's identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlanRef(pub Uuid);

impl PlanRef {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for PlanRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Engagement suggestion produced by the external nudge policy.
/// The kernel only consumes it; ranking heuristics live outside.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Nudge {
    pub level: HazardLevel,
    pub subject_id: String,
    /// Contact-region tags the nudge is asking to touch.
    pub scope: Vec<String>,
    pub target: Pose,
    pub contact_normal: Vector3,
    pub rationale: String,
    /// 0..1
    pub priority: f64,
    pub expires_at_ms: MonotonicMs,
}

impl Nudge {
    pub fn expired(&self, now_ms: MonotonicMs) -> bool {
        now_ms >= self.expires_at_ms
    }
}

/// (min, max) stiffness band in N/mm.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImpedanceBand {
    pub min: f64,
    pub max: f64,
}

impl ImpedanceBand {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// True when `other` lies entirely inside this band.
    pub fn contains(&self, other: &ImpedanceBand) -> bool {
        self.min <= other.min && other.min <= other.max && other.max <= self.max
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("peak force must be non-negative")]
    NegativeForce,
    #[error("dwell {0}ms outside [0, 10000]ms")]
    DwellOutOfBounds(u64),
    #[error("{0} speed outside (0.0, 1.0] m/s")]
    SpeedOutOfRange(&'static str),
    #[error("impedance {0} band requires min <= max, both non-negative")]
    ImpedanceInvalid(&'static str),
}

/// Concrete contact execution plan, bounded by the configured envelopes.
/// Consent context is carried forward so the pre-contact guard can re-check
/// freshness without reconstructing the request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactPlan {
    pub plan_ref: PlanRef,
    pub subject_id: String,
    pub scope: Vec<String>,
    pub target: Pose,
    pub contact_normal: Vector3,
    pub peak_force_n: f64,
    pub dwell_ms: u64,
    pub approach_speed_mps: f64,
    pub release_speed_mps: f64,
    pub impedance_normal: ImpedanceBand,
    pub impedance_tangential: ImpedanceBand,
    pub consent_mode: ConsentMode,
    pub rationale: String,
}

impl ContactPlan {
    /// Schema-level sanity. Envelope caps are enforced separately by the
    /// software veto channel.
    pub fn validate(&self) -> Result<(), PlanError> {
        if self.peak_force_n < 0.0 {
            return Err(PlanError::NegativeForce);
        }
        if self.dwell_ms > 10_000 {
            return Err(PlanError::DwellOutOfBounds(self.dwell_ms));
        }
        if !(self.approach_speed_mps > 0.0 && self.approach_speed_mps <= 1.0) {
            return Err(PlanError::SpeedOutOfRange("approach"));
        }
        if !(self.release_speed_mps > 0.0 && self.release_speed_mps <= 1.0) {
            return Err(PlanError::SpeedOutOfRange("release"));
        }
        for (band, name) in [
            (&self.impedance_normal, "normal"),
            (&self.impedance_tangential, "tangential"),
        ] {
            if band.min < 0.0 || band.min > band.max {
                return Err(PlanError::ImpedanceInvalid(name));
            }
        }
        Ok(())
    }
}

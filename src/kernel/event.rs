use serde::{Deserialize, Serialize};

use super::audit::AuditEvent;
use super::envelope::SensorFrame;
use super::geometry::Pose;
use super::hazard::HazardSample;
use super::plan::{Nudge, PlanRef};
use super::state::MotionMode;
use super::time::MonotonicMs;
use super::veto::HardwareStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperatorSignal {
    Confirm,
    Deny,
    Clear,
}

/// Everything the state machine reads on one tick, snapshotted before the
/// step runs. No input mutates during guard evaluation.
#[derive(Debug, Clone)]
pub struct TickInputs {
    pub now_ms: MonotonicMs,
    /// The hazard subsystem's clock read at tick start. Compared against
    /// `veto_clock_ms`; disagreement over budget is treated as RED.
    pub hazard_clock_ms: MonotonicMs,
    /// The veto/fault chain's clock read at tick start.
    pub veto_clock_ms: MonotonicMs,
    pub hazard: HazardSample,
    pub nudge: Option<Nudge>,
    pub operator: Option<OperatorSignal>,
    pub sensors: SensorFrame,
    pub hardware: HardwareStatus,
    /// Current end-effector pose, used as corridor start for the software
    /// veto's sampling.
    pub ee_pose: Option<Pose>,
    /// Motion-layer feedback: rest pose reached within tolerance.
    pub rest_reached: bool,
    /// Motion-layer feedback: emergency escape trajectory finished.
    pub escape_complete: bool,
}

impl TickInputs {
    /// A quiet tick: GREEN hazard, nominal hardware, no operator input.
    pub fn quiescent(now_ms: MonotonicMs) -> Self {
        Self {
            now_ms,
            hazard_clock_ms: now_ms,
            veto_clock_ms: now_ms,
            hazard: HazardSample::new(super::hazard::HazardLevel::Green, now_ms),
            nudge: None,
            operator: None,
            sensors: SensorFrame::quiescent(now_ms),
            hardware: HardwareStatus::nominal(now_ms),
            ee_pose: None,
            rest_reached: false,
            escape_complete: false,
        }
    }
}

/// Published once per tick. The 500-1000 Hz force loop selects its profile
/// from this; it never reads controller internals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotionCommand {
    pub mode: MotionMode,
    pub plan_ref: Option<PlanRef>,
}

impl MotionCommand {
    pub fn rest() -> Self {
        Self { mode: MotionMode::Rest, plan_ref: None }
    }
}

/// One tick's full result: the command to publish plus the ordered audit
/// trail for the step.
#[derive(Debug, Clone)]
pub struct TickOutput {
    pub command: MotionCommand,
    pub events: Vec<AuditEvent>,
}

use serde::{Deserialize, Serialize};

use super::envelope::{EnvelopeLimits, EnvelopeStatus};
use super::geometry::Pose;
use super::hazard::HazardLevel;
use super::plan::ContactPlan;
use super::time::MonotonicMs;

/// Scene-aligned hazard lookup. The perception stack implements this; the
/// kernel only ever asks "what level is this pose".
pub trait SafetyMap {
    fn level_at(&self, pose: &Pose) -> HazardLevel;
}

impl<F> SafetyMap for F
where
    F: Fn(&Pose) -> HazardLevel,
{
    fn level_at(&self, pose: &Pose) -> HazardLevel {
        self(pose)
    }
}

/// One channel's answer for the current tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VetoVerdict {
    pub allow: bool,
    pub latched_block: bool,
}

impl VetoVerdict {
    pub fn permits(&self) -> bool {
        self.allow && !self.latched_block
    }
}

/// Independent fault chain snapshot (E-stop, over-limits, watchdog).
/// Read by the hardware channel only; the software channel never sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HardwareStatus {
    pub e_stop: bool,
    pub overtemp: bool,
    pub overcurrent: bool,
    pub overtorque: bool,
    pub watchdog_fault: bool,
    pub sampled_at_ms: MonotonicMs,
}

impl HardwareStatus {
    pub fn nominal(sampled_at_ms: MonotonicMs) -> Self {
        Self { sampled_at_ms, ..Default::default() }
    }
}

/// Edge-latched block flag. Activates on the tripping edge and persists
/// until explicitly cleared, independent of the triggering condition's
/// later state. Each channel owns exactly one, with no sharing.
#[derive(Debug, Clone, Default)]
pub struct VetoLatch {
    engaged: bool,
    reason: String,
    tripped_at_ms: MonotonicMs,
}

impl VetoLatch {
    pub fn trip(&mut self, reason: &str, now_ms: MonotonicMs) {
        // First trip wins; re-trips do not overwrite the original reason.
        if !self.engaged {
            self.engaged = true;
            self.reason = reason.to_string();
            self.tripped_at_ms = now_ms;
        }
    }

    pub fn clear(&mut self) {
        self.engaged = false;
        self.reason.clear();
        self.tripped_at_ms = 0;
    }

    pub fn engaged(&self) -> bool {
        self.engaged
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// Software veto path: plan vs envelope caps, target cell on the safety
/// map, and a coarse straight-line corridor sample from the current pose.
#[derive(Debug, Default)]
pub struct SoftwareVeto {
    latch: VetoLatch,
}

const CORRIDOR_SAMPLES: u32 = 10;

impl SoftwareVeto {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn evaluate(
        &mut self,
        plan: &ContactPlan,
        envelope: &EnvelopeStatus,
        limits: &EnvelopeLimits,
        map: &dyn SafetyMap,
        start_pose: Option<&Pose>,
        now_ms: MonotonicMs,
    ) -> VetoVerdict {
        if self.latch.engaged() {
            return VetoVerdict { allow: false, latched_block: true };
        }

        let allow = match self.check(plan, envelope, limits, map, start_pose) {
            Ok(()) => true,
            Err(reason) => {
                self.latch.trip(&reason, now_ms);
                false
            }
        };

        VetoVerdict { allow, latched_block: self.latch.engaged() }
    }

    pub fn clear(&mut self) {
        self.latch.clear();
    }

    pub fn latched(&self) -> bool {
        self.latch.engaged()
    }

    pub fn latch_reason(&self) -> &str {
        self.latch.reason()
    }

    fn check(
        &self,
        plan: &ContactPlan,
        envelope: &EnvelopeStatus,
        limits: &EnvelopeLimits,
        map: &dyn SafetyMap,
        start_pose: Option<&Pose>,
    ) -> Result<(), String> {
        // 1) Envelope caps
        if plan.peak_force_n > limits.max_force_n {
            return Err(format!(
                "envelope: peak_force {:.3}N > cap {:.3}N",
                plan.peak_force_n, limits.max_force_n
            ));
        }
        if plan.dwell_ms < limits.dwell_ms_min || plan.dwell_ms > limits.dwell_ms_max {
            return Err(format!(
                "envelope: dwell {}ms outside [{},{}]ms",
                plan.dwell_ms, limits.dwell_ms_min, limits.dwell_ms_max
            ));
        }
        if plan.approach_speed_mps > limits.approach_speed_mps {
            return Err("envelope: approach speed over cap".to_string());
        }
        if plan.release_speed_mps > limits.release_speed_mps {
            return Err("envelope: release speed over cap".to_string());
        }
        if !limits.impedance_normal.contains(&plan.impedance_normal)
            || !limits.impedance_tangential.contains(&plan.impedance_tangential)
        {
            return Err("envelope: impedance band outside limits".to_string());
        }

        // 2) Measured envelope already out of bounds
        if let Some(detail) = envelope.breach_detail() {
            return Err(format!("envelope: {}", detail));
        }

        // 3) Target cell safety
        if map.level_at(&plan.target) == HazardLevel::Red {
            return Err("safety_map: target RED".to_string());
        }

        // 4) Corridor sampling, start -> target, any RED vetoes
        if let Some(start) = start_pose {
            if !corridor_clear(start, &plan.target, map) {
                return Err("safety_map: corridor contains RED".to_string());
            }
        }

        Ok(())
    }
}

/// Coarse straight-line sampling between start and target.
fn corridor_clear(start: &Pose, target: &Pose, map: &dyn SafetyMap) -> bool {
    let run = target.xyz.sub(&start.xyz);
    for k in 1..=CORRIDOR_SAMPLES {
        let alpha = k as f64 / (CORRIDOR_SAMPLES + 1) as f64;
        let p = Pose {
            frame: target.frame.clone(),
            xyz: start.xyz.add(&run.scale(alpha)),
            rpy: target.rpy,
        };
        if map.level_at(&p) == HazardLevel::Red {
            return false;
        }
    }
    true
}

/// Hardware veto path: reads the independent fault chain only. Structurally
/// the mirror of the software channel, with its own latch and no shared
/// state between the two.
#[derive(Debug, Default)]
pub struct HardwareVeto {
    latch: VetoLatch,
}

impl HardwareVeto {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn evaluate(&mut self, status: &HardwareStatus, now_ms: MonotonicMs) -> VetoVerdict {
        if self.latch.engaged() {
            return VetoVerdict { allow: false, latched_block: true };
        }

        let fault = if status.e_stop {
            Some("hw: e_stop")
        } else if status.watchdog_fault {
            Some("hw: watchdog_fault")
        } else if status.overtemp {
            Some("hw: overtemp")
        } else if status.overcurrent {
            Some("hw: overcurrent")
        } else if status.overtorque {
            Some("hw: overtorque")
        } else {
            None
        };

        let allow = match fault {
            Some(reason) => {
                self.latch.trip(reason, now_ms);
                false
            }
            None => true,
        };

        VetoVerdict { allow, latched_block: self.latch.engaged() }
    }

    pub fn clear(&mut self) {
        self.latch.clear();
    }

    pub fn latched(&self) -> bool {
        self.latch.engaged()
    }

    pub fn latch_reason(&self) -> &str {
        self.latch.reason()
    }
}

/// Dual-channel consensus: both channels must currently allow and neither
/// may be latched. Plain boolean AND, no cross-channel reads.
pub fn dual_channel_ok(software: &VetoVerdict, hardware: &VetoVerdict) -> bool {
    software.permits() && hardware.permits()
}

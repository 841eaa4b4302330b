use super::consent::ConsentMode;
use super::envelope::EnvelopeLimits;
use super::plan::{ContactPlan, Nudge, PlanError, PlanRef};

/// Optional hints to bias plan selection. Never exceed configured caps;
/// everything here is clamped.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlannerHints {
    pub peak_force_target_n: Option<f64>,
    pub dwell_ms_target: Option<u64>,
    pub approach_speed_mps: Option<f64>,
    pub release_speed_mps: Option<f64>,
}

/// Force target sits under the cap unless the caller asks for more,
/// in which case the cap still wins.
const FORCE_HEADROOM: f64 = 0.85;

/// Transforms an accepted nudge into a concrete plan strictly inside the
/// configured envelopes. The veto channels re-validate the result; this
/// stage only chooses values, it grants nothing.
#[derive(Debug, Default)]
pub struct ContactPlanner;

impl ContactPlanner {
    pub fn new() -> Self {
        Self
    }

    /// Nudge + consent context -> ContactPlan, or None on incomplete input.
    pub fn plan(
        &self,
        nudge: &Nudge,
        consent_mode: ConsentMode,
        limits: &EnvelopeLimits,
        hints: Option<&PlannerHints>,
    ) -> Result<ContactPlan, PlanError> {
        let hints = hints.copied().unwrap_or_default();

        let force_target = hints
            .peak_force_target_n
            .unwrap_or(FORCE_HEADROOM * limits.max_force_n);
        let peak_force_n = force_target.min(limits.max_force_n);

        let dwell_target = hints
            .dwell_ms_target
            .unwrap_or((limits.dwell_ms_min + limits.dwell_ms_max) / 2);
        let dwell_ms = dwell_target.clamp(limits.dwell_ms_min, limits.dwell_ms_max);

        let approach_speed_mps = hints
            .approach_speed_mps
            .unwrap_or(limits.approach_speed_mps)
            .min(limits.approach_speed_mps);
        let release_speed_mps = hints
            .release_speed_mps
            .unwrap_or(limits.release_speed_mps)
            .min(limits.release_speed_mps);

        let plan = ContactPlan {
            plan_ref: PlanRef::generate(),
            subject_id: nudge.subject_id.clone(),
            scope: nudge.scope.clone(),
            target: nudge.target.clone(),
            contact_normal: nudge.contact_normal,
            peak_force_n,
            dwell_ms,
            approach_speed_mps,
            release_speed_mps,
            // Planner passes the full allowed bands through; the controller
            // selects a working point inside them.
            impedance_normal: limits.impedance_normal,
            impedance_tangential: limits.impedance_tangential,
            consent_mode,
            rationale: nudge.rationale.clone(),
        };
        plan.validate()?;
        Ok(plan)
    }
}

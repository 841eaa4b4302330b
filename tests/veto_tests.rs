use tactus::kernel::consent::ConsentMode;
use tactus::kernel::envelope::{EnvelopeLimits, RiskEvaluator, SensorFrame};
use tactus::kernel::geometry::{Pose, Vector3};
use tactus::kernel::hazard::HazardLevel;
use tactus::kernel::plan::{ContactPlan, ImpedanceBand, PlanRef};
use tactus::kernel::veto::{
    dual_channel_ok, HardwareStatus, HardwareVeto, SafetyMap, SoftwareVeto,
};

fn plan_within(limits: &EnvelopeLimits) -> ContactPlan {
    ContactPlan {
        plan_ref: PlanRef::generate(),
        subject_id: "person-1".to_string(),
        scope: vec!["shoulder_contact".to_string()],
        target: Pose::world(Vector3::new(0.4, 0.1, 1.1)),
        contact_normal: Vector3::new(0.0, 0.0, 1.0),
        peak_force_n: 1.0,
        dwell_ms: 1_500,
        approach_speed_mps: 0.15,
        release_speed_mps: 0.20,
        impedance_normal: limits.impedance_normal,
        impedance_tangential: limits.impedance_tangential,
        consent_mode: ConsentMode::Explicit,
        rationale: "test".to_string(),
    }
}

fn status_for(plan: &ContactPlan, limits: &EnvelopeLimits) -> tactus::kernel::envelope::EnvelopeStatus {
    RiskEvaluator::new().evaluate(&SensorFrame::quiescent(0), Some(plan), limits)
}

fn green(_: &Pose) -> HazardLevel {
    HazardLevel::Green
}

#[test]
fn software_allows_a_plan_inside_caps() {
    let limits = EnvelopeLimits::default();
    let plan = plan_within(&limits);
    let env = status_for(&plan, &limits);
    let mut sw = SoftwareVeto::new();

    let verdict = sw.evaluate(&plan, &env, &limits, &green, None, 1_000);
    assert!(verdict.allow);
    assert!(!verdict.latched_block);
    assert!(dual_channel_ok(
        &verdict,
        &HardwareVeto::new().evaluate(&HardwareStatus::nominal(1_000), 1_000)
    ));
}

#[test]
fn software_vetoes_overforce_plan_and_latches() {
    let limits = EnvelopeLimits::default();
    let mut plan = plan_within(&limits);
    plan.peak_force_n = limits.max_force_n + 0.5;
    let env = status_for(&plan, &limits);
    let mut sw = SoftwareVeto::new();

    let verdict = sw.evaluate(&plan, &env, &limits, &green, None, 1_000);
    assert!(!verdict.allow);
    assert!(verdict.latched_block);
    assert!(sw.latch_reason().contains("peak_force"), "reason: {}", sw.latch_reason());
}

#[test]
fn software_vetoes_red_target() {
    let limits = EnvelopeLimits::default();
    let plan = plan_within(&limits);
    let env = status_for(&plan, &limits);
    let red_target = |pose: &Pose| {
        if pose.xyz.sub(&plan.target.xyz).norm() < 1e-9 {
            HazardLevel::Red
        } else {
            HazardLevel::Green
        }
    };
    let mut sw = SoftwareVeto::new();

    let verdict = sw.evaluate(&plan, &env, &limits, &red_target, None, 1_000);
    assert!(!verdict.allow);
    assert!(sw.latch_reason().contains("target RED"));
}

#[test]
fn software_vetoes_red_corridor() {
    let limits = EnvelopeLimits::default();
    let plan = plan_within(&limits);
    let env = status_for(&plan, &limits);
    // RED band midway between start and target; both endpoints green.
    let wall = |pose: &Pose| {
        if (pose.xyz.x - 0.2).abs() < 0.05 {
            HazardLevel::Red
        } else {
            HazardLevel::Green
        }
    };
    let start = Pose::world(Vector3::new(0.0, 0.1, 1.1));
    let mut sw = SoftwareVeto::new();

    let verdict = sw.evaluate(&plan, &env, &limits, &wall, Some(&start), 1_000);
    assert!(!verdict.allow, "a RED corridor sample must veto");
    assert!(sw.latch_reason().contains("corridor"));
}

#[test]
fn hardware_vetoes_each_fault() {
    for (name, status) in [
        ("e_stop", HardwareStatus { e_stop: true, ..HardwareStatus::nominal(0) }),
        ("watchdog", HardwareStatus { watchdog_fault: true, ..HardwareStatus::nominal(0) }),
        ("overtemp", HardwareStatus { overtemp: true, ..HardwareStatus::nominal(0) }),
        ("overcurrent", HardwareStatus { overcurrent: true, ..HardwareStatus::nominal(0) }),
        ("overtorque", HardwareStatus { overtorque: true, ..HardwareStatus::nominal(0) }),
    ] {
        let mut hw = HardwareVeto::new();
        let verdict = hw.evaluate(&status, 1_000);
        assert!(!verdict.allow, "{} must veto", name);
        assert!(verdict.latched_block, "{} must latch", name);
    }
}

#[test]
fn latch_persists_through_allow_conditions() {
    let mut hw = HardwareVeto::new();
    hw.evaluate(&HardwareStatus { e_stop: true, ..HardwareStatus::nominal(0) }, 1_000);
    assert!(hw.latched());

    // The fault goes away; the latch must not.
    for t in [1_050, 1_100, 1_150] {
        let verdict = hw.evaluate(&HardwareStatus::nominal(t), t);
        assert!(!verdict.allow, "a latched channel never allows");
        assert!(verdict.latched_block, "latch must persist without clear()");
    }

    hw.clear();
    let verdict = hw.evaluate(&HardwareStatus::nominal(1_200), 1_200);
    assert!(verdict.allow, "explicit clear restores the channel");
}

#[test]
fn first_trip_reason_is_kept() {
    let mut hw = HardwareVeto::new();
    hw.evaluate(&HardwareStatus { e_stop: true, ..HardwareStatus::nominal(0) }, 1_000);
    // A different fault while latched does not overwrite the original reason.
    hw.evaluate(&HardwareStatus { overtemp: true, ..HardwareStatus::nominal(0) }, 1_050);
    assert!(hw.latch_reason().contains("e_stop"));
}

#[test]
fn channels_are_combined_by_and() {
    let allow = tactus::kernel::veto::VetoVerdict { allow: true, latched_block: false };
    let block = tactus::kernel::veto::VetoVerdict { allow: false, latched_block: true };

    assert!(dual_channel_ok(&allow, &allow));
    assert!(!dual_channel_ok(&allow, &block));
    assert!(!dual_channel_ok(&block, &allow));
    assert!(!dual_channel_ok(&block, &block));
}

#[test]
fn closure_maps_implement_the_seam() {
    let map = |pose: &Pose| {
        if pose.xyz.z > 1.5 {
            HazardLevel::Red
        } else {
            HazardLevel::Yellow
        }
    };
    assert_eq!(map.level_at(&Pose::world(Vector3::new(0.0, 0.0, 2.0))), HazardLevel::Red);
    assert_eq!(map.level_at(&Pose::world(Vector3::new(0.0, 0.0, 1.0))), HazardLevel::Yellow);
}

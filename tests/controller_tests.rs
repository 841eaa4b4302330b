use tokio::sync::mpsc;

use tactus::kernel::config::ControllerConfig;
use tactus::kernel::consent::{ConsentRecord, ConsentSource};
use tactus::kernel::controller::{Controller, Event};
use tactus::kernel::geometry::{Pose, Vector3};
use tactus::kernel::hazard::{HazardLevel, HazardSample};
use tactus::kernel::machine::ContactStateMachine;
use tactus::kernel::plan::Nudge;
use tactus::kernel::state::{ContactState, MotionMode};

fn machine() -> ContactStateMachine {
    ContactStateMachine::new(
        ControllerConfig::default(),
        Box::new(|_: &Pose| HazardLevel::Green),
    )
    .expect("default config must validate")
}

fn nudge(now: u64) -> Nudge {
    Nudge {
        level: HazardLevel::Green,
        subject_id: "person-1".to_string(),
        scope: vec!["shoulder_contact".to_string()],
        target: Pose::world(Vector3::new(0.4, 0.1, 1.1)),
        contact_normal: Vector3::new(0.0, 0.0, 1.0),
        rationale: "support request".to_string(),
        priority: 0.7,
        expires_at_ms: now + 1_200,
    }
}

#[tokio::test]
async fn full_cycle_through_the_driver() {
    let (_tx, rx) = mpsc::channel(16);
    let (mut controller, command_rx) = Controller::new(machine(), rx);

    // Consent and nudge arrive in the same drain.
    let events = vec![
        Event::Hazard(HazardSample::new(HazardLevel::Green, 1_000)),
        Event::ConsentGranted(ConsentRecord::explicit(
            "person-1",
            &["shoulder_contact"],
            ConsentSource::Verbal,
            1_000,
            60_000,
        )),
        Event::Nudge(nudge(1_000)),
        Event::EePose(Pose::world(Vector3::new(0.2, 0.0, 0.9))),
    ];
    let out = controller.tick_step(1_000, events);
    assert_eq!(controller.machine.state(), ContactState::Approach);
    assert_eq!(out.command.mode, MotionMode::Approach);
    assert_eq!(*command_rx.borrow(), out.command, "command must be published");

    controller.tick_step(1_050, vec![]);
    assert_eq!(controller.machine.state(), ContactState::Precontact);

    controller.tick_step(1_100, vec![]);
    assert_eq!(controller.machine.state(), ContactState::Contact);
    assert_eq!(command_rx.borrow().mode, MotionMode::ContactProfile);

    // Dwell completes, then the motion layer reports rest.
    controller.tick_step(2_200, vec![]);
    assert_eq!(controller.machine.state(), ContactState::Release);

    controller.tick_step(2_300, vec![Event::RestReached]);
    assert_eq!(controller.machine.state(), ContactState::Idle);
    assert_eq!(command_rx.borrow().mode, MotionMode::Rest);

    assert!(!controller.audit.is_empty(), "the cycle must leave an audit trail");
}

#[tokio::test]
async fn rest_feedback_is_one_shot() {
    let (_tx, rx) = mpsc::channel(16);
    let (mut controller, _command_rx) = Controller::new(machine(), rx);

    // A rest report consumed while idle must not linger and auto-complete
    // a later withdrawal.
    controller.tick_step(900, vec![Event::RestReached]);

    let events = vec![
        Event::ConsentGranted(ConsentRecord::explicit(
            "person-1",
            &["shoulder_contact"],
            ConsentSource::Verbal,
            1_000,
            60_000,
        )),
        Event::Nudge(nudge(1_000)),
    ];
    controller.tick_step(1_000, events);
    controller.tick_step(1_050, vec![]);
    controller.tick_step(1_100, vec![]);
    assert_eq!(controller.machine.state(), ContactState::Contact);

    controller.tick_step(2_200, vec![]);
    assert_eq!(controller.machine.state(), ContactState::Release);

    // No fresh feedback: the release must keep waiting.
    controller.tick_step(2_250, vec![]);
    assert_eq!(
        controller.machine.state(),
        ContactState::Release,
        "a stale rest report must not complete the release"
    );

    controller.tick_step(2_300, vec![Event::RestReached]);
    assert_eq!(controller.machine.state(), ContactState::Idle);
}

#[tokio::test]
async fn expired_nudge_is_dropped_at_the_boundary() {
    let (_tx, rx) = mpsc::channel(16);
    let (mut controller, _command_rx) = Controller::new(machine(), rx);

    let events = vec![
        Event::ConsentGranted(ConsentRecord::explicit(
            "person-1",
            &["shoulder_contact"],
            ConsentSource::Verbal,
            1_000,
            60_000,
        )),
        Event::Nudge(nudge(0)), // expires at 1_200
    ];
    controller.tick_step(2_000, events);
    assert_eq!(
        controller.machine.state(),
        ContactState::Idle,
        "an expired nudge must not engage"
    );
}

#[tokio::test]
async fn red_hazard_event_halts_and_publishes_rest() {
    let (_tx, rx) = mpsc::channel(16);
    let (mut controller, command_rx) = Controller::new(machine(), rx);

    let events = vec![
        Event::ConsentGranted(ConsentRecord::explicit(
            "person-1",
            &["shoulder_contact"],
            ConsentSource::Verbal,
            1_000,
            60_000,
        )),
        Event::Nudge(nudge(1_000)),
    ];
    controller.tick_step(1_000, events);
    assert_eq!(controller.machine.state(), ContactState::Approach);

    controller.tick_step(
        1_050,
        vec![Event::Hazard(HazardSample::new(HazardLevel::Red, 1_050))],
    );
    assert_eq!(controller.machine.state(), ContactState::SafeHold);
    assert_eq!(command_rx.borrow().mode, MotionMode::Rest);
}

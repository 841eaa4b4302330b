use std::time::Duration;

use tokio::sync::mpsc;

use tactus::kernel::config::ControllerConfig;
use tactus::kernel::consent::{ConsentRecord, ConsentSource};
use tactus::kernel::controller::{Controller, Event};
use tactus::kernel::geometry::{Pose, Vector3};
use tactus::kernel::hazard::{HazardLevel, HazardSample};
use tactus::kernel::machine::ContactStateMachine;
use tactus::kernel::plan::Nudge;
use tactus::kernel::rest::{retreat_duration_ms, RestTargets};
use tactus::kernel::state::MotionMode;
use tactus::kernel::time::MonotonicClock;

// Scripted bench scenario: grant consent, nudge a GREEN shoulder target,
// let the cycle run approach -> contact -> release, then report the audit
// trail. The motion layer is simulated by feeding feedback events.

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();
    tracing::info!("tactus controller booting");

    let clock = MonotonicClock::new();
    let config = ControllerConfig::default();
    let consent_ttl_ms = config.consent_ttl_ms;

    // Scene: everything GREEN except a forbidden block above the table.
    let safety_map = |pose: &Pose| {
        if pose.xyz.z > 1.5 {
            HazardLevel::Red
        } else {
            HazardLevel::Green
        }
    };

    let machine = ContactStateMachine::new(config, Box::new(safety_map))?;

    let (tx, rx) = mpsc::channel(100);
    let (mut controller, mut command_rx) = Controller::new(machine, rx);

    // Simulated motion layer: watch the published command and feed
    // completion events back, the way the real force loop would.
    let feedback_tx = tx.clone();
    tokio::spawn(async move {
        let rest = RestTargets::default();
        loop {
            if command_rx.changed().await.is_err() {
                break;
            }
            let command = *command_rx.borrow();
            match command.mode {
                MotionMode::Retreat => {
                    // Bounded return-to-rest.
                    let ms = retreat_duration_ms(0.12, 0.2);
                    tokio::time::sleep(Duration::from_millis(ms)).await;
                    let _ = feedback_tx.send(Event::RestReached).await;
                    tracing::info!(
                        "motion: rest reached ({} fingertip targets)",
                        rest.tips().len()
                    );
                }
                MotionMode::EmergencyStop => {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    let _ = feedback_tx.send(Event::EscapeComplete).await;
                }
                _ => {}
            }
        }
    });

    // Scripted operator/perception side.
    let script_tx = tx.clone();
    let script_clock = clock;
    tokio::spawn(async move {
        let now = script_clock.now_ms();
        let _ = script_tx
            .send(Event::Hazard(HazardSample::new(HazardLevel::Green, now)))
            .await;
        let _ = script_tx
            .send(Event::ConsentGranted(ConsentRecord::explicit(
                "person-1",
                &["shoulder_contact"],
                ConsentSource::Verbal,
                now,
                consent_ttl_ms,
            )))
            .await;

        let _ = script_tx
            .send(Event::Nudge(Nudge {
                level: HazardLevel::Green,
                subject_id: "person-1".to_string(),
                scope: vec!["shoulder_contact".to_string()],
                target: Pose::world(Vector3::new(0.4, 0.1, 1.1)),
                contact_normal: Vector3::new(0.0, 0.0, 1.0),
                rationale: "support request".to_string(),
                priority: 0.7,
                expires_at_ms: now + 1_200,
            }))
            .await;
        let _ = script_tx
            .send(Event::EePose(Pose::world(Vector3::new(0.2, 0.0, 0.9))))
            .await;
    });

    // Run the control loop for a bounded demo window.
    tokio::select! {
        _ = controller.run() => {}
        _ = tokio::time::sleep(Duration::from_secs(8)) => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupted");
        }
    }

    println!("--- audit trail ({} events) ---", controller.audit.len());
    for event in controller.audit.recent(32) {
        println!("{}", serde_json::to_string(event)?);
    }
    println!("final state: {:?}", controller.machine.state());

    Ok(())
}

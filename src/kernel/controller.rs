use tokio::sync::{mpsc, watch};
use tokio::time::{interval, Duration};
use tracing::{info, warn};

use super::audit::AuditLog;
use super::consent::ConsentRecord;
use super::envelope::SensorFrame;
use super::event::{MotionCommand, OperatorSignal, TickInputs, TickOutput};
use super::geometry::Pose;
use super::hazard::HazardSample;
use super::machine::ContactStateMachine;
use super::plan::Nudge;
use super::time::{MonotonicClock, MonotonicMs, Tick};
use super::veto::HardwareStatus;

/// External signals feeding the control loop. Producers (perception,
/// operator UI, motion layer) send these; the controller drains the queue
/// once per cadence tick and snapshots latest-wins.
#[derive(Debug, Clone)]
pub enum Event {
    Hazard(HazardSample),
    Sensors(SensorFrame),
    Hardware(HardwareStatus),
    Nudge(Nudge),
    Operator(OperatorSignal),
    ConsentGranted(ConsentRecord),
    ConsentRevoked(String),
    EePose(Pose),
    RestReached,
    EscapeComplete,
}

/// Single-threaded actor around the state machine. The machine never sees
/// the channel; it gets one immutable snapshot per tick.
///
/// The emitted command goes out on a watch channel: single writer here,
/// any number of lock-free readers in the fast force loop.
pub struct Controller {
    pub receiver: mpsc::Receiver<Event>,
    pub machine: ContactStateMachine,
    pub audit: AuditLog,
    command_tx: watch::Sender<MotionCommand>,
    clock: MonotonicClock,
    pub tick: Tick,

    // Latest-wins input snapshots. Hazard/sensor/hardware frames persist
    // between arrivals; feedback flags are consumed by the next tick.
    hazard: HazardSample,
    sensors: SensorFrame,
    hardware: HardwareStatus,
    nudge: Option<Nudge>,
    ee_pose: Option<Pose>,
    rest_reached: bool,
    escape_complete: bool,
}

impl Controller {
    pub fn new(
        machine: ContactStateMachine,
        receiver: mpsc::Receiver<Event>,
    ) -> (Self, watch::Receiver<MotionCommand>) {
        let (command_tx, command_rx) = watch::channel(MotionCommand::rest());
        let controller = Self {
            receiver,
            machine,
            audit: AuditLog::new(),
            command_tx,
            clock: MonotonicClock::new(),
            tick: Tick::new(),
            hazard: HazardSample::new(super::hazard::HazardLevel::Green, 0),
            sensors: SensorFrame::quiescent(0),
            hardware: HardwareStatus::nominal(0),
            nudge: None,
            ee_pose: None,
            rest_reached: false,
            escape_complete: false,
        };
        (controller, command_rx)
    }

    /// Pure step: drain the queued events into the snapshot, run the
    /// machine once, publish the command. MUST NOT await.
    pub fn tick_step(&mut self, now_ms: MonotonicMs, events: Vec<Event>) -> TickOutput {
        self.tick = self.tick.next();

        let mut operator = None;
        for event in events {
            match event {
                Event::Hazard(sample) => self.hazard = sample,
                Event::Sensors(frame) => self.sensors = frame,
                Event::Hardware(status) => self.hardware = status,
                Event::Nudge(nudge) => self.nudge = Some(nudge),
                Event::Operator(sig) => operator = Some(sig),
                Event::ConsentGranted(record) => self.machine.consent_mut().grant(record),
                Event::ConsentRevoked(subject) => {
                    self.machine.consent_mut().revoke(&subject);
                }
                Event::EePose(pose) => self.ee_pose = Some(pose),
                Event::RestReached => self.rest_reached = true,
                Event::EscapeComplete => self.escape_complete = true,
            }
        }

        // Expired nudges are dropped at the boundary, not inside guards.
        if let Some(n) = &self.nudge {
            if n.expired(now_ms) {
                self.nudge = None;
            }
        }

        let inputs = TickInputs {
            now_ms,
            // Single-host deployment: both subsystems share this process
            // clock. Split sources would read their own here.
            hazard_clock_ms: now_ms,
            veto_clock_ms: now_ms,
            hazard: self.hazard,
            nudge: self.nudge.clone(),
            operator,
            sensors: self.sensors.clone(),
            hardware: self.hardware,
            ee_pose: self.ee_pose.clone(),
            rest_reached: self.rest_reached,
            escape_complete: self.escape_complete,
        };

        // Feedback flags are one-shot.
        self.rest_reached = false;
        self.escape_complete = false;

        let output = self.machine.tick(&inputs);

        self.audit.record_all(&output.events);
        for event in &output.events {
            match serde_json::to_string(event) {
                Ok(line) => info!(target: "audit", "{}", line),
                Err(e) => warn!("audit serialization failed: {}", e),
            }
        }

        // send_if_modified keeps the fast loop's change notifications
        // meaningful: readers wake only on actual mode/plan changes.
        self.command_tx.send_if_modified(|current| {
            if *current != output.command {
                *current = output.command;
                true
            } else {
                false
            }
        });

        output
    }

    /// Async driver loop. Holds the cadence; all timeout arithmetic stays
    /// inside the machine as deadline comparisons.
    pub async fn run(&mut self) {
        let period = self.machine.config().tick_period_ms();
        info!("contact controller started, tick {}ms", period);

        let mut cadence = interval(Duration::from_millis(period));
        cadence.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            cadence.tick().await;

            let mut events: Vec<Event> = Vec::new();
            while let Ok(event) = self.receiver.try_recv() {
                events.push(event);
            }

            let now_ms = self.clock.now_ms();
            self.tick_step(now_ms, events);
        }
    }
}

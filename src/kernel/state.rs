use serde::{Deserialize, Serialize};

use super::plan::ContactPlan;
use super::time::MonotonicMs;

/// The explicit lifecycle states of a contact interaction.
/// Flat on purpose: every guard stays auditable in one transition table,
/// no hierarchical nesting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContactState {
    /// At rest pose, no engagement in progress.
    Idle,
    /// Awaiting operator confirmation for a YELLOW-level nudge.
    Verify,
    /// Moving toward the target along a checked corridor.
    Approach,
    /// Final pre-touch hold; impedance, risk and consent re-checked here.
    Precontact,
    /// Touching. Dwell accumulates; envelopes enforced every tick.
    Contact,
    /// Normal withdrawal after a completed dwell.
    Release,
    /// Controlled withdrawal after a veto, timeout or plan change.
    Retreat,
    /// Immediate escape after an envelope violation during contact.
    EmergencyRetreat,
    /// Halted. Requires cleared hazards, reset latches and operator
    /// acknowledgement to leave.
    SafeHold,
}

impl Default for ContactState {
    fn default() -> Self {
        Self::Idle
    }
}

/// Commanded motion mode, published once per tick. The fast force loop
/// consumes this as a profile selector, never per-sample commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MotionMode {
    Rest,
    Approach,
    ContactProfile,
    Retreat,
    EmergencyStop,
}

impl ContactState {
    /// Motion outside the moving states is never commanded: everything
    /// else maps to REST, except the emergency escape which is a halt
    /// command, not motion.
    pub fn motion_mode(&self) -> MotionMode {
        match self {
            ContactState::Idle | ContactState::Verify | ContactState::SafeHold => MotionMode::Rest,
            ContactState::Approach | ContactState::Precontact => MotionMode::Approach,
            ContactState::Contact => MotionMode::ContactProfile,
            ContactState::Release | ContactState::Retreat => MotionMode::Retreat,
            ContactState::EmergencyRetreat => MotionMode::EmergencyStop,
        }
    }
}

/// The single mutable core entity. Exactly one instance exists per
/// controller, owned by the state machine and mutated only by its
/// transition function. Reconstructed fresh to Idle on restart.
#[derive(Debug)]
pub struct ControllerState {
    pub current: ContactState,
    pub entered_at_ms: MonotonicMs,
    pub dwell_accum_ms: u64,
    pub active_plan: Option<ContactPlan>,
}

impl ControllerState {
    pub fn new(now_ms: MonotonicMs) -> Self {
        Self {
            current: ContactState::Idle,
            entered_at_ms: now_ms,
            dwell_accum_ms: 0,
            active_plan: None,
        }
    }

    pub fn elapsed_ms(&self, now_ms: MonotonicMs) -> u64 {
        now_ms.saturating_sub(self.entered_at_ms)
    }

    /// Commit a transition. Dwell zeroes on Contact entry; the plan is
    /// dropped synchronously when entering any state that cannot use it,
    /// before the next motion command is emitted.
    pub fn enter(&mut self, next: ContactState, now_ms: MonotonicMs) {
        self.current = next;
        self.entered_at_ms = now_ms;
        match next {
            ContactState::Contact => self.dwell_accum_ms = 0,
            ContactState::Idle
            | ContactState::Retreat
            | ContactState::EmergencyRetreat
            | ContactState::SafeHold => {
                self.active_plan = None;
                self.dwell_accum_ms = 0;
            }
            _ => {}
        }
    }
}

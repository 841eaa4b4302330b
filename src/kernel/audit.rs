use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::state::ContactState;
use super::time::MonotonicMs;

// Allowed in audit payloads: IDs, timestamps, states, short reason strings.
// Forbidden: raw sensor frames, poses of people, anything re-identifying.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditKind {
    /// RED hazard forced a halt into SafeHold.
    HazardStop,
    /// A veto channel tripped its latch this tick.
    VetoTripped,
    /// Transition forced to Retreat by a latched veto.
    VetoAbort,
    /// YELLOW nudge: operator confirmation requested.
    ConfirmRequested,
    /// Operator confirmed; engagement proceeds.
    ConfirmGranted,
    /// Operator denied; back to rest.
    ConfirmDenied,
    /// GREEN nudge accepted, plan begun.
    EngagementStarted,
    /// Ordinary forward progress (e.g. approach reached pre-contact hold).
    Advance,
    /// Dwell timer started, contact profile commanded.
    ContactStarted,
    /// Dwell complete, normal release begun.
    ContactReleased,
    /// Consent no longer fresh at the pre-contact re-check.
    ConsentExpired,
    /// The nudge target changed under an in-flight plan.
    PlanChanged,
    /// Envelope violation during contact; immediate escape.
    EmergencyEscape,
    /// Escape finished; annunciating and holding.
    EscapeComplete,
    /// A per-state deadline expired and forced a withdrawal.
    TimeoutAbort,
    /// Rest pose reached, cycle closed.
    RestReached,
    /// Operator cleared the latches.
    LatchCleared,
    /// SafeHold released back to Idle.
    SafeHoldReleased,
    /// Clock drift over budget, consent race, or similar. Never silent.
    InvariantViolation,
}

/// Append-only audit record. Produced by the state machine, consumed by
/// the external logger; the kernel never reads these back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub kind: AuditKind,
    pub at_ms: MonotonicMs,
    pub state_from: ContactState,
    pub state_to: ContactState,
    pub detail: String,
}

impl AuditEvent {
    pub fn new(
        kind: AuditKind,
        at_ms: MonotonicMs,
        state_from: ContactState,
        state_to: ContactState,
        detail: impl Into<String>,
    ) -> Self {
        Self { kind, at_ms, state_from, state_to, detail: detail.into() }
    }
}

const MAX_EVENTS: usize = 10_000;

/// Bounded in-memory audit sink for the driver. Persistence beyond this
/// buffer is the external logger's job.
#[derive(Debug, Default)]
pub struct AuditLog {
    buffer: VecDeque<AuditEvent>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self { buffer: VecDeque::with_capacity(MAX_EVENTS) }
    }

    pub fn record(&mut self, event: AuditEvent) {
        if self.buffer.len() >= MAX_EVENTS {
            self.buffer.pop_front();
        }
        self.buffer.push_back(event);
    }

    pub fn record_all(&mut self, events: &[AuditEvent]) {
        for e in events {
            self.record(e.clone());
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn recent(&self, n: usize) -> impl Iterator<Item = &AuditEvent> {
        let skip = self.buffer.len().saturating_sub(n);
        self.buffer.iter().skip(skip)
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

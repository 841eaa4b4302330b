use super::audit::{AuditEvent, AuditKind};
use super::config::{ConfigError, ControllerConfig};
use super::consent::{ConsentLedger, ConsentMode, ConsentStatus};
use super::envelope::{EnvelopeStatus, RiskEvaluator};
use super::event::{MotionCommand, OperatorSignal, TickInputs, TickOutput};
use super::hazard::HazardLevel;
use super::plan::Nudge;
use super::planner::ContactPlanner;
use super::state::{ContactState, ControllerState};
use super::time::MonotonicMs;
use super::veto::{dual_channel_ok, HardwareVeto, SafetyMap, SoftwareVeto, VetoVerdict};

/// The single authority over contact state. Owns the controller state, both
/// veto channels, the consent ledger and the envelope evaluator; nothing
/// else mutates any of them.
///
/// `tick` is pure with respect to time: the caller samples the clock once
/// and passes `now_ms` in, so every deadline is a comparison, never a sleep.
pub struct ContactStateMachine {
    config: ControllerConfig,
    state: ControllerState,
    consent: ConsentLedger,
    software: SoftwareVeto,
    hardware: HardwareVeto,
    evaluator: RiskEvaluator,
    planner: ContactPlanner,
    safety_map: Box<dyn SafetyMap + Send>,
    /// Set when RED forces a halt; only an operator clear resets it.
    hazard_latched: bool,
    /// Operator acknowledgement observed while holding.
    operator_ack: bool,
    /// Nudge held across the confirmation window.
    pending_nudge: Option<Nudge>,
    /// End of the last contact, for the social cooldown.
    last_contact_end_ms: Option<MonotonicMs>,
}

impl ContactStateMachine {
    /// Construction validates the configuration and refuses to start on an
    /// inconsistent set.
    pub fn new(
        config: ControllerConfig,
        safety_map: Box<dyn SafetyMap + Send>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            state: ControllerState::new(0),
            consent: ConsentLedger::new(),
            software: SoftwareVeto::new(),
            hardware: HardwareVeto::new(),
            evaluator: RiskEvaluator::new(),
            planner: ContactPlanner::new(),
            safety_map,
            hazard_latched: false,
            operator_ack: false,
            pending_nudge: None,
            last_contact_end_ms: None,
        })
    }

    pub fn state(&self) -> ContactState {
        self.state.current
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn consent(&self) -> &ConsentLedger {
        &self.consent
    }

    /// Grants and revocations are routed through here by the driver before
    /// the tick runs; the machine itself only queries.
    pub fn consent_mut(&mut self) -> &mut ConsentLedger {
        &mut self.consent
    }

    pub fn dwell_accum_ms(&self) -> u64 {
        self.state.dwell_accum_ms
    }

    pub fn software_latched(&self) -> bool {
        self.software.latched()
    }

    pub fn hardware_latched(&self) -> bool {
        self.hardware.latched()
    }

    pub fn hazard_latched(&self) -> bool {
        self.hazard_latched
    }

    /// One control-plane step: snapshot inputs, evaluate guards in priority
    /// order, commit at most one transition, emit the command and audit
    /// trail. Must not await or block.
    pub fn tick(&mut self, inputs: &TickInputs) -> TickOutput {
        let now = inputs.now_ms;
        let from = self.state.current;
        let mut events: Vec<AuditEvent> = Vec::new();

        // === 1. SNAPSHOT & CLOCK GUARD ===
        // Hazard and veto channels may run on different clock sources.
        // Disagreement over budget is fail-safe RED until resynchronized.
        let mut hazard = inputs.hazard.level;
        let drift = inputs.hazard_clock_ms.abs_diff(inputs.veto_clock_ms);
        if drift > self.config.clock_drift_budget_ms {
            hazard = HazardLevel::Red;
            events.push(AuditEvent::new(
                AuditKind::InvariantViolation,
                now,
                from,
                from,
                format!(
                    "clock drift {}ms over budget {}ms",
                    drift, self.config.clock_drift_budget_ms
                ),
            ));
        }
        let red = hazard == HazardLevel::Red;

        // === 2. DWELL ACCUMULATION ===
        if from == ContactState::Contact {
            self.state.dwell_accum_ms = self.state.elapsed_ms(now);
        }

        // === 3. ENVELOPE EVALUATION ===
        let env = self.evaluator.evaluate(
            &inputs.sensors,
            self.state.active_plan.as_ref(),
            &self.config.limits,
        );

        // === 4. VETO CHANNELS (independent reads, combined by AND) ===
        let hw_was_latched = self.hardware.latched();
        let hw_verdict = self.hardware.evaluate(&inputs.hardware, now);
        if self.hardware.latched() && !hw_was_latched {
            events.push(AuditEvent::new(
                AuditKind::VetoTripped,
                now,
                from,
                from,
                format!("hardware channel: {}", self.hardware.latch_reason()),
            ));
        }

        let sw_was_latched = self.software.latched();
        let sw_verdict = match self.state.active_plan.clone() {
            Some(plan) => self.software.evaluate(
                &plan,
                &env,
                &self.config.limits,
                self.safety_map.as_ref(),
                inputs.ee_pose.as_ref(),
                now,
            ),
            // No plan in flight: nothing to validate, but a standing latch
            // still blocks.
            None => VetoVerdict {
                allow: !self.software.latched(),
                latched_block: self.software.latched(),
            },
        };
        if self.software.latched() && !sw_was_latched {
            events.push(AuditEvent::new(
                AuditKind::VetoTripped,
                now,
                from,
                from,
                format!("software channel: {}", self.software.latch_reason()),
            ));
        }

        // === 5. OPERATOR CLEAR (SafeHold and Idle only) ===
        if inputs.operator == Some(OperatorSignal::Clear)
            && matches!(from, ContactState::SafeHold | ContactState::Idle)
        {
            if self.software.latched() || self.hardware.latched() || self.hazard_latched {
                self.software.clear();
                self.hardware.clear();
                self.hazard_latched = false;
                events.push(AuditEvent::new(
                    AuditKind::LatchCleared,
                    now,
                    from,
                    from,
                    "operator clear",
                ));
            }
            self.operator_ack = true;
        }

        // === 6. GUARDED TRANSITION (first satisfied guard wins) ===
        let latched_any = sw_verdict.latched_block || hw_verdict.latched_block;
        let elapsed = self.state.elapsed_ms(now);
        let mut next = from;

        match from {
            ContactState::Idle => {
                if red {
                    self.hazard_latched = true;
                    next = ContactState::SafeHold;
                    events.push(AuditEvent::new(
                        AuditKind::HazardStop,
                        now,
                        from,
                        next,
                        "hazard RED",
                    ));
                } else if let Some(nudge) = inputs.nudge.as_ref() {
                    if !nudge.expired(now) && self.cooldown_elapsed(now) {
                        match nudge.level {
                            HazardLevel::Yellow => {
                                self.pending_nudge = Some(nudge.clone());
                                next = ContactState::Verify;
                                events.push(AuditEvent::new(
                                    AuditKind::ConfirmRequested,
                                    now,
                                    from,
                                    next,
                                    format!("subject {}", nudge.subject_id),
                                ));
                            }
                            HazardLevel::Green => {
                                let status =
                                    self.consent.query(&nudge.subject_id, &nudge.scope, now);
                                if status.is_fresh()
                                    && dual_channel_ok(&sw_verdict, &hw_verdict)
                                {
                                    next = self.begin_plan(
                                        nudge, status, from, now, &mut events,
                                    );
                                }
                            }
                            // The nudge policy must not propose RED targets.
                            HazardLevel::Red => {}
                        }
                    }
                }
            }

            ContactState::Verify => {
                if red {
                    self.hazard_latched = true;
                    next = ContactState::SafeHold;
                    events.push(AuditEvent::new(
                        AuditKind::HazardStop, now, from, next, "hazard RED",
                    ));
                } else if inputs.operator == Some(OperatorSignal::Confirm) {
                    if let Some(nudge) = self.pending_nudge.take() {
                        let status = self.consent.query(&nudge.subject_id, &nudge.scope, now);
                        next = self.begin_plan(&nudge, status, from, now, &mut events);
                        if next == ContactState::Approach {
                            // Rewrite the engagement event as the mandatory
                            // confirmation record.
                            if let Some(last) = events.last_mut() {
                                last.kind = AuditKind::ConfirmGranted;
                            }
                        }
                    }
                } else if inputs.operator == Some(OperatorSignal::Deny) {
                    self.pending_nudge = None;
                    next = ContactState::Idle;
                    events.push(AuditEvent::new(
                        AuditKind::ConfirmDenied, now, from, next, "operator denied",
                    ));
                } else if elapsed >= self.config.verify_timeout_ms {
                    self.pending_nudge = None;
                    next = ContactState::Idle;
                    events.push(AuditEvent::new(
                        AuditKind::TimeoutAbort, now, from, next, "confirmation window expired",
                    ));
                }
            }

            ContactState::Approach => {
                if red {
                    self.hazard_latched = true;
                    next = ContactState::SafeHold;
                    events.push(AuditEvent::new(
                        AuditKind::HazardStop, now, from, next, "hazard RED",
                    ));
                } else if latched_any {
                    next = ContactState::Retreat;
                    events.push(AuditEvent::new(
                        AuditKind::VetoAbort, now, from, next, self.latch_summary(),
                    ));
                } else if self.plan_changed(inputs) {
                    next = ContactState::Retreat;
                    events.push(AuditEvent::new(
                        AuditKind::PlanChanged, now, from, next, "nudge target moved",
                    ));
                } else if elapsed >= self.config.approach_timeout_ms {
                    next = ContactState::Retreat;
                    events.push(AuditEvent::new(
                        AuditKind::TimeoutAbort, now, from, next, "approach deadline expired",
                    ));
                } else if sw_verdict.allow && hw_verdict.allow && env.risk_ok {
                    next = ContactState::Precontact;
                    events.push(AuditEvent::new(
                        AuditKind::Advance, now, from, next, "corridor clear, recheck ok",
                    ));
                }
            }

            ContactState::Precontact => {
                if red {
                    self.hazard_latched = true;
                    next = ContactState::SafeHold;
                    events.push(AuditEvent::new(
                        AuditKind::HazardStop, now, from, next, "hazard RED",
                    ));
                } else if latched_any {
                    next = ContactState::Retreat;
                    events.push(AuditEvent::new(
                        AuditKind::VetoAbort, now, from, next, self.latch_summary(),
                    ));
                } else if elapsed >= self.config.precontact_timeout_ms {
                    next = ContactState::Retreat;
                    events.push(AuditEvent::new(
                        AuditKind::TimeoutAbort, now, from, next, "pre-contact deadline expired",
                    ));
                } else {
                    // Consent is re-checked at this instant, never carried
                    // over from the approach phase.
                    next = self.precontact_consent_step(&env, from, now, &mut events);
                }
            }

            ContactState::Contact => {
                if red {
                    self.hazard_latched = true;
                    next = ContactState::SafeHold;
                    events.push(AuditEvent::new(
                        AuditKind::HazardStop, now, from, next, "hazard RED",
                    ));
                } else if env.violated() {
                    next = ContactState::EmergencyRetreat;
                    events.push(AuditEvent::new(
                        AuditKind::EmergencyEscape,
                        now,
                        from,
                        next,
                        env.breach_detail().unwrap_or_default(),
                    ));
                } else if self.state.dwell_accum_ms >= self.config.limits.dwell_ms_min
                    && self.state.dwell_accum_ms <= self.config.limits.dwell_ms_max
                {
                    next = ContactState::Release;
                    events.push(AuditEvent::new(
                        AuditKind::ContactReleased,
                        now,
                        from,
                        next,
                        format!("dwell {}ms", self.state.dwell_accum_ms),
                    ));
                } else if self.state.dwell_accum_ms > self.config.limits.dwell_ms_max {
                    // Only reachable if the control tick stalled past the
                    // whole dwell window.
                    next = ContactState::Retreat;
                    events.push(AuditEvent::new(
                        AuditKind::TimeoutAbort, now, from, next, "dwell window overrun",
                    ));
                }
            }

            ContactState::Release => {
                if red {
                    self.hazard_latched = true;
                    next = ContactState::SafeHold;
                    events.push(AuditEvent::new(
                        AuditKind::HazardStop, now, from, next, "hazard RED",
                    ));
                } else if inputs.rest_reached {
                    next = ContactState::Idle;
                    events.push(AuditEvent::new(
                        AuditKind::RestReached, now, from, next, "release complete",
                    ));
                } else if elapsed >= self.config.release_timeout_ms {
                    next = ContactState::Retreat;
                    events.push(AuditEvent::new(
                        AuditKind::TimeoutAbort, now, from, next, "release deadline expired",
                    ));
                }
            }

            ContactState::Retreat => {
                if red {
                    self.hazard_latched = true;
                    next = ContactState::SafeHold;
                    events.push(AuditEvent::new(
                        AuditKind::HazardStop, now, from, next, "hazard RED",
                    ));
                } else if inputs.rest_reached {
                    next = ContactState::Idle;
                    events.push(AuditEvent::new(
                        AuditKind::RestReached, now, from, next, "retreat complete",
                    ));
                } else if elapsed >= self.config.retreat_timeout_ms {
                    // Cannot reach rest: escalate to a hold rather than
                    // loop in place.
                    next = ContactState::SafeHold;
                    events.push(AuditEvent::new(
                        AuditKind::TimeoutAbort, now, from, next, "retreat deadline expired",
                    ));
                }
            }

            ContactState::EmergencyRetreat => {
                if red {
                    self.hazard_latched = true;
                    next = ContactState::SafeHold;
                    events.push(AuditEvent::new(
                        AuditKind::HazardStop, now, from, next, "hazard RED",
                    ));
                } else if inputs.escape_complete {
                    next = ContactState::SafeHold;
                    events.push(AuditEvent::new(
                        AuditKind::EscapeComplete, now, from, next, "annunciating",
                    ));
                } else if elapsed >= self.config.escape_timeout_ms {
                    next = ContactState::SafeHold;
                    events.push(AuditEvent::new(
                        AuditKind::TimeoutAbort, now, from, next, "escape deadline expired",
                    ));
                }
            }

            ContactState::SafeHold => {
                let hazards_cleared = !red && !self.hazard_latched;
                let latches_reset = !self.software.latched() && !self.hardware.latched();
                let ack_ok = !self.config.operator_ack_required || self.operator_ack;
                if hazards_cleared && latches_reset && ack_ok {
                    self.operator_ack = false;
                    next = ContactState::Idle;
                    events.push(AuditEvent::new(
                        AuditKind::SafeHoldReleased, now, from, next, "hold released",
                    ));
                }
            }
        }

        // === 7. COMMIT ===
        if next != from {
            if from == ContactState::Contact {
                self.last_contact_end_ms = Some(now);
            }
            if from == ContactState::Verify {
                self.pending_nudge = None;
            }
            if next == ContactState::SafeHold {
                // A fresh hold always needs a fresh acknowledgement.
                self.operator_ack = false;
            }
            self.state.enter(next, now);
        }

        // === 8. EMIT ===
        // Cancellation is already visible here: the plan was dropped during
        // commit, so a canceled cycle never publishes its plan_ref again.
        let command = MotionCommand {
            mode: self.state.current.motion_mode(),
            plan_ref: self.state.active_plan.as_ref().map(|p| p.plan_ref),
        };

        TickOutput { command, events }
    }

    fn cooldown_elapsed(&self, now: MonotonicMs) -> bool {
        match self.last_contact_end_ms {
            Some(t) => now.saturating_sub(t) >= self.config.cooldown_ms,
            None => true,
        }
    }

    fn plan_changed(&self, inputs: &TickInputs) -> bool {
        match (&self.state.active_plan, &inputs.nudge) {
            (Some(plan), Some(nudge)) => {
                !nudge.expired(inputs.now_ms) && nudge.target != plan.target
            }
            _ => false,
        }
    }

    fn latch_summary(&self) -> String {
        let mut parts = Vec::new();
        if self.software.latched() {
            parts.push(format!("software: {}", self.software.latch_reason()));
        }
        if self.hardware.latched() {
            parts.push(format!("hardware: {}", self.hardware.latch_reason()));
        }
        parts.join("; ")
    }

    /// Build and adopt a plan for an accepted nudge. Falls back to staying
    /// put (with an audit record) if the planner cannot produce a valid
    /// plan, which only happens on a corrupted configuration.
    fn begin_plan(
        &mut self,
        nudge: &Nudge,
        status: ConsentStatus,
        from: ContactState,
        now: MonotonicMs,
        events: &mut Vec<AuditEvent>,
    ) -> ContactState {
        let mode = match status {
            ConsentStatus::Fresh(m) => m,
            ConsentStatus::Absent => ConsentMode::None,
        };
        match self.planner.plan(nudge, mode, &self.config.limits, None) {
            Ok(plan) => {
                let plan_ref = plan.plan_ref;
                self.state.active_plan = Some(plan);
                events.push(AuditEvent::new(
                    AuditKind::EngagementStarted,
                    now,
                    from,
                    ContactState::Approach,
                    format!("plan {}", plan_ref),
                ));
                ContactState::Approach
            }
            Err(err) => {
                events.push(AuditEvent::new(
                    AuditKind::InvariantViolation,
                    now,
                    from,
                    from,
                    format!("planner rejected nudge: {}", err),
                ));
                from
            }
        }
    }

    /// The pre-contact consent and envelope gate. A stale grant withdraws;
    /// a grant that vanished entirely while a consented plan was in flight
    /// is a race we fail safe on.
    fn precontact_consent_step(
        &mut self,
        env: &EnvelopeStatus,
        from: ContactState,
        now: MonotonicMs,
        events: &mut Vec<AuditEvent>,
    ) -> ContactState {
        let Some(plan) = self.state.active_plan.as_ref() else {
            // A pre-contact hold without a plan cannot proceed.
            events.push(AuditEvent::new(
                AuditKind::InvariantViolation, now, from, ContactState::SafeHold,
                "pre-contact hold with no active plan",
            ));
            self.hazard_latched = true;
            return ContactState::SafeHold;
        };

        let status = self.consent.query(&plan.subject_id, &plan.scope, now);
        match status {
            ConsentStatus::Fresh(_) => {
                if env.impedance_ok && env.risk_ok {
                    events.push(AuditEvent::new(
                        AuditKind::ContactStarted,
                        now,
                        from,
                        ContactState::Contact,
                        format!("plan {}", plan.plan_ref),
                    ));
                    ContactState::Contact
                } else {
                    from
                }
            }
            ConsentStatus::Absent => {
                let revoked_race = plan.consent_mode != ConsentMode::None
                    && !self.consent.subject_known(&plan.subject_id);
                if revoked_race {
                    events.push(AuditEvent::new(
                        AuditKind::InvariantViolation,
                        now,
                        from,
                        ContactState::SafeHold,
                        "consent revoked under an in-flight plan",
                    ));
                    self.hazard_latched = true;
                    ContactState::SafeHold
                } else {
                    events.push(AuditEvent::new(
                        AuditKind::ConsentExpired,
                        now,
                        from,
                        ContactState::Retreat,
                        format!("subject {}", plan.subject_id),
                    ));
                    ContactState::Retreat
                }
            }
        }
    }
}

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::time::MonotonicMs;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsentMode {
    /// Contemporaneous, affirmative.
    Explicit,
    /// Institutional/caregiver profile allows limited contact.
    Policy,
    /// No consent in scope.
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsentSource {
    Verbal,
    Gesture,
    Ui,
    Profile,
}

/// A single consent grant. Never mutated in place; a re-grant replaces the
/// whole record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsentRecord {
    pub subject_id: String,
    pub mode: ConsentMode,
    pub source: ConsentSource,
    /// Contact-region tags, e.g. "shoulder_contact". Lowercased on grant.
    pub scope: Vec<String>,
    pub granted_at_ms: MonotonicMs,
    pub ttl_ms: u64,
}

impl ConsentRecord {
    pub fn explicit(
        subject_id: &str,
        scope: &[&str],
        source: ConsentSource,
        granted_at_ms: MonotonicMs,
        ttl_ms: u64,
    ) -> Self {
        Self {
            subject_id: subject_id.to_string(),
            mode: ConsentMode::Explicit,
            source,
            scope: scope.iter().map(|s| s.to_lowercase()).collect(),
            granted_at_ms,
            ttl_ms,
        }
    }

    pub fn policy(
        subject_id: &str,
        scope: &[&str],
        granted_at_ms: MonotonicMs,
        ttl_ms: u64,
    ) -> Self {
        Self {
            subject_id: subject_id.to_string(),
            mode: ConsentMode::Policy,
            source: ConsentSource::Profile,
            scope: scope.iter().map(|s| s.to_lowercase()).collect(),
            granted_at_ms,
            ttl_ms,
        }
    }

    /// Freshness is computed on read, never cached.
    /// A record is fresh iff `now - granted_at < ttl`. TTL of zero is
    /// immediately stale.
    pub fn fresh(&self, now_ms: MonotonicMs) -> bool {
        if self.mode == ConsentMode::None {
            return false;
        }
        now_ms.saturating_sub(self.granted_at_ms) < self.ttl_ms
    }

    fn covers(&self, requested: &[String]) -> bool {
        requested
            .iter()
            .all(|r| self.scope.iter().any(|s| s == &r.to_lowercase()))
    }
}

/// Outcome of a ledger query. A stale record is reported Absent, not
/// stale-but-usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsentStatus {
    Fresh(ConsentMode),
    Absent,
}

impl ConsentStatus {
    pub fn is_fresh(&self) -> bool {
        matches!(self, ConsentStatus::Fresh(_))
    }
}

/// Tracks the most recent consent record per subject.
///
/// Expiry is lazy: stale records stay in the map until replaced or revoked,
/// but `query` never returns them.
#[derive(Debug, Default)]
pub struct ConsentLedger {
    records: HashMap<String, ConsentRecord>,
    /// Caregiver/clinician switch. When off, Policy-mode records never
    /// satisfy a query.
    policy_fallback_enabled: bool,
}

impl ConsentLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enable_policy_fallback(&mut self, enabled: bool) {
        self.policy_fallback_enabled = enabled;
    }

    /// Replace-on-update: any existing record for the subject is discarded.
    pub fn grant(&mut self, record: ConsentRecord) {
        self.records.insert(record.subject_id.clone(), record);
    }

    pub fn revoke(&mut self, subject_id: &str) {
        self.records.remove(subject_id);
    }

    /// Current, valid consent for the requested scopes, or Absent.
    /// Explicit grants are preferred; Policy satisfies only when the
    /// fallback switch is on.
    pub fn query(
        &self,
        subject_id: &str,
        requested_scope: &[String],
        now_ms: MonotonicMs,
    ) -> ConsentStatus {
        let Some(rec) = self.records.get(subject_id) else {
            return ConsentStatus::Absent;
        };
        if !rec.fresh(now_ms) || !rec.covers(requested_scope) {
            return ConsentStatus::Absent;
        }
        match rec.mode {
            ConsentMode::Explicit => ConsentStatus::Fresh(ConsentMode::Explicit),
            ConsentMode::Policy if self.policy_fallback_enabled => {
                ConsentStatus::Fresh(ConsentMode::Policy)
            }
            _ => ConsentStatus::Absent,
        }
    }

    /// Whether any record (fresh or stale) exists for the subject. Lets the
    /// caller tell "expired" apart from "revoked mid-flight".
    pub fn subject_known(&self, subject_id: &str) -> bool {
        self.records.contains_key(subject_id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

use serde::{Deserialize, Serialize};

use super::time::MonotonicMs;

/// Tri-level scene hazard classification.
/// Ordering is severity: Green < Yellow < Red, so `max` picks the more
/// restrictive of two classifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum HazardLevel {
    /// Autonomous contact allowed within configured envelopes.
    Green,
    /// Verify: require consent/confirmation/additional sensing.
    Yellow,
    /// Prohibited. Contact and traversal blocked.
    Red,
}

impl HazardLevel {
    /// Most-conservative combination rule for disagreeing sensors.
    pub fn most_conservative(a: HazardLevel, b: HazardLevel) -> HazardLevel {
        a.max(b)
    }
}

/// Point-in-time hazard reading from the external hazard reader.
/// The kernel treats it as instantaneous ground truth; the RED edge is
/// remembered through the hazard latch, not by keeping samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HazardSample {
    pub level: HazardLevel,
    pub sampled_at_ms: MonotonicMs,
}

impl HazardSample {
    pub fn new(level: HazardLevel, sampled_at_ms: MonotonicMs) -> Self {
        Self { level, sampled_at_ms }
    }
}

/// One sensor's hazard classification for the active region.
/// Multiple views are combined by the envelope evaluator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HazardView {
    pub source: String,
    pub level: HazardLevel,
}

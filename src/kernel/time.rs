use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tick {
    pub frame: u64,
}

/// Control-plane cadence. 50ms = 20 Hz revalidation.
pub const TICK_MS: u64 = 50;

impl Tick {
    pub fn new() -> Self {
        Tick { frame: 0 }
    }

    pub fn next(&self) -> Self {
        Tick { frame: self.frame + 1 }
    }
}

/// Monotonic millisecond timestamps. All deadline arithmetic in the kernel
/// is done on these, never on wall-clock time.
pub type MonotonicMs = u64;

/// Process-local monotonic clock. The kernel itself never reads it; the
/// driver samples it once per tick and passes `now_ms` in.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }

    pub fn now_ms(&self) -> MonotonicMs {
        self.origin.elapsed().as_millis() as MonotonicMs
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

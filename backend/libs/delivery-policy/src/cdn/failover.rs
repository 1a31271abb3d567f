/// Origin failure tracking
///
/// Playback sessions report failures against an origin; once the consecutive
/// failure count reaches the threshold the resolver demotes it. There is no
/// recovery path back to the front of the list within a process lifetime.
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Health state of one origin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OriginState {
    /// No outstanding failures
    Healthy,
    /// Some consecutive failures, below the demotion threshold
    Degraded,
    /// Moved to the back of the ordering for this session
    Demoted,
}

impl OriginState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Demoted => "demoted",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OriginStats {
    pub origin: String,
    pub state: OriginState,
    pub consecutive_failures: u32,
    pub total_failures: u32,
}

#[derive(Debug, Default)]
pub(crate) struct OriginHealth {
    consecutive_failures: AtomicU32,
    total_failures: AtomicU32,
    demoted: AtomicBool,
}

impl OriginHealth {
    /// Returns the consecutive failure count including this one
    pub(crate) fn record_failure(&self) -> u32 {
        self.total_failures.fetch_add(1, Ordering::SeqCst);
        self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub(crate) fn record_success(&self) {
        self.consecutive_failures.store(0, Ordering::SeqCst);
    }

    /// Returns true the first time the origin is marked demoted
    pub(crate) fn mark_demoted(&self) -> bool {
        !self.demoted.swap(true, Ordering::SeqCst)
    }

    pub(crate) fn state(&self) -> OriginState {
        if self.demoted.load(Ordering::SeqCst) {
            OriginState::Demoted
        } else if self.consecutive_failures.load(Ordering::SeqCst) > 0 {
            OriginState::Degraded
        } else {
            OriginState::Healthy
        }
    }

    pub(crate) fn stats(&self, origin: &str) -> OriginStats {
        OriginStats {
            origin: origin.to_string(),
            state: self.state(),
            consecutive_failures: self.consecutive_failures.load(Ordering::SeqCst),
            total_failures: self.total_failures.load(Ordering::SeqCst),
        }
    }
}

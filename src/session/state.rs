//! Session lifecycle state
//!
//! Tracks a streaming session from construction to its final inactive state.
//! Transitions only move forward, so once a session reads as inactive it
//! stays inactive; the sweeper relies on that.

use std::sync::atomic::{AtomicU8, Ordering};

/// Session lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SessionPhase {
    /// Constructed, subscription not yet live
    Starting,
    /// Subscribed and delivering frames
    Active,
    /// Connection failed, subscription ended, or one-shot delivery completed
    Inactive,
}

impl SessionPhase {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => SessionPhase::Starting,
            1 => SessionPhase::Active,
            _ => SessionPhase::Inactive,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            SessionPhase::Starting => 0,
            SessionPhase::Active => 1,
            SessionPhase::Inactive => 2,
        }
    }
}

/// Phase cell shared between the request thread, bus callbacks and the sweeper
#[derive(Debug)]
pub struct PhaseCell(AtomicU8);

impl PhaseCell {
    /// New cell in [`SessionPhase::Starting`]
    pub fn new() -> Self {
        Self(AtomicU8::new(SessionPhase::Starting.as_u8()))
    }

    /// Current phase
    pub fn get(&self) -> SessionPhase {
        SessionPhase::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Move to `phase` unless already past it. Returns the phase now held.
    pub fn advance(&self, phase: SessionPhase) -> SessionPhase {
        let prev = self.0.fetch_max(phase.as_u8(), Ordering::AcqRel);
        SessionPhase::from_u8(prev.max(phase.as_u8()))
    }

    /// Move to [`SessionPhase::Inactive`]. Returns true if this call did it.
    pub fn deactivate(&self) -> bool {
        let inactive = SessionPhase::Inactive.as_u8();
        self.0.swap(inactive, Ordering::AcqRel) != inactive
    }

    /// Whether the session has gone inactive
    pub fn is_inactive(&self) -> bool {
        self.get() == SessionPhase::Inactive
    }
}

impl Default for PhaseCell {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_lifecycle() {
        let phase = PhaseCell::new();
        assert_eq!(phase.get(), SessionPhase::Starting);

        assert_eq!(phase.advance(SessionPhase::Active), SessionPhase::Active);
        assert!(!phase.is_inactive());

        assert!(phase.deactivate());
        assert!(phase.is_inactive());
        assert!(!phase.deactivate());
    }

    #[test]
    fn test_inactive_is_final() {
        let phase = PhaseCell::new();
        phase.deactivate();

        // A late start must not revive the session
        assert_eq!(phase.advance(SessionPhase::Active), SessionPhase::Inactive);
        assert_eq!(phase.get(), SessionPhase::Inactive);
    }
}

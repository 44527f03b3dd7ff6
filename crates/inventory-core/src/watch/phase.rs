//! Subscription lifecycle.
//!
//! ```text
//!   Negotiating ──► Snapshotting ──► Streaming
//!        │               │               │
//!        └───────────────┴───────────────┴──► Closed
//! ```
//!
//! Each edge is taken at most once; `Closed` is terminal.

use std::sync::atomic::{AtomicU8, Ordering};

/// Where a subscription is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Registered, snapshot not yet read.
    Negotiating,
    /// Delivering snapshot records.
    Snapshotting,
    /// Delivering change events.
    Streaming,
    /// Torn down.
    Closed,
}

impl Phase {
    const fn to_u8(self) -> u8 {
        match self {
            Self::Negotiating => 0,
            Self::Snapshotting => 1,
            Self::Streaming => 2,
            Self::Closed => 3,
        }
    }

    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Negotiating,
            1 => Self::Snapshotting,
            2 => Self::Streaming,
            _ => Self::Closed,
        }
    }

    /// Whether `self -> next` is a legal transition.
    pub const fn can_advance(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Negotiating, Self::Snapshotting)
                | (Self::Snapshotting, Self::Streaming)
                | (Self::Negotiating | Self::Snapshotting | Self::Streaming, Self::Closed)
        )
    }
}

impl core::fmt::Display for Phase {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Self::Negotiating => "negotiating",
            Self::Snapshotting => "snapshotting",
            Self::Streaming => "streaming",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Atomically updated [`Phase`].
#[derive(Debug)]
pub struct PhaseCell(AtomicU8);

impl PhaseCell {
    /// A cell in [`Phase::Negotiating`].
    pub const fn new() -> Self {
        Self(AtomicU8::new(Phase::Negotiating.to_u8()))
    }

    /// Current phase.
    pub fn get(&self) -> Phase {
        Phase::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Move from `from` to `to`. Returns `false` if the edge is illegal or
    /// the cell is no longer in `from`.
    pub fn advance(&self, from: Phase, to: Phase) -> bool {
        from.can_advance(to)
            && self
                .0
                .compare_exchange(from.to_u8(), to.to_u8(), Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
    }

    /// Move to [`Phase::Closed`]. Returns `true` only for the call that
    /// performed the transition.
    pub fn close(&self) -> bool {
        self.0.swap(Phase::Closed.to_u8(), Ordering::AcqRel) != Phase::Closed.to_u8()
    }
}

impl Default for PhaseCell {
    fn default() -> Self {
        Self::new()
    }
}

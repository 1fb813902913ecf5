//! Terminal workflow outcomes

/// Liveness classification verdict for a captured image
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Liveness {
    /// Genuine tissue
    Live,
    /// Spoof artifact
    Fake,
}

/// Successful enrollment result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrollOutcome {
    /// Slot the canonical template was stored at
    pub slot: u16,

    /// Identity label written to the persistence store
    pub label: String,
}

/// Search result
///
/// `UnresolvedMatch` is a consistency warning: the device matched a
/// slot, but the identity index has no record for it. It is distinct
/// from both `NoMatch` and a resolved `Match`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    /// The device matched a slot and the identity resolved
    Match {
        slot: u16,
        label: String,
        liveness: Option<Liveness>,
    },

    /// The device matched a slot absent from the identity index
    UnresolvedMatch {
        slot: u16,
        liveness: Option<Liveness>,
    },

    /// No template matched
    NoMatch { liveness: Option<Liveness> },
}

impl SearchOutcome {
    /// Slot the device matched, if any
    pub fn matched_slot(&self) -> Option<u16> {
        match self {
            Self::Match { slot, .. } | Self::UnresolvedMatch { slot, .. } => Some(*slot),
            Self::NoMatch { .. } => None,
        }
    }

    /// Whether the device reported a match at all
    pub fn is_match(&self) -> bool {
        self.matched_slot().is_some()
    }

    /// Attached liveness verdict, if classification ran
    pub fn liveness(&self) -> Option<Liveness> {
        match self {
            Self::Match { liveness, .. }
            | Self::UnresolvedMatch { liveness, .. }
            | Self::NoMatch { liveness } => *liveness,
        }
    }
}

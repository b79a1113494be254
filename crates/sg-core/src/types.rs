//! Core type definitions for SweepGuard
//!
//! These types are shared by the classifier, the sweeper, the interceptors
//! and the engine lifecycle.

use serde::{Deserialize, Serialize};

// =============================================================================
// Classification
// =============================================================================

/// Outcome of classifying one URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    /// Resource may load
    Allow,
    /// Resource must be suppressed
    Block,
}

impl Classification {
    #[inline]
    pub fn is_block(self) -> bool {
        self == Self::Block
    }

    #[inline]
    pub fn is_allow(self) -> bool {
        self == Self::Allow
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Block => "block",
        }
    }
}

/// Which step of the classifier decided the outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reason {
    /// Empty input, nothing to block
    Empty,
    /// Allow List entry matched
    AllowListed(String),
    /// Block List entry matched
    BlockListed(String),
    /// Hostname ends with a suspicious TLD
    SuspiciousTld(String),
    /// Hostname carries a long machine-generated label
    RandomHost,
    /// Nothing matched
    Default,
}

/// Classification plus the reason behind it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub classification: Classification,
    pub reason: Reason,
}

impl Verdict {
    pub(crate) fn allow(reason: Reason) -> Self {
        Self {
            classification: Classification::Allow,
            reason,
        }
    }

    pub(crate) fn block(reason: Reason) -> Self {
        Self {
            classification: Classification::Block,
            reason,
        }
    }
}

impl std::fmt::Display for Reason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "empty url"),
            Self::AllowListed(entry) => write!(f, "allow list: {}", entry),
            Self::BlockListed(entry) => write!(f, "block list: {}", entry),
            Self::SuspiciousTld(tld) => write!(f, "suspicious tld: {}", tld),
            Self::RandomHost => write!(f, "random-looking hostname"),
            Self::Default => write!(f, "no match"),
        }
    }
}

// =============================================================================
// Sweep Targets (which element families a sweep inspects)
// =============================================================================

bitflags::bitflags! {
    /// Element families inspected by a sweep.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct SweepTargets: u8 {
        /// `<script src>`
        const SCRIPT = 1 << 0;
        /// `<iframe>`
        const IFRAME = 1 << 1;
        /// `<meta http-equiv="refresh">`
        const META_REFRESH = 1 << 2;
        /// Attribute-substring container selectors
        const CONTAINER = 1 << 3;

        const ALL = Self::SCRIPT.bits()
            | Self::IFRAME.bits()
            | Self::META_REFRESH.bits()
            | Self::CONTAINER.bits();
    }
}

impl Default for SweepTargets {
    fn default() -> Self {
        Self::ALL
    }
}

// =============================================================================
// Intercept Kinds
// =============================================================================

bitflags::bitflags! {
    /// Imperative entry points that can be intercepted.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct InterceptKind: u8 {
        /// Element creation and `src` assignment on script/iframe
        const CREATE_ELEMENT = 1 << 0;
        /// Programmatic popup (`window.open`)
        const WINDOW_OPEN = 1 << 1;
        /// Programmatic navigation (location assignment)
        const NAVIGATION = 1 << 2;
        /// Capturing click on links
        const CLICK = 1 << 3;

        const ALL = Self::CREATE_ELEMENT.bits()
            | Self::WINDOW_OPEN.bits()
            | Self::NAVIGATION.bits()
            | Self::CLICK.bits();
    }
}

impl Default for InterceptKind {
    fn default() -> Self {
        Self::ALL
    }
}

impl InterceptKind {
    /// Name of a single kind, for logging.
    pub fn name(self) -> &'static str {
        if self == Self::CREATE_ELEMENT {
            "create-element"
        } else if self == Self::WINDOW_OPEN {
            "window-open"
        } else if self == Self::NAVIGATION {
            "navigation"
        } else if self == Self::CLICK {
            "click"
        } else {
            "mixed"
        }
    }
}

// =============================================================================
// Mutation Batch
// =============================================================================

/// Summary of one batch of subtree mutations delivered to an observer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MutationBatch {
    /// Number of mutation records in the batch
    pub records: usize,
    /// Number of nodes added across all records
    pub added: usize,
    /// Number of nodes removed across all records
    pub removed: usize,
}

impl MutationBatch {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records == 0
    }

    #[inline]
    pub fn has_additions(&self) -> bool {
        self.added > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intercept_kind_names() {
        assert_eq!(InterceptKind::WINDOW_OPEN.name(), "window-open");
        assert_eq!(InterceptKind::CLICK.name(), "click");
        assert_eq!(InterceptKind::ALL.name(), "mixed");
    }

    #[test]
    fn test_defaults_cover_everything() {
        assert_eq!(SweepTargets::default(), SweepTargets::ALL);
        assert!(InterceptKind::default().contains(InterceptKind::NAVIGATION));
    }

    #[test]
    fn test_mutation_batch_additions() {
        let batch = MutationBatch { records: 2, added: 0, removed: 3 };
        assert!(!batch.has_additions());
        assert!(!batch.is_empty());
        assert!(MutationBatch::default().is_empty());
    }
}

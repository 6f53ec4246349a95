use crate::hash::{selector_hash, HashError};
use dns_policy_controller_k8s_api::{DnsPolicySpec, Map};
use std::fmt;

/// The mapping a policy uses to select its workloads.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SelectionKey<'a> {
    TargetSelector(&'a Map),
    Subject(&'a Map),
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum InvalidSelection {
    #[error("targetSelector or subject cannot be empty")]
    Empty,

    #[error("targetSelector and subject are mutually exclusive")]
    Ambiguous,
}

// === impl SelectionKey ===

impl<'a> SelectionKey<'a> {
    /// Resolves the selection key of a policy, preferring `targetSelector` when both forms are
    /// populated.
    pub fn of(spec: &'a DnsPolicySpec) -> Result<Self, InvalidSelection> {
        match (spec.target_selector(), spec.subject()) {
            (Some(labels), _) => Ok(Self::TargetSelector(labels)),
            (None, Some(subject)) => Ok(Self::Subject(subject)),
            (None, None) => Err(InvalidSelection::Empty),
        }
    }

    /// Like [`SelectionKey::of`], but rejects policies that populate both forms.
    pub fn exclusive(spec: &'a DnsPolicySpec) -> Result<Self, InvalidSelection> {
        if spec.target_selector().is_some() && spec.subject().is_some() {
            return Err(InvalidSelection::Ambiguous);
        }
        Self::of(spec)
    }

    pub fn map(&self) -> &'a Map {
        match self {
            Self::TargetSelector(m) | Self::Subject(m) => *m,
        }
    }

    pub fn hash(&self) -> Result<String, HashError> {
        selector_hash(self.map())
    }
}

impl fmt::Display for SelectionKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TargetSelector(_) => f.write_str("targetSelector"),
            Self::Subject(_) => f.write_str("subject"),
        }
    }
}

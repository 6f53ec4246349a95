use crate::State;
use dns_policy_controller_core::{HashError, InvalidSelection, PolicyId};
use std::fmt;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid DnsPolicy {id}: {source}")]
    Validation {
        id: PolicyId,
        #[source]
        source: InvalidSelection,
    },

    #[error("failed to compute {kind} hash for {id}: {source}")]
    HashComputation {
        id: PolicyId,
        kind: &'static str,
        #[source]
        source: HashError,
    },

    #[error("selector hash {hash} of {id} is already owned by {owner}")]
    DuplicateHash {
        id: PolicyId,
        hash: String,
        owner: PolicyId,
    },

    #[error("failed to {op} DnsPolicy {id}: {source}")]
    Persistence {
        id: PolicyId,
        op: StoreOp,
        #[source]
        source: anyhow::Error,
    },
}

/// The store operation that failed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StoreOp {
    Fetch,
    AddFinalizer,
    RemoveFinalizer,
    UpdateStatus,
}

// === impl Error ===

impl Error {
    /// Errors that cannot clear until the resource itself is edited.
    pub fn is_user_correctable(&self) -> bool {
        matches!(self, Self::Validation { .. } | Self::DuplicateHash { .. })
    }

    /// The condition and event reason reported for the error.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "InvalidSpec",
            Self::HashComputation { .. } => "HashComputationFailed",
            Self::DuplicateHash { .. } => "DuplicateHash",
            Self::Persistence { op, .. } => match op {
                StoreOp::Fetch => "FetchFailed",
                StoreOp::AddFinalizer => "FinalizerAddFailed",
                StoreOp::RemoveFinalizer => "FinalizerRemovalFailed",
                StoreOp::UpdateStatus => "StatusUpdateFailed",
            },
        }
    }

    /// The state a failed reconciliation leaves the policy in.
    pub fn state(&self) -> State {
        match self {
            Self::DuplicateHash { .. } => State::Conflict,
            Self::Persistence {
                op: StoreOp::AddFinalizer,
                ..
            } => State::FinalizerPending,
            Self::Persistence {
                op: StoreOp::RemoveFinalizer,
                ..
            } => State::Deleting,
            _ => State::Validating,
        }
    }

    pub(crate) fn outcome(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "invalid",
            Self::HashComputation { .. } => "hash_failed",
            Self::DuplicateHash { .. } => "conflict",
            Self::Persistence { .. } => "persistence_failed",
        }
    }
}

// === impl StoreOp ===

impl fmt::Display for StoreOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fetch => f.write_str("fetch"),
            Self::AddFinalizer => f.write_str("add finalizer to"),
            Self::RemoveFinalizer => f.write_str("remove finalizer from"),
            Self::UpdateStatus => f.write_str("update status of"),
        }
    }
}

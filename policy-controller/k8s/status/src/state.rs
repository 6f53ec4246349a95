use dns_policy_controller_k8s_api::{finalizer, DnsPolicy};

/// Where a policy sits in its reconciliation lifecycle.
///
/// ```text
/// Absent           --reconcile--> Absent            (index entry dropped)
/// Deleting         --reconcile--> Absent            (index entry dropped, finalizer removed)
/// FinalizerPending --reconcile--> Validating        (finalizer added)
/// Validating       --reconcile--> Indexed           (hashes committed)
///                               | Validating        (invalid spec or hash failure)
///                               | Conflict          (selector hash owned by another policy)
/// Conflict         --edit-------> Validating
/// Indexed          --edit-------> Validating
/// ```
///
/// Only `Absent`, `Deleting`, `FinalizerPending` and `Validating` are observed on entry; `Conflict`
/// and `Indexed` are where a reconciliation leaves the policy until its next change.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum State {
    Absent,
    Deleting,
    FinalizerPending,
    Validating,
    Conflict,
    Indexed,
}

// === impl State ===

impl State {
    /// Classifies a freshly fetched policy.
    pub fn observe(policy: Option<&DnsPolicy>) -> Self {
        match policy {
            None => Self::Absent,
            Some(p) if p.is_deleting() => Self::Deleting,
            Some(p) if !finalizer::contains(p, finalizer::FINALIZER) => Self::FinalizerPending,
            Some(_) => Self::Validating,
        }
    }
}

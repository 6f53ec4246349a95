use crate::{error::StoreOp, Error, Event, EventSink, PolicyStore, ReconcileMetrics, State};
use chrono::Utc;
use dns_policy_controller_core::{spec_hash, PolicyId, SelectionKey};
use dns_policy_controller_k8s_api::{
    finalizer::{self, FINALIZER},
    Condition, ConditionStatus, DnsPolicy, Time,
};
use dns_policy_controller_k8s_index::PolicyIndex;
use tracing::{debug, info, warn};

pub const READY: &str = "Ready";

/// Drives a single policy from its observed state to its desired state.
#[derive(Clone, Debug)]
pub struct Reconciler<S, E> {
    index: PolicyIndex,
    store: S,
    events: E,
    metrics: ReconcileMetrics,
}

/// How a successful reconciliation ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The object no longer exists; any index entry was dropped.
    Forgotten,

    /// The object was being deleted and had no finalizer left to remove.
    Released,

    /// The index entry was dropped and the finalizer removed.
    Finalized,

    /// The finalizer was added. The store update triggers the next pass.
    FinalizerAdded,

    /// The policy is indexed under `selector_hash`. `status_updated` is false when the persisted
    /// status already described the current generation.
    Indexed {
        selector_hash: String,
        status_updated: bool,
    },
}

// === impl Reconciler ===

impl<S, E> Reconciler<S, E>
where
    S: PolicyStore,
    E: EventSink,
{
    pub fn new(index: PolicyIndex, store: S, events: E, metrics: ReconcileMetrics) -> Self {
        Self {
            index,
            store,
            events,
            metrics,
        }
    }

    pub fn index(&self) -> &PolicyIndex {
        &self.index
    }

    /// Reconciles the policy identified by `id` against its current stored state.
    #[tracing::instrument(skip_all, fields(ns = %id.namespace, name = %id.name))]
    pub async fn reconcile(&self, id: &PolicyId) -> Result<Outcome, Error> {
        let res = self.reconcile_inner(id).await;
        match &res {
            Ok(outcome) => self.metrics.observe(outcome.label()),
            Err(error) => self.metrics.observe(error.outcome()),
        }
        res
    }

    async fn reconcile_inner(&self, id: &PolicyId) -> Result<Outcome, Error> {
        let policy = self
            .store
            .get(id)
            .await
            .map_err(|source| Error::Persistence {
                id: id.clone(),
                op: StoreOp::Fetch,
                source,
            })?;

        let state = State::observe(policy.as_ref());
        debug!(?state);
        match (state, policy) {
            (State::Absent, _) | (_, None) => Ok(self.forget(id)),
            (State::Deleting, Some(policy)) => self.finalize(id, policy).await,
            (State::FinalizerPending, Some(policy)) => self.add_finalizer(id, policy).await,
            (_, Some(policy)) => self.index_policy(id, policy).await,
        }
    }

    fn forget(&self, id: &PolicyId) -> Outcome {
        if let Some(hash) = self.index.delete(id) {
            info!(%hash, "Removed deleted policy from index");
        }
        Outcome::Forgotten
    }

    async fn finalize(&self, id: &PolicyId, mut policy: DnsPolicy) -> Result<Outcome, Error> {
        let removed = self.index.delete(id);
        if !finalizer::contains(&policy, FINALIZER) {
            return Ok(Outcome::Released);
        }

        if let Some(hash) = removed {
            info!(%hash, "Removed policy from index");
        }
        self.events
            .record(
                &policy,
                Event::normal("Deleted", "DnsPolicy removed from the policy index"),
            )
            .await;

        finalizer::remove(&mut policy, FINALIZER);
        if let Err(source) = self.store.update(&policy).await {
            let error = Error::Persistence {
                id: id.clone(),
                op: StoreOp::RemoveFinalizer,
                source,
            };
            self.events
                .record(&policy, Event::warning(error.reason(), error.to_string()))
                .await;
            return Err(error);
        }
        Ok(Outcome::Finalized)
    }

    async fn add_finalizer(&self, id: &PolicyId, mut policy: DnsPolicy) -> Result<Outcome, Error> {
        finalizer::add(&mut policy, FINALIZER);
        match self.store.update(&policy).await {
            Ok(_) => {
                self.events
                    .record(
                        &policy,
                        Event::normal("FinalizerAdded", format!("Added finalizer {FINALIZER}")),
                    )
                    .await;
                Ok(Outcome::FinalizerAdded)
            }
            Err(source) => {
                let error = Error::Persistence {
                    id: id.clone(),
                    op: StoreOp::AddFinalizer,
                    source,
                };
                self.events
                    .record(&policy, Event::warning(error.reason(), error.to_string()))
                    .await;
                Err(error)
            }
        }
    }

    async fn index_policy(&self, id: &PolicyId, mut policy: DnsPolicy) -> Result<Outcome, Error> {
        let selector_hash = match fingerprint(id, &policy) {
            Ok(hash) => hash,
            Err(error) => return Err(self.reject(policy, error).await),
        };

        if let Some(owner) = self.index.owner(&selector_hash) {
            if owner != *id {
                let error = Error::DuplicateHash {
                    id: id.clone(),
                    hash: selector_hash,
                    owner,
                };
                return Err(self.reject(policy, error).await);
            }
        }

        let spec_hash = match spec_hash(&policy.spec) {
            Ok(hash) => hash,
            Err(source) => {
                let error = Error::HashComputation {
                    id: id.clone(),
                    kind: "spec",
                    source,
                };
                return Err(self.reject(policy, error).await);
            }
        };

        let generation = policy.generation();
        let mut status = policy.status_or_default();
        let selector_changed = status.selector_hash != selector_hash;
        let spec_changed = status.spec_hash != spec_hash;
        let needs_update = selector_changed
            || spec_changed
            || status.observed_generation != generation
            || !status.conditions.is_true(READY);

        if needs_update {
            status.selector_hash = selector_hash.clone();
            status.spec_hash = spec_hash;
            status.observed_generation = generation;
            status.conditions.set(Condition {
                type_: READY.to_string(),
                status: ConditionStatus::True,
                reason: "Reconciled".to_string(),
                message: "DnsPolicy is indexed".to_string(),
                observed_generation: generation,
                last_transition_time: Time(Utc::now()),
            });
            policy.status = Some(status);
        }

        // The index is only mutated once every check has passed. A concurrent reconciliation of
        // another policy may still have claimed the hash since it was checked.
        if let Err(conflict) = self.index.upsert(&policy, selector_hash.clone()) {
            let error = Error::DuplicateHash {
                id: id.clone(),
                hash: conflict.hash,
                owner: conflict.owner,
            };
            return Err(self.reject(policy, error).await);
        }

        if needs_update {
            if let Err(source) = self.store.update_status(&policy).await {
                let error = Error::Persistence {
                    id: id.clone(),
                    op: StoreOp::UpdateStatus,
                    source,
                };
                self.events
                    .record(&policy, Event::warning(error.reason(), error.to_string()))
                    .await;
                return Err(error);
            }

            if selector_changed {
                self.events
                    .record(
                        &policy,
                        Event::normal(
                            "SelectorHashUpdated",
                            format!("Selector hash set to {selector_hash}"),
                        ),
                    )
                    .await;
            }
            if spec_changed {
                self.events
                    .record(&policy, Event::normal("SpecHashUpdated", "Spec hash updated"))
                    .await;
            }
            self.events
                .record(&policy, Event::normal("Reconciled", "Status updated"))
                .await;
        }

        self.events
            .record(
                &policy,
                Event::normal(
                    "PolicyIndexed",
                    format!("DnsPolicy indexed under selector hash {selector_hash}"),
                ),
            )
            .await;
        info!(%selector_hash, status_updated = needs_update, "Indexed");

        Ok(Outcome::Indexed {
            selector_hash,
            status_updated: needs_update,
        })
    }

    /// Reports a failure on the resource and returns the error.
    ///
    /// The `Ready` condition is set to `False` and persisted only when it changes, so repeated
    /// failures do not rewrite the status. Persisting the condition is best-effort; the
    /// error is always returned. The index is left untouched.
    async fn reject(&self, mut policy: DnsPolicy, error: Error) -> Error {
        warn!(%error, "Rejected policy");
        self.events
            .record(&policy, Event::warning(error.reason(), error.to_string()))
            .await;

        let generation = policy.generation();
        let mut status = policy.status_or_default();
        let changed = status.conditions.set(Condition {
            type_: READY.to_string(),
            status: ConditionStatus::False,
            reason: error.reason().to_string(),
            message: error.to_string(),
            observed_generation: generation,
            last_transition_time: Time(Utc::now()),
        });
        if changed {
            policy.status = Some(status);
            if let Err(error) = self.store.update_status(&policy).await {
                warn!(%error, "Failed to record failure condition");
            }
        }

        error
    }
}

// === impl Outcome ===

impl Outcome {
    /// The state the policy is left in.
    pub fn state(&self) -> State {
        match self {
            Self::Forgotten | Self::Released | Self::Finalized => State::Absent,
            Self::FinalizerAdded => State::Validating,
            Self::Indexed { .. } => State::Indexed,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Forgotten => "forgotten",
            Self::Released => "released",
            Self::Finalized => "finalized",
            Self::FinalizerAdded => "finalizer_added",
            Self::Indexed {
                status_updated: true,
                ..
            } => "indexed",
            Self::Indexed {
                status_updated: false,
                ..
            } => "unchanged",
        }
    }
}

fn fingerprint(id: &PolicyId, policy: &DnsPolicy) -> Result<String, Error> {
    let key = SelectionKey::of(&policy.spec).map_err(|source| Error::Validation {
        id: id.clone(),
        source,
    })?;
    key.hash().map_err(|source| Error::HashComputation {
        id: id.clone(),
        kind: "selector",
        source,
    })
}

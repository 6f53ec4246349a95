use ahash::AHashMap as HashMap;
use dns_policy_controller_core::PolicyId;
use dns_policy_controller_k8s_api::DnsPolicy;
use parking_lot::RwLock;
use std::{collections::hash_map::Entry, sync::Arc};

/// A handle to the process-wide policy index.
///
/// Clones share the same underlying maps. Every operation holds the lock only for in-memory map
/// updates, and every policy that crosses the API boundary is copied.
#[derive(Clone, Debug, Default)]
pub struct PolicyIndex(Arc<RwLock<Index>>);

/// Another policy already owns the hash.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("selector hash {hash} is already owned by {owner}")]
pub struct HashConflict {
    pub hash: String,
    pub owner: PolicyId,
}

#[derive(Debug, Default)]
struct Index {
    by_hash: HashMap<String, Indexed>,
    by_id: HashMap<PolicyId, String>,
}

#[derive(Debug)]
struct Indexed {
    id: PolicyId,
    policy: DnsPolicy,
}

// === impl PolicyIndex ===

impl PolicyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Indexes a copy of `policy` under `hash`.
    ///
    /// If the policy was previously indexed under a different hash, that entry is removed in the
    /// same critical section. Repeating an upsert with the same policy and hash is a no-op apart
    /// from refreshing the stored snapshot.
    pub fn upsert(&self, policy: &DnsPolicy, hash: impl Into<String>) -> Result<(), HashConflict> {
        let id = PolicyId::from(policy);
        let hash = hash.into();
        let snapshot = policy.clone();
        self.0.write().upsert(id, hash, snapshot)
    }

    /// Returns a copy of the policy indexed under `hash`.
    pub fn get(&self, hash: &str) -> Option<DnsPolicy> {
        self.0.read().by_hash.get(hash).map(|e| e.policy.clone())
    }

    /// Returns the identity of the policy that owns `hash`.
    pub fn owner(&self, hash: &str) -> Option<PolicyId> {
        self.0.read().by_hash.get(hash).map(|e| e.id.clone())
    }

    /// Removes the policy and its hash entry. Unknown policies are ignored.
    ///
    /// Returns the hash the policy was indexed under.
    pub fn delete(&self, id: &PolicyId) -> Option<String> {
        self.0.write().delete(id)
    }

    /// Returns copies of all indexed policies.
    ///
    /// The result does not track later updates.
    pub fn get_all(&self) -> Vec<DnsPolicy> {
        self.0
            .read()
            .by_hash
            .values()
            .map(|e| e.policy.clone())
            .collect()
    }

    /// The number of indexed hashes.
    pub fn size(&self) -> usize {
        self.0.read().by_hash.len()
    }

    #[cfg(test)]
    pub(crate) fn check_consistency(&self) {
        let index = self.0.read();
        assert_eq!(index.by_hash.len(), index.by_id.len());
        for (id, hash) in &index.by_id {
            let entry = index
                .by_hash
                .get(hash)
                .unwrap_or_else(|| panic!("{id} points to missing hash {hash}"));
            assert_eq!(&entry.id, id);
        }
    }
}

// === impl Index ===

impl Index {
    fn upsert(&mut self, id: PolicyId, hash: String, policy: DnsPolicy) -> Result<(), HashConflict> {
        if let Some(entry) = self.by_hash.get(&hash) {
            if entry.id != id {
                return Err(HashConflict {
                    hash,
                    owner: entry.id.clone(),
                });
            }
        }

        match self.by_id.entry(id.clone()) {
            Entry::Occupied(mut entry) => {
                if *entry.get() != hash {
                    let old = entry.insert(hash.clone());
                    self.by_hash.remove(&old);
                    tracing::debug!(policy = %id, %old, new = %hash, "Selector hash moved");
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(hash.clone());
                tracing::debug!(policy = %id, %hash, "Indexed");
            }
        }

        self.by_hash.insert(hash, Indexed { id, policy });
        Ok(())
    }

    fn delete(&mut self, id: &PolicyId) -> Option<String> {
        let hash = self.by_id.remove(id)?;
        self.by_hash.remove(&hash);
        tracing::debug!(policy = %id, %hash, "Removed");
        Some(hash)
    }
}

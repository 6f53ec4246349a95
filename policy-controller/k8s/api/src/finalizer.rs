//! Cleanup marker handling.
//!
//! A `DnsPolicy` is only indexed once it carries [`FINALIZER`], so the controller always gets a
//! chance to remove it from the index before the API server erases the object.

use kube::Resource;

pub const FINALIZER: &str = "dns.dnspolicies.io/finalizer";

pub fn contains<K: Resource>(obj: &K, finalizer: &str) -> bool {
    obj.meta()
        .finalizers
        .iter()
        .flatten()
        .any(|f| f == finalizer)
}

/// Adds the finalizer. Returns false if it was already present.
pub fn add<K: Resource>(obj: &mut K, finalizer: &str) -> bool {
    if contains(obj, finalizer) {
        return false;
    }
    obj.meta_mut()
        .finalizers
        .get_or_insert_with(Vec::new)
        .push(finalizer.to_string());
    true
}

/// Removes every occurrence of the finalizer. Returns false if it was not present.
pub fn remove<K: Resource>(obj: &mut K, finalizer: &str) -> bool {
    let Some(finalizers) = obj.meta_mut().finalizers.as_mut() else {
        return false;
    };
    let before = finalizers.len();
    finalizers.retain(|f| f != finalizer);
    before != finalizers.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DnsPolicy, DnsPolicySpec};

    #[test]
    fn add_and_remove() {
        let mut policy = DnsPolicy::new("p", DnsPolicySpec::default());
        assert!(!contains(&policy, FINALIZER));
        assert!(!remove(&mut policy, FINALIZER));

        assert!(add(&mut policy, FINALIZER));
        assert!(!add(&mut policy, FINALIZER));
        assert!(contains(&policy, FINALIZER));
        assert_eq!(policy.metadata.finalizers.as_ref().map(Vec::len), Some(1));

        assert!(remove(&mut policy, FINALIZER));
        assert!(!contains(&policy, FINALIZER));
    }

    #[test]
    fn leaves_foreign_finalizers() {
        let mut policy = DnsPolicy::new("p", DnsPolicySpec::default());
        policy.metadata.finalizers = Some(vec!["example.com/other".to_string()]);
        add(&mut policy, FINALIZER);
        remove(&mut policy, FINALIZER);
        assert_eq!(
            policy.metadata.finalizers,
            Some(vec!["example.com/other".to_string()])
        );
    }
}

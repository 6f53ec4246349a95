use crate::{HashConflict, PolicyIndex};
use dns_policy_controller_core::PolicyId;
use dns_policy_controller_k8s_api::{DnsPolicy, DnsPolicySpec};
use maplit::btreemap;
use pretty_assertions::assert_eq;

fn mk_policy(ns: &str, name: &str, app: &str) -> DnsPolicy {
    let mut policy = DnsPolicy::new(
        name,
        DnsPolicySpec {
            target_selector: Some(btreemap! { "app".to_string() => app.to_string() }),
            block_list: vec!["ads.example.com".to_string()],
            ..Default::default()
        },
    );
    policy.metadata.namespace = Some(ns.to_string());
    policy
}

#[test]
fn upsert_then_get() {
    let index = PolicyIndex::new();
    let policy = mk_policy("ns-0", "p", "web");
    index.upsert(&policy, "h1").unwrap();

    assert_eq!(index.get("h1"), Some(policy));
    assert_eq!(index.owner("h1"), Some(PolicyId::new("ns-0", "p")));
    assert_eq!(index.get("h2"), None);
    assert_eq!(index.size(), 1);
    index.check_consistency();
}

#[test]
fn upsert_moves_changed_hash() {
    let index = PolicyIndex::new();
    let policy = mk_policy("ns-0", "p", "web");
    index.upsert(&policy, "h1").unwrap();
    index.upsert(&policy, "h2").unwrap();

    assert_eq!(index.get("h1"), None);
    assert_eq!(index.get("h2"), Some(policy));
    assert_eq!(index.size(), 1);
    index.check_consistency();
}

#[test]
fn upsert_is_idempotent() {
    let index = PolicyIndex::new();
    let policy = mk_policy("ns-0", "p", "web");
    for _ in 0..3 {
        index.upsert(&policy, "h1").unwrap();
    }
    assert_eq!(index.size(), 1);
    assert_eq!(index.get_all(), vec![policy]);
    index.check_consistency();
}

#[test]
fn upsert_refreshes_snapshot() {
    let index = PolicyIndex::new();
    let mut policy = mk_policy("ns-0", "p", "web");
    index.upsert(&policy, "h1").unwrap();

    policy.spec.dry_run = true;
    index.upsert(&policy, "h1").unwrap();
    assert!(index.get("h1").unwrap().spec.dry_run);
}

#[test]
fn snapshots_are_copies() {
    let index = PolicyIndex::new();
    let mut policy = mk_policy("ns-0", "p", "web");
    index.upsert(&policy, "h1").unwrap();

    // Mutating the caller's object does not leak into the index.
    policy.spec.block_list.push("x.test".to_string());
    assert_eq!(index.get("h1").unwrap().spec.block_list.len(), 1);

    // Mutating a returned copy does not leak either.
    let mut copy = index.get("h1").unwrap();
    copy.spec.block_list.clear();
    assert_eq!(index.get("h1").unwrap().spec.block_list.len(), 1);
}

#[test]
fn delete_removes_both_entries() {
    let index = PolicyIndex::new();
    let a = mk_policy("ns-0", "a", "a");
    let b = mk_policy("ns-0", "b", "b");
    index.upsert(&a, "ha").unwrap();
    index.upsert(&b, "hb").unwrap();
    assert_eq!(index.size(), 2);

    assert_eq!(index.delete(&PolicyId::new("ns-0", "a")), Some("ha".to_string()));
    assert_eq!(index.get("ha"), None);
    assert_eq!(index.size(), 1);
    assert_eq!(index.get("hb"), Some(b));
    index.check_consistency();
}

#[test]
fn delete_unknown_is_noop() {
    let index = PolicyIndex::new();
    index.upsert(&mk_policy("ns-0", "a", "a"), "ha").unwrap();
    assert_eq!(index.delete(&PolicyId::new("ns-0", "missing")), None);
    assert_eq!(index.delete(&PolicyId::new("ns-1", "a")), None);
    assert_eq!(index.size(), 1);
}

#[test]
fn same_name_in_other_namespace_is_distinct() {
    let index = PolicyIndex::new();
    index.upsert(&mk_policy("ns-0", "p", "a"), "ha").unwrap();
    index.upsert(&mk_policy("ns-1", "p", "b"), "hb").unwrap();
    assert_eq!(index.size(), 2);
    index.delete(&PolicyId::new("ns-0", "p"));
    assert_eq!(index.owner("hb"), Some(PolicyId::new("ns-1", "p")));
    index.check_consistency();
}

#[test]
fn upsert_rejects_hash_owned_by_another_policy() {
    let index = PolicyIndex::new();
    let a = mk_policy("ns-0", "a", "web");
    let b = mk_policy("ns-0", "b", "web");
    index.upsert(&a, "h").unwrap();

    assert_eq!(
        index.upsert(&b, "h"),
        Err(HashConflict {
            hash: "h".to_string(),
            owner: PolicyId::new("ns-0", "a"),
        })
    );
    assert_eq!(index.get("h"), Some(a));
    assert_eq!(index.size(), 1);
    index.check_consistency();
}

#[test]
fn rejected_move_keeps_previous_entry() {
    let index = PolicyIndex::new();
    let a = mk_policy("ns-0", "a", "a");
    let b = mk_policy("ns-0", "b", "b");
    index.upsert(&a, "ha").unwrap();
    index.upsert(&b, "hb").unwrap();

    assert!(index.upsert(&b, "ha").is_err());
    assert_eq!(index.get("hb"), Some(b));
    assert_eq!(index.size(), 2);
    index.check_consistency();
}

#[test]
fn size_tracks_distinct_owners_under_churn() {
    let index = PolicyIndex::new();
    let names = ["a", "b", "c", "d", "e"];
    for round in 0..20usize {
        for (i, name) in names.iter().enumerate() {
            let policy = mk_policy("ns-0", name, name);
            let id = PolicyId::from(&policy);
            match (round + i) % 3 {
                0 => {
                    let _ = index.upsert(&policy, format!("{name}-{}", round % 2));
                }
                1 => {
                    index.delete(&id);
                }
                _ => {
                    let _ = index.upsert(&policy, format!("{name}-{round}"));
                }
            }
            index.check_consistency();
        }
    }
    let owners = index
        .get_all()
        .iter()
        .map(PolicyId::from)
        .collect::<std::collections::BTreeSet<_>>();
    assert_eq!(owners.len(), index.size());
}

#[test]
fn concurrent_readers_and_writers() {
    let index = PolicyIndex::new();
    let handles = (0..4)
        .map(|t| {
            let index = index.clone();
            std::thread::spawn(move || {
                for i in 0..200 {
                    let policy = mk_policy("ns-0", &format!("p{t}"), "web");
                    index.upsert(&policy, format!("t{t}-{}", i % 7)).unwrap();
                    let _ = index.get(&format!("t{}-{}", (t + 1) % 4, i % 7));
                    if i % 5 == 0 {
                        index.delete(&PolicyId::from(&policy));
                    }
                }
            })
        })
        .collect::<Vec<_>>();
    for h in handles {
        h.join().expect("thread must not panic");
    }
    index.check_consistency();
    assert!(index.size() <= 4);
}

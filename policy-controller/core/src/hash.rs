//! Deterministic fingerprints of policy content.
//!
//! Inputs are re-encoded as JSON over ordered maps and sorted lists before hashing so that a
//! fingerprint never depends on map iteration order or on the order of list entries in the
//! source object. Fingerprints are lowercase hex SHA-256 digests.

use dns_policy_controller_k8s_api::DnsPolicySpec;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

#[derive(Debug, thiserror::Error)]
#[error("failed to encode fingerprint input: {0}")]
pub struct HashError(#[from] serde_json::Error);

type Canonical<'a> = BTreeMap<&'a str, &'a str>;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NormalizedSpec<'a> {
    block_list: Vec<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    subject: Option<Canonical<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    target_selector: Option<Canonical<'a>>,
}

/// Fingerprints a selection mapping.
///
/// An empty mapping has no fingerprint and yields an empty string.
pub fn selector_hash<'a, I>(selection: I) -> Result<String, HashError>
where
    I: IntoIterator<Item = (&'a String, &'a String)>,
{
    let canonical = canonicalize(selection);
    if canonical.is_empty() {
        return Ok(String::new());
    }
    digest(&canonical)
}

/// Fingerprints the policy body: its selection key and its block list.
pub fn spec_hash(spec: &DnsPolicySpec) -> Result<String, HashError> {
    let mut block_list = spec.block_list.iter().map(String::as_str).collect::<Vec<_>>();
    block_list.sort_unstable();

    let normalized = NormalizedSpec {
        block_list,
        subject: spec.subject().map(canonicalize),
        target_selector: spec.target_selector().map(canonicalize),
    };
    digest(&normalized)
}

fn canonicalize<'a>(selection: impl IntoIterator<Item = (&'a String, &'a String)>) -> Canonical<'a> {
    selection
        .into_iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect()
}

fn digest<T: Serialize>(value: &T) -> Result<String, HashError> {
    let bytes = serde_json::to_vec(value)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use maplit::btreemap;
    use std::collections::HashMap;

    const FRONTEND: &str = "746847ef750f654a34b259b01519323955b4994ef30cbabe2caf15eacf2c23e5";

    fn labels(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn selector_hash_is_sha256_of_canonical_json() {
        let selector = labels(&[("app", "frontend")]);
        assert_eq!(selector_hash(&selector).unwrap(), FRONTEND);
    }

    #[test]
    fn selector_hash_ignores_insertion_order() {
        let pairs = [("app", "web"), ("tier", "frontend"), ("env", "prod"), ("zone", "a")];
        let expected = selector_hash(&labels(&pairs)).unwrap();

        let mut reversed = pairs;
        reversed.reverse();
        assert_eq!(selector_hash(&labels(&reversed)).unwrap(), expected);

        let mut rotated = pairs;
        rotated.rotate_left(2);
        assert_eq!(selector_hash(&labels(&rotated)).unwrap(), expected);

        let ordered = labels(&pairs).into_iter().collect::<BTreeMap<_, _>>();
        assert_eq!(selector_hash(&ordered).unwrap(), expected);
    }

    #[test]
    fn selector_hash_of_empty_mapping_is_empty() {
        assert_eq!(selector_hash(&HashMap::new()).unwrap(), "");
    }

    #[test]
    fn selector_hash_distinguishes_values() {
        let a = selector_hash(&labels(&[("app", "a")])).unwrap();
        let b = selector_hash(&labels(&[("app", "b")])).unwrap();
        assert_ne!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn spec_hash_matches_normalized_encoding() {
        let spec = DnsPolicySpec {
            target_selector: Some(btreemap! {
                "tier".to_string() => "web".to_string(),
                "app".to_string() => "frontend".to_string(),
            }),
            block_list: vec!["b.example.com".to_string(), "a.example.com".to_string()],
            ..Default::default()
        };
        assert_eq!(
            spec_hash(&spec).unwrap(),
            "a964d558eca0748f6e53e945d843b85e836bd4bd0319c336b6ae185bc9808689"
        );
    }

    #[test]
    fn spec_hash_ignores_block_list_order() {
        let domains = ["ads.example.com", "*.tracker.net", "malware.test", "a.b.c"];
        let spec = |list: &[&str]| DnsPolicySpec {
            subject: Some(btreemap! { "serviceAccount".to_string() => "web".to_string() }),
            block_list: list.iter().map(|d| d.to_string()).collect(),
            ..Default::default()
        };

        let expected = spec_hash(&spec(&domains)).unwrap();
        let mut reversed = domains;
        reversed.reverse();
        assert_eq!(spec_hash(&spec(&reversed)).unwrap(), expected);
        let mut rotated = domains;
        rotated.rotate_left(1);
        assert_eq!(spec_hash(&spec(&rotated)).unwrap(), expected);
    }

    #[test]
    fn spec_hash_tracks_content() {
        let base = DnsPolicySpec {
            target_selector: Some(btreemap! { "app".to_string() => "web".to_string() }),
            block_list: vec!["ads.example.com".to_string()],
            ..Default::default()
        };
        let more = DnsPolicySpec {
            block_list: vec!["ads.example.com".to_string(), "x.test".to_string()],
            ..base.clone()
        };
        let by_subject = DnsPolicySpec {
            target_selector: None,
            subject: base.target_selector.clone(),
            ..base.clone()
        };
        let base_hash = spec_hash(&base).unwrap();
        assert_ne!(base_hash, spec_hash(&more).unwrap());
        assert_ne!(base_hash, spec_hash(&by_subject).unwrap());
    }
}

use crate::{condition::Conditions, Map};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const API_GROUP: &str = "dns.dnspolicies.io";

/// Declares the DNS block list enforced for a set of workloads.
///
/// Workloads are selected either by `targetSelector` (all labels must match) or by `subject`
/// (an identity binding). Exactly one of the two is expected to be populated.
#[derive(Clone, Debug, Default, PartialEq, Eq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "dns.dnspolicies.io",
    version = "v1alpha1",
    kind = "DnsPolicy",
    status = "DnsPolicyStatus",
    shortname = "dnsp",
    derive = "PartialEq",
    derive = "Default",
    printcolumn = r#"{"name":"SelectorHash","type":"string","jsonPath":".status.selectorHash"}"#,
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct DnsPolicySpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_selector: Option<Map>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<Map>,

    /// Domain patterns that must not be resolved.
    #[serde(default)]
    pub block_list: Vec<String>,

    /// When set, violations are only observed by the enforcing proxy.
    #[serde(default, alias = "dryrun")]
    pub dry_run: bool,
}

/// State derived by the controller. Never written by operators.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DnsPolicyStatus {
    /// Fingerprint of the selection key, used by proxies to look the policy up.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub selector_hash: String,

    /// Fingerprint of the policy body, used by proxies to detect changes.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub spec_hash: String,

    #[serde(default)]
    pub observed_generation: i64,

    #[serde(default)]
    pub conditions: Conditions,
}

// === impl DnsPolicySpec ===

impl DnsPolicySpec {
    pub fn target_selector(&self) -> Option<&Map> {
        self.target_selector.as_ref().filter(|m| !m.is_empty())
    }

    pub fn subject(&self) -> Option<&Map> {
        self.subject.as_ref().filter(|m| !m.is_empty())
    }
}

// === impl DnsPolicy ===

impl DnsPolicy {
    pub fn status_or_default(&self) -> DnsPolicyStatus {
        self.status.clone().unwrap_or_default()
    }

    /// The revision number assigned by the API server, or zero when unset.
    pub fn generation(&self) -> i64 {
        self.metadata.generation.unwrap_or_default()
    }

    pub fn is_deleting(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maplit::btreemap;

    #[test]
    fn parses_wire_shape() {
        let policy: DnsPolicy = serde_json::from_value(serde_json::json!({
            "apiVersion": "dns.dnspolicies.io/v1alpha1",
            "kind": "DnsPolicy",
            "metadata": { "namespace": "ns-0", "name": "frontend" },
            "spec": {
                "targetSelector": { "app": "frontend" },
                "blockList": ["*.example.com"],
                "dryrun": true,
            },
            "status": {
                "selectorHash": "abc",
                "observedGeneration": 2,
                "conditions": [],
            },
        }))
        .expect("policy must parse");

        assert_eq!(
            policy.spec.target_selector(),
            Some(&btreemap! { "app".to_string() => "frontend".to_string() })
        );
        assert_eq!(policy.spec.subject(), None);
        assert!(policy.spec.dry_run);
        let status = policy.status_or_default();
        assert_eq!(status.selector_hash, "abc");
        assert_eq!(status.spec_hash, "");
        assert_eq!(status.observed_generation, 2);
    }

    #[test]
    fn api_group_matches_resource() {
        use kube::Resource;
        assert_eq!(DnsPolicy::group(&()), API_GROUP);
        assert_eq!(DnsPolicy::api_version(&()), format!("{API_GROUP}/v1alpha1"));
    }

    #[test]
    fn empty_mappings_are_absent() {
        let spec = DnsPolicySpec {
            target_selector: Some(Map::new()),
            subject: Some(btreemap! { "sa".to_string() => "web".to_string() }),
            ..Default::default()
        };
        assert_eq!(spec.target_selector(), None);
        assert!(spec.subject().is_some());
    }

    #[test]
    fn serializes_camel_case() {
        let spec = DnsPolicySpec {
            target_selector: Some(btreemap! { "app".to_string() => "web".to_string() }),
            block_list: vec!["ads.example.com".to_string()],
            dry_run: false,
            ..Default::default()
        };
        let value = serde_json::to_value(&spec).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "targetSelector": { "app": "web" },
                "blockList": ["ads.example.com"],
                "dryRun": false,
            })
        );
    }
}

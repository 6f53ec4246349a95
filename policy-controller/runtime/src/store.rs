use crate::{
    core::PolicyId,
    k8s::{
        events::{self, Recorder, Reporter},
        policy::API_GROUP,
        Api, Client, DnsPolicy, Patch, PatchParams, PostParams, Resource, ResourceExt,
    },
    status::{Event, EventSink, EventType, PolicyStore},
};
use anyhow::Result;
use tracing::warn;

/// Reads and writes `DnsPolicy` resources through the Kubernetes API.
#[derive(Clone)]
pub(crate) struct KubeStore {
    client: Client,
}

/// Publishes reconciliation events as Kubernetes `Event` resources.
#[derive(Clone)]
pub(crate) struct KubeEvents {
    recorder: Recorder,
}

// === impl KubeStore ===

impl KubeStore {
    pub(crate) fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, namespace: &str) -> Api<DnsPolicy> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait::async_trait]
impl PolicyStore for KubeStore {
    async fn get(&self, id: &PolicyId) -> Result<Option<DnsPolicy>> {
        let policy = self.api(&id.namespace).get_opt(&id.name).await?;
        Ok(policy)
    }

    async fn update(&self, policy: &DnsPolicy) -> Result<DnsPolicy> {
        let ns = policy.namespace().unwrap_or_default();
        let name = policy.name_any();
        let updated = self
            .api(&ns)
            .replace(&name, &PostParams::default(), policy)
            .await?;
        Ok(updated)
    }

    async fn update_status(&self, policy: &DnsPolicy) -> Result<()> {
        let ns = policy.namespace().unwrap_or_default();
        let name = policy.name_any();
        let patch = Patch::Merge(serde_json::json!({ "status": policy.status }));
        self.api(&ns)
            .patch_status(&name, &PatchParams::apply(API_GROUP), &patch)
            .await?;
        Ok(())
    }
}

// === impl KubeEvents ===

impl KubeEvents {
    pub(crate) fn new(client: Client, controller: String, instance: Option<String>) -> Self {
        let reporter = Reporter {
            controller,
            instance,
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

#[async_trait::async_trait]
impl EventSink for KubeEvents {
    async fn record(&self, policy: &DnsPolicy, event: Event) {
        let type_ = match event.type_ {
            EventType::Normal => events::EventType::Normal,
            EventType::Warning => events::EventType::Warning,
        };
        let ev = events::Event {
            type_,
            reason: event.reason.to_string(),
            note: Some(event.message),
            action: "Reconcile".to_string(),
            secondary: None,
        };
        if let Err(error) = self.recorder.publish(&ev, &policy.object_ref(&())).await {
            warn!(%error, reason = %ev.reason, "Failed to publish event");
        }
    }
}

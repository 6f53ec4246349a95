use dns_policy_controller_core::PolicyId;
use dns_policy_controller_k8s_api::DnsPolicy;
use std::sync::Arc;

/// Reads and writes `DnsPolicy` resources.
///
/// Implementations talk to the API server in production; tests use an in-memory store.
#[async_trait::async_trait]
pub trait PolicyStore: Send + Sync {
    /// Fetches the current state of a policy. `None` means the object no longer exists.
    async fn get(&self, id: &PolicyId) -> anyhow::Result<Option<DnsPolicy>>;

    /// Persists the object's metadata (i.e. its finalizers) and returns the stored object.
    async fn update(&self, policy: &DnsPolicy) -> anyhow::Result<DnsPolicy>;

    /// Persists the object's status subresource.
    async fn update_status(&self, policy: &DnsPolicy) -> anyhow::Result<()>;
}

/// Records human-readable events against a policy.
///
/// Recording is best-effort: implementations log failures rather than returning them.
#[async_trait::async_trait]
pub trait EventSink: Send + Sync {
    async fn record(&self, policy: &DnsPolicy, event: Event);
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Event {
    pub type_: EventType,
    pub reason: &'static str,
    pub message: String,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EventType {
    Normal,
    Warning,
}

// === impl Event ===

impl Event {
    pub fn normal(reason: &'static str, message: impl Into<String>) -> Self {
        Self {
            type_: EventType::Normal,
            reason,
            message: message.into(),
        }
    }

    pub fn warning(reason: &'static str, message: impl Into<String>) -> Self {
        Self {
            type_: EventType::Warning,
            reason,
            message: message.into(),
        }
    }
}

#[async_trait::async_trait]
impl<S: PolicyStore + ?Sized> PolicyStore for Arc<S> {
    async fn get(&self, id: &PolicyId) -> anyhow::Result<Option<DnsPolicy>> {
        (**self).get(id).await
    }

    async fn update(&self, policy: &DnsPolicy) -> anyhow::Result<DnsPolicy> {
        (**self).update(policy).await
    }

    async fn update_status(&self, policy: &DnsPolicy) -> anyhow::Result<()> {
        (**self).update_status(policy).await
    }
}

#[async_trait::async_trait]
impl<E: EventSink + ?Sized> EventSink for Arc<E> {
    async fn record(&self, policy: &DnsPolicy, event: Event) {
        (**self).record(policy, event).await
    }
}

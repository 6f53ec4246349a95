use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{counter::Counter, family::Family},
    registry::Registry,
};

/// Counts reconciliations by how they ended.
#[derive(Clone, Debug, Default)]
pub struct ReconcileMetrics {
    reconciles: Family<OutcomeLabels, Counter>,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct OutcomeLabels {
    outcome: &'static str,
}

// === impl ReconcileMetrics ===

impl ReconcileMetrics {
    pub fn register(reg: &mut Registry) -> Self {
        let metrics = Self::default();
        reg.register(
            "reconcile",
            "Count of DnsPolicy reconciliations by outcome",
            metrics.reconciles.clone(),
        );
        metrics
    }

    pub(crate) fn observe(&self, outcome: &'static str) {
        self.reconciles
            .get_or_create(&OutcomeLabels { outcome })
            .inc();
    }

    #[cfg(test)]
    pub(crate) fn count(&self, outcome: &'static str) -> u64 {
        self.reconciles
            .get_or_create(&OutcomeLabels { outcome })
            .get()
    }
}

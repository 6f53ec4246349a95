use crate::PolicyIndex;
use prometheus_client::{
    collector::Collector,
    encoding::{DescriptorEncoder, EncodeMetric},
    metrics::{gauge::ConstGauge, MetricType},
    registry::Registry,
};

#[derive(Debug)]
struct Instrumented(PolicyIndex);

/// Registers a collector that reports the index size on each scrape.
pub fn register(reg: &mut Registry, index: PolicyIndex) {
    reg.register_collector(Box::new(Instrumented(index)));
}

impl Collector for Instrumented {
    fn encode(&self, mut encoder: DescriptorEncoder<'_>) -> Result<(), std::fmt::Error> {
        let size = ConstGauge::new(self.0.size() as i64);
        let size_encoder = encoder.encode_descriptor(
            "size",
            "The number of selector hashes in the policy index",
            None,
            MetricType::Gauge,
        )?;
        size.encode(size_encoder)
    }
}

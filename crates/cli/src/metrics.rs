//! Prometheus registry for the `docflow` binary.
//!
//! Collects the core metrics plus document loading counters.

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// Documents read from disk by result.
pub static DOCUMENTS_LOADED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("docflow_documents_loaded_total", "Documents read from disk"),
        &["result"], // "ok", "error"
    )
    .unwrap()
});

fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(DOCUMENTS_LOADED.clone()))
        .unwrap();

    for metric in docflow_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .context("Failed to encode metrics")?;
    String::from_utf8(buffer).context("Metrics output is not UTF-8")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_includes_core_metrics() {
        DOCUMENTS_LOADED.with_label_values(&["ok"]).inc();
        docflow_core::metrics::ITEMS_PROCESSED
            .with_label_values(&["completed"])
            .inc();

        let text = encode_metrics().unwrap();

        assert!(text.contains("docflow_documents_loaded_total"));
        assert!(text.contains("docflow_items_processed_total"));
    }
}

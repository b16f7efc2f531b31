//! Runtime metrics: classification latency, ingest count, predicted label counts.

use std::collections::VecDeque;
use std::time::Duration;

use indexmap::IndexMap;

/// Latency samples kept for averages and percentiles. Older samples are dropped.
pub const LATENCY_WINDOW: usize = 10_000;

/// Collects runtime metrics for a classification engine.
///
/// Counters cover the whole process lifetime; latency figures cover the most
/// recent [`LATENCY_WINDOW`] classifications.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    classify_latencies_us: VecDeque<f64>,
    total_classifications: u64,
    total_inserts: u64,
    predictions: IndexMap<String, u64>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a classification, its duration and the label it produced.
    pub fn record_classify(&mut self, duration: Duration, label: &str) {
        self.total_classifications += 1;
        if self.classify_latencies_us.len() == LATENCY_WINDOW {
            self.classify_latencies_us.pop_front();
        }
        self.classify_latencies_us.push_back(duration.as_micros() as f64);
        *self.predictions.entry(label.to_string()).or_insert(0) += 1;
    }

    pub fn record_insert(&mut self) {
        self.total_inserts += 1;
    }

    pub fn total_classifications(&self) -> u64 {
        self.total_classifications
    }

    pub fn total_inserts(&self) -> u64 {
        self.total_inserts
    }

    /// How often each label has won, in first-predicted order.
    pub fn predictions(&self) -> &IndexMap<String, u64> {
        &self.predictions
    }

    /// Average classification latency in microseconds.
    pub fn avg_latency_us(&self) -> f64 {
        if self.classify_latencies_us.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.classify_latencies_us.iter().sum();
        sum / self.classify_latencies_us.len() as f64
    }

    /// Get a percentile of classification latency (e.g., 50.0, 95.0, 99.0).
    pub fn percentile_latency_us(&self, percentile: f64) -> f64 {
        self.percentiles_latency_us(&[percentile])[0]
    }

    /// Several latency percentiles from a single sort of the window.
    pub fn percentiles_latency_us(&self, percentiles: &[f64]) -> Vec<f64> {
        if self.classify_latencies_us.is_empty() {
            return vec![0.0; percentiles.len()];
        }

        let mut sorted: Vec<f64> = self.classify_latencies_us.iter().copied().collect();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let last = sorted.len() - 1;
        percentiles
            .iter()
            .map(|p| {
                let index = ((p / 100.0) * last as f64).round() as usize;
                sorted[index.min(last)]
            })
            .collect()
    }

    pub fn latency_samples(&self) -> usize {
        self.classify_latencies_us.len()
    }
}

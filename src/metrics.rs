// Metrics and observability module
// Owns the gRPC server handled counter and handling-time histogram, keyed by
// the base labels plus whatever the configured LabelExtractor declares
//
// Numan Thabit 2025 Nov

use crate::errors::{MetricsError, Result};
use crate::interceptor::UnaryServerInterceptor;
use crate::labels::{declared_label_names, LabelExtractor};
use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts};
use std::sync::Arc;
use tracing::warn;

pub const HANDLED_TOTAL: &str = "grpc_server_handled_total";
pub const HANDLING_SECONDS: &str = "grpc_server_handling_seconds";

/// Server-side gRPC metrics for unary calls.
///
/// Cheap to clone; clones share the same series. Register it into a
/// `prometheus::Registry` to have it scraped.
#[derive(Clone)]
pub struct ServerMetrics {
    label_names: Arc<[String]>,
    extractor: Arc<dyn LabelExtractor>,
    handled_total: IntCounterVec,
    handling_seconds: HistogramVec,
}

impl ServerMetrics {
    pub fn new(extractor: Arc<dyn LabelExtractor>) -> Result<Self> {
        Self::with_buckets(extractor, prometheus::DEFAULT_BUCKETS.to_vec())
    }

    pub fn with_buckets(extractor: Arc<dyn LabelExtractor>, buckets: Vec<f64>) -> Result<Self> {
        validate_buckets(&buckets)?;

        let label_names: Arc<[String]> = declared_label_names(extractor.as_ref()).into();
        let names: Vec<&str> = label_names.iter().map(String::as_str).collect();

        let handled_total = IntCounterVec::new(
            Opts::new(
                HANDLED_TOTAL,
                "Total number of RPCs completed on the server, regardless of success or failure.",
            ),
            &names,
        )?;
        let handling_seconds = HistogramVec::new(
            HistogramOpts::new(
                HANDLING_SECONDS,
                "Histogram of response latency (seconds) of gRPC that had been application-level handled by the server.",
            )
            .buckets(buckets),
            &names,
        )?;

        Ok(Self {
            label_names,
            extractor,
            handled_total,
            handling_seconds,
        })
    }

    /// Declared label set: `grpc_service`, `grpc_method`, `grpc_status`, then
    /// the extractor's names.
    pub fn label_names(&self) -> &Arc<[String]> {
        &self.label_names
    }

    pub fn extractor(&self) -> &Arc<dyn LabelExtractor> {
        &self.extractor
    }

    /// Interceptor that records into these metrics using their own extractor.
    pub fn interceptor(&self) -> UnaryServerInterceptor {
        UnaryServerInterceptor::new(self.clone())
    }

    /// Records one handled call. `values` must follow `label_names` order.
    pub fn observe(&self, values: &[&str], elapsed_secs: f64) {
        match self.handled_total.get_metric_with_label_values(values) {
            Ok(counter) => counter.inc(),
            Err(err) => {
                warn!(error = %err, "dropping handled_total observation");
                return;
            }
        }
        match self.handling_seconds.get_metric_with_label_values(values) {
            Ok(histogram) => histogram.observe(elapsed_secs),
            Err(err) => warn!(error = %err, "dropping handling_seconds observation"),
        }
    }

    pub fn handled_total(&self) -> &IntCounterVec {
        &self.handled_total
    }

    pub fn handling_seconds(&self) -> &HistogramVec {
        &self.handling_seconds
    }
}

impl Collector for ServerMetrics {
    fn desc(&self) -> Vec<&Desc> {
        let mut descs = self.handled_total.desc();
        descs.extend(self.handling_seconds.desc());
        descs
    }

    fn collect(&self) -> Vec<MetricFamily> {
        let mut families = self.handled_total.collect();
        families.extend(self.handling_seconds.collect());
        families
    }
}

// A trailing `+Inf` is accepted; prometheus drops it and always adds its own.
fn validate_buckets(buckets: &[f64]) -> Result<()> {
    let buckets = match buckets.split_last() {
        Some((last, rest)) if *last == f64::INFINITY => rest,
        _ => buckets,
    };
    if buckets.is_empty() {
        return Err(MetricsError::Config("histogram buckets must not be empty".into()));
    }
    if buckets.iter().any(|b| !b.is_finite()) {
        return Err(MetricsError::Config("histogram buckets must be finite".into()));
    }
    if buckets.windows(2).any(|pair| pair[0] >= pair[1]) {
        return Err(MetricsError::Config(
            "histogram buckets must be strictly increasing".into(),
        ));
    }
    Ok(())
}

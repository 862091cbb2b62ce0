// Per-call reporter
// Lives for exactly one unary call and commits exactly one observation into
// the server metrics when the call finishes or is abandoned
//
// Numan Thabit 2025 Nov

use crate::labels::{LabelValues, GRPC_STATUS};
use crate::metrics::ServerMetrics;
use crate::status::code_name;
use tokio::time::Instant;
use tonic::Code;
use tracing::debug;

pub struct ServerReporter<'a> {
    metrics: &'a ServerMetrics,
    labels: LabelValues,
    start: Instant,
    committed: bool,
}

impl<'a> ServerReporter<'a> {
    pub fn new(metrics: &'a ServerMetrics, labels: LabelValues) -> Self {
        Self {
            metrics,
            labels,
            start: Instant::now(),
            committed: false,
        }
    }

    /// Finishes the call with `code` as its status label.
    pub fn handled(mut self, code: Code) {
        self.commit(code);
    }

    fn commit(&mut self, code: Code) {
        if self.committed {
            return;
        }
        self.committed = true;
        self.labels.set(GRPC_STATUS, code_name(code));

        let elapsed = self.start.elapsed().as_secs_f64();
        let values = self.labels.ordered();
        debug!(labels = ?values, elapsed_secs = elapsed, "grpc call handled");
        self.metrics.observe(&values, elapsed);
    }
}

// Reached without `handled` only when the handler panicked or its future was
// dropped before producing a result.
impl Drop for ServerReporter<'_> {
    fn drop(&mut self) {
        let code = if std::thread::panicking() {
            Code::Internal
        } else {
            Code::Cancelled
        };
        self.commit(code);
    }
}

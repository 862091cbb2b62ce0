// Unary server interceptor
// Wraps a unary gRPC handler: resolves the call's labels, times the handler,
// classifies its outcome and records it, then hands the result back untouched
//
// Numan Thabit 2025 Nov

use crate::labels::{resolve_labels, CallContext};
use crate::metrics::ServerMetrics;
use crate::reporter::ServerReporter;
use crate::status::outcome_code;
use std::future::Future;
use tonic::{Request, Response, Status};

/// Identifies the method being invoked.
#[derive(Debug, Clone, Copy)]
pub struct UnaryServerInfo<'a> {
    /// Route of the call, e.g. `/demo.DemoService/SayHello`.
    pub full_method: &'a str,
}

impl<'a> UnaryServerInfo<'a> {
    pub const fn new(full_method: &'a str) -> Self {
        Self { full_method }
    }
}

/// Records `grpc_server_handled_total` and `grpc_server_handling_seconds`
/// around unary handlers.
#[derive(Clone)]
pub struct UnaryServerInterceptor {
    metrics: ServerMetrics,
}

impl UnaryServerInterceptor {
    pub fn new(metrics: ServerMetrics) -> Self {
        Self { metrics }
    }

    pub fn metrics(&self) -> &ServerMetrics {
        &self.metrics
    }

    /// Runs `handler` for one call and records exactly one observation.
    ///
    /// The request reaches the handler unmodified and the handler's result,
    /// success or failure, is returned as is. If the returned future is
    /// dropped before the handler finishes, the call is recorded as
    /// `Canceled`.
    pub async fn intercept<Req, Resp, H, Fut>(
        &self,
        info: &UnaryServerInfo<'_>,
        request: Request<Req>,
        handler: H,
    ) -> Result<Response<Resp>, Status>
    where
        H: FnOnce(Request<Req>) -> Fut,
        Fut: Future<Output = Result<Response<Resp>, Status>>,
    {
        let labels = {
            let ctx = CallContext::new(info.full_method, request.metadata(), request.extensions());
            resolve_labels(
                self.metrics.label_names(),
                self.metrics.extractor().as_ref(),
                &ctx,
            )
        };

        let reporter = ServerReporter::new(&self.metrics, labels);
        let result = handler(request).await;
        reporter.handled(outcome_code(&result));
        result
    }
}

// Demo gRPC service
// A single greeting method whose every call goes through the metrics
// interceptor
//
// Numan Thabit 2025 Nov

use crate::interceptor::{UnaryServerInfo, UnaryServerInterceptor};
use crate::proto::{DemoService, DemoServiceServer, HelloRequest, HelloResponse, SAY_HELLO};
use tonic::{Request, Response, Status};

#[derive(Clone)]
pub struct DemoServer {
    interceptor: UnaryServerInterceptor,
}

impl DemoServer {
    pub fn new(interceptor: UnaryServerInterceptor) -> Self {
        Self { interceptor }
    }

    pub fn into_service(self) -> DemoServiceServer<Self> {
        DemoServiceServer::new(self)
    }
}

#[tonic::async_trait]
impl DemoService for DemoServer {
    async fn say_hello(
        &self,
        request: Request<HelloRequest>,
    ) -> Result<Response<HelloResponse>, Status> {
        self.interceptor
            .intercept(&UnaryServerInfo::new(SAY_HELLO), request, |req| async move {
                say_hello(req.into_inner())
            })
            .await
    }
}

fn say_hello(request: HelloRequest) -> Result<Response<HelloResponse>, Status> {
    if request.name.is_empty() {
        return Err(Status::invalid_argument("name must not be empty"));
    }
    Ok(Response::new(HelloResponse {
        message: format!("Hello {}", request.name),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::DefaultLabelExtractor;
    use crate::metrics::ServerMetrics;
    use std::sync::Arc;

    fn server() -> DemoServer {
        let metrics = ServerMetrics::new(Arc::new(DefaultLabelExtractor)).unwrap();
        DemoServer::new(metrics.interceptor())
    }

    #[tokio::test]
    async fn greets_by_name() {
        let server = server();
        let response = server
            .say_hello(Request::new(HelloRequest {
                name: "Test".into(),
            }))
            .await
            .unwrap();
        assert_eq!(response.into_inner().message, "Hello Test");

        assert_eq!(
            server
                .interceptor
                .metrics()
                .handled_total()
                .with_label_values(&["demo.DemoService", "SayHello", "OK"])
                .get(),
            1
        );
    }

    #[tokio::test]
    async fn empty_name_is_invalid_and_counted() {
        let server = server();
        let status = server
            .say_hello(Request::new(HelloRequest::default()))
            .await
            .unwrap_err();
        assert_eq!(status.code(), tonic::Code::InvalidArgument);

        assert_eq!(
            server
                .interceptor
                .metrics()
                .handled_total()
                .with_label_values(&["demo.DemoService", "SayHello", "InvalidArgument"])
                .get(),
            1
        );
    }
}

// Metrics scrape endpoint
// Serves the Prometheus text exposition of a registry over HTTP, plus a small
// health route
//
// Numan Thabit 2025 Nov

use crate::errors::Result;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router as AxumRouter,
};
use prometheus::{Encoder, Registry, TextEncoder};
use serde::Serialize;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

#[derive(Clone)]
struct ScrapeState {
    registry: Registry,
    label_names: Arc<[String]>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub labels: Vec<String>,
}

/// Create the HTTP router exposing `/metrics` and `/health`
pub fn create_metrics_router(registry: Registry, label_names: Arc<[String]>) -> AxumRouter {
    AxumRouter::new()
        .route("/metrics", get(metrics))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(ScrapeState {
            registry,
            label_names,
        })
}

/// Render every registered collector in text exposition format.
pub fn render(registry: &Registry) -> Result<String> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&registry.gather(), &mut buffer)?;
    // TextEncoder only ever writes UTF-8.
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

async fn metrics(State(state): State<ScrapeState>) -> Response {
    match render(&state.registry) {
        Ok(body) => (
            [(header::CONTENT_TYPE, TextEncoder::new().format_type().to_string())],
            body,
        )
            .into_response(),
        Err(err) => {
            warn!(error = %err, "failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
        }
    }
}

async fn health_check(State(state): State<ScrapeState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        labels: state.label_names.to_vec(),
    })
}

/// Bind `addr` and serve the metrics router until `shutdown` resolves.
pub async fn serve_metrics<F>(
    addr: SocketAddr,
    registry: Registry,
    label_names: Arc<[String]>,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %listener.local_addr()?, "metrics endpoint listening");
    axum::serve(listener, create_metrics_router(registry, label_names))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::StaticLabelExtractor;
    use crate::metrics::ServerMetrics;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    fn registry_with_metrics() -> (Registry, ServerMetrics) {
        let extractor = StaticLabelExtractor::new(vec![("userName".into(), "jordi".into())]);
        let metrics = ServerMetrics::new(Arc::new(extractor)).unwrap();
        let registry = Registry::new();
        registry.register(Box::new(metrics.clone())).unwrap();
        (registry, metrics)
    }

    async fn fetch(router: AxumRouter, uri: &str) -> (StatusCode, String) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn metrics_route_serves_text_exposition() {
        let (registry, metrics) = registry_with_metrics();
        metrics.observe(&["demo.DemoService", "SayHello", "OK", "jordi"], 0.004);
        metrics.observe(&["demo.DemoService", "SayHello", "OK", "jordi"], 0.004);

        let router = create_metrics_router(registry, Arc::clone(metrics.label_names()));
        let (status, body) = fetch(router, "/metrics").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("# HELP grpc_server_handling_seconds"));
        let line = body
            .lines()
            .find(|l| l.starts_with("grpc_server_handled_total{"))
            .unwrap();
        assert!(line.contains(r#"grpc_service="demo.DemoService""#));
        assert!(line.contains(r#"grpc_method="SayHello""#));
        assert!(line.contains(r#"grpc_status="OK""#));
        assert!(line.contains(r#"userName="jordi""#));
        assert!(line.ends_with(" 2"));
    }

    #[tokio::test]
    async fn metrics_route_omits_unseen_series() {
        let (registry, metrics) = registry_with_metrics();
        let router = create_metrics_router(registry, Arc::clone(metrics.label_names()));
        let (status, body) = fetch(router, "/metrics").await;

        assert_eq!(status, StatusCode::OK);
        assert!(!body.contains("grpc_server_handled_total{"));
        assert!(!body.contains("grpc_server_handling_seconds_bucket{"));
    }

    #[tokio::test]
    async fn health_lists_declared_labels() {
        let (registry, metrics) = registry_with_metrics();
        let router = create_metrics_router(registry, Arc::clone(metrics.label_names()));
        let (status, body) = fetch(router, "/health").await;

        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(
            json["labels"],
            serde_json::json!(["grpc_service", "grpc_method", "grpc_status", "userName"])
        );
    }
}

// Library root module for grpc-prom
// Prometheus metrics for unary gRPC servers: a label extractor protocol, the
// handled counter and handling-time histogram, and the interceptor that
// records them, plus the demo service, scrape endpoint and polling client
//
// Numan Thabit 2025 Nov

pub mod client;
pub mod config;
pub mod errors;
pub mod interceptor;
pub mod labels;
pub mod metrics;
pub mod proto;
pub mod reporter;
pub mod scrape;
pub mod service;
pub mod status;

pub use errors::MetricsError;
pub use interceptor::{UnaryServerInfo, UnaryServerInterceptor};
pub use labels::{
    CallContext, DefaultLabelExtractor, LabelExtractor, MetadataLabelExtractor,
    StaticLabelExtractor,
};
pub use metrics::ServerMetrics;

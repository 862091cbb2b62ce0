// Configuration management module
// This file handles loading and parsing of configuration settings for the
// server and the polling client from environment variables
//
// Numan Thabit 2025 Nov

use crate::errors::{MetricsError, Result};
use crate::labels::{
    DefaultLabelExtractor, LabelExtractor, MetadataLabelExtractor, StaticLabelExtractor,
    DEFAULT_METADATA_VALUE_LIMIT,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use url::Url;

/// Environment variable prefix, e.g. `GRPC_PROM__GRPC_ADDR`.
pub const ENV_PREFIX: &str = "GRPC_PROM";

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// gRPC listen address
    #[serde(default = "default_grpc_addr")]
    pub grpc_addr: SocketAddr,
    /// Prometheus scrape endpoint listen address
    #[serde(default = "default_metrics_addr")]
    pub metrics_addr: SocketAddr,
    /// Handling-time histogram buckets in seconds, comma separated
    pub histogram_buckets: Option<String>,
    /// Fixed custom labels, `name=value,...`
    pub static_labels: Option<String>,
    /// Custom labels read from request metadata, `name=metadata-key,...`
    pub metadata_labels: Option<String>,
    /// Distinct values admitted per metadata label before new ones resolve
    /// to `default`
    #[serde(default = "default_metadata_value_limit")]
    pub metadata_value_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            grpc_addr: default_grpc_addr(),
            metrics_addr: default_metrics_addr(),
            histogram_buckets: None,
            static_labels: None,
            metadata_labels: None,
            metadata_value_limit: default_metadata_value_limit(),
        }
    }
}

impl ServerConfig {
    pub fn load() -> Result<Self> {
        load_env()
    }

    /// Custom buckets, or `None` to use the Prometheus defaults.
    pub fn buckets(&self) -> Result<Option<Vec<f64>>> {
        let Some(raw) = self.histogram_buckets.as_deref() else {
            return Ok(None);
        };
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<f64>()
                    .map_err(|err| MetricsError::Config(format!("invalid bucket {s:?}: {err}")))
            })
            .collect::<Result<Vec<_>>>()
            .map(Some)
    }

    /// Label extractor selected by configuration. Metadata labels win over
    /// static labels; with neither set, no custom labels are attached.
    pub fn label_extractor(&self) -> Result<Arc<dyn LabelExtractor>> {
        if let Some(raw) = self.metadata_labels.as_deref() {
            let extractor = MetadataLabelExtractor::new(parse_pairs(raw)?)
                .with_value_limit(self.metadata_value_limit);
            return Ok(Arc::new(extractor));
        }
        if let Some(raw) = self.static_labels.as_deref() {
            return Ok(Arc::new(StaticLabelExtractor::new(parse_pairs(raw)?)));
        }
        Ok(Arc::new(DefaultLabelExtractor))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Server endpoint, e.g. http://localhost:9093
    #[serde(default = "default_endpoint")]
    pub endpoint: Url,
    /// Pause between calls
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Names sent in turn, comma separated
    #[serde(default = "default_names")]
    pub names: String,
    /// Request metadata attached to every call, `key=value,...`
    pub metadata: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            interval_secs: default_interval_secs(),
            names: default_names(),
            metadata: None,
        }
    }
}

impl ClientConfig {
    pub fn load() -> Result<Self> {
        load_env()
    }

    pub fn names(&self) -> Vec<String> {
        self.names
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn metadata_pairs(&self) -> Result<Vec<(String, String)>> {
        match self.metadata.as_deref() {
            Some(raw) => parse_pairs(raw),
            None => Ok(Vec::new()),
        }
    }
}

fn load_env<T: for<'de> Deserialize<'de>>() -> Result<T> {
    let cfg = config::Config::builder()
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__"),
        )
        .build()
        .map_err(|err| MetricsError::Config(err.to_string()))?;
    cfg.try_deserialize()
        .map_err(|err| MetricsError::Config(err.to_string()))
}

/// Parses `a=1,b=2` into ordered pairs. Empty segments are skipped.
pub fn parse_pairs(raw: &str) -> Result<Vec<(String, String)>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((name, value)) if !name.trim().is_empty() => {
                Ok((name.trim().to_string(), value.trim().to_string()))
            }
            _ => Err(MetricsError::Config(format!(
                "expected name=value, got {pair:?}"
            ))),
        })
        .collect()
}

fn default_grpc_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 9093))
}

fn default_metrics_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 9092))
}

fn default_metadata_value_limit() -> usize {
    DEFAULT_METADATA_VALUE_LIMIT
}

fn default_endpoint() -> Url {
    Url::parse("http://localhost:9093").expect("static endpoint is a valid URL")
}

fn default_interval_secs() -> u64 {
    3
}

fn default_names() -> String {
    "Test,Test111".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_label_pairs_in_order() {
        let pairs = parse_pairs("userName=x-user-name, tenant = x-tenant ,").unwrap();
        assert_eq!(
            pairs,
            vec![
                ("userName".to_string(), "x-user-name".to_string()),
                ("tenant".to_string(), "x-tenant".to_string()),
            ]
        );
    }

    #[test]
    fn rejects_pairs_without_name() {
        assert!(matches!(parse_pairs("=x"), Err(MetricsError::Config(_))));
        assert!(matches!(parse_pairs("novalue"), Err(MetricsError::Config(_))));
    }

    #[test]
    fn parses_buckets() {
        let cfg = ServerConfig {
            histogram_buckets: Some("0.001, 0.01,0.1".into()),
            ..ServerConfig::default()
        };
        assert_eq!(cfg.buckets().unwrap(), Some(vec![0.001, 0.01, 0.1]));
        assert_eq!(ServerConfig::default().buckets().unwrap(), None);

        let bad = ServerConfig {
            histogram_buckets: Some("fast".into()),
            ..ServerConfig::default()
        };
        assert!(bad.buckets().is_err());
    }

    #[test]
    fn extractor_selection() {
        let cfg = ServerConfig::default();
        assert!(cfg.label_extractor().unwrap().label_names().is_empty());

        let cfg = ServerConfig {
            static_labels: Some("userName=jordi".into()),
            ..ServerConfig::default()
        };
        assert_eq!(cfg.label_extractor().unwrap().label_names(), vec!["userName"]);

        let cfg = ServerConfig {
            static_labels: Some("userName=jordi".into()),
            metadata_labels: Some("tenant=x-tenant".into()),
            ..ServerConfig::default()
        };
        assert_eq!(cfg.label_extractor().unwrap().label_names(), vec!["tenant"]);
    }

    #[test]
    fn metadata_value_limit_reaches_extractor() {
        let cfg = ServerConfig {
            metadata_labels: Some("userName=x-user-name".into()),
            metadata_value_limit: 2,
            ..ServerConfig::default()
        };
        let extractor = cfg.label_extractor().unwrap();
        let names: Arc<[String]> = crate::labels::declared_label_names(extractor.as_ref()).into();
        let extensions = tonic::Extensions::default();

        let mut resolved = Vec::new();
        for user in ["a", "b", "c", "a"] {
            let mut metadata = tonic::metadata::MetadataMap::new();
            metadata.insert("x-user-name", user.parse().unwrap());
            let ctx = crate::labels::CallContext::new("/s.S/M", &metadata, &extensions);
            let values = crate::labels::resolve_labels(&names, extractor.as_ref(), &ctx);
            resolved.push(values.ordered()[3].to_string());
        }
        assert_eq!(resolved, vec!["a", "b", "default", "a"]);
        assert_eq!(
            ServerConfig::default().metadata_value_limit,
            DEFAULT_METADATA_VALUE_LIMIT
        );
    }

    #[test]
    fn client_defaults() {
        let cfg = ClientConfig::default();
        assert_eq!(cfg.endpoint.as_str(), "http://localhost:9093/");
        assert_eq!(cfg.names(), vec!["Test", "Test111"]);
        assert!(cfg.metadata_pairs().unwrap().is_empty());
    }
}

// Label resolution for per-call metrics
// Declares the label set shared by every gRPC server metric and resolves the
// concrete values for one inbound call: service and method from the route,
// everything else from a pluggable LabelExtractor
//
// Numan Thabit 2025 Nov

use crate::errors::MetricsError;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use tonic::metadata::MetadataMap;
use tonic::Extensions;
use tracing::{debug, warn};

pub const GRPC_SERVICE: &str = "grpc_service";
pub const GRPC_METHOD: &str = "grpc_method";
pub const GRPC_STATUS: &str = "grpc_status";

/// Base label names, always first and always in this order.
pub const BASE_LABEL_NAMES: [&str; 3] = [GRPC_SERVICE, GRPC_METHOD, GRPC_STATUS];

/// Value for a declared label nobody filled in.
pub const DEFAULT_LABEL_VALUE: &str = "default";
/// Service and method value when the route cannot be split.
pub const UNKNOWN_LABEL_VALUE: &str = "unknown";

/// What a label extractor is allowed to look at for one call.
#[derive(Clone, Copy)]
pub struct CallContext<'a> {
    full_method: &'a str,
    metadata: &'a MetadataMap,
    extensions: &'a Extensions,
}

impl<'a> CallContext<'a> {
    pub fn new(full_method: &'a str, metadata: &'a MetadataMap, extensions: &'a Extensions) -> Self {
        Self {
            full_method,
            metadata,
            extensions,
        }
    }

    /// Route of the call, e.g. `/demo.DemoService/SayHello`.
    pub fn full_method(&self) -> &'a str {
        self.full_method
    }

    pub fn metadata(&self) -> &'a MetadataMap {
        self.metadata
    }

    pub fn extensions(&self) -> &'a Extensions {
        self.extensions
    }
}

/// Supplies the custom labels attached to every server metric.
///
/// `label_names` is read once when the metrics are built. `labels` runs on the
/// request path for every call, so it must not block or do I/O. Names it leaves
/// out resolve to `"default"`; names it returns that were never declared are
/// dropped.
pub trait LabelExtractor: Send + Sync {
    fn label_names(&self) -> Vec<String>;

    fn labels(&self, ctx: &CallContext<'_>) -> Result<HashMap<String, String>, MetricsError>;
}

/// No custom labels.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultLabelExtractor;

impl LabelExtractor for DefaultLabelExtractor {
    fn label_names(&self) -> Vec<String> {
        Vec::new()
    }

    fn labels(&self, _ctx: &CallContext<'_>) -> Result<HashMap<String, String>, MetricsError> {
        Ok(HashMap::new())
    }
}

/// Attaches the same fixed values to every call, e.g. a deployment or user tag.
#[derive(Debug, Clone, Default)]
pub struct StaticLabelExtractor {
    labels: Vec<(String, String)>,
}

impl StaticLabelExtractor {
    pub fn new(labels: Vec<(String, String)>) -> Self {
        Self { labels }
    }
}

impl LabelExtractor for StaticLabelExtractor {
    fn label_names(&self) -> Vec<String> {
        self.labels.iter().map(|(name, _)| name.clone()).collect()
    }

    fn labels(&self, _ctx: &CallContext<'_>) -> Result<HashMap<String, String>, MetricsError> {
        Ok(self.labels.iter().cloned().collect())
    }
}

/// Distinct values a metadata-backed label may take before new values
/// collapse into `"default"`.
pub const DEFAULT_METADATA_VALUE_LIMIT: usize = 100;

/// Copies label values out of inbound gRPC metadata.
///
/// Each declared label is paired with the metadata key it is read from. Missing
/// keys and values that are not printable ASCII leave the label unset.
///
/// Values come from the caller, and every distinct value becomes a series that
/// is never removed. Each label therefore admits at most `value_limit` distinct
/// values; later newcomers are left unset while already admitted values keep
/// resolving.
#[derive(Debug)]
pub struct MetadataLabelExtractor {
    keys: Vec<MetadataKey>,
    value_limit: usize,
}

#[derive(Debug)]
struct MetadataKey {
    label: String,
    key: String,
    admitted: Mutex<HashSet<String>>,
}

impl MetadataLabelExtractor {
    /// `keys` holds `(label name, metadata key)` pairs.
    pub fn new(keys: Vec<(String, String)>) -> Self {
        let keys = keys
            .into_iter()
            .map(|(label, key)| MetadataKey {
                label,
                key: key.to_ascii_lowercase(),
                admitted: Mutex::new(HashSet::new()),
            })
            .collect();
        Self {
            keys,
            value_limit: DEFAULT_METADATA_VALUE_LIMIT,
        }
    }

    /// Caps the distinct values admitted per label.
    pub fn with_value_limit(mut self, value_limit: usize) -> Self {
        self.value_limit = value_limit;
        self
    }

    pub fn value_limit(&self) -> usize {
        self.value_limit
    }

    fn admit(&self, entry: &MetadataKey, value: &str) -> bool {
        let mut admitted = entry
            .admitted
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if admitted.contains(value) {
            return true;
        }
        if admitted.len() >= self.value_limit {
            return false;
        }
        admitted.insert(value.to_string());
        if admitted.len() == self.value_limit {
            warn!(
                label = %entry.label,
                limit = self.value_limit,
                "metadata label reached its value limit; new values resolve to default"
            );
        }
        true
    }
}

impl LabelExtractor for MetadataLabelExtractor {
    fn label_names(&self) -> Vec<String> {
        self.keys.iter().map(|entry| entry.label.clone()).collect()
    }

    fn labels(&self, ctx: &CallContext<'_>) -> Result<HashMap<String, String>, MetricsError> {
        let mut labels = HashMap::with_capacity(self.keys.len());
        for entry in &self.keys {
            let Some(value) = ctx.metadata().get(entry.key.as_str()) else {
                continue;
            };
            match value.to_str() {
                Ok(value) if self.admit(entry, value) => {
                    labels.insert(entry.label.clone(), value.to_string());
                }
                Ok(_) => debug!(label = %entry.label, "metadata value over limit"),
                Err(_) => {
                    debug!(label = %entry.label, key = %entry.key, "metadata value not printable")
                }
            }
        }
        Ok(labels)
    }
}

/// Full label set for an extractor: the base names followed by the
/// extractor's own names, in declaration order.
pub fn declared_label_names(extractor: &dyn LabelExtractor) -> Vec<String> {
    BASE_LABEL_NAMES
        .iter()
        .map(|name| name.to_string())
        .chain(extractor.label_names())
        .collect()
}

/// Splits `/package.Service/Method` into service and method.
pub fn split_method_name(full_method: &str) -> (&str, &str) {
    let full_method = full_method.strip_prefix('/').unwrap_or(full_method);
    match full_method.split_once('/') {
        Some((service, method)) => (service, method),
        None => (UNKNOWN_LABEL_VALUE, UNKNOWN_LABEL_VALUE),
    }
}

/// One value slot per declared label name, kept in declaration order.
#[derive(Debug, Clone)]
pub struct LabelValues {
    names: Arc<[String]>,
    values: Vec<Option<String>>,
}

impl LabelValues {
    pub fn new(names: Arc<[String]>) -> Self {
        let values = vec![None; names.len()];
        Self { names, values }
    }

    /// Sets a declared label. Returns false when `name` is not declared.
    pub fn set(&mut self, name: &str, value: impl Into<String>) -> bool {
        match self.names.iter().position(|declared| declared == name) {
            Some(idx) => {
                self.values[idx] = Some(value.into());
                true
            }
            None => false,
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        let idx = self.names.iter().position(|declared| declared == name)?;
        self.values[idx].as_deref()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Values in declaration order, unset slots rendered as `"default"`.
    pub fn ordered(&self) -> Vec<&str> {
        self.values
            .iter()
            .map(|value| value.as_deref().unwrap_or(DEFAULT_LABEL_VALUE))
            .collect()
    }
}

/// Resolves every declared label for one call. Never fails: an extractor
/// error is logged and its labels fall back to the default value.
pub fn resolve_labels(
    names: &Arc<[String]>,
    extractor: &dyn LabelExtractor,
    ctx: &CallContext<'_>,
) -> LabelValues {
    let (service, method) = split_method_name(ctx.full_method());
    let mut values = LabelValues::new(Arc::clone(names));
    values.set(GRPC_SERVICE, service);
    values.set(GRPC_METHOD, method);

    match extractor.labels(ctx) {
        Ok(custom) => {
            for (name, value) in custom {
                if !values.set(&name, value) {
                    debug!(label = %name, "dropping undeclared label");
                }
            }
        }
        Err(err) => {
            warn!(error = %err, method = %ctx.full_method(), "label extraction failed; using defaults");
        }
    }
    values
}

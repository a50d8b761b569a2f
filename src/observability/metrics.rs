//! Per-request metric accumulation and egress.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): one per finished request, labelled by indexed entries
//! - `gateway_<name>` (histogram): every non-indexed numeric entry, e.g. `gateway_upstream_duration_ms`
//!
//! # Design Decisions
//! - The accumulator is an ordered list, so the egress sees entries in the
//!   order steps produced them
//! - Labels come only from indexed entries to keep cardinality deliberate

use std::net::SocketAddr;

use metrics::Label;
use metrics_exporter_prometheus::PrometheusBuilder;

/// Value of one accumulated metric.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricValue {
    Text(String),
    Number(f64),
}

impl std::fmt::Display for MetricValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricValue::Text(s) => f.write_str(s),
            MetricValue::Number(n) => write!(f, "{}", n),
        }
    }
}

impl From<&str> for MetricValue {
    fn from(v: &str) -> Self {
        MetricValue::Text(v.to_string())
    }
}

impl From<String> for MetricValue {
    fn from(v: String) -> Self {
        MetricValue::Text(v)
    }
}

impl From<u16> for MetricValue {
    fn from(v: u16) -> Self {
        MetricValue::Number(v as f64)
    }
}

impl From<u64> for MetricValue {
    fn from(v: u64) -> Self {
        MetricValue::Number(v as f64)
    }
}

impl From<f64> for MetricValue {
    fn from(v: f64) -> Self {
        MetricValue::Number(v)
    }
}

/// One `{name, value, indexed}` triple.
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    pub name: String,
    pub value: MetricValue,
    pub indexed: bool,
}

/// Ordered metrics gathered while one request flows through the pipeline.
#[derive(Debug, Clone, Default)]
pub struct RequestMetrics {
    entries: Vec<Metric>,
}

impl RequestMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: impl Into<String>, value: impl Into<MetricValue>, indexed: bool) {
        self.entries.push(Metric {
            name: name.into(),
            value: value.into(),
            indexed,
        });
    }

    /// Shorthand for an indexed entry.
    pub fn tag(&mut self, name: impl Into<String>, value: impl Into<MetricValue>) {
        self.add(name, value, true);
    }

    pub fn entries(&self) -> &[Metric] {
        &self.entries
    }

    /// Most recent value recorded under `name`.
    pub fn get(&self, name: &str) -> Option<&MetricValue> {
        self.entries.iter().rev().find(|m| m.name == name).map(|m| &m.value)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Where finished request metrics go.
pub trait MetricsSink: Send + Sync {
    fn publish(&self, metrics: &RequestMetrics);
}

/// Writes through the `metrics` facade; a Prometheus recorder picks it up.
#[derive(Debug, Default, Clone)]
pub struct PrometheusSink;

impl MetricsSink for PrometheusSink {
    fn publish(&self, request: &RequestMetrics) {
        let mut labels: Vec<Label> = Vec::new();
        for m in request.entries().iter().filter(|m| m.indexed) {
            labels.retain(|l| l.key() != m.name);
            labels.push(Label::new(m.name.clone(), m.value.to_string()));
        }

        metrics::counter!("gateway_requests_total", labels.clone()).increment(1);

        for m in request.entries().iter().filter(|m| !m.indexed) {
            if let MetricValue::Number(n) = m.value {
                metrics::histogram!(format!("gateway_{}", m.name), labels.clone()).record(n);
            }
        }
    }
}

/// Start the Prometheus scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to start metrics endpoint"),
    }
}

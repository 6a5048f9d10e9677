//! Prometheus metrics for the web layer

use crate::error::{Error, Result};
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder,
};

/// Request and schema metrics, exposed on `/metrics`
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    /// Requests by route and status code
    pub requests: IntCounterVec,
    /// Failed catalog operations by error code
    pub errors: IntCounterVec,
    /// Time to fetch, resolve and render one schema
    pub show_schema_seconds: Histogram,
}

impl Metrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let requests = IntCounterVec::new(
            Opts::new("crdviz_requests_total", "Requests served by route and status"),
            &["route", "status"],
        )
        .map_err(metrics_error)?;
        let errors = IntCounterVec::new(
            Opts::new("crdviz_errors_total", "Failed catalog operations by error code"),
            &["code"],
        )
        .map_err(metrics_error)?;
        let show_schema_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "crdviz_show_schema_duration_seconds",
                "Time to fetch, resolve and render a CRD schema",
            )
            .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        )
        .map_err(metrics_error)?;

        registry
            .register(Box::new(requests.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(errors.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(show_schema_seconds.clone()))
            .map_err(metrics_error)?;

        Ok(Self {
            registry,
            requests,
            errors,
            show_schema_seconds,
        })
    }

    /// Count a served request
    pub fn observe_request(&self, route: &str, status: u16) {
        self.requests
            .with_label_values(&[route, &status.to_string()])
            .inc();
    }

    /// Count a failed catalog operation
    pub fn observe_error(&self, err: &Error) {
        self.errors.with_label_values(&[err.code()]).inc();
    }

    /// Text exposition format
    pub fn encode(&self) -> Result<(String, String)> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(metrics_error)?;
        let body = String::from_utf8(buffer)
            .map_err(|e| Error::Internal(format!("metrics are not UTF-8: {}", e)))?;
        Ok((encoder.format_type().to_string(), body))
    }
}

fn metrics_error(err: prometheus::Error) -> Error {
    Error::Internal(format!("metrics: {}", err))
}

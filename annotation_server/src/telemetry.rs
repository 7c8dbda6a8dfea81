use opentelemetry::{
    global,
    metrics::{Counter, Histogram, MeterProvider, UpDownCounter},
    KeyValue,
};
use opentelemetry_sdk::metrics::SdkMeterProvider;
use prometheus::Registry;
use std::collections::HashSet;
use thiserror::Error;

pub const ROUTE_UPLOAD: &str = "/upload";
pub const ROUTE_STREAM: &str = "/ws";

#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to build prometheus exporter: {0}")]
    Exporter(String),
}

pub struct Metrics {
    frames_received: Counter<u64>,
    frames_skipped: Counter<u64>,
    frames_dropped: Counter<u64>,
    upload_requests: Counter<u64>,
    pipeline_duration: Histogram<u64>,
    active_sessions: UpDownCounter<i64>,
    sessions_closed: Counter<u64>,
    // Dropping the last provider handle shuts the exporter down.
    _provider: SdkMeterProvider,
    pub registry: Registry,
}

impl Metrics {
    pub fn new() -> Result<Self, TelemetryError> {
        let registry = Registry::new();
        let exporter = opentelemetry_prometheus::exporter()
            .with_registry(registry.clone())
            .build()
            .map_err(|e| TelemetryError::Exporter(e.to_string()))?;

        let provider = SdkMeterProvider::builder().with_reader(exporter).build();

        let meter = provider.meter("annotation_server");
        global::set_meter_provider(provider.clone());

        let frames_received = meter
            .u64_counter("frames_received_total")
            .with_description("Frames received on streaming sessions")
            .build();

        let frames_skipped = meter
            .u64_counter("frames_skipped_total")
            .with_description("Streaming frames skipped because they did not decode")
            .build();

        let frames_dropped = meter
            .u64_counter("frames_dropped_total")
            .with_description("Streaming frames discarded by the inbound buffer overflow policy")
            .build();

        let upload_requests = meter
            .u64_counter("upload_requests_total")
            .with_description("Single-shot upload requests by outcome")
            .build();

        let boundaries = generate_boundaries((15, 30, 60, 500, 1000));

        let pipeline_duration = meter
            .u64_histogram("pipeline_duration_ms")
            .with_boundaries(boundaries)
            .with_description("Duration of frame pipeline runs in milliseconds")
            .build();

        let active_sessions = meter
            .i64_up_down_counter("active_sessions")
            .with_description("Open streaming sessions")
            .build();

        let sessions_closed = meter
            .u64_counter("sessions_closed_total")
            .with_description("Streaming sessions closed, by reason")
            .build();

        Ok(Metrics {
            frames_received,
            frames_skipped,
            frames_dropped,
            upload_requests,
            pipeline_duration,
            active_sessions,
            sessions_closed,
            _provider: provider,
            registry,
        })
    }

    pub fn record_frame_received(&self) {
        self.frames_received.add(1, &[]);
    }

    pub fn record_frame_skipped(&self) {
        self.frames_skipped.add(1, &[]);
    }

    pub fn record_frame_dropped(&self, policy: &str) {
        let attributes = vec![KeyValue::new("policy", policy.to_string())];
        self.frames_dropped.add(1, &attributes);
    }

    pub fn record_upload(&self, outcome: &str) {
        let attributes = vec![KeyValue::new("outcome", outcome.to_string())];
        self.upload_requests.add(1, &attributes);
    }

    pub fn record_pipeline_duration(&self, duration_ms: u64, route: &str) {
        let attributes = vec![KeyValue::new("route", route.to_string())];
        self.pipeline_duration.record(duration_ms, &attributes);
    }

    pub fn session_opened(&self) {
        self.active_sessions.add(1, &[]);
    }

    pub fn session_closed(&self, reason: &str) {
        self.active_sessions.add(-1, &[]);
        let attributes = vec![KeyValue::new("reason", reason.to_string())];
        self.sessions_closed.add(1, &attributes);
    }
}

fn generate_boundaries(parts: (i32, i32, i32, i32, i32)) -> Vec<f64> {
    let first_step: usize = 10;
    let middle_step: usize = 2;
    let end_step: usize = 20;
    let tail_step: usize = 100;
    let first_part = (parts.0..=parts.1).step_by(first_step);
    let middle_part = (parts.1..=parts.2).step_by(middle_step);
    let end_part = (parts.2..=parts.3).step_by(end_step);
    let tail_part = (parts.3..=parts.4).step_by(tail_step);

    let mut seen = HashSet::new();
    first_part
        .chain(middle_part)
        .chain(end_part)
        .chain(tail_part)
        .filter(|&x| seen.insert(x))
        .map(|x| x as f64)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_boundaries() {
        let parts = (2, 22, 26, 46, 146);
        let get = generate_boundaries(parts);
        let expected = vec![2.0, 12.0, 22.0, 24.0, 26.0, 46.0, 146.0];

        assert_eq!(get, expected);
    }

    #[test]
    fn test_metrics_are_exported() {
        let metrics = Metrics::new().unwrap();
        metrics.record_frame_received();
        metrics.record_pipeline_duration(42, ROUTE_STREAM);

        let names: Vec<String> = metrics
            .registry
            .gather()
            .iter()
            .map(|family| family.get_name().to_string())
            .collect();

        assert!(names.iter().any(|n| n.starts_with("frames_received")));
        assert!(names.iter().any(|n| n.starts_with("pipeline_duration_ms")));
    }

    #[test]
    fn test_active_sessions_returns_to_zero() {
        let metrics = Metrics::new().unwrap();
        metrics.session_opened();
        metrics.session_closed("peer_closed");

        let families = metrics.registry.gather();
        let active = families
            .iter()
            .find(|family| family.get_name().starts_with("active_sessions"))
            .unwrap();
        assert_eq!(active.get_metric().len(), 1);
        assert_eq!(active.get_metric()[0].get_gauge().value(), 0.0);

        let closed = families
            .iter()
            .find(|family| family.get_name().starts_with("sessions_closed"))
            .unwrap();
        let labels: Vec<(String, String)> = closed.get_metric()[0]
            .get_label()
            .iter()
            .map(|pair| (pair.get_name().to_string(), pair.get_value().to_string()))
            .collect();
        assert!(labels.contains(&("reason".to_string(), "peer_closed".to_string())));
    }
}

//! Prometheus metrics for monitoring
//!
//! Exposes metrics for:
//! - Event counts and rejections
//! - Step completion progress
//! - Plan replacements and resets

use crate::error::{ProgressError, ProgressResult};
use crate::events::ProgressEvent;
use crate::tracker::ListOutcome;

use axum::{http::StatusCode, routing::get, Router};
use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_gauge, Counter, CounterVec, Encoder, Gauge,
    TextEncoder,
};
use std::net::SocketAddr;
use tracing::info;

lazy_static! {
    // Event metrics
    pub static ref EVENTS_RECEIVED: CounterVec = register_counter_vec!(
        "swap_progress_events_received_total",
        "Total step events received by type",
        &["event_type"]
    ).unwrap();

    pub static ref EVENTS_REJECTED: CounterVec = register_counter_vec!(
        "swap_progress_events_rejected_total",
        "Total step events rejected by reason",
        &["reason"]
    ).unwrap();

    // Progress metrics
    pub static ref STEPS_COMPLETED: Counter = register_counter!(
        "swap_progress_steps_completed_total",
        "Total step completion events applied"
    ).unwrap();

    pub static ref LIST_REPLACEMENTS: CounterVec = register_counter_vec!(
        "swap_progress_list_replacements_total",
        "Total steps-list events by outcome",
        &["outcome"]
    ).unwrap();

    pub static ref RESETS: Counter = register_counter!(
        "swap_progress_resets_total",
        "Total progress resets"
    ).unwrap();

    pub static ref STEPS_TRACKED: Gauge = register_gauge!(
        "swap_progress_steps_tracked",
        "Steps in the current list"
    ).unwrap();

    pub static ref STEPS_DONE: Gauge = register_gauge!(
        "swap_progress_steps_done",
        "Completed steps in the current list"
    ).unwrap();

    pub static ref ALL_COMPLETED: Gauge = register_gauge!(
        "swap_progress_all_completed",
        "Whether every tracked step is completed (1=yes, 0=no)"
    ).unwrap();
}

/// Prometheus metrics server
pub struct MetricsServer {
    port: u16,
}

impl MetricsServer {
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    pub async fn run(&self) -> ProgressResult<()> {
        let app = Router::new().route("/metrics", get(metrics_handler));

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        info!("Starting metrics server on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| ProgressError::Internal(format!("bind {}: {}", addr, e)))?;
        axum::serve(listener, app)
            .await
            .map_err(|e| ProgressError::Internal(e.to_string()))?;

        Ok(())
    }
}

async fn metrics_handler() -> (StatusCode, String) {
    match render() {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

/// Encode all registered metrics in the text exposition format
pub fn render() -> ProgressResult<String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| ProgressError::Internal(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| ProgressError::Internal(e.to_string()))
}

// Helper functions to record metrics

pub fn record_event(event: &ProgressEvent) {
    EVENTS_RECEIVED.with_label_values(&[event.name()]).inc();
}

pub fn record_rejected(error: &ProgressError) {
    EVENTS_REJECTED.with_label_values(&[error.kind()]).inc();
}

pub fn record_step_completed() {
    STEPS_COMPLETED.inc();
}

pub fn record_list_outcome(outcome: ListOutcome) {
    let label = match outcome {
        ListOutcome::Merged { .. } => "merged",
        ListOutcome::Skipped => "skipped",
    };
    LIST_REPLACEMENTS.with_label_values(&[label]).inc();
}

pub fn record_reset() {
    RESETS.inc();
}

pub fn record_progress(total: usize, completed: usize, all_completed: bool) {
    STEPS_TRACKED.set(total as f64);
    STEPS_DONE.set(completed as f64);
    ALL_COMPLETED.set(if all_completed { 1.0 } else { 0.0 });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_includes_recorded_metrics() {
        record_reset();
        record_progress(9, 2, false);
        record_rejected(&ProgressError::EventParsing("bad".to_string()));

        let body = render().unwrap();
        assert!(body.contains("swap_progress_resets_total"));
        assert!(body.contains("swap_progress_steps_tracked"));
        assert!(body.contains("reason=\"event_parsing\""));
    }
}

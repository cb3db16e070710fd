use std::time::Instant;

use chrono::Utc;
use serde_json::Value as JsonValue;
use tracing::info;

use crate::error::{Result, StudioError};

/// Wraps a generation call with paired request/response events on the
/// `studio.timing` target so slow models and quota failures show up in
/// timing.jsonl without grepping the general log.
pub async fn log_generation_timing<T, F, Fut>(
    model: &str,
    operation: &str,
    metadata: Option<JsonValue>,
    call: F,
) -> Result<T>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let started_at = Utc::now();
    let started_perf = Instant::now();
    let metadata_text = metadata
        .as_ref()
        .map(|value| value.to_string())
        .unwrap_or_else(|| "{}".to_string());
    info!(
        target: "studio.timing",
        "event=generation_request model={} operation={} started_at={} metadata={}",
        model,
        operation,
        started_at.to_rfc3339(),
        metadata_text
    );

    let result = call().await;
    let status = match &result {
        Ok(_) => "success",
        Err(StudioError::QuotaExceeded) => "quota_exceeded",
        Err(StudioError::Cancelled) => "cancelled",
        Err(StudioError::VideoTimedOut { .. }) => "timed_out",
        Err(_) => "error",
    };

    let completed_at = Utc::now();
    let duration = started_perf.elapsed().as_secs_f64();
    info!(
        target: "studio.timing",
        "event=generation_response model={} operation={} completed_at={} duration_s={:.3} status={} metadata={}",
        model,
        operation,
        completed_at.to_rfc3339(),
        duration,
        status,
        metadata_text
    );

    result
}

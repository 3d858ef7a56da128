//! Collector API handlers.
//!
//! Each handler reads/writes via `MetricStore` and maps errors onto the
//! status taxonomy: 400 for validation, 404 for a missing metric, 500 for
//! internal/persistence failures. Not-found is a normal outcome and is not
//! logged as an error.

use std::io::Read;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use flate2::read::GzDecoder;
use serde::Deserialize;
use tracing::error;

use tally_model::{Metric, MetricKind, MetricRecord, MetricValue};
use tally_store::StoreError;

use crate::ApiState;

fn error_response(status: StatusCode, msg: String) -> Response {
    (status, msg).into_response()
}

fn internal_error(err: impl std::fmt::Display) -> Response {
    error!(error = %err, "internal server error");
    error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal server error".to_string(),
    )
}

/// Decode a request body, gunzipping when `Content-Encoding: gzip` is set.
fn decode_body(headers: &HeaderMap, body: &Bytes) -> Result<Vec<u8>, String> {
    let is_gzip = headers
        .get(header::CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("gzip"));

    if !is_gzip {
        return Ok(body.to_vec());
    }

    let mut decoded = Vec::new();
    GzDecoder::new(body.as_ref())
        .read_to_end(&mut decoded)
        .map_err(|e| format!("failed to decompress request body: {e}"))?;
    Ok(decoded)
}

/// POST /update — apply a JSON metric record, respond with the merged record.
pub async fn update_metric(
    State(state): State<ApiState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let body = match decode_body(&headers, &body) {
        Ok(body) => body,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, msg),
    };

    let record: MetricRecord = match serde_json::from_slice(&body) {
        Ok(record) => record,
        Err(e) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                format!("failed to parse metric record: {e}"),
            );
        }
    };

    let metric = match Metric::try_from(record) {
        Ok(metric) => metric,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
    };

    match state.store.update(metric).await {
        Ok(merged) => Json(MetricRecord::from(&merged)).into_response(),
        Err(e) => internal_error(e),
    }
}

/// POST /update/{kind}/{name}/{value} — path-parameter update variant.
///
/// The raw value parses as an integer for counters and a float for gauges.
pub async fn update_metric_by_params(
    State(state): State<ApiState>,
    Path((kind, name, value)): Path<(String, String, String)>,
) -> Response {
    let kind: MetricKind = match kind.parse() {
        Ok(kind) => kind,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
    };

    let metric = match kind {
        MetricKind::Counter => match value.parse::<i64>() {
            Ok(delta) => Metric::counter(name, delta),
            Err(e) => {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    format!("failed to parse counter value: {e}"),
                );
            }
        },
        MetricKind::Gauge => match value.parse::<f64>() {
            Ok(value) => Metric::gauge(name, value),
            Err(e) => {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    format!("failed to parse gauge value: {e}"),
                );
            }
        },
    };

    match state.store.update(metric).await {
        Ok(_) => StatusCode::OK.into_response(),
        Err(e) => internal_error(e),
    }
}

/// Lookup request body for POST /value.
#[derive(Deserialize)]
struct MetricQuery {
    id: String,
    #[serde(rename = "type")]
    kind: MetricKind,
}

/// POST /value — look up a metric by `{id, type}`, respond with its record.
pub async fn get_metric(
    State(state): State<ApiState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let body = match decode_body(&headers, &body) {
        Ok(body) => body,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, msg),
    };

    let query: MetricQuery = match serde_json::from_slice(&body) {
        Ok(query) => query,
        Err(e) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                format!("failed to parse metric query: {e}"),
            );
        }
    };

    match state.store.get(query.kind, &query.id).await {
        Ok(metric) => Json(MetricRecord::from(&metric)).into_response(),
        Err(e) if e.is_not_found() => error_response(StatusCode::NOT_FOUND, e.to_string()),
        Err(e) => internal_error(e),
    }
}

/// GET /value/{kind}/{name} — bare metric value as text.
pub async fn get_metric_by_params(
    State(state): State<ApiState>,
    Path((kind, name)): Path<(String, String)>,
) -> Response {
    let kind: MetricKind = match kind.parse() {
        Ok(kind) => kind,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
    };

    match state.store.get(kind, &name).await {
        Ok(metric) => match metric.value {
            MetricValue::Counter(delta) => delta.to_string().into_response(),
            MetricValue::Gauge(value) => value.to_string().into_response(),
        },
        Err(e) if e.is_not_found() => error_response(StatusCode::NOT_FOUND, e.to_string()),
        Err(e) => internal_error(e),
    }
}

/// GET / — newline-delimited `name value` listing of all stored metrics.
///
/// Gauges print with 5-digit fixed precision, counters as integers; lines
/// are sorted by name for a stable listing.
pub async fn list_metrics(State(state): State<ApiState>) -> Response {
    let metrics = state.store.list().await;

    let mut entries: Vec<(String, String)> = metrics
        .into_values()
        .map(|m| {
            let rendered = match m.value {
                MetricValue::Counter(delta) => delta.to_string(),
                MetricValue::Gauge(value) => format!("{value:.5}"),
            };
            (m.name, rendered)
        })
        .collect();
    entries.sort();

    let mut out = String::new();
    for (name, rendered) in entries {
        out.push_str(&name);
        out.push(' ');
        out.push_str(&rendered);
        out.push('\n');
    }

    out.into_response()
}

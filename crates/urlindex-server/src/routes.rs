//! HTTP handlers for the query API (§6): Operation A, Operation B, and
//! `/healthz`. Each handler records the same request/refused/response-time
//! metrics the teacher records for DNS queries, just keyed by `operation`
//! instead of `qtype`.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;

use urlindex_core::context::Context;
use urlindex_core::query;
use urlindex_types::error::Error;
use urlindex_types::model::DatasetId;

use crate::metrics;
use crate::state::{AppState, REQUEST_DEADLINE};
use crate::wire::{DatasetsOfResponse, ErrorResponse, UrlsOfQuery, UrlsOfResponse};

fn error_status(err: &Error) -> StatusCode {
    match err {
        Error::InputMalformed(_) => StatusCode::BAD_REQUEST,
        Error::VersionMissing | Error::ArtifactCorrupt { .. } => StatusCode::SERVICE_UNAVAILABLE,
        Error::TransientIo { .. } => StatusCode::GATEWAY_TIMEOUT,
        Error::OverCapacity(_) => StatusCode::TOO_MANY_REQUESTS,
        Error::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(operation: &str, err: Error) -> (StatusCode, Json<ErrorResponse>) {
    let reason = if matches!(err, Error::InputMalformed(_)) {
        "malformed_input"
    } else {
        "internal"
    };
    metrics::QUERY_REQUESTS_REFUSED_TOTAL
        .with_label_values(&[operation, reason])
        .inc();
    (error_status(&err), Json(ErrorResponse { error: err.to_string() }))
}

pub async fn datasets_of(
    State(state): State<Arc<AppState>>,
    Path(domain): Path<String>,
) -> (StatusCode, Json<serde_json::Value>) {
    let start = Instant::now();
    metrics::QUERY_REQUESTS_TOTAL.with_label_values(&["datasets_of"]).inc();

    let version = state.current_version();
    let result = query::datasets_of(&version, &domain);

    metrics::QUERY_RESPONSE_TIME_SECONDS
        .with_label_values(&["datasets_of"])
        .observe(start.elapsed().as_secs_f64());

    match result {
        Ok(result) => {
            let body = DatasetsOfResponse::from(result);
            (StatusCode::OK, Json(serde_json::to_value(body).unwrap()))
        }
        Err(err) => {
            let (status, body) = error_response("datasets_of", err);
            (status, Json(serde_json::to_value(body.0).unwrap()))
        }
    }
}

pub async fn urls_of(
    State(state): State<Arc<AppState>>,
    Path((domain, dataset_id)): Path<(String, u32)>,
    Query(params): Query<UrlsOfQuery>,
) -> (StatusCode, Json<serde_json::Value>) {
    let start = Instant::now();
    metrics::QUERY_REQUESTS_TOTAL.with_label_values(&["urls_of"]).inc();

    let version = state.current_version();
    let limit = params.limit.unwrap_or(state.config.default_limit);
    let ctx = Context::new(
        &version.artifacts,
        &state.postings_cache,
        &state.row_group_cache,
        Instant::now() + REQUEST_DEADLINE,
    );

    let result = query::urls_of(
        &ctx,
        &version,
        &state.config,
        &domain,
        DatasetId(dataset_id),
        params.offset,
        limit,
    );

    metrics::QUERY_RESPONSE_TIME_SECONDS
        .with_label_values(&["urls_of"])
        .observe(start.elapsed().as_secs_f64());

    match result {
        Ok(result) => {
            if ctx.is_expired() && result.next_offset.is_some() {
                metrics::QUERY_PARTIAL_RESULTS_TOTAL.inc();
            }
            let body: UrlsOfResponse = result.into();
            (StatusCode::OK, Json(serde_json::to_value(body).unwrap()))
        }
        Err(err) => {
            let (status, body) = error_response("urls_of", err);
            (status, Json(serde_json::to_value(body.0).unwrap()))
        }
    }
}

pub async fn healthz(State(state): State<Arc<AppState>>) -> (StatusCode, &'static str) {
    let version = state.current_version();
    if version.artifacts.version.is_empty() {
        (StatusCode::SERVICE_UNAVAILABLE, "no published version")
    } else {
        (StatusCode::OK, "ok")
    }
}

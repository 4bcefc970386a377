use axum::{
    Json, Router,
    body::{Body, Bytes},
    extract::{State, rejection::JsonRejection},
    http::header,
    response::{IntoResponse, Response},
    routing::post,
};
use futures::StreamExt;
use prep::{PrepError, trace_channel};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::{AppState, error::ApiError};

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct AnalyzeMeetingsRequest {
    /// Passed to the calendar agent exactly as given
    pub date: String,
}

/// Runs the calendar fetch before answering, so a fetch failure becomes a plain error
/// response. Everything after that is streamed as one JSON record per line.
pub async fn analyze_meetings(
    State(state): State<AppState>,
    payload: Result<Json<AnalyzeMeetingsRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    tracing::info!("[API] Analyzing meetings for '{}'", request.date);

    let (sink, receiver) = trace_channel();
    let fetched = state.pipeline().begin(request.date, sink).await?;
    let run_id = fetched.run_id();

    tokio::spawn(async move {
        match fetched.finish().await {
            Ok(_) => tracing::debug!("[API] Run {} streamed to completion", run_id),
            Err(PrepError::StreamClosed) => {
                tracing::info!("[API] Client left before run {} finished", run_id)
            }
            Err(e) => tracing::warn!("[API] Run {} ended with error: {}", run_id, e),
        }
    });

    let lines = receiver
        .into_records()
        .map(|record| record.to_ndjson_line().map(Bytes::from));

    Ok((
        [(header::CONTENT_TYPE, "application/json")],
        Body::from_stream(lines),
    )
        .into_response())
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/analyze-meetings", post(analyze_meetings))
}

use std::convert::Infallible;

use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;
use cctv_core::log::DetectionRecord;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;

use crate::error::AppError;
use crate::state::AppState;

pub const DEFAULT_LIMIT: usize = 50;

#[derive(serde::Deserialize)]
pub struct DetectionsQuery {
    limit: Option<String>,
}

fn parse_limit(raw: Option<&str>, capacity: usize) -> Result<usize, AppError> {
    let limit = match raw.map(str::trim) {
        None | Some("") => DEFAULT_LIMIT,
        Some(value) => value.parse::<usize>().map_err(|_| {
            AppError::bad_request(format!("limit must be a non-negative integer, got '{value}'"))
        })?,
    };
    Ok(limit.min(capacity))
}

/// GET /detections — newest records from the detection log, oldest first.
pub async fn recent_detections(
    State(app): State<AppState>,
    Query(q): Query<DetectionsQuery>,
) -> Result<Json<Vec<DetectionRecord>>, AppError> {
    let limit = parse_limit(q.limit.as_deref(), app.manager.log().capacity())?;
    Ok(Json(app.manager.recent_detections(limit)))
}

/// GET /events — SSE stream emitting a `detection` event per detected object.
pub async fn sse_events(State(app): State<AppState>) -> impl IntoResponse {
    let rx = app.manager.subscribe_events();
    let stream = BroadcastStream::new(rx).filter_map(|msg| match msg {
        Ok(event) => Event::default()
            .event("detection")
            .json_data(&event)
            .ok()
            .map(Ok::<Event, Infallible>),
        Err(e) => {
            tracing::debug!(error = %e, "event subscriber lagged");
            None
        }
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

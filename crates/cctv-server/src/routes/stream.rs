use std::convert::Infallible;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use cctv_core::encode::{multipart_chunk, MJPEG_CONTENT_TYPE};
use tokio_stream::wrappers::WatchStream;
use tokio_stream::StreamExt as _;

use crate::state::AppState;

/// GET /video_feed — MJPEG stream of the newest annotated frames.
///
/// Each client follows the frame channel independently and only ever sees
/// the latest frame; while the camera is off the stream stays open and idle.
pub async fn video_feed(State(app): State<AppState>) -> Response {
    let frames = WatchStream::new(app.manager.subscribe_frames()).filter_map(|packet| {
        packet.map(|p| Ok::<Bytes, Infallible>(multipart_chunk(&p.jpeg)))
    });

    (
        [
            (header::CONTENT_TYPE, MJPEG_CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(frames),
    )
        .into_response()
}

/// GET /frame.jpg — the latest frame, or 204 when the camera is off.
pub async fn latest_frame(State(app): State<AppState>) -> Response {
    match app.manager.latest_frame() {
        Some(packet) => (
            [
                (header::CONTENT_TYPE, "image/jpeg"),
                (header::CACHE_CONTROL, "no-cache"),
            ],
            packet.jpeg,
        )
            .into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

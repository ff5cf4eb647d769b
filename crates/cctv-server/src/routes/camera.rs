use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use cctv_core::error::CctvError;
use cctv_core::manager::{CameraStatus, ControlOutcome};

use crate::error::AppError;
use crate::state::AppState;

/// GET /cameras — indexes of cameras that open and deliver a frame.
pub async fn list_cameras(State(app): State<AppState>) -> Result<Json<Vec<u32>>, AppError> {
    let manager = app.manager.clone();
    let cameras = tokio::task::spawn_blocking(move || manager.list_cameras())
        .await
        .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))?;
    Ok(Json(cameras))
}

#[derive(serde::Deserialize)]
pub struct ControlBody {
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    camera_index: Option<i64>,
}

enum Action {
    On(u32),
    Off,
}

fn parse_action(body: ControlBody) -> Result<Action, ControlOutcome> {
    let action = body.action.unwrap_or_default().to_ascii_lowercase();
    match action.as_str() {
        "on" => {
            let index = body.camera_index.unwrap_or(0);
            u32::try_from(index)
                .map(Action::On)
                .map_err(|_| ControlOutcome {
                    success: false,
                    message: CctvError::InvalidCameraIndex(index).to_string(),
                })
        }
        "off" => Ok(Action::Off),
        _ => Err(invalid_request()),
    }
}

fn invalid_request() -> ControlOutcome {
    ControlOutcome {
        success: false,
        message: "Invalid request".to_string(),
    }
}

/// POST /control — turn the camera on or off.
///
/// Malformed bodies and unknown actions get a 400 with the same
/// `{success, message}` shape as a normal reply.
pub async fn control(
    State(app): State<AppState>,
    body: Result<Json<ControlBody>, JsonRejection>,
) -> Result<(StatusCode, Json<ControlOutcome>), AppError> {
    let action = match body {
        Ok(Json(body)) => parse_action(body),
        Err(rejection) => {
            tracing::debug!(error = %rejection, "rejected control body");
            Err(invalid_request())
        }
    };
    let action = match action {
        Ok(action) => action,
        Err(outcome) => return Ok((StatusCode::BAD_REQUEST, Json(outcome))),
    };

    let manager = app.manager.clone();
    let outcome = tokio::task::spawn_blocking(move || match action {
        Action::On(index) => manager.start(index),
        Action::Off => manager.stop(),
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))?;

    Ok((StatusCode::OK, Json(outcome)))
}

/// GET /status
pub async fn get_status(State(app): State<AppState>) -> Json<CameraStatus> {
    Json(app.manager.status())
}

pub mod embed;
pub mod error;
pub mod routes;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use cctv_core::config::{Config, WarnLevel};
use cctv_core::error::CctvError;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// Build the axum Router with all routes and middleware.
/// Used by `serve()` and available for integration testing.
pub fn build_router(app_state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(embed::index))
        // Camera control
        .route("/cameras", get(routes::camera::list_cameras))
        .route("/control", post(routes::camera::control))
        .route("/status", get(routes::camera::get_status))
        // Frames
        .route("/video_feed", get(routes::stream::video_feed))
        .route("/frame.jpg", get(routes::stream::latest_frame))
        // Detections
        .route("/detections", get(routes::detections::recent_detections))
        .route("/events", get(routes::detections::sse_events))
        .fallback(embed::static_handler)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

/// Start the streaming server described by `config`.
///
/// Refuses to start on error-level config problems. Runs until Ctrl-C, then
/// turns the camera off. Open streams are dropped rather than drained.
pub async fn serve(config: Config, open_browser: bool) -> anyhow::Result<()> {
    let errors: Vec<String> = config
        .validate()
        .into_iter()
        .filter(|w| w.level == WarnLevel::Error)
        .map(|w| w.message)
        .collect();
    if !errors.is_empty() {
        return Err(CctvError::InvalidConfig(errors.join("; ")).into());
    }

    let state = AppState::from_config(&config)?;

    let manager = state.manager.clone();
    let cameras = tokio::task::spawn_blocking(move || manager.list_cameras()).await?;
    if cameras.is_empty() {
        tracing::warn!(backend = state.manager.backend_name(), "no cameras found");
    } else {
        tracing::info!(?cameras, "cameras found");
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tokio::select! {
        result = serve_on(state.clone(), listener, open_browser) => result?,
        _ = tokio::signal::ctrl_c() => tracing::info!("shutting down"),
    }

    let manager = state.manager.clone();
    tokio::task::spawn_blocking(move || manager.stop()).await?;
    Ok(())
}

/// Start the server on a pre-bound listener.
///
/// Unlike `serve`, this accepts a `TcpListener` that was already bound so the
/// caller can read the actual port before starting (useful when `port = 0` and
/// the OS picks a free port).
pub async fn serve_on(
    state: AppState,
    listener: tokio::net::TcpListener,
    open_browser: bool,
) -> anyhow::Result<()> {
    let local = listener.local_addr()?;
    let url = if local.ip().is_unspecified() {
        format!("http://localhost:{}", local.port())
    } else {
        format!("http://{local}")
    };

    tracing::info!("cctv server listening on {url}");

    if open_browser {
        let _ = open::that(&url);
    }

    axum::serve(listener, build_router(state)).await?;
    Ok(())
}

use std::sync::Arc;

use cctv_core::camera::backend_for;
use cctv_core::config::Config;
use cctv_core::detect::load_detector;
use cctv_core::log::DetectionLog;
use cctv_core::manager::{CameraManager, ManagerSettings};

/// Shared application state, cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<CameraManager>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(manager: CameraManager, config: Config) -> Self {
        Self {
            manager: Arc::new(manager),
            config: Arc::new(config),
        }
    }

    /// Build the camera backend, detector and detection log from `config`.
    ///
    /// A detector that fails to load is logged and treated as unavailable so
    /// the stream still works without inference.
    pub fn from_config(config: &Config) -> cctv_core::Result<Self> {
        let backend = backend_for(&config.camera)?;

        let detector = match load_detector(&config.detector) {
            Ok(detector) => detector,
            Err(e) => {
                tracing::warn!(error = %e, "object detection unavailable");
                None
            }
        };

        let log = Arc::new(DetectionLog::open(&config.log.path, config.log.capacity));
        tracing::info!(
            backend = backend.name(),
            log = %config.log.path.display(),
            entries = log.len(),
            "camera pipeline ready"
        );

        let manager = CameraManager::new(backend, detector, log, ManagerSettings::from(config));
        Ok(Self::new(manager, config.clone()))
    }
}

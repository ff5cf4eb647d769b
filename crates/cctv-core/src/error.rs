use thiserror::Error;

#[derive(Debug, Error)]
pub enum CctvError {
    #[error("failed to open camera {index}: {reason}")]
    CameraOpen { index: u32, reason: String },

    #[error("camera read failed: {0}")]
    CameraRead(String),

    #[error("camera backend '{0}' is not available in this build")]
    BackendUnavailable(String),

    #[error("failed to load model '{path}': {reason}")]
    ModelLoad { path: String, reason: String },

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("frame encoding failed: {0}")]
    Encode(String),

    #[error("invalid camera index: {0}")]
    InvalidCameraIndex(i64),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CctvError>;

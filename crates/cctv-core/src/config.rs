use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const DEFAULT_CONFIG_FILE: &str = "cctv.yaml";

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

// ---------------------------------------------------------------------------
// BackendKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    V4l,
    TestPattern,
}

impl BackendKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BackendKind::V4l => "v4l",
            BackendKind::TestPattern => "test-pattern",
        }
    }

    /// Whether this backend was compiled into the current binary.
    pub fn is_compiled(self) -> bool {
        match self {
            BackendKind::V4l => cfg!(feature = "v4l"),
            BackendKind::TestPattern => true,
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "v4l" | "v4l2" => Ok(BackendKind::V4l),
            "test-pattern" | "test_pattern" | "testpattern" => Ok(BackendKind::TestPattern),
            other => Err(format!(
                "unknown camera backend '{other}' (expected v4l or test-pattern)"
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// CameraConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    #[serde(default = "default_backend")]
    pub backend: BackendKind,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_fps")]
    pub fps: u32,
    /// Driver-side frame buffers. One keeps latency lowest.
    #[serde(default = "default_buffers")]
    pub buffers: u32,
    /// Device indexes probed by the camera list are `0..scan_limit`.
    #[serde(default = "default_scan_limit")]
    pub scan_limit: u32,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
    /// Indexes reported as present by the test-pattern backend.
    #[serde(default = "default_test_pattern_devices")]
    pub test_pattern_devices: Vec<u32>,
}

fn default_backend() -> BackendKind {
    if cfg!(feature = "v4l") {
        BackendKind::V4l
    } else {
        BackendKind::TestPattern
    }
}

fn default_width() -> u32 {
    640
}

fn default_height() -> u32 {
    480
}

fn default_fps() -> u32 {
    15
}

fn default_buffers() -> u32 {
    1
}

fn default_scan_limit() -> u32 {
    4
}

fn default_jpeg_quality() -> u8 {
    80
}

fn default_test_pattern_devices() -> Vec<u32> {
    vec![0]
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            width: default_width(),
            height: default_height(),
            fps: default_fps(),
            buffers: default_buffers(),
            scan_limit: default_scan_limit(),
            jpeg_quality: default_jpeg_quality(),
            test_pattern_devices: default_test_pattern_devices(),
        }
    }
}

// ---------------------------------------------------------------------------
// DetectorConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// TorchScript export of a YOLOv8 model.
    #[serde(default = "default_model")]
    pub model: PathBuf,
    /// Optional class-name file, one name per line. COCO names otherwise.
    #[serde(default)]
    pub labels: Option<PathBuf>,
    #[serde(default = "default_confidence")]
    pub confidence: f32,
    #[serde(default = "default_iou")]
    pub iou: f32,
    #[serde(default = "default_input_size")]
    pub input_size: u32,
    #[serde(default = "default_max_detections")]
    pub max_detections: usize,
}

fn default_enabled() -> bool {
    true
}

fn default_model() -> PathBuf {
    PathBuf::from("yolov8n.torchscript")
}

fn default_confidence() -> f32 {
    0.5
}

fn default_iou() -> f32 {
    0.7
}

fn default_input_size() -> u32 {
    640
}

fn default_max_detections() -> usize {
    300
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            model: default_model(),
            labels: None,
            confidence: default_confidence(),
            iou: default_iou(),
            input_size: default_input_size(),
            max_detections: default_max_detections(),
        }
    }
}

// ---------------------------------------------------------------------------
// LogConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_path")]
    pub path: PathBuf,
    #[serde(default = "default_log_capacity")]
    pub capacity: usize,
}

fn default_log_path() -> PathBuf {
    PathBuf::from("detection_log.json")
}

fn default_log_capacity() -> usize {
    1000
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            path: default_log_path(),
            capacity: default_log_capacity(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub log: LogConfig,
}

impl Config {
    /// Load the config at `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path)?;
        if data.trim().is_empty() {
            return Ok(Self::default());
        }
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(path, data.as_bytes())
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        let mut error = |message: String| {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message,
            })
        };

        let cam = &self.camera;
        if !cam.backend.is_compiled() {
            error(format!(
                "camera.backend '{}' is not compiled in (rebuild with --features {})",
                cam.backend, cam.backend
            ));
        }
        if cam.width == 0 || cam.height == 0 {
            error(format!(
                "camera frame size {}x{} must be non-zero",
                cam.width, cam.height
            ));
        } else {
            if cam.width % 2 != 0 {
                error(format!(
                    "camera.width {} must be even for YUYV capture",
                    cam.width
                ));
            }
            if cam.height % 2 != 0 {
                error(format!(
                    "camera.height {} must be even for YUYV capture",
                    cam.height
                ));
            }
        }
        if cam.fps == 0 {
            error("camera.fps must be greater than 0".to_string());
        }
        if !(1..=100).contains(&cam.jpeg_quality) {
            error(format!(
                "camera.jpeg_quality {} must be within 1..=100",
                cam.jpeg_quality
            ));
        }

        let det = &self.detector;
        if !(0.0..=1.0).contains(&det.confidence) {
            error(format!(
                "detector.confidence {} must be within [0, 1]",
                det.confidence
            ));
        }
        if !(0.0..=1.0).contains(&det.iou) {
            error(format!("detector.iou {} must be within [0, 1]", det.iou));
        }
        if det.input_size == 0 || det.input_size % 32 != 0 {
            error(format!(
                "detector.input_size {} must be a positive multiple of 32",
                det.input_size
            ));
        }

        if self.log.capacity == 0 {
            error("log.capacity must be greater than 0".to_string());
        }

        if cam.buffers == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "camera.buffers is 0; the driver will pick its own count".to_string(),
            });
        }
        if cam.scan_limit == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "camera.scan_limit is 0; no cameras will ever be listed".to_string(),
            });
        }
        if det.enabled && !cfg!(feature = "torch") {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "detector.enabled is set but this build has no torch support; \
                          frames will be streamed without detection"
                    .to_string(),
            });
        }
        if let Some(labels) = &det.labels {
            if !labels.exists() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!(
                        "detector.labels '{}' does not exist; COCO names will be used",
                        labels.display()
                    ),
                });
            }
        }

        warnings
    }

    pub fn has_errors(&self) -> bool {
        self.validate().iter().any(|w| w.level == WarnLevel::Error)
    }
}

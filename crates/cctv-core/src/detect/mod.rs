//! Object detection: the [`Detector`] seam, YOLOv8 decoding and model loading.

pub mod labels;
pub mod postprocess;
#[cfg(feature = "torch")]
mod torch;

use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::config::DetectorConfig;
use crate::error::Result;

/// One detected object, box in source-frame pixels as `[x1, y1, x2, y2]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub bbox: [f32; 4],
    pub confidence: f32,
    pub class_id: usize,
    pub class_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorSettings {
    pub confidence: f32,
    pub iou: f32,
    pub input_size: u32,
    pub max_detections: usize,
}

impl From<&DetectorConfig> for DetectorSettings {
    fn from(cfg: &DetectorConfig) -> Self {
        Self {
            confidence: cfg.confidence,
            iou: cfg.iou,
            input_size: cfg.input_size,
            max_detections: cfg.max_detections,
        }
    }
}

pub trait Detector: Send {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<Detection>>;

    fn labels(&self) -> &[String];
}

/// Load the configured detector.
///
/// `Ok(None)` when detection is disabled or the build has no inference
/// backend; frames are then streamed unannotated.
pub fn load_detector(cfg: &DetectorConfig) -> Result<Option<Box<dyn Detector>>> {
    if !cfg.enabled {
        tracing::info!("object detection disabled in config");
        return Ok(None);
    }

    let labels = match &cfg.labels {
        Some(path) if path.exists() => labels::load_labels(path)?,
        _ => labels::coco_labels(),
    };

    load_backend(cfg, labels)
}

#[cfg(feature = "torch")]
fn load_backend(cfg: &DetectorConfig, labels: Vec<String>) -> Result<Option<Box<dyn Detector>>> {
    let detector = torch::TorchYolo::load(&cfg.model, DetectorSettings::from(cfg), labels)?;
    Ok(Some(Box::new(detector)))
}

#[cfg(not(feature = "torch"))]
fn load_backend(cfg: &DetectorConfig, _labels: Vec<String>) -> Result<Option<Box<dyn Detector>>> {
    tracing::warn!(
        model = %cfg.model.display(),
        "built without the torch feature; object detection unavailable"
    );
    Ok(None)
}

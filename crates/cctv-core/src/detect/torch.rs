use std::path::Path;

use image::RgbImage;
use tch::{CModule, Device, Kind, Tensor};
use tracing::info;

use super::postprocess::{decode_yolov8, letterbox, non_max_suppression};
use super::{Detection, Detector, DetectorSettings};
use crate::error::{CctvError, Result};

/// TorchScript-backed YOLOv8 detector.
pub struct TorchYolo {
    module: CModule,
    device: Device,
    settings: DetectorSettings,
    labels: Vec<String>,
}

impl TorchYolo {
    /// Load a TorchScript export onto CUDA when available, CPU otherwise.
    pub fn load(path: &Path, settings: DetectorSettings, labels: Vec<String>) -> Result<Self> {
        let device = Device::cuda_if_available();
        let mut module =
            CModule::load_on_device(path, device).map_err(|e| CctvError::ModelLoad {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        module.set_eval();
        info!(model = %path.display(), ?device, classes = labels.len(), "YOLO model loaded");
        Ok(Self {
            module,
            device,
            settings,
            labels,
        })
    }

    fn to_input(&self, image: &RgbImage) -> Tensor {
        let size = self.settings.input_size as i64;
        Tensor::from_slice(image.as_raw())
            .to_device(self.device)
            .to_kind(Kind::Float)
            .view([1, size, size, 3])
            .permute([0, 3, 1, 2])
            / 255.0
    }
}

impl Detector for TorchYolo {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<Detection>> {
        let (boxed, lb) = letterbox(image, self.settings.input_size);
        let input = self.to_input(&boxed);

        let output = tch::no_grad(|| self.module.forward_ts(&[input]))
            .map_err(|e| CctvError::Inference(e.to_string()))?;
        let shape = output.size();
        if shape.len() != 3 || shape[0] != 1 {
            return Err(CctvError::Inference(format!(
                "unexpected detector output shape: {shape:?}"
            )));
        }
        let anchors = shape[2] as usize;

        let flat = output
            .to_device(Device::Cpu)
            .to_kind(Kind::Float)
            .contiguous()
            .view([-1]);
        let values = Vec::<f32>::try_from(&flat).map_err(|e| CctvError::Inference(e.to_string()))?;

        let detections = decode_yolov8(
            &values,
            anchors,
            &lb,
            &self.settings,
            &self.labels,
            image.dimensions(),
        )?;
        Ok(non_max_suppression(
            detections,
            self.settings.iou,
            self.settings.max_detections,
        ))
    }

    fn labels(&self) -> &[String] {
        &self.labels
    }
}

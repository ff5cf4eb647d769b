//! Camera backends and device discovery.
//!
//! A [`CameraBackend`] knows how to open a device by index; the returned
//! [`FrameSource`] is owned by the capture worker and releases the device on
//! drop.

mod test_pattern;
#[cfg(feature = "v4l")]
mod v4l;

pub use test_pattern::TestPatternBackend;
#[cfg(feature = "v4l")]
pub use self::v4l::V4lBackend;

use std::sync::Arc;

use chrono::{DateTime, Local};
use image::RgbImage;

use crate::config::{BackendKind, CameraConfig};
use crate::error::Result;

/// A decoded RGB frame together with its capture time.
#[derive(Debug, Clone)]
pub struct Frame {
    pub image: RgbImage,
    pub captured_at: DateTime<Local>,
}

impl Frame {
    pub fn new(image: RgbImage) -> Self {
        Self {
            image,
            captured_at: Local::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureSettings {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub buffers: u32,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self::from(&CameraConfig::default())
    }
}

impl From<&CameraConfig> for CaptureSettings {
    fn from(cfg: &CameraConfig) -> Self {
        Self {
            width: cfg.width,
            height: cfg.height,
            fps: cfg.fps.max(1),
            buffers: cfg.buffers,
        }
    }
}

/// An open camera. Dropping it releases the device.
pub trait FrameSource: Send {
    /// Block until the next frame is available.
    fn read_frame(&mut self) -> Result<Frame>;

    fn index(&self) -> u32;
}

pub trait CameraBackend: Send + Sync {
    fn name(&self) -> &'static str;

    fn open(&self, index: u32, settings: &CaptureSettings) -> Result<Box<dyn FrameSource>>;

    /// Open the device, grab one frame and release it again.
    fn probe(&self, index: u32) -> bool {
        let settings = CaptureSettings::default();
        match self.open(index, &settings) {
            Ok(mut source) => source.read_frame().is_ok(),
            Err(_) => false,
        }
    }
}

/// Indexes in `0..scan_limit` that open and deliver a frame.
pub fn available_cameras(backend: &dyn CameraBackend, scan_limit: u32) -> Vec<u32> {
    let found: Vec<u32> = (0..scan_limit)
        .filter(|&index| backend.probe(index))
        .collect();
    tracing::debug!(backend = backend.name(), ?found, "camera scan finished");
    found
}

/// Construct the backend selected in the camera config.
pub fn backend_for(cfg: &CameraConfig) -> Result<Arc<dyn CameraBackend>> {
    match cfg.backend {
        BackendKind::TestPattern => Ok(Arc::new(TestPatternBackend::new(
            cfg.test_pattern_devices.clone(),
        ))),
        #[cfg(feature = "v4l")]
        BackendKind::V4l => Ok(Arc::new(V4lBackend)),
        #[cfg(not(feature = "v4l"))]
        BackendKind::V4l => Err(crate::error::CctvError::BackendUnavailable(
            cfg.backend.to_string(),
        )),
    }
}

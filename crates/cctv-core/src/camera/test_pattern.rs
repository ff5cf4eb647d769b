use std::time::{Duration, Instant};

use image::{Rgb, RgbImage};

use super::{CameraBackend, CaptureSettings, Frame, FrameSource};
use crate::error::{CctvError, Result};

const BARS: [[u8; 3]; 8] = [
    [255, 255, 255],
    [255, 255, 0],
    [0, 255, 255],
    [0, 255, 0],
    [255, 0, 255],
    [255, 0, 0],
    [0, 0, 255],
    [16, 16, 16],
];

/// Synthetic camera that renders scrolling color bars.
#[derive(Debug, Clone)]
pub struct TestPatternBackend {
    devices: Vec<u32>,
}

impl TestPatternBackend {
    pub fn new(devices: Vec<u32>) -> Self {
        Self { devices }
    }
}

impl CameraBackend for TestPatternBackend {
    fn name(&self) -> &'static str {
        "test-pattern"
    }

    fn open(&self, index: u32, settings: &CaptureSettings) -> Result<Box<dyn FrameSource>> {
        if !self.devices.contains(&index) {
            return Err(CctvError::CameraOpen {
                index,
                reason: "no such test-pattern device".to_string(),
            });
        }
        if settings.width == 0 || settings.height == 0 {
            return Err(CctvError::CameraOpen {
                index,
                reason: format!("invalid frame size {}x{}", settings.width, settings.height),
            });
        }
        Ok(Box::new(TestPatternSource {
            index,
            width: settings.width,
            height: settings.height,
            interval: Duration::from_secs(1) / settings.fps.max(1),
            last: None,
            tick: 0,
        }))
    }

    // Synthetic devices always deliver, so skip rendering a frame.
    fn probe(&self, index: u32) -> bool {
        self.devices.contains(&index)
    }
}

struct TestPatternSource {
    index: u32,
    width: u32,
    height: u32,
    interval: Duration,
    last: Option<Instant>,
    tick: u32,
}

impl FrameSource for TestPatternSource {
    fn read_frame(&mut self) -> Result<Frame> {
        if let Some(last) = self.last {
            let elapsed = last.elapsed();
            if elapsed < self.interval {
                std::thread::sleep(self.interval - elapsed);
            }
        }
        self.last = Some(Instant::now());

        let bar_width = (self.width / BARS.len() as u32).max(1);
        let offset = self.tick.wrapping_mul(4);
        let image = RgbImage::from_fn(self.width, self.height, |x, _| {
            let bar = (x.wrapping_add(offset) / bar_width) as usize % BARS.len();
            Rgb(BARS[bar])
        });
        self.tick = self.tick.wrapping_add(1);
        Ok(Frame::new(image))
    }

    fn index(&self) -> u32 {
        self.index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> CaptureSettings {
        CaptureSettings {
            width: 64,
            height: 48,
            fps: 200,
            buffers: 1,
        }
    }

    #[test]
    fn open_unknown_index_fails() {
        let backend = TestPatternBackend::new(vec![0]);
        let err = backend.open(3, &settings()).err().unwrap();
        assert!(matches!(err, CctvError::CameraOpen { index: 3, .. }));
    }

    #[test]
    fn frames_have_requested_size() {
        let backend = TestPatternBackend::new(vec![1]);
        let mut source = backend.open(1, &settings()).unwrap();
        assert_eq!(source.index(), 1);
        let frame = source.read_frame().unwrap();
        assert_eq!(frame.image.dimensions(), (64, 48));
    }

    #[test]
    fn pattern_scrolls_between_frames() {
        let backend = TestPatternBackend::new(vec![0]);
        let mut source = backend.open(0, &settings()).unwrap();
        let first = source.read_frame().unwrap();
        let second = source.read_frame().unwrap();
        assert_ne!(first.image.as_raw(), second.image.as_raw());
    }

    #[test]
    fn long_running_source_wraps_instead_of_overflowing() {
        let mut source = TestPatternSource {
            index: 0,
            width: 64,
            height: 48,
            interval: Duration::ZERO,
            last: None,
            tick: u32::MAX / 4,
        };
        for _ in 0..4 {
            let frame = source.read_frame().unwrap();
            assert_eq!(frame.image.dimensions(), (64, 48));
        }
    }

    #[test]
    fn read_is_paced_to_fps() {
        let backend = TestPatternBackend::new(vec![0]);
        let mut source = backend
            .open(
                0,
                &CaptureSettings {
                    fps: 20,
                    ..settings()
                },
            )
            .unwrap();
        let start = Instant::now();
        for _ in 0..3 {
            source.read_frame().unwrap();
        }
        // Two full intervals of 50ms between three frames.
        assert!(start.elapsed() >= Duration::from_millis(95));
    }
}

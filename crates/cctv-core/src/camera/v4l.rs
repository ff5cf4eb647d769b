//! Video4Linux capture for USB webcams and the Pi camera's V4L2 bridge.

use image::{ImageFormat, RgbImage};
use tracing::{debug, info, warn};
use v4l::buffer::Type;
use v4l::io::mmap::Stream as MmapStream;
use v4l::io::traits::CaptureStream;
use v4l::video::capture::Parameters;
use v4l::video::Capture;
use v4l::{Device, FourCC};

use super::{CameraBackend, CaptureSettings, Frame, FrameSource};
use crate::convert::yuyv_to_rgb;
use crate::error::{CctvError, Result};

const MJPG: &[u8; 4] = b"MJPG";
const YUYV: &[u8; 4] = b"YUYV";

#[derive(Debug, Clone, Copy, Default)]
pub struct V4lBackend;

impl CameraBackend for V4lBackend {
    fn name(&self) -> &'static str {
        "v4l"
    }

    fn open(&self, index: u32, settings: &CaptureSettings) -> Result<Box<dyn FrameSource>> {
        let open_err = |reason: String| CctvError::CameraOpen { index, reason };

        let dev = Device::new(index as usize).map_err(|e| open_err(e.to_string()))?;
        let pixel = negotiate_format(&dev, settings).map_err(|e| open_err(e.to_string()))?;

        if let Err(e) = dev.set_params(&Parameters::with_fps(settings.fps)) {
            warn!(index, error = %e, "could not set frame rate, using device default");
        }

        let stream = MmapStream::with_buffers(&dev, Type::VideoCapture, settings.buffers.max(1))
            .map_err(|e| open_err(format!("failed to start buffer stream: {e}")))?;

        info!(
            index,
            width = pixel.width,
            height = pixel.height,
            fourcc = %pixel.fourcc,
            "v4l capture stream started"
        );

        Ok(Box::new(V4lSource {
            index,
            pixel,
            stream,
            _dev: dev,
        }))
    }
}

#[derive(Debug, Clone, Copy)]
struct PixelFormat {
    width: u32,
    height: u32,
    fourcc: FourCC,
}

/// Try MJPG, then YUYV, at the requested size.
fn negotiate_format(dev: &Device, settings: &CaptureSettings) -> std::io::Result<PixelFormat> {
    for code in [MJPG, YUYV] {
        let mut format = dev.format()?;
        format.width = settings.width;
        format.height = settings.height;
        format.fourcc = FourCC::new(code);
        match dev.set_format(&format) {
            Ok(applied) if applied.fourcc == FourCC::new(code) => {
                if (applied.width, applied.height) != (settings.width, settings.height) {
                    debug!(
                        requested_width = settings.width,
                        requested_height = settings.height,
                        width = applied.width,
                        height = applied.height,
                        "device adjusted frame size"
                    );
                }
                return Ok(PixelFormat {
                    width: applied.width,
                    height: applied.height,
                    fourcc: applied.fourcc,
                });
            }
            Ok(applied) => {
                debug!(wanted = %FourCC::new(code), got = %applied.fourcc, "format rejected");
            }
            Err(e) => {
                debug!(wanted = %FourCC::new(code), error = %e, "set_format failed");
            }
        }
    }
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "device supports neither MJPG nor YUYV",
    ))
}

struct V4lSource {
    index: u32,
    pixel: PixelFormat,
    stream: MmapStream<'static>,
    _dev: Device,
}

impl FrameSource for V4lSource {
    fn read_frame(&mut self) -> Result<Frame> {
        let (buf, meta) = self
            .stream
            .next()
            .map_err(|e| CctvError::CameraRead(e.to_string()))?;
        let used = (meta.bytesused as usize).min(buf.len());
        let data = if used == 0 { buf } else { &buf[..used] };

        let image = if self.pixel.fourcc == FourCC::new(MJPG) {
            image::load_from_memory_with_format(data, ImageFormat::Jpeg)
                .map_err(|e| CctvError::CameraRead(format!("bad MJPG frame: {e}")))?
                .to_rgb8()
        } else {
            let rgb = yuyv_to_rgb(data, self.pixel.width, self.pixel.height);
            RgbImage::from_raw(self.pixel.width, self.pixel.height, rgb).ok_or_else(|| {
                CctvError::CameraRead(format!(
                    "short YUYV frame: {} bytes for {}x{}",
                    data.len(),
                    self.pixel.width,
                    self.pixel.height
                ))
            })?
        };

        Ok(Frame::new(image))
    }

    fn index(&self) -> u32 {
        self.index
    }
}

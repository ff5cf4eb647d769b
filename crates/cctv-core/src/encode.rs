//! JPEG encoding and MJPEG multipart framing.

use bytes::{BufMut, Bytes, BytesMut};
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;

use crate::error::{CctvError, Result};

pub const MJPEG_BOUNDARY: &str = "frame";
pub const MJPEG_CONTENT_TYPE: &str = "multipart/x-mixed-replace; boundary=frame";

/// Encode an RGB frame as JPEG. Quality is clamped to 1..=100.
pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Bytes> {
    let mut buffer = Vec::with_capacity((image.width() * image.height() / 4) as usize);
    JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100))
        .encode_image(image)
        .map_err(|e| CctvError::Encode(e.to_string()))?;
    Ok(Bytes::from(buffer))
}

/// Wrap one JPEG as a part of the `multipart/x-mixed-replace` stream.
pub fn multipart_chunk(jpeg: &[u8]) -> Bytes {
    let mut part = BytesMut::with_capacity(jpeg.len() + 64);
    part.put_slice(b"--");
    part.put_slice(MJPEG_BOUNDARY.as_bytes());
    part.put_slice(b"\r\nContent-Type: image/jpeg\r\n\r\n");
    part.put_slice(jpeg);
    part.put_slice(b"\r\n");
    part.freeze()
}

//! YOLOv8 pre- and post-processing.
//!
//! Pure functions so they can be tested without a model. The detector output
//! is the raw `[4 + classes, anchors]` head, channel-major, boxes as
//! `cx, cy, w, h` in letterboxed input pixels.

use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};

use super::labels::class_name;
use super::{Detection, DetectorSettings};
use crate::error::{CctvError, Result};

const PAD_GRAY: u8 = 114;

/// Mapping between letterboxed model input and the source frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
}

impl Letterbox {
    /// Map a point from model input space back to frame pixels.
    pub fn to_frame(&self, x: f32, y: f32) -> (f32, f32) {
        ((x - self.pad_x) / self.scale, (y - self.pad_y) / self.scale)
    }
}

/// Resize `image` into a `size`x`size` square, keeping aspect ratio and
/// padding the remainder with gray.
pub fn letterbox(image: &RgbImage, size: u32) -> (RgbImage, Letterbox) {
    let size = size.max(1);
    let (w, h) = image.dimensions();
    let scale = (size as f32 / w as f32).min(size as f32 / h as f32);
    let new_w = ((w as f32 * scale).round() as u32).clamp(1, size);
    let new_h = ((h as f32 * scale).round() as u32).clamp(1, size);
    let pad_x = (size - new_w) / 2;
    let pad_y = (size - new_h) / 2;

    let mut canvas = RgbImage::from_pixel(size, size, Rgb([PAD_GRAY; 3]));
    if (new_w, new_h) == (w, h) {
        imageops::overlay(&mut canvas, image, pad_x as i64, pad_y as i64);
    } else {
        let resized = imageops::resize(image, new_w, new_h, FilterType::Triangle);
        imageops::overlay(&mut canvas, &resized, pad_x as i64, pad_y as i64);
    }

    (
        canvas,
        Letterbox {
            scale,
            pad_x: pad_x as f32,
            pad_y: pad_y as f32,
        },
    )
}

/// Decode the raw detection head into frame-space detections, keeping the
/// best class per anchor when its score reaches the confidence threshold.
pub fn decode_yolov8(
    output: &[f32],
    anchors: usize,
    letterbox: &Letterbox,
    settings: &DetectorSettings,
    labels: &[String],
    frame_size: (u32, u32),
) -> Result<Vec<Detection>> {
    if anchors == 0 || output.len() % anchors != 0 {
        return Err(CctvError::Inference(format!(
            "output of {} values does not divide into {anchors} anchors",
            output.len()
        )));
    }
    let channels = output.len() / anchors;
    if channels < 5 {
        return Err(CctvError::Inference(format!(
            "detector output needs at least 5 channels (box + 1 class), got {channels}"
        )));
    }

    let at = |channel: usize, anchor: usize| output[channel * anchors + anchor];
    let max_x = frame_size.0.saturating_sub(1) as f32;
    let max_y = frame_size.1.saturating_sub(1) as f32;

    let mut detections = Vec::new();
    for anchor in 0..anchors {
        let (class_id, confidence) = (4..channels)
            .map(|c| (c - 4, at(c, anchor)))
            .fold((0, f32::MIN), |best, cur| if cur.1 > best.1 { cur } else { best });
        if confidence < settings.confidence {
            continue;
        }

        let (cx, cy, w, h) = (at(0, anchor), at(1, anchor), at(2, anchor), at(3, anchor));
        let (x1, y1) = letterbox.to_frame(cx - w / 2.0, cy - h / 2.0);
        let (x2, y2) = letterbox.to_frame(cx + w / 2.0, cy + h / 2.0);
        let bbox = [
            x1.clamp(0.0, max_x),
            y1.clamp(0.0, max_y),
            x2.clamp(0.0, max_x),
            y2.clamp(0.0, max_y),
        ];
        if bbox[2] <= bbox[0] || bbox[3] <= bbox[1] {
            continue;
        }

        detections.push(Detection {
            bbox,
            confidence,
            class_id,
            class_name: class_name(labels, class_id),
        });
    }

    Ok(detections)
}

pub fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let ix1 = a[0].max(b[0]);
    let iy1 = a[1].max(b[1]);
    let ix2 = a[2].min(b[2]);
    let iy2 = a[3].min(b[3]);
    let inter = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
    let area_a = (a[2] - a[0]).max(0.0) * (a[3] - a[1]).max(0.0);
    let area_b = (b[2] - b[0]).max(0.0) * (b[3] - b[1]).max(0.0);
    let union = area_a + area_b - inter;
    if union <= 0.0 {
        0.0
    } else {
        inter / union
    }
}

/// Class-aware non-maximum suppression. Highest confidence wins; output is
/// sorted by descending confidence and capped at `max_detections`.
pub fn non_max_suppression(
    mut detections: Vec<Detection>,
    iou_threshold: f32,
    max_detections: usize,
) -> Vec<Detection> {
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept: Vec<Detection> = Vec::new();
    for candidate in detections {
        if kept.len() >= max_detections {
            break;
        }
        let suppressed = kept.iter().any(|k| {
            k.class_id == candidate.class_id && iou(&k.bbox, &candidate.bbox) > iou_threshold
        });
        if !suppressed {
            kept.push(candidate);
        }
    }
    kept
}

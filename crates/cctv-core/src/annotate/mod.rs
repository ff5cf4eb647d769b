//! Draw detection boxes and labels onto frames.

pub mod font;

use image::{Rgb, RgbImage};

use crate::detect::Detection;
use font::{glyph, ADVANCE, GLYPH_HEIGHT, GLYPH_WIDTH};

pub const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
pub const BOX_THICKNESS: i32 = 2;
pub const LABEL_SCALE: i32 = 2;
/// Gap between the label baseline and the top edge of its box.
pub const LABEL_OFFSET: i32 = 10;

/// Label text for a detection, e.g. `person 87.3%`.
pub fn label_text(detection: &Detection) -> String {
    format!(
        "{} {:.1}%",
        detection.class_name,
        detection.confidence * 100.0
    )
}

/// Draw every detection's box, then its label above the box.
pub fn annotate(image: &mut RgbImage, detections: &[Detection]) {
    for det in detections {
        let [x1, y1, x2, y2] = det.bbox.map(|v| v.round() as i32);
        draw_rectangle(image, x1, y1, x2, y2, BOX_THICKNESS, BOX_COLOR);
    }
    for det in detections {
        let x = det.bbox[0].round() as i32;
        let label_height = GLYPH_HEIGHT as i32 * LABEL_SCALE;
        let y = det.bbox[1].round() as i32 - LABEL_OFFSET - label_height;
        let y = y.max(0);
        draw_text(image, x, y, &label_text(det), LABEL_SCALE, BOX_COLOR);
    }
}

/// Outline a rectangle with the given stroke thickness, growing inward.
pub fn draw_rectangle(
    image: &mut RgbImage,
    left: i32,
    top: i32,
    right: i32,
    bottom: i32,
    thickness: i32,
    color: Rgb<u8>,
) {
    for t in 0..thickness.max(1) {
        let (l, tp, r, b) = (left + t, top + t, right - t, bottom - t);
        if l > r || tp > b {
            break;
        }
        for x in l..=r {
            put(image, x, tp, color);
            put(image, x, b, color);
        }
        for y in tp..=b {
            put(image, l, y, color);
            put(image, r, y, color);
        }
    }
}

/// Render `text` with its top-left corner at (`x`, `y`).
pub fn draw_text(image: &mut RgbImage, x: i32, y: i32, text: &str, scale: i32, color: Rgb<u8>) {
    let scale = scale.max(1);
    let mut pen_x = x;
    for ch in text.chars() {
        let rows = glyph(ch);
        for (row, bits) in rows.iter().enumerate() {
            for col in 0..GLYPH_WIDTH {
                if (bits >> (GLYPH_WIDTH - 1 - col)) & 1 == 0 {
                    continue;
                }
                let px = pen_x + col as i32 * scale;
                let py = y + row as i32 * scale;
                for dy in 0..scale {
                    for dx in 0..scale {
                        put(image, px + dx, py + dy, color);
                    }
                }
            }
        }
        pen_x += ADVANCE as i32 * scale;
    }
}

/// Set a pixel, ignoring coordinates outside the image.
fn put(image: &mut RgbImage, x: i32, y: i32, color: Rgb<u8>) {
    if x < 0 || y < 0 || x >= image.width() as i32 || y >= image.height() as i32 {
        return;
    }
    image.put_pixel(x as u32, y as u32, color);
}

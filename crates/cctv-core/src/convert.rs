//! Pixel format conversion for raw camera buffers.

/// Convert packed YUYV (YUV 4:2:2) to RGB8.
///
/// YUYV layout: Y0 U0 Y1 V0, each 4-byte group encodes 2 pixels. BT.601
/// coefficients. Output is truncated to `width * height * 3` bytes.
pub fn yuyv_to_rgb(data: &[u8], width: u32, height: u32) -> Vec<u8> {
    let pixel_count = (width as usize) * (height as usize);
    let mut rgb = Vec::with_capacity(pixel_count * 3);

    for chunk in data.chunks_exact(4) {
        let y0 = chunk[0] as f32;
        let u = chunk[1] as f32 - 128.0;
        let y1 = chunk[2] as f32;
        let v = chunk[3] as f32 - 128.0;

        for y in [y0, y1] {
            if rgb.len() >= pixel_count * 3 {
                return rgb;
            }
            rgb.push((y + 1.402 * v).clamp(0.0, 255.0) as u8);
            rgb.push((y - 0.344 * u - 0.714 * v).clamp(0.0, 255.0) as u8);
            rgb.push((y + 1.772 * u).clamp(0.0, 255.0) as u8);
        }
    }

    rgb
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neutral_chroma_is_gray() {
        let data = [100, 128, 200, 128];
        assert_eq!(yuyv_to_rgb(&data, 2, 1), vec![100, 100, 100, 200, 200, 200]);
    }

    #[test]
    fn strong_red_chroma() {
        // Full V shifts toward red, away from green.
        let data = [128, 128, 128, 255];
        let rgb = yuyv_to_rgb(&data, 2, 1);
        assert_eq!(rgb[0], 255);
        assert!(rgb[1] < 128);
        assert_eq!(rgb[2], 128);
    }

    #[test]
    fn output_truncated_to_frame_size() {
        let data = vec![128u8; 16];
        assert_eq!(yuyv_to_rgb(&data, 2, 1).len(), 6);
    }

    #[test]
    fn short_buffer_yields_partial_frame() {
        let data = [128u8, 128, 128];
        assert!(yuyv_to_rgb(&data, 2, 1).is_empty());
    }
}

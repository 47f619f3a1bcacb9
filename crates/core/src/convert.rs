//! Pixel ⇄ tensor layout conversion.
//!
//! Interleaved u8 samples (HWC, row-major) in and out of `[1, C, H, W]`
//! float32 arrays in the 0–255 range the Real-ESRGAN family expects. Pure
//! layout/normalization adaptation — no learned parameters. The layout
//! transform round-trips exactly; values clamp to 0–255 on the way out.

use ndarray::Array4;

use crate::error::{Error, Result};

/// Copy a rectangular region out of an interleaved pixel buffer.
///
/// `out` is truncated and refilled, so a scratch `Vec` can be reused across
/// tiles without reallocation once it has reached its high-water mark.
pub fn extract_region(
    input: &[u8],
    image_width: usize,
    channels: usize,
    x: usize,
    y: usize,
    w: usize,
    h: usize,
    out: &mut Vec<u8>,
) {
    out.clear();
    out.reserve(w * h * channels);
    for row in y..y + h {
        let start = (row * image_width + x) * channels;
        out.extend_from_slice(&input[start..start + w * channels]);
    }
}

/// Interleaved u8 HWC → `[1, C, H, W]` f32, 0–255 range.
///
/// Reuses `buf` when its shape matches, avoiding a per-tile allocation.
pub fn pixels_to_nchw(
    data: &[u8],
    width: usize,
    height: usize,
    channels: usize,
    buf: &mut Option<Array4<f32>>,
) -> Result<Array4<f32>> {
    let expected = width * height * channels;
    if data.len() != expected {
        return Err(Error::DimensionMismatch {
            expected,
            actual: data.len(),
        });
    }

    let target_shape = [1, channels, height, width];
    let mut nchw = match buf.take() {
        Some(arr) if arr.shape() == target_shape => arr,
        _ => Array4::<f32>::zeros((1, channels, height, width)),
    };
    let hw = height * width;
    let slice = nchw
        .as_slice_mut()
        .expect("freshly shaped array is contiguous");

    for i in 0..hw {
        let src = i * channels;
        for c in 0..channels {
            slice[c * hw + i] = data[src + c] as f32;
        }
    }

    Ok(nchw)
}

/// `[1, C, H, W]` f32 → interleaved u8 HWC, clamped to 0–255.
///
/// Writes into `out`, resizing it to exactly `W*H*C`.
pub fn nchw_to_pixels(arr: &Array4<f32>, out: &mut Vec<u8>) -> Result<()> {
    let shape = arr.shape();
    let (channels, height, width) = (shape[1], shape[2], shape[3]);
    let hw = height * width;

    let owned_contig;
    let slice = if let Some(s) = arr.as_slice() {
        s
    } else {
        owned_contig = arr.as_standard_layout().into_owned();
        owned_contig.as_slice().expect("standard layout")
    };

    out.clear();
    out.resize(hw * channels, 0);
    for i in 0..hw {
        let dst = i * channels;
        for c in 0..channels {
            out[dst + c] = slice[c * hw + i].clamp(0.0, 255.0) as u8;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixels_to_nchw_rgb() {
        let data = vec![255, 0, 0, 0, 255, 0, 0, 0, 255, 128, 128, 128];
        let arr = pixels_to_nchw(&data, 2, 2, 3, &mut None).unwrap();
        assert_eq!(arr.shape(), &[1, 3, 2, 2]);
        assert_eq!(arr[[0, 0, 0, 0]], 255.0);
        assert_eq!(arr[[0, 1, 0, 0]], 0.0);
        assert_eq!(arr[[0, 1, 0, 1]], 255.0);
        assert_eq!(arr[[0, 2, 1, 0]], 255.0);
        assert_eq!(arr[[0, 0, 1, 1]], 128.0);
    }

    #[test]
    fn test_pixels_to_nchw_single_channel() {
        let data = vec![10, 20, 30, 40];
        let arr = pixels_to_nchw(&data, 4, 1, 1, &mut None).unwrap();
        assert_eq!(arr.shape(), &[1, 1, 1, 4]);
        assert_eq!(arr[[0, 0, 0, 3]], 40.0);
    }

    #[test]
    fn test_pixels_to_nchw_length_mismatch() {
        let data = vec![0u8; 11];
        assert!(matches!(
            pixels_to_nchw(&data, 2, 2, 3, &mut None),
            Err(Error::DimensionMismatch { expected: 12, actual: 11 })
        ));
    }

    #[test]
    fn test_nchw_to_pixels_clamping() {
        let mut arr = Array4::<f32>::zeros((1, 3, 1, 1));
        arr[[0, 0, 0, 0]] = 300.0;
        arr[[0, 1, 0, 0]] = -10.0;
        arr[[0, 2, 0, 0]] = 128.5;
        let mut out = Vec::new();
        nchw_to_pixels(&arr, &mut out).unwrap();
        assert_eq!(out, vec![255, 0, 128]);
    }

    #[test]
    fn test_layout_roundtrip_exact() {
        let data: Vec<u8> = (0..4 * 3 * 4).map(|i| (i * 7 % 256) as u8).collect();
        let arr = pixels_to_nchw(&data, 4, 3, 4, &mut None).unwrap();
        let mut restored = Vec::new();
        nchw_to_pixels(&arr, &mut restored).unwrap();
        assert_eq!(data, restored);
    }

    #[test]
    fn test_extract_region_rows() {
        // 4x3 single-channel image with row-major values 0..12.
        let img: Vec<u8> = (0..12).collect();
        let mut out = Vec::new();
        extract_region(&img, 4, 1, 1, 1, 2, 2, &mut out);
        assert_eq!(out, vec![5, 6, 9, 10]);
    }

    #[test]
    fn test_extract_region_interleaved() {
        // 2x2 RGB image.
        let img = vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12];
        let mut out = Vec::new();
        extract_region(&img, 2, 3, 1, 0, 1, 2, &mut out);
        assert_eq!(out, vec![4, 5, 6, 10, 11, 12]);
    }
}

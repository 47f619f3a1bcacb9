//! Stitching: copy a processed tile's interior into the output image.
//!
//! The tile result still carries the scaled prepadding border; the stitch
//! crops it by offsetting into the tile and copies exactly the destination
//! rectangle, so each output pixel is written once across all tiles.

use crate::error::{Error, Result};
use crate::tile::TileSpec;

/// Copy the interior of `tile_pixels` (interleaved, covering
/// `padded_src × scale`) into `output` at the tile's destination rectangle.
pub fn stitch_tile(
    output: &mut [u8],
    output_width: usize,
    channels: usize,
    tile_pixels: &[u8],
    spec: &TileSpec,
    scale: usize,
) -> Result<()> {
    let tile_w = spec.padded_src.w * scale;
    let tile_h = spec.padded_src.h * scale;
    let expected = tile_w * tile_h * channels;
    if tile_pixels.len() != expected {
        return Err(Error::DimensionMismatch {
            expected,
            actual: tile_pixels.len(),
        });
    }

    // Prepadding converted to output coordinates; zero on clamped borders.
    let crop_x = (spec.src.x - spec.padded_src.x) * scale;
    let crop_y = (spec.src.y - spec.padded_src.y) * scale;

    for row in 0..spec.dst.h {
        let src_start = ((crop_y + row) * tile_w + crop_x) * channels;
        let dst_start = ((spec.dst.y + row) * output_width + spec.dst.x) * channels;
        let len = spec.dst.w * channels;
        output[dst_start..dst_start + len]
            .copy_from_slice(&tile_pixels[src_start..src_start + len]);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tile::plan_tiles;

    #[test]
    fn test_stitch_covers_every_output_pixel_once() {
        let (w, h, ts, pre, scale) = (10, 6, 4, 2, 2);
        let tiles = plan_tiles(w, h, ts, pre, scale).unwrap();
        let (ow, oh) = (w * scale, h * scale);
        let mut output = vec![0u8; ow * oh];

        for (i, spec) in tiles.iter().enumerate() {
            let tile_w = spec.padded_src.w * scale;
            let tile_h = spec.padded_src.h * scale;
            // Mark every pixel of this tile with its index + 1.
            let tile = vec![(i + 1) as u8; tile_w * tile_h];
            stitch_tile(&mut output, ow, 1, &tile, spec, scale).unwrap();
        }

        assert!(output.iter().all(|&v| v != 0), "no output pixel left unwritten");
    }

    #[test]
    fn test_stitch_crops_prepadding() {
        // One interior tile of a larger image: src (4,4) 4x4, padded (2,2) 8x8.
        let spec = crate::tile::TileSpec {
            src: crate::tile::Rect::new(4, 4, 4, 4),
            padded_src: crate::tile::Rect::new(2, 2, 8, 8),
            dst: crate::tile::Rect::new(8, 8, 8, 8),
        };
        let scale = 2;
        let tile_w = 8 * scale;

        // Tile pixels: value = x coordinate within the tile, single channel.
        let tile: Vec<u8> = (0..tile_w * tile_w).map(|i| (i % tile_w) as u8).collect();
        let ow = 16 * scale;
        let mut output = vec![255u8; ow * ow];
        stitch_tile(&mut output, ow, 1, &tile, &spec, scale).unwrap();

        // Interior starts (src.x - padded.x) * scale = 4 columns into the tile.
        assert_eq!(output[8 * ow + 8], 4);
        assert_eq!(output[8 * ow + 15], 11);
        // Outside the destination rect untouched.
        assert_eq!(output[0], 255);
        assert_eq!(output[8 * ow + 7], 255);
        assert_eq!(output[8 * ow + 16], 255);
    }

    #[test]
    fn test_stitch_rejects_wrong_tile_size() {
        let spec = crate::tile::TileSpec {
            src: crate::tile::Rect::new(0, 0, 4, 4),
            padded_src: crate::tile::Rect::new(0, 0, 4, 4),
            dst: crate::tile::Rect::new(0, 0, 8, 8),
        };
        let mut output = vec![0u8; 8 * 8];
        let tile = vec![0u8; 10];
        assert!(matches!(
            stitch_tile(&mut output, 8, 1, &tile, &spec, 2),
            Err(Error::DimensionMismatch { .. })
        ));
    }
}

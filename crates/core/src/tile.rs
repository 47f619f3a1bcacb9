//! Tile planning: split an image into prepadded source tiles whose scaled
//! interiors exactly partition the output.
//!
//! Interior rectangles tile the input with no gap and no overlap; only the
//! prepadded *source* rectangles overlap. Padding is clamped at image borders
//! so no read ever lands outside `[0,width)×[0,height)`.

use tracing::debug;

use crate::error::{Error, Result};

/// Axis-aligned rectangle, `x`/`y` top-left, half-open extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: usize,
    pub y: usize,
    pub w: usize,
    pub h: usize,
}

impl Rect {
    pub fn new(x: usize, y: usize, w: usize, h: usize) -> Self {
        Self { x, y, w, h }
    }

    pub fn right(&self) -> usize {
        self.x + self.w
    }

    pub fn bottom(&self) -> usize {
        self.y + self.h
    }
}

/// One planned tile: interior source region, the prepadded source region the
/// network actually sees, and the destination region in output coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileSpec {
    /// Interior region in source coordinates, before prepadding.
    pub src: Rect,
    /// Prepadded source region, clamped to the image bounds.
    pub padded_src: Rect,
    /// Destination region in output (scaled) coordinates.
    pub dst: Rect,
}

/// Compute the row-major sequence of tiles covering a `width`×`height` image.
pub fn plan_tiles(
    width: usize,
    height: usize,
    tile_size: usize,
    prepadding: usize,
    scale: usize,
) -> Result<Vec<TileSpec>> {
    if width == 0 || height == 0 {
        return Err(Error::InvalidConfiguration(format!(
            "image dimensions must be positive, got {width}x{height}"
        )));
    }
    if tile_size == 0 {
        return Err(Error::InvalidConfiguration(
            "tile size must be positive".to_string(),
        ));
    }
    if scale == 0 {
        return Err(Error::InvalidConfiguration(
            "scale must be positive".to_string(),
        ));
    }

    let x_tiles = width.div_ceil(tile_size);
    let y_tiles = height.div_ceil(tile_size);
    let mut tiles = Vec::with_capacity(x_tiles * y_tiles);

    for ty in 0..y_tiles {
        for tx in 0..x_tiles {
            let x = tx * tile_size;
            let y = ty * tile_size;
            let w = tile_size.min(width - x);
            let h = tile_size.min(height - y);

            let pad_x0 = x.saturating_sub(prepadding);
            let pad_y0 = y.saturating_sub(prepadding);
            let pad_x1 = (x + w + prepadding).min(width);
            let pad_y1 = (y + h + prepadding).min(height);

            tiles.push(TileSpec {
                src: Rect::new(x, y, w, h),
                padded_src: Rect::new(pad_x0, pad_y0, pad_x1 - pad_x0, pad_y1 - pad_y0),
                dst: Rect::new(x * scale, y * scale, w * scale, h * scale),
            });
        }
    }

    debug!(
        width,
        height,
        tile_size,
        prepadding,
        scale,
        tiles = tiles.len(),
        "Planned tile grid"
    );

    Ok(tiles)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_tile_covers_small_image() {
        let tiles = plan_tiles(16, 16, 32, 10, 4).unwrap();
        assert_eq!(tiles.len(), 1);
        assert_eq!(tiles[0].src, Rect::new(0, 0, 16, 16));
        assert_eq!(tiles[0].padded_src, Rect::new(0, 0, 16, 16));
        assert_eq!(tiles[0].dst, Rect::new(0, 0, 64, 64));
    }

    #[test]
    fn test_64x64_scale4_tile32_grid() {
        let tiles = plan_tiles(64, 64, 32, 10, 4).unwrap();
        assert_eq!(tiles.len(), 4);

        let dsts: Vec<Rect> = tiles.iter().map(|t| t.dst).collect();
        assert_eq!(
            dsts,
            vec![
                Rect::new(0, 0, 128, 128),
                Rect::new(128, 0, 128, 128),
                Rect::new(0, 128, 128, 128),
                Rect::new(128, 128, 128, 128),
            ]
        );

        // First tile: padding clamps at the top-left, extends bottom-right.
        assert_eq!(tiles[0].padded_src, Rect::new(0, 0, 42, 42));
        // Last tile: padding extends top-left, clamps at the bottom-right.
        assert_eq!(tiles[3].padded_src, Rect::new(22, 22, 42, 42));
    }

    #[test]
    fn test_interiors_partition_exactly() {
        for (w, h, ts) in [(64, 64, 32), (100, 70, 32), (33, 65, 16), (1, 1, 32)] {
            let tiles = plan_tiles(w, h, ts, 10, 2).unwrap();
            let mut covered = vec![0u8; w * h];
            for t in &tiles {
                for y in t.src.y..t.src.bottom() {
                    for x in t.src.x..t.src.right() {
                        covered[y * w + x] += 1;
                    }
                }
            }
            assert!(
                covered.iter().all(|&c| c == 1),
                "{w}x{h} tile {ts}: interiors must cover each pixel exactly once"
            );
        }
    }

    #[test]
    fn test_dst_partitions_output_exactly() {
        let (w, h, ts, scale) = (50, 34, 16, 3);
        let tiles = plan_tiles(w, h, ts, 10, scale).unwrap();
        let (ow, oh) = (w * scale, h * scale);
        let mut covered = vec![0u8; ow * oh];
        for t in &tiles {
            for y in t.dst.y..t.dst.bottom() {
                for x in t.dst.x..t.dst.right() {
                    covered[y * ow + x] += 1;
                }
            }
        }
        assert!(covered.iter().all(|&c| c == 1));
    }

    #[test]
    fn test_padded_src_stays_in_bounds() {
        for ts in [1, 3, 16, 200] {
            let tiles = plan_tiles(47, 29, ts, 10, 2).unwrap();
            for t in &tiles {
                assert!(t.padded_src.right() <= 47);
                assert!(t.padded_src.bottom() <= 29);
                // Padded region always contains the interior.
                assert!(t.padded_src.x <= t.src.x);
                assert!(t.padded_src.y <= t.src.y);
                assert!(t.padded_src.right() >= t.src.right());
                assert!(t.padded_src.bottom() >= t.src.bottom());
            }
        }
    }

    #[test]
    fn test_raster_order() {
        let tiles = plan_tiles(96, 64, 32, 10, 2).unwrap();
        assert_eq!(tiles.len(), 6);
        let origins: Vec<(usize, usize)> = tiles.iter().map(|t| (t.src.x, t.src.y)).collect();
        assert_eq!(
            origins,
            vec![(0, 0), (32, 0), (64, 0), (0, 32), (32, 32), (64, 32)]
        );
    }

    #[test]
    fn test_rejects_degenerate_inputs() {
        assert!(matches!(
            plan_tiles(0, 10, 32, 10, 2),
            Err(Error::InvalidConfiguration(_))
        ));
        assert!(matches!(
            plan_tiles(10, 0, 32, 10, 2),
            Err(Error::InvalidConfiguration(_))
        ));
        assert!(matches!(
            plan_tiles(10, 10, 0, 10, 2),
            Err(Error::InvalidConfiguration(_))
        ));
        assert!(matches!(
            plan_tiles(10, 10, 32, 10, 0),
            Err(Error::InvalidConfiguration(_))
        ));
    }
}

//! Contrast-limited adaptive histogram equalization.
//!
//! The image is split into a grid of tiles; each tile gets its own
//! equalization curve with the histogram clipped at `clip_limit` times the
//! flat-histogram height, and the excess spread back over all bins. Pixels
//! are remapped by bilinear interpolation between the four nearest tile
//! curves so tile borders do not show.

use image::{GrayImage, Luma};

/// CLAHE operator for 8-bit single-channel images.
#[derive(Debug, Clone, Copy)]
pub struct Clahe {
    clip_limit: f32,
    tile_grid: u32,
}

impl Clahe {
    /// Creates a new operator.
    ///
    /// A `clip_limit` of zero disables clipping (plain tiled equalization).
    /// `tile_grid` is clamped to at least one tile.
    pub fn new(clip_limit: f32, tile_grid: u32) -> Self {
        Self {
            clip_limit,
            tile_grid: tile_grid.max(1),
        }
    }

    pub fn clip_limit(&self) -> f32 {
        self.clip_limit
    }

    pub fn tile_grid(&self) -> u32 {
        self.tile_grid
    }

    /// Equalizes `image`, returning a new image of the same size.
    pub fn apply(&self, image: &GrayImage) -> GrayImage {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return image.clone();
        }

        let tile_w = width.div_ceil(self.tile_grid.min(width));
        let tile_h = height.div_ceil(self.tile_grid.min(height));
        let tiles_x = width.div_ceil(tile_w);
        let tiles_y = height.div_ceil(tile_h);

        let mut luts = Vec::with_capacity((tiles_x * tiles_y) as usize);
        for ty in 0..tiles_y {
            for tx in 0..tiles_x {
                let x0 = tx * tile_w;
                let y0 = ty * tile_h;
                let x1 = (x0 + tile_w).min(width);
                let y1 = (y0 + tile_h).min(height);

                let mut hist = [0u32; 256];
                for y in y0..y1 {
                    for x in x0..x1 {
                        hist[image.get_pixel(x, y)[0] as usize] += 1;
                    }
                }
                luts.push(tile_lut(&mut hist, (x1 - x0) * (y1 - y0), self.clip_limit));
            }
        }

        let mut out = GrayImage::new(width, height);
        for y in 0..height {
            let (ty0, ty1, wy) = neighbour_tiles(y, tile_h, tiles_y);
            for x in 0..width {
                let (tx0, tx1, wx) = neighbour_tiles(x, tile_w, tiles_x);
                let v = image.get_pixel(x, y)[0] as usize;
                let at = |tx: u32, ty: u32| f32::from(luts[(ty * tiles_x + tx) as usize][v]);

                let top = at(tx0, ty0) * (1.0 - wx) + at(tx1, ty0) * wx;
                let bottom = at(tx0, ty1) * (1.0 - wx) + at(tx1, ty1) * wx;
                let value = top * (1.0 - wy) + bottom * wy;
                out.put_pixel(x, y, Luma([value.round().clamp(0.0, 255.0) as u8]));
            }
        }
        out
    }
}

/// Tiles bracketing pixel coordinate `pos` and the weight of the second one.
fn neighbour_tiles(pos: u32, tile_size: u32, tiles: u32) -> (u32, u32, f32) {
    let f = (pos as f32 + 0.5) / tile_size as f32 - 0.5;
    if f <= 0.0 {
        return (0, 0, 0.0);
    }
    let t0 = f.floor() as u32;
    if t0 + 1 >= tiles {
        return (tiles - 1, tiles - 1, 0.0);
    }
    (t0, t0 + 1, f - t0 as f32)
}

/// Clips a tile histogram and turns its cumulative sum into a lookup table.
fn tile_lut(hist: &mut [u32; 256], area: u32, clip_limit: f32) -> [u8; 256] {
    if clip_limit > 0.0 {
        let limit = ((clip_limit * area as f32 / 256.0) as u32).max(1);
        let mut excess = 0u32;
        for bin in hist.iter_mut() {
            if *bin > limit {
                excess += *bin - limit;
                *bin = limit;
            }
        }

        let batch = excess / 256;
        let mut residual = excess % 256;
        for bin in hist.iter_mut() {
            *bin += batch;
        }
        if residual > 0 {
            let step = (256 / residual).max(1) as usize;
            for bin in hist.iter_mut().step_by(step) {
                if residual == 0 {
                    break;
                }
                *bin += 1;
                residual -= 1;
            }
        }
    }

    let scale = 255.0 / area as f32;
    let mut lut = [0u8; 256];
    let mut sum = 0u32;
    for (entry, &count) in lut.iter_mut().zip(hist.iter()) {
        sum += count;
        *entry = (sum as f32 * scale).round().min(255.0) as u8;
    }
    lut
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_image_stays_near_original() {
        let clahe = Clahe::new(2.0, 8);
        for value in [0u8, 60, 136, 255] {
            let img = GrayImage::from_pixel(128, 128, Luma([value]));
            let out = clahe.apply(&img);
            let got = out.get_pixel(64, 64)[0];
            assert!(
                (i32::from(got) - i32::from(value)).abs() <= 4,
                "value {} mapped to {}",
                value,
                got
            );
        }
    }

    #[test]
    fn test_stretches_low_contrast_ramp() {
        let img = GrayImage::from_fn(64, 64, |x, _| Luma([100 + (x / 8) as u8]));
        let out = Clahe::new(40.0, 1).apply(&img);
        let lo = out.get_pixel(0, 0)[0];
        let hi = out.get_pixel(63, 0)[0];
        assert!(hi - lo > 100, "range {}..{} not stretched", lo, hi);
    }

    #[test]
    fn test_preserves_dimensions_with_uneven_tiles() {
        let img = GrayImage::from_fn(37, 23, |x, y| Luma([((x * 7 + y * 3) % 256) as u8]));
        let out = Clahe::new(2.0, 8).apply(&img);
        assert_eq!(out.dimensions(), (37, 23));
    }

    #[test]
    fn test_tiny_image_uses_single_tile_per_pixel() {
        let img = GrayImage::from_pixel(3, 2, Luma([42]));
        let out = Clahe::new(2.0, 8).apply(&img);
        assert_eq!(out.dimensions(), (3, 2));
    }
}

use crate::error::PreprocessError;
use image::{GrayImage, Luma};

/// Number of tiles along each axis
const TILE_GRID: u32 = 8;
/// Maximum amplification of any single histogram bin, relative to a flat histogram
const CLIP_LIMIT: f32 = 3.0;

const BINS: usize = 256;

/// Normalize contrast with CLAHE (contrast limited adaptive histogram equalization)
///
/// Each tile of an 8x8 grid gets its own equalization curve, built from a
/// histogram whose bins are capped at `CLIP_LIMIT` times the flat level so that
/// near-uniform tiles are not stretched into noise. Pixels are mapped through
/// the four surrounding tile curves and blended bilinearly to hide tile seams.
pub fn apply(image: GrayImage) -> Result<GrayImage, PreprocessError> {
    let (width, height) = image.dimensions();
    let grid = TileGrid::new(width, height);
    let luts = grid.build_luts(&image);

    Ok(GrayImage::from_fn(width, height, |x, y| {
        let value = image.get_pixel(x, y).0[0] as usize;

        let (tx0, tx1, wx) = grid.neighbours_x(x);
        let (ty0, ty1, wy) = grid.neighbours_y(y);

        let top = lerp(
            luts[grid.index(tx0, ty0)][value],
            luts[grid.index(tx1, ty0)][value],
            wx,
        );
        let bottom = lerp(
            luts[grid.index(tx0, ty1)][value],
            luts[grid.index(tx1, ty1)][value],
            wx,
        );
        let blended = top + (bottom - top) * wy;

        Luma([blended.round().clamp(0.0, 255.0) as u8])
    }))
}

/// Tile layout over an image; axes shorter than the grid get one tile per pixel
struct TileGrid {
    width: u32,
    height: u32,
    cols: u32,
    rows: u32,
}

impl TileGrid {
    fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            cols: TILE_GRID.min(width).max(1),
            rows: TILE_GRID.min(height).max(1),
        }
    }

    fn index(&self, tx: u32, ty: u32) -> usize {
        (ty * self.cols + tx) as usize
    }

    /// Pixel range `[start, end)` covered by tile `t` out of `count` along an axis of `len`
    fn span(t: u32, count: u32, len: u32) -> (u32, u32) {
        let start = (t as u64 * len as u64 / count as u64) as u32;
        let end = ((t as u64 + 1) * len as u64 / count as u64) as u32;
        (start, end)
    }

    fn build_luts(&self, image: &GrayImage) -> Vec<[u8; BINS]> {
        let mut luts = Vec::with_capacity((self.cols * self.rows) as usize);
        for ty in 0..self.rows {
            let (y0, y1) = Self::span(ty, self.rows, self.height);
            for tx in 0..self.cols {
                let (x0, x1) = Self::span(tx, self.cols, self.width);

                let mut hist = [0u32; BINS];
                for y in y0..y1 {
                    for x in x0..x1 {
                        hist[image.get_pixel(x, y).0[0] as usize] += 1;
                    }
                }

                let area = (x1 - x0) * (y1 - y0);
                luts.push(clipped_equalization(&mut hist, area));
            }
        }
        luts
    }

    fn neighbours_x(&self, x: u32) -> (u32, u32, f32) {
        neighbours(x, self.width, self.cols)
    }

    fn neighbours_y(&self, y: u32) -> (u32, u32, f32) {
        neighbours(y, self.height, self.rows)
    }
}

/// The two tiles whose centres bracket pixel `p`, and the weight of the second
fn neighbours(p: u32, len: u32, count: u32) -> (u32, u32, f32) {
    let tile_size = len as f32 / count as f32;
    let pos = (p as f32 + 0.5) / tile_size - 0.5;

    let lower = pos.floor();
    let weight = pos - lower;
    let last = count as i64 - 1;
    let t0 = (lower as i64).clamp(0, last) as u32;
    let t1 = (lower as i64 + 1).clamp(0, last) as u32;

    (t0, t1, weight)
}

/// Clip the histogram, redistribute the excess, and turn its CDF into a lookup table
fn clipped_equalization(hist: &mut [u32; BINS], area: u32) -> [u8; BINS] {
    let mut lut = [0u8; BINS];
    if area == 0 {
        return lut;
    }

    let clip = ((CLIP_LIMIT * area as f32 / BINS as f32) as u32).max(1);

    let mut excess = 0u32;
    for bin in hist.iter_mut() {
        if *bin > clip {
            excess += *bin - clip;
            *bin = clip;
        }
    }

    let batch = excess / BINS as u32;
    let mut residual = excess - batch * BINS as u32;
    for bin in hist.iter_mut() {
        *bin += batch;
    }
    if residual > 0 {
        let step = (BINS as u32 / residual).max(1) as usize;
        for bin in hist.iter_mut().step_by(step) {
            if residual == 0 {
                break;
            }
            *bin += 1;
            residual -= 1;
        }
    }

    let scale = 255.0 / area as f32;
    let mut cumulative = 0u32;
    for (value, bin) in hist.iter().enumerate() {
        cumulative += bin;
        lut[value] = (cumulative as f32 * scale).round().clamp(0.0, 255.0) as u8;
    }
    lut
}

fn lerp(a: u8, b: u8, t: f32) -> f32 {
    a as f32 + (b as f32 - a as f32) * t
}

use crate::error::PreprocessError;
use image::{GrayImage, Luma};
use imageproc::morphology::{grayscale_dilate, grayscale_erode, Mask};

/// Morphological closing (dilation then erosion) with a 2x2 square
/// Closes single-pixel gaps left by binarization without thickening strokes.
/// Erosion uses the element reflected through its anchor, so the result is
/// not shifted.
pub fn apply(image: GrayImage) -> Result<GrayImage, PreprocessError> {
    let square = GrayImage::from_pixel(2, 2, Luma([255]));
    let forward = Mask::from_image(&square, 0, 0);
    let backward = Mask::from_image(&square, 1, 1);

    Ok(grayscale_erode(&grayscale_dilate(&image, &forward), &backward))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_close_fills_single_pixel_gap() {
        // White run with a one-pixel dark hole
        let mut img = GrayImage::from_pixel(10, 10, Luma([0]));
        for x in 2..8 {
            for y in 4..6 {
                img.put_pixel(x, y, Luma([255]));
            }
        }
        img.put_pixel(5, 4, Luma([0]));

        let result = apply(img).unwrap();
        assert_eq!(result.get_pixel(5, 4).0[0], 255);
    }

    #[test]
    fn test_close_does_not_shift_or_thicken() {
        let mut img = GrayImage::from_pixel(12, 12, Luma([0]));
        for x in 3..9 {
            for y in 3..9 {
                img.put_pixel(x, y, Luma([255]));
            }
        }

        let result = apply(img.clone()).unwrap();
        assert_eq!(result, img);
    }

    #[test]
    fn test_close_output_is_binary_for_binary_input() {
        let img = GrayImage::from_fn(16, 16, |x, y| {
            if (x * 7 + y * 3) % 5 == 0 {
                Luma([0])
            } else {
                Luma([255])
            }
        });
        let result = apply(img).unwrap();
        assert!(result.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
    }

    /// Max over `[x, x+1] x [y, y+1]`, then min over `[x-1, x] x [y-1, y]`, skipping off-image cells
    fn reference_close(img: &GrayImage) -> GrayImage {
        let (w, h) = (img.width() as i64, img.height() as i64);
        let fold = |src: &GrayImage, lo: i64, hi: i64, max: bool| {
            GrayImage::from_fn(src.width(), src.height(), |x, y| {
                let mut acc = if max { 0u8 } else { 255u8 };
                for dy in lo..=hi {
                    for dx in lo..=hi {
                        let (sx, sy) = (x as i64 + dx, y as i64 + dy);
                        if sx < 0 || sy < 0 || sx >= w || sy >= h {
                            continue;
                        }
                        let v = src.get_pixel(sx as u32, sy as u32).0[0];
                        acc = if max { acc.max(v) } else { acc.min(v) };
                    }
                }
                Luma([acc])
            })
        };
        fold(&fold(img, 0, 1, true), -1, 0, false)
    }

    #[test]
    fn test_close_matches_max_then_min_on_noisy_binary_images() {
        let mut state = 0x2545_f491_u32;
        for _ in 0..10 {
            let img = GrayImage::from_fn(37, 23, |_, _| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                if state % 3 == 0 {
                    Luma([0])
                } else {
                    Luma([255])
                }
            });
            assert_eq!(apply(img.clone()).unwrap(), reference_close(&img));
        }
    }

    #[test]
    fn test_close_keeps_corner_pixels() {
        let mut img = GrayImage::from_pixel(6, 6, Luma([0]));
        img.put_pixel(5, 5, Luma([255]));
        img.put_pixel(0, 0, Luma([255]));

        let result = apply(img.clone()).unwrap();
        assert_eq!(result, img);
    }
}

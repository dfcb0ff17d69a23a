use imreg_core::Image;
use crate::error::{FastError, FastResult};

/// Standard CLAHE tile side
pub const CLAHE_TILE_SIZE: usize = 8;
/// Standard CLAHE contrast limiting factor
pub const CLAHE_CLIP_LIMIT: f32 = 2.0;

/// Photometric normalization applied before detection
pub struct ImagePreprocessing;

impl ImagePreprocessing {
    /// Apply CLAHE (Contrast Limited Adaptive Histogram Equalization) with the
    /// standard tile size and clip limit.
    pub fn apply_clahe_preprocessing(img: &Image, width: usize, height: usize) -> FastResult<Image> {
        Self::apply_clahe(img, width, height, CLAHE_TILE_SIZE, CLAHE_CLIP_LIMIT)
    }

    /// CLAHE with explicit parameters. Each pixel is mapped through the
    /// bilinear blend of the four nearest tile lookup tables, so tile seams
    /// do not show up as artificial corners.
    pub fn apply_clahe(img: &Image, width: usize, height: usize, tile_size: usize, clip_limit: f32) -> FastResult<Image> {
        if width == 0 || height == 0 || tile_size == 0 {
            return Err(FastError::InvalidImageSize { width, height });
        }
        if img.len() != width * height {
            return Err(FastError::InvalidImageData {
                expected_len: width * height,
                actual_len: img.len(),
            });
        }

        let tiles_x = width.div_ceil(tile_size);
        let tiles_y = height.div_ceil(tile_size);

        let luts: Vec<[u8; 256]> = (0..tiles_y)
            .flat_map(|ty| (0..tiles_x).map(move |tx| (tx, ty)))
            .map(|(tx, ty)| {
                let x0 = tx * tile_size;
                let y0 = ty * tile_size;
                let x1 = (x0 + tile_size).min(width);
                let y1 = (y0 + tile_size).min(height);

                let mut histogram = [0u32; 256];
                for y in y0..y1 {
                    for &p in &img[y * width + x0..y * width + x1] {
                        histogram[p as usize] += 1;
                    }
                }
                Self::clip_histogram(&mut histogram, clip_limit);
                Self::histogram_lut(&histogram)
            })
            .collect();

        let mut equalized = vec![0u8; img.len()];
        let half = tile_size as f32 / 2.0;

        for y in 0..height {
            // Position relative to tile centers
            let fy = ((y as f32 + 0.5 - half) / tile_size as f32).clamp(0.0, (tiles_y - 1) as f32);
            let ty0 = fy.floor() as usize;
            let ty1 = (ty0 + 1).min(tiles_y - 1);
            let wy = fy - ty0 as f32;

            for x in 0..width {
                let fx = ((x as f32 + 0.5 - half) / tile_size as f32).clamp(0.0, (tiles_x - 1) as f32);
                let tx0 = fx.floor() as usize;
                let tx1 = (tx0 + 1).min(tiles_x - 1);
                let wx = fx - tx0 as f32;

                let p = img[y * width + x] as usize;
                let v00 = luts[ty0 * tiles_x + tx0][p] as f32;
                let v10 = luts[ty0 * tiles_x + tx1][p] as f32;
                let v01 = luts[ty1 * tiles_x + tx0][p] as f32;
                let v11 = luts[ty1 * tiles_x + tx1][p] as f32;

                let top = v00 * (1.0 - wx) + v10 * wx;
                let bottom = v01 * (1.0 - wx) + v11 * wx;
                equalized[y * width + x] = (top * (1.0 - wy) + bottom * wy).round().clamp(0.0, 255.0) as u8;
            }
        }

        Ok(equalized)
    }

    /// Clip histogram bins and redistribute the excess uniformly
    fn clip_histogram(histogram: &mut [u32; 256], clip_limit: f32) {
        let total_pixels: u32 = histogram.iter().sum();
        let clip_threshold = ((total_pixels as f32 / 256.0) * clip_limit).max(1.0) as u32;

        let mut excess = 0u32;
        for count in histogram.iter_mut() {
            if *count > clip_threshold {
                excess += *count - clip_threshold;
                *count = clip_threshold;
            }
        }

        let redistribution = excess / 256;
        let remainder = (excess % 256) as usize;
        for (i, count) in histogram.iter_mut().enumerate() {
            *count += redistribution;
            if i < remainder {
                *count += 1;
            }
        }
    }

    /// Cumulative distribution scaled to [0, 255]
    fn histogram_lut(histogram: &[u32; 256]) -> [u8; 256] {
        let total_pixels: u32 = histogram.iter().sum();
        let mut lut = [0u8; 256];
        if total_pixels == 0 {
            return lut;
        }

        let mut cumulative = 0u32;
        for (value, &count) in lut.iter_mut().zip(histogram.iter()) {
            cumulative += count;
            *value = ((cumulative as f32 / total_pixels as f32) * 255.0).round() as u8;
        }
        lut
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clahe_preserves_size() {
        let img: Image = (0..64 * 48).map(|i| (i % 251) as u8).collect();
        let out = ImagePreprocessing::apply_clahe_preprocessing(&img, 64, 48).unwrap();
        assert_eq!(out.len(), img.len());
    }

    #[test]
    fn test_clahe_stretches_low_contrast() {
        // Horizontal ramp squeezed into [100, 115]
        let (w, h) = (64, 64);
        let img: Image = (0..w * h).map(|i| 100 + ((i % w) * 16 / w) as u8).collect();
        let out = ImagePreprocessing::apply_clahe(&img, w, h, 16, 40.0).unwrap();

        let range = |v: &Image| *v.iter().max().unwrap() as i32 - *v.iter().min().unwrap() as i32;
        assert!(range(&out) > range(&img));
    }

    #[test]
    fn test_clahe_is_monotonic_within_a_tile() {
        let (w, h) = (8, 8);
        let img: Image = (0..w * h).map(|i| (i * 3) as u8).collect();
        let out = ImagePreprocessing::apply_clahe(&img, w, h, 8, 2.0).unwrap();
        for pair in out.windows(2) {
            assert!(pair[1] >= pair[0]);
        }
    }

    #[test]
    fn test_clahe_rejects_bad_input() {
        assert!(ImagePreprocessing::apply_clahe(&vec![0; 10], 4, 4, 8, 2.0).is_err());
        assert!(ImagePreprocessing::apply_clahe(&vec![], 0, 4, 8, 2.0).is_err());
    }
}

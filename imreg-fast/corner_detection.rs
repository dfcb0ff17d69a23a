use imreg_core::{Image, Keypoint};
use crate::types::{CornerType, ScoredKeypoint, ScaleLevel};
use crate::utils::has_consecutive_bits;
use rayon::prelude::*;

/// Contiguous arc length of the segment test (FAST-9)
pub const FAST_ARC_LENGTH: usize = 9;

/// How detected corners are ranked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreType {
    /// Harris corner measure on a 7x7 window
    Harris,
    /// Mean squared contrast of the circle pixels past the threshold
    Fast,
}

/// Corner detection algorithms (FAST and Harris)
pub struct CornerDetector;

impl CornerDetector {
    /// FAST circle offsets for corner detection
    pub const FAST_OFFSETS: [(i32, i32); 16] = [
        (0, -3), (1, -3), (2, -2), (3, -1),
        (3, 0), (3, 1), (2, 2), (1, 3),
        (0, 3), (-1, 3), (-2, 2), (-3, 1),
        (-3, 0), (-3, -1), (-2, -2), (-1, -3),
    ];

    /// Detect FAST corners at one pyramid level, rows processed in parallel.
    ///
    /// Pixels closer than `border` to an edge are never tested. Keypoints are
    /// returned in level coordinates, row-major.
    pub fn detect_keypoints_at_scale(
        img: &Image,
        scale_level: &ScaleLevel,
        threshold: u8,
        border: usize,
        score: ScoreType,
    ) -> Vec<ScoredKeypoint> {
        let width = scale_level.width;
        let height = scale_level.height;
        let border = border.max(3);

        if width <= 2 * border || height <= 2 * border {
            return Vec::new();
        }

        (border..height - border)
            .into_par_iter()
            .flat_map_iter(|y| {
                let mut row_keypoints = Vec::new();
                for x in border..width - border {
                    if !Self::is_fast_corner(img, width, x, y, threshold) {
                        continue;
                    }
                    let response = match score {
                        ScoreType::Harris => Self::compute_harris_response(img, width, height, x, y),
                        ScoreType::Fast => Self::compute_intensity_response(img, width, x, y, threshold),
                    };
                    let mut keypoint = Keypoint::new(x as f32, y as f32);
                    keypoint.octave = scale_level.level;
                    keypoint.response = response;
                    row_keypoints.push(ScoredKeypoint { keypoint, response });
                }
                row_keypoints
            })
            .collect()
    }

    /// Segment test: at least `FAST_ARC_LENGTH` contiguous circle pixels all
    /// brighter or all darker than the center by `threshold`.
    pub fn is_fast_corner(img: &Image, width: usize, x: usize, y: usize, threshold: u8) -> bool {
        let center = img[y * width + x];
        let at = |i: usize| {
            let (dx, dy) = Self::FAST_OFFSETS[i];
            img[(y as i32 + dy) as usize * width + (x as i32 + dx) as usize]
        };

        // High-speed rejection: a 9-arc always covers at least two of the four
        // compass pixels, all of the arc's kind.
        let (mut compass_bright, mut compass_dark) = (0, 0);
        for i in [0, 4, 8, 12] {
            match CornerType::classify(at(i), center, threshold) {
                CornerType::Bright => compass_bright += 1,
                CornerType::Dark => compass_dark += 1,
                CornerType::None => {}
            }
        }
        if compass_bright < 2 && compass_dark < 2 {
            return false;
        }

        let mut bright: u16 = 0;
        let mut dark: u16 = 0;
        for i in 0..16 {
            match CornerType::classify(at(i), center, threshold) {
                CornerType::Bright => bright |= 1 << i,
                CornerType::Dark => dark |= 1 << i,
                CornerType::None => {}
            }
        }

        has_consecutive_bits(bright, FAST_ARC_LENGTH) || has_consecutive_bits(dark, FAST_ARC_LENGTH)
    }

    /// Mean squared contrast of the circle pixels past the threshold
    pub fn compute_intensity_response(img: &Image, width: usize, x: usize, y: usize, threshold: u8) -> f32 {
        let center = img[y * width + x] as f32;
        let mut sum_diff = 0.0f32;
        let mut count = 0;

        for &(dx, dy) in Self::FAST_OFFSETS.iter() {
            let px = (x as i32 + dx) as usize;
            let py = (y as i32 + dy) as usize;
            let diff = (center - img[py * width + px] as f32).abs();
            if diff > threshold as f32 {
                sum_diff += diff * diff;
                count += 1;
            }
        }

        if count > 0 {
            sum_diff / count as f32
        } else {
            0.0
        }
    }

    /// Harris corner response `det(M) - k * trace(M)^2` on a 7x7 window.
    ///
    /// Returns 0 when the window does not fit inside the image.
    pub fn compute_harris_response(img: &Image, width: usize, height: usize, x: usize, y: usize) -> f32 {
        const RADIUS: usize = 3;
        const K: f64 = 0.04;

        // Window plus one pixel for the Sobel support
        if x < RADIUS + 1 || y < RADIUS + 1 || x + RADIUS + 1 >= width || y + RADIUS + 1 >= height {
            return 0.0;
        }

        let mut ixx = 0.0f64;
        let mut ixy = 0.0f64;
        let mut iyy = 0.0f64;

        for ny in y - RADIUS..=y + RADIUS {
            for nx in x - RADIUS..=x + RADIUS {
                let (gx, gy) = Self::compute_gradients(img, width, nx, ny);
                ixx += (gx * gx) as f64;
                ixy += (gx * gy) as f64;
                iyy += (gy * gy) as f64;
            }
        }

        // Normalize so the score does not depend on the window size
        let norm = 1.0 / ((2 * RADIUS + 1) * (2 * RADIUS + 1)) as f64;
        let (ixx, ixy, iyy) = (ixx * norm, ixy * norm, iyy * norm);

        let det = ixx * iyy - ixy * ixy;
        let trace = ixx + iyy;
        (det - K * trace * trace) as f32
    }

    /// Image gradients with the Sobel operator. Caller guarantees a 1-pixel margin.
    fn compute_gradients(img: &Image, width: usize, x: usize, y: usize) -> (f32, f32) {
        let p = |xx: usize, yy: usize| img[yy * width + xx] as f32;

        // Sobel X kernel: [-1, 0, 1; -2, 0, 2; -1, 0, 1]
        let gx = p(x + 1, y - 1) + 2.0 * p(x + 1, y) + p(x + 1, y + 1)
            - p(x - 1, y - 1) - 2.0 * p(x - 1, y) - p(x - 1, y + 1);

        // Sobel Y kernel: [-1, -2, -1; 0, 0, 0; 1, 2, 1]
        let gy = p(x - 1, y + 1) + 2.0 * p(x, y + 1) + p(x + 1, y + 1)
            - p(x - 1, y - 1) - 2.0 * p(x, y - 1) - p(x + 1, y - 1);

        (gx / 8.0, gy / 8.0)
    }
}

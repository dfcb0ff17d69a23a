use imreg_core::Image;
use crate::error::{FastError, FastResult};
use crate::types::ScaleLevel;

/// Smallest level side worth running the detector on
pub const MIN_LEVEL_SIZE: usize = 32;

/// Image pyramid operations for multi-scale feature detection
pub struct ImagePyramid;

impl ImagePyramid {
    /// Generate scale levels for image pyramid
    pub fn generate_scale_levels(
        width: usize,
        height: usize,
        n_levels: usize,
        scale_factor: f32,
    ) -> FastResult<Vec<ScaleLevel>> {
        if n_levels == 0 || !(scale_factor > 1.0) {
            return Err(FastError::InvalidPyramid { n_levels, scale_factor });
        }

        let mut levels = Vec::with_capacity(n_levels);
        let mut current_scale = 1.0f32;

        for level in 0..n_levels {
            let scaled_width = ((width as f32) / current_scale).round() as usize;
            let scaled_height = ((height as f32) / current_scale).round() as usize;

            // Level 0 is always kept, even for tiny images
            if level > 0 && (scaled_width < MIN_LEVEL_SIZE || scaled_height < MIN_LEVEL_SIZE) {
                break;
            }

            levels.push(ScaleLevel {
                level,
                scale: current_scale,
                width: scaled_width.max(1),
                height: scaled_height.max(1),
                scale_x: width as f32 / scaled_width.max(1) as f32,
                scale_y: height as f32 / scaled_height.max(1) as f32,
            });

            current_scale *= scale_factor;
        }

        Ok(levels)
    }

    /// Build image pyramid from base image.
    ///
    /// Every level is resampled from the previous one, so each step only
    /// shrinks by `scale_factor` and bilinear sampling stays alias-free enough.
    pub fn build_image_pyramid(img: &Image, width: usize, height: usize, scale_levels: &[ScaleLevel]) -> FastResult<Vec<Image>> {
        if img.len() != width * height {
            return Err(FastError::InvalidImageData {
                expected_len: width * height,
                actual_len: img.len(),
            });
        }

        let mut pyramid: Vec<Image> = Vec::with_capacity(scale_levels.len());
        let (mut prev_w, mut prev_h) = (width, height);

        for scale_level in scale_levels {
            if scale_level.level == 0 {
                pyramid.push(img.clone());
            } else {
                let prev = &pyramid[pyramid.len() - 1];
                let downsampled = Self::downsample_image(prev, prev_w, prev_h, scale_level.width, scale_level.height);
                pyramid.push(downsampled);
            }
            prev_w = scale_level.width;
            prev_h = scale_level.height;
        }

        Ok(pyramid)
    }

    /// Downsample image using bilinear interpolation
    fn downsample_image(img: &Image, src_width: usize, src_height: usize, target_width: usize, target_height: usize) -> Image {
        let mut downsampled = vec![0u8; target_width * target_height];

        let x_ratio = src_width as f32 / target_width as f32;
        let y_ratio = src_height as f32 / target_height as f32;

        for y in 0..target_height {
            let src_y = ((y as f32 + 0.5) * y_ratio - 0.5).max(0.0);
            for x in 0..target_width {
                let src_x = ((x as f32 + 0.5) * x_ratio - 0.5).max(0.0);
                let value = Self::bilinear_sample(img, src_width, src_height, src_x, src_y);
                downsampled[y * target_width + x] = value.round().clamp(0.0, 255.0) as u8;
            }
        }

        downsampled
    }

    /// Sample image at fractional coordinates using bilinear interpolation
    fn bilinear_sample(img: &Image, width: usize, height: usize, x: f32, y: f32) -> f32 {
        let x1 = (x.floor() as usize).min(width - 1);
        let y1 = (y.floor() as usize).min(height - 1);
        let x2 = (x1 + 1).min(width - 1);
        let y2 = (y1 + 1).min(height - 1);

        let fx = x - x1 as f32;
        let fy = y - y1 as f32;

        let p11 = img[y1 * width + x1] as f32;
        let p12 = img[y1 * width + x2] as f32;
        let p21 = img[y2 * width + x1] as f32;
        let p22 = img[y2 * width + x2] as f32;

        let interpolated_top = p11 * (1.0 - fx) + p12 * fx;
        let interpolated_bottom = p21 * (1.0 - fx) + p22 * fx;

        interpolated_top * (1.0 - fy) + interpolated_bottom * fy
    }
}

use imreg_core::{FeatureConfig, Image, Keypoint};
use crate::corner_detection::{CornerDetector, ScoreType};
use crate::error::{FastError, FastResult};
use crate::preprocessing::ImagePreprocessing;
use crate::pyramid::ImagePyramid;
use crate::refinement::KeypointRefinement;
use crate::types::{ScaleLevel, ScoredKeypoint};
use log::debug;
use rayon::prelude::*;

/// Extra margin beyond the orientation patch radius, leaving room for the
/// rotated descriptor sampling pattern.
const DESCRIPTOR_MARGIN: usize = 5;

/// Keypoints together with the pyramid they were detected on
#[derive(Debug, Clone)]
pub struct Detection {
    /// Keypoints in full-resolution coordinates, grouped by ascending octave
    pub keypoints: Vec<Keypoint>,
    pub levels: Vec<ScaleLevel>,
    /// One image per level (after optional CLAHE on the base level)
    pub pyramid: Vec<Image>,
}

/// Main FAST corner detector with multi-scale capability
#[derive(Debug, Clone)]
pub struct FastDetector {
    cfg: FeatureConfig,
    w: usize,
    h: usize,
    scale_levels: Vec<ScaleLevel>,
}

impl FastDetector {
    /// Creates a new FAST detector with validation
    pub fn new(cfg: FeatureConfig, width: usize, height: usize) -> FastResult<Self> {
        if width == 0 || height == 0 {
            return Err(FastError::InvalidImageSize { width, height });
        }

        // Threshold 0 would detect everything, >127 breaks the u8 contrast test
        if cfg.threshold == 0 || cfg.threshold > 127 {
            return Err(FastError::InvalidThreshold(cfg.threshold));
        }

        if cfg.patch_size % 2 == 0 || cfg.patch_size < 7 {
            return Err(FastError::InvalidPatchSize { patch_size: cfg.patch_size });
        }

        let scale_levels = ImagePyramid::generate_scale_levels(width, height, cfg.n_levels, cfg.scale_factor)?;

        Ok(Self {
            cfg,
            w: width,
            h: height,
            scale_levels,
        })
    }

    /// Validates image data before processing
    fn validate_image(&self, img: &Image) -> FastResult<()> {
        let expected_len = self.w * self.h;
        if img.len() != expected_len {
            return Err(FastError::InvalidImageData {
                expected_len,
                actual_len: img.len(),
            });
        }
        Ok(())
    }

    /// Distance from a level edge under which keypoints are not reported
    pub fn border(&self) -> usize {
        self.cfg.patch_size / 2 + DESCRIPTOR_MARGIN
    }

    /// Detect keypoints across all pyramid levels
    pub fn detect_keypoints(&self, img: &Image) -> FastResult<Vec<Keypoint>> {
        Ok(self.detect(img)?.keypoints)
    }

    /// Detect keypoints and keep the pyramid around for descriptor extraction.
    ///
    /// The feature budget is split across levels in proportion to their area;
    /// within a level the strongest responses win after non-maximum suppression.
    pub fn detect(&self, img: &Image) -> FastResult<Detection> {
        self.validate_image(img)?;

        let base = if self.cfg.clahe {
            ImagePreprocessing::apply_clahe_preprocessing(img, self.w, self.h)?
        } else {
            img.clone()
        };

        let pyramid = ImagePyramid::build_image_pyramid(&base, self.w, self.h, &self.scale_levels)?;
        let budgets = self.level_budgets();

        let per_level: Vec<Vec<Keypoint>> = self
            .scale_levels
            .par_iter()
            .zip(pyramid.par_iter())
            .zip(budgets.par_iter())
            .map(|((scale_level, level_img), &budget)| self.detect_at_level(level_img, scale_level, budget))
            .collect();

        for (level, kps) in self.scale_levels.iter().zip(&per_level) {
            debug!(
                "level {} ({}x{}, scale {:.2}): {} keypoints",
                level.level, level.width, level.height, level.scale, kps.len()
            );
        }

        Ok(Detection {
            keypoints: per_level.into_iter().flatten().collect(),
            levels: self.scale_levels.clone(),
            pyramid,
        })
    }

    /// Detect, suppress, rank, orient and refine keypoints on one level
    fn detect_at_level(&self, img: &Image, scale_level: &ScaleLevel, budget: usize) -> Vec<Keypoint> {
        if budget == 0 {
            return Vec::new();
        }

        let score = if self.cfg.harris_score { ScoreType::Harris } else { ScoreType::Fast };
        let scored = CornerDetector::detect_keypoints_at_scale(img, scale_level, self.cfg.threshold, self.border(), score);

        let mut kept = KeypointRefinement::non_maximum_suppression(&scored, self.cfg.nms_distance);
        kept.truncate(budget);

        let (w, h) = (scale_level.width, scale_level.height);
        let patch_size = self.cfg.patch_size;

        kept.into_iter()
            .map(|ScoredKeypoint { keypoint, .. }| {
                let mut kp = if self.cfg.subpixel_refinement {
                    KeypointRefinement::refine_keypoint_subpixel(keypoint, |x, y| {
                        if x < 0 || y < 0 {
                            return 0.0;
                        }
                        CornerDetector::compute_harris_response(img, w, h, x as usize, y as usize)
                    })
                } else {
                    keypoint
                };
                kp.angle = KeypointRefinement::compute_orientation(img, w, h, kp.x, kp.y, patch_size);

                let (bx, by) = scale_level.to_base(kp.x, kp.y);
                kp.x = bx;
                kp.y = by;
                kp.size = patch_size as f32 * scale_level.scale;
                kp
            })
            .collect()
    }

    /// Split `n_features` across levels in proportion to level area
    fn level_budgets(&self) -> Vec<usize> {
        let areas: Vec<f64> = self
            .scale_levels
            .iter()
            .map(|l| (l.width * l.height) as f64)
            .collect();
        let total: f64 = areas.iter().sum();

        let mut budgets = Vec::with_capacity(areas.len());
        let mut assigned = 0usize;
        for (i, area) in areas.iter().enumerate() {
            let budget = if i + 1 == areas.len() {
                self.cfg.n_features.saturating_sub(assigned)
            } else {
                ((self.cfg.n_features as f64) * area / total).round() as usize
            };
            let budget = budget.min(self.cfg.n_features - assigned);
            assigned += budget;
            budgets.push(budget);
        }
        budgets
    }

    /// Get scale levels for this detector
    pub fn get_scale_levels(&self) -> &[ScaleLevel] {
        &self.scale_levels
    }

    /// Get detector configuration
    pub fn config(&self) -> &FeatureConfig {
        &self.cfg
    }

    /// Get image dimensions
    pub fn dimensions(&self) -> (usize, usize) {
        (self.w, self.h)
    }
}

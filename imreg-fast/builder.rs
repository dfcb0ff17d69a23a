use imreg_core::{FeatureConfig, RegistrationConfig};
use crate::detector::FastDetector;
use crate::error::FastResult;

/// Builder for creating a `FastDetector`
#[derive(Debug, Clone)]
pub struct DetectorBuilder {
    config: FeatureConfig,
    width: usize,
    height: usize,
}

impl DetectorBuilder {
    /// Create a new builder with default settings
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            config: FeatureConfig::default(),
            width,
            height,
        }
    }

    /// Start from an existing feature configuration
    pub fn from_config(config: FeatureConfig, width: usize, height: usize) -> Self {
        Self { config, width, height }
    }

    /// Set the FAST threshold (1-127)
    pub fn threshold(mut self, threshold: u8) -> Self {
        self.config.threshold = threshold;
        self
    }

    /// Set the patch size for orientation calculation
    pub fn patch_size(mut self, patch_size: usize) -> Self {
        self.config.patch_size = patch_size;
        self
    }

    /// Maximum number of keypoints kept over all levels
    pub fn n_features(mut self, n_features: usize) -> Self {
        self.config.n_features = n_features;
        self
    }

    pub fn pyramid(mut self, n_levels: usize, scale_factor: f32) -> Self {
        self.config.n_levels = n_levels;
        self.config.scale_factor = scale_factor;
        self
    }

    /// Enable or disable Harris corner scoring
    pub fn harris_corners(mut self, enable: bool) -> Self {
        self.config.harris_score = enable;
        self
    }

    /// Enable or disable CLAHE preprocessing
    pub fn clahe_preprocessing(mut self, enable: bool) -> Self {
        self.config.clahe = enable;
        self
    }

    /// Set the non-maximum suppression (NMS) distance
    pub fn nms_distance(mut self, distance: f32) -> Self {
        self.config.nms_distance = distance;
        self
    }

    /// Enable or disable subpixel refinement
    pub fn subpixel_refinement(mut self, enable: bool) -> Self {
        self.config.subpixel_refinement = enable;
        self
    }

    /// Apply the speed-oriented preset
    pub fn preset_fast(mut self) -> Self {
        self.config = RegistrationConfig::fast_preset().features;
        self
    }

    /// Apply the low-contrast preset
    pub fn preset_illumination_robust(mut self) -> Self {
        self.config = RegistrationConfig::illumination_robust_preset().features;
        self
    }

    /// Build the `FastDetector`
    pub fn build(self) -> FastResult<FastDetector> {
        FastDetector::new(self.config, self.width, self.height)
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }
}

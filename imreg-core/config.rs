#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Errors raised while validating or (de)serializing a configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for '{field}': {reason}")]
    InvalidValue { field: &'static str, reason: String },
    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),
    #[cfg(feature = "serde")]
    #[error("Failed to parse TOML configuration: {0}")]
    TomlDe(#[from] toml::de::Error),
    #[cfg(feature = "serde")]
    #[error("Failed to write TOML configuration: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[cfg(feature = "serde")]
    #[error("Failed to process JSON configuration: {0}")]
    Json(#[from] serde_json::Error),
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field,
        reason: reason.into(),
    }
}

/// Keypoint detection and description settings
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct FeatureConfig {
    /// FAST intensity threshold (1-127)
    pub threshold: u8,
    /// Diameter of the orientation / descriptor patch (odd)
    pub patch_size: usize,
    /// Upper bound on keypoints kept per image
    pub n_features: usize,
    /// Number of pyramid levels
    pub n_levels: usize,
    /// Downscale factor between two consecutive pyramid levels
    pub scale_factor: f32,
    /// Minimum distance between two keypoints of the same level
    pub nms_distance: f32,
    pub subpixel_refinement: bool,
    /// Rank corners by Harris response instead of the FAST intensity score
    pub harris_score: bool,
    /// Contrast-limited histogram equalization before detection
    pub clahe: bool,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            threshold: 20,
            patch_size: 31,
            n_features: 4000,
            n_levels: 8,
            scale_factor: 1.2,
            nms_distance: 3.0,
            subpixel_refinement: true,
            harris_score: true,
            clahe: false,
        }
    }
}

/// Descriptor matching settings
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MatcherConfig {
    /// Nearest / second-nearest distance ratio a match must stay below
    pub ratio: f32,
    /// Largest Hamming distance accepted for a match
    pub max_distance: u32,
    /// Keep only mutual nearest neighbours
    pub cross_check: bool,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            ratio: 0.8,
            max_distance: 64,
            cross_check: false,
        }
    }
}

/// Robust homography estimation settings
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RansacConfig {
    /// Number of hypotheses evaluated
    pub max_iterations: usize,
    /// Reprojection error (pixels) under which a correspondence is an inlier
    pub inlier_threshold: f64,
    /// Correspondences required before estimation is attempted
    pub min_correspondences: usize,
    /// Absolute floor on the accepted inlier count
    pub min_inliers: usize,
    /// Fraction of correspondences that must be inliers
    pub min_inlier_ratio: f64,
    /// Refit / re-score rounds on the winning inlier set
    pub refine_iterations: usize,
    /// Base seed; iteration `i` samples with `seed + i`
    pub seed: u64,
}

impl Default for RansacConfig {
    fn default() -> Self {
        Self {
            max_iterations: 2000,
            inlier_threshold: 3.0,
            min_correspondences: 4,
            min_inliers: 8,
            min_inlier_ratio: 0.15,
            refine_iterations: 5,
            seed: 0x1D5E_ED00,
        }
    }
}

/// Complete registration configuration
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RegistrationConfig {
    /// Worker threads for the global rayon pool
    pub threads: usize,
    pub features: FeatureConfig,
    pub matcher: MatcherConfig,
    pub ransac: RansacConfig,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            threads: num_cpus::get().max(1),
            features: FeatureConfig::default(),
            matcher: MatcherConfig::default(),
            ransac: RansacConfig::default(),
        }
    }
}

impl RegistrationConfig {
    /// Preset trading keypoint count for speed
    pub fn fast_preset() -> Self {
        let mut cfg = Self::default();
        cfg.features.threshold = 30;
        cfg.features.n_features = 1500;
        cfg.features.n_levels = 4;
        cfg.features.subpixel_refinement = false;
        cfg.ransac.max_iterations = 500;
        cfg
    }

    /// Preset for low-contrast or unevenly lit inputs
    pub fn illumination_robust_preset() -> Self {
        let mut cfg = Self::default();
        cfg.features.threshold = 12;
        cfg.features.clahe = true;
        cfg.features.nms_distance = 2.0;
        cfg
    }

    /// Generate human-readable summary
    pub fn summary(&self) -> String {
        format!(
            "RegistrationConfig: threads={}, fast_threshold={}, n_features={}, levels={}x{:.2}, ratio={:.2}, max_hamming={}, ransac=[iter:{}, thr:{:.1}px, min_inliers:{}, min_ratio:{:.2}, seed:{:#x}]",
            self.threads,
            self.features.threshold,
            self.features.n_features,
            self.features.n_levels,
            self.features.scale_factor,
            self.matcher.ratio,
            self.matcher.max_distance,
            self.ransac.max_iterations,
            self.ransac.inlier_threshold,
            self.ransac.min_inliers,
            self.ransac.min_inlier_ratio,
            self.ransac.seed,
        )
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.threads == 0 {
            return Err(invalid("threads", "must be at least 1"));
        }

        let f = &self.features;
        if f.threshold == 0 || f.threshold > 127 {
            return Err(invalid("features.threshold", format!("{} (must be 1-127)", f.threshold)));
        }
        if f.patch_size % 2 == 0 || f.patch_size < 7 {
            return Err(invalid("features.patch_size", format!("{} (must be odd and >= 7)", f.patch_size)));
        }
        if f.n_features == 0 {
            return Err(invalid("features.n_features", "must be at least 1"));
        }
        if f.n_levels == 0 {
            return Err(invalid("features.n_levels", "must be at least 1"));
        }
        if !(f.scale_factor > 1.0) {
            return Err(invalid("features.scale_factor", format!("{} (must be > 1.0)", f.scale_factor)));
        }
        if !(f.nms_distance >= 0.0) {
            return Err(invalid("features.nms_distance", "must be non-negative"));
        }

        let m = &self.matcher;
        if !(m.ratio > 0.0 && m.ratio <= 1.0) {
            return Err(invalid("matcher.ratio", format!("{} (must be in (0, 1])", m.ratio)));
        }

        let r = &self.ransac;
        if r.max_iterations == 0 {
            return Err(invalid("ransac.max_iterations", "must be at least 1"));
        }
        if !(r.inlier_threshold > 0.0) {
            return Err(invalid("ransac.inlier_threshold", "must be positive"));
        }
        if r.min_correspondences < 4 {
            return Err(invalid("ransac.min_correspondences", "a homography needs at least 4 pairs"));
        }
        if r.min_inliers < 4 {
            return Err(invalid("ransac.min_inliers", "a homography needs at least 4 inliers"));
        }
        if !(0.0..=1.0).contains(&r.min_inlier_ratio) {
            return Err(invalid("ransac.min_inlier_ratio", format!("{} (must be in [0, 1])", r.min_inlier_ratio)));
        }
        Ok(())
    }

    /// Load configuration from TOML file
    #[cfg(feature = "serde")]
    pub fn load_toml<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Save configuration to TOML file
    #[cfg(feature = "serde")]
    pub fn save_toml<P: AsRef<std::path::Path>>(&self, path: P) -> Result<(), ConfigError> {
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    /// Load configuration from JSON file
    #[cfg(feature = "serde")]
    pub fn load_json<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Serialize to TOML string
    #[cfg(feature = "serde")]
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Deserialize from TOML string
    #[cfg(feature = "serde")]
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to JSON string
    #[cfg(feature = "serde")]
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Deserialize from JSON string
    #[cfg(feature = "serde")]
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
}

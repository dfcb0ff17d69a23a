//! Multi-scale oriented FAST keypoint detection.
//!
//! `FastDetector` builds an image pyramid, runs the FAST-9 segment test on
//! every level, ranks corners by Harris response, suppresses neighbours,
//! assigns intensity-centroid orientations and maps everything back to the
//! full-resolution frame.

pub mod builder;
pub mod corner_detection;
pub mod detector;
pub mod error;
pub mod preprocessing;
pub mod pyramid;
pub mod refinement;
pub mod types;
pub mod utils;

pub use builder::DetectorBuilder;
pub use corner_detection::{CornerDetector, ScoreType, FAST_ARC_LENGTH};
pub use detector::{Detection, FastDetector};
pub use error::{FastError, FastResult};
pub use preprocessing::ImagePreprocessing;
pub use pyramid::ImagePyramid;
pub use refinement::KeypointRefinement;
pub use types::{ScaleLevel, ScoredKeypoint};

#[cfg(test)]
mod tests {
    use super::*;
    use imreg_core::{FeatureConfig, Image};

    fn create_test_config() -> FeatureConfig {
        FeatureConfig {
            patch_size: 15,
            n_levels: 3,
            ..FeatureConfig::default()
        }
    }

    fn create_test_image(width: usize, height: usize) -> Image {
        vec![128; width * height] // Gray image
    }

    /// Bright squares on a dark background, one every 24 pixels
    fn create_blocks_image(width: usize, height: usize) -> Image {
        let mut img = vec![50; width * height];
        for cy in (24..height.saturating_sub(24)).step_by(24) {
            for cx in (24..width.saturating_sub(24)).step_by(24) {
                let level = 160 + ((cx + 3 * cy) % 80) as u8;
                for y in cy..cy + 10 {
                    for x in cx..cx + 10 {
                        img[y * width + x] = level;
                    }
                }
            }
        }
        img
    }

    #[test]
    fn test_valid_constructor() {
        let detector = FastDetector::new(create_test_config(), 100, 100);
        assert!(detector.is_ok());
    }

    #[test]
    fn test_invalid_dimensions() {
        let result = FastDetector::new(create_test_config(), 0, 100);
        assert!(matches!(result, Err(FastError::InvalidImageSize { .. })));

        let result = FastDetector::new(create_test_config(), 100, 0);
        assert!(matches!(result, Err(FastError::InvalidImageSize { .. })));
    }

    #[test]
    fn test_invalid_threshold() {
        let mut cfg = create_test_config();

        cfg.threshold = 0;
        let result = FastDetector::new(cfg.clone(), 100, 100);
        assert!(matches!(result, Err(FastError::InvalidThreshold(0))));

        cfg.threshold = 200;
        let result = FastDetector::new(cfg, 100, 100);
        assert!(matches!(result, Err(FastError::InvalidThreshold(200))));
    }

    #[test]
    fn test_invalid_patch_size() {
        let mut cfg = create_test_config();
        cfg.patch_size = 16;
        let result = FastDetector::new(cfg, 100, 100);
        assert!(matches!(result, Err(FastError::InvalidPatchSize { patch_size: 16 })));
    }

    #[test]
    fn test_invalid_pyramid() {
        let mut cfg = create_test_config();
        cfg.scale_factor = 1.0;
        let result = FastDetector::new(cfg, 100, 100);
        assert!(matches!(result, Err(FastError::InvalidPyramid { .. })));
    }

    #[test]
    fn test_invalid_image_data() {
        let detector = FastDetector::new(create_test_config(), 10, 10).unwrap();
        let img = vec![0; 50];
        let result = detector.detect_keypoints(&img);
        assert!(matches!(result, Err(FastError::InvalidImageData { .. })));
    }

    #[test]
    fn test_empty_image_detection() {
        let detector = FastDetector::new(create_test_config(), 64, 64).unwrap();
        let keypoints = detector.detect_keypoints(&create_test_image(64, 64)).unwrap();
        assert!(keypoints.is_empty());
    }

    #[test]
    fn test_tiny_image_has_no_keypoints() {
        let detector = FastDetector::new(create_test_config(), 7, 7).unwrap();
        let keypoints = detector.detect_keypoints(&create_blocks_image(7, 7)).unwrap();
        assert!(keypoints.is_empty());
    }

    #[test]
    fn test_corner_detection() {
        let (w, h) = (160, 160);
        let detector = FastDetector::new(create_test_config(), w, h).unwrap();
        let detection = detector.detect(&create_blocks_image(w, h)).unwrap();

        assert!(!detection.keypoints.is_empty());
        assert_eq!(detection.levels.len(), detection.pyramid.len());
        for kp in &detection.keypoints {
            assert!(kp.x >= 0.0 && kp.x < w as f32);
            assert!(kp.y >= 0.0 && kp.y < h as f32);
            assert!(kp.angle.is_finite());
            assert!(kp.response.is_finite());
            assert!(kp.octave < detection.levels.len());
        }
    }

    #[test]
    fn test_keypoints_grouped_by_octave() {
        let (w, h) = (160, 160);
        let detector = FastDetector::new(create_test_config(), w, h).unwrap();
        let keypoints = detector.detect_keypoints(&create_blocks_image(w, h)).unwrap();
        for pair in keypoints.windows(2) {
            assert!(pair[0].octave <= pair[1].octave);
        }
    }

    #[test]
    fn test_feature_budget() {
        let (w, h) = (160, 160);
        let img = create_blocks_image(w, h);
        let unlimited = DetectorBuilder::new(w, h).patch_size(15).build().unwrap();
        let limited = DetectorBuilder::new(w, h).patch_size(15).n_features(10).build().unwrap();

        let all = unlimited.detect_keypoints(&img).unwrap();
        let capped = limited.detect_keypoints(&img).unwrap();
        assert!(all.len() > 10);
        assert!(capped.len() <= 10);
    }

    #[test]
    fn test_parallel_determinism() {
        let (w, h) = (160, 120);
        let detector = FastDetector::new(create_test_config(), w, h).unwrap();
        let img = create_blocks_image(w, h);
        let first = detector.detect_keypoints(&img).unwrap();
        for _ in 0..5 {
            assert_eq!(detector.detect_keypoints(&img).unwrap(), first);
        }
    }

    #[test]
    fn test_clahe_detection_runs() {
        let (w, h) = (128, 128);
        let detector = DetectorBuilder::new(w, h)
            .patch_size(15)
            .clahe_preprocessing(true)
            .build()
            .unwrap();
        assert!(detector.detect_keypoints(&create_blocks_image(w, h)).is_ok());
    }

    #[test]
    fn test_configuration_access() {
        let cfg = create_test_config();
        let detector = FastDetector::new(cfg.clone(), 40, 40).unwrap();
        assert_eq!(detector.config(), &cfg);
        assert_eq!(detector.dimensions(), (40, 40));
        assert_eq!(detector.border(), 7 + 5);
        assert_eq!(detector.get_scale_levels()[0].width, 40);
    }

    #[test]
    fn test_builder_presets() {
        let builder = DetectorBuilder::new(64, 64).preset_fast();
        assert_eq!(builder.config().threshold, 30);
        let builder = DetectorBuilder::new(64, 64).preset_illumination_robust();
        assert!(builder.config().clahe);
        assert_eq!((builder.width(), builder.height()), (64, 64));
    }
}

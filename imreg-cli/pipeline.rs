//! End-to-end registration: features, matching, robust estimation, warping.

use std::time::{Duration, Instant};

use image::DynamicImage;
use imreg_core::{Correspondence, Keypoint, RegistrationConfig};
use imreg_ransac::{Homography, Matcher, RansacEstimator};
use log::info;

use crate::error::RegResult;
use crate::features::FeatureExtractor;
use crate::preprocess::to_luma;
use crate::warp::warp_perspective;

/// Counters and timings of one run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegistrationStats {
    pub moving_keypoints: usize,
    pub reference_keypoints: usize,
    pub correspondences: usize,
    pub inliers: usize,
    pub inlier_ratio: f64,
    pub ransac_iterations: usize,
    pub extraction_time: Duration,
    pub matching_time: Duration,
    pub estimation_time: Duration,
    pub warp_time: Duration,
}

impl RegistrationStats {
    pub fn total_time(&self) -> Duration {
        self.extraction_time + self.matching_time + self.estimation_time + self.warp_time
    }
}

#[derive(Debug, Clone)]
pub struct RegistrationResult {
    /// Moving image resampled into the reference frame
    pub aligned: DynamicImage,
    pub moving_keypoints: Vec<Keypoint>,
    pub reference_keypoints: Vec<Keypoint>,
    pub correspondences: Vec<Correspondence>,
    /// Ascending indices into `correspondences`
    pub inliers: Vec<usize>,
    /// Moving -> reference mapping
    pub transform: Homography,
    pub stats: RegistrationStats,
}

/// Registration pipeline bound to one configuration
#[derive(Debug, Clone)]
pub struct Registration {
    config: RegistrationConfig,
}

impl Registration {
    pub fn new(config: RegistrationConfig) -> RegResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &RegistrationConfig {
        &self.config
    }

    /// Align `moving` onto `reference`.
    ///
    /// Both images are expected to be cropped already. The aligned image has
    /// the reference dimensions and the moving image's channel layout.
    pub fn run(&self, moving: &DynamicImage, reference: &DynamicImage) -> RegResult<RegistrationResult> {
        let mut stats = RegistrationStats::default();

        let start = Instant::now();
        let (moving_luma, mw, mh) = to_luma(moving);
        let (reference_luma, rw, rh) = to_luma(reference);
        let extractor = FeatureExtractor::new(self.config.features.clone());
        let (moving_features, reference_features) =
            extractor.extract_pair((&moving_luma, mw, mh), (&reference_luma, rw, rh))?;
        stats.extraction_time = start.elapsed();
        stats.moving_keypoints = moving_features.len();
        stats.reference_keypoints = reference_features.len();
        info!(
            "Keypoints: {} in the image to register, {} in the reference image ({:.2?})",
            stats.moving_keypoints, stats.reference_keypoints, stats.extraction_time
        );

        let start = Instant::now();
        let correspondences = Matcher::new(&self.config.matcher).match_descriptors(
            &moving_features.keypoints,
            &moving_features.descriptors,
            &reference_features.keypoints,
            &reference_features.descriptors,
        )?;
        stats.matching_time = start.elapsed();
        stats.correspondences = correspondences.len();
        info!("Matches: {} ({:.2?})", stats.correspondences, stats.matching_time);

        let start = Instant::now();
        let estimate = RansacEstimator::new(self.config.ransac.clone()).estimate(&correspondences)?;
        stats.estimation_time = start.elapsed();
        stats.inliers = estimate.inliers.len();
        stats.inlier_ratio = estimate.inlier_ratio;
        stats.ransac_iterations = estimate.iterations;
        info!(
            "Inliers: {}/{} ({:.1}%) after {} iterations ({:.2?})",
            stats.inliers,
            stats.correspondences,
            stats.inlier_ratio * 100.0,
            stats.ransac_iterations,
            stats.estimation_time
        );

        let start = Instant::now();
        let aligned = warp_perspective(moving, &estimate.transform, reference.width(), reference.height())?;
        stats.warp_time = start.elapsed();
        info!(
            "Warped to {}x{} ({:.2?}), total {:.2?}",
            aligned.width(),
            aligned.height(),
            stats.warp_time,
            stats.total_time()
        );

        Ok(RegistrationResult {
            aligned,
            moving_keypoints: moving_features.keypoints,
            reference_keypoints: reference_features.keypoints,
            correspondences,
            inliers: estimate.inliers,
            transform: estimate.transform,
            stats,
        })
    }
}

//! RANSAC (Random Sample Consensus) homography estimation.
//!
//! Every iteration draws four distinct correspondences with its own RNG,
//! seeded `seed + iteration`, so iterations can run in parallel and still
//! produce the same answer as a sequential loop:
//! 1. Sample a minimal set and skip it when three points are collinear
//! 2. Fit a homography with the normalized DLT
//! 3. Count correspondences within the reprojection threshold
//! 4. Keep the best hypothesis (inliers, then total error, then iteration)
//! 5. Refit on the inliers until the set stops growing

use imreg_core::{Correspondence, RansacConfig};
use log::{debug, warn};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use thiserror::Error;

use crate::homography::{estimate_homography, is_degenerate_sample, Homography};

/// Points needed to determine a homography
pub const SAMPLE_SIZE: usize = 4;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EstimateError {
    #[error("insufficient correspondences: found {found}, at least {required} required")]
    InsufficientCorrespondences { found: usize, required: usize },
    #[error("registration failed: {inliers} of {total} correspondences are inliers, at least {required} required")]
    RegistrationFailed {
        inliers: usize,
        required: usize,
        total: usize,
    },
}

/// Result of RANSAC estimation.
#[derive(Debug, Clone, PartialEq)]
pub struct RansacResult {
    /// Accepted moving -> reference transform.
    pub transform: Homography,
    /// Ascending indices of inlier correspondences.
    pub inliers: Vec<usize>,
    /// Number of sampling iterations performed.
    pub iterations: usize,
    /// Final inlier ratio.
    pub inlier_ratio: f64,
}

#[derive(Debug, Clone)]
struct Hypothesis {
    iteration: usize,
    transform: Homography,
    inliers: Vec<usize>,
    /// Sum of the reprojection errors of the inliers
    error: f64,
}

impl Hypothesis {
    /// Total order: more inliers, then lower error, then earlier iteration
    fn beats(&self, other: &Hypothesis) -> bool {
        self.inliers
            .len()
            .cmp(&other.inliers.len())
            .then_with(|| other.error.total_cmp(&self.error))
            .then_with(|| other.iteration.cmp(&self.iteration))
            .is_gt()
    }
}

/// RANSAC estimator for robust homography fitting.
#[derive(Debug, Clone)]
pub struct RansacEstimator {
    config: RansacConfig,
}

impl RansacEstimator {
    pub fn new(config: RansacConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RansacConfig {
        &self.config
    }

    /// Correspondences needed before sampling starts
    pub fn required_correspondences(&self) -> usize {
        SAMPLE_SIZE.max(self.config.min_correspondences)
    }

    /// Inliers needed out of `total` correspondences for the model to be accepted
    pub fn required_inliers(&self, total: usize) -> usize {
        let by_ratio = (self.config.min_inlier_ratio * total as f64).ceil() as usize;
        SAMPLE_SIZE.max(self.config.min_inliers).max(by_ratio)
    }

    /// Estimate the moving -> reference homography from correspondences.
    pub fn estimate(&self, correspondences: &[Correspondence]) -> Result<RansacResult, EstimateError> {
        let total = correspondences.len();
        let required = self.required_correspondences();
        if total < required {
            return Err(EstimateError::InsufficientCorrespondences { found: total, required });
        }

        let src: Vec<(f64, f64)> = correspondences.iter().map(|c| c.moving).collect();
        let dst: Vec<(f64, f64)> = correspondences.iter().map(|c| c.reference).collect();

        let iterations = self.config.max_iterations;
        let best = (0..iterations)
            .into_par_iter()
            .filter_map(|iteration| self.hypothesis(&src, &dst, iteration))
            .reduce_with(|a, b| if b.beats(&a) { b } else { a });

        let required_inliers = self.required_inliers(total);
        let Some(best) = best else {
            warn!("RANSAC: every sample of {} correspondences was degenerate", total);
            return Err(EstimateError::RegistrationFailed {
                inliers: 0,
                required: required_inliers,
                total,
            });
        };

        debug!(
            "RANSAC: best sample at iteration {} with {}/{} inliers",
            best.iteration,
            best.inliers.len(),
            total
        );

        let refined = self.refine(&src, &dst, best);

        if refined.inliers.len() < required_inliers {
            return Err(EstimateError::RegistrationFailed {
                inliers: refined.inliers.len(),
                required: required_inliers,
                total,
            });
        }

        let inlier_ratio = refined.inliers.len() as f64 / total as f64;
        Ok(RansacResult {
            transform: refined.transform,
            inliers: refined.inliers,
            iterations,
            inlier_ratio,
        })
    }

    /// Fit and score the model of one iteration; `None` for degenerate samples
    fn hypothesis(&self, src: &[(f64, f64)], dst: &[(f64, f64)], iteration: usize) -> Option<Hypothesis> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed.wrapping_add(iteration as u64));
        let mut sample = Vec::with_capacity(SAMPLE_SIZE);
        random_sample_into(&mut rng, src.len(), SAMPLE_SIZE, &mut sample);

        let sample_src: Vec<(f64, f64)> = sample.iter().map(|&i| src[i]).collect();
        let sample_dst: Vec<(f64, f64)> = sample.iter().map(|&i| dst[i]).collect();
        if is_degenerate_sample(&sample_src) || is_degenerate_sample(&sample_dst) {
            return None;
        }

        let transform = estimate_homography(&sample_src, &sample_dst)?;
        let (inliers, error) = count_inliers(src, dst, &transform, self.config.inlier_threshold);

        Some(Hypothesis {
            iteration,
            transform,
            inliers,
            error,
        })
    }

    /// Least-squares refit on the inliers, repeated while the inlier set grows.
    ///
    /// The first refit always replaces the sampled model; later refits are
    /// kept unless they lose inliers. The returned inliers are always those
    /// of the returned transform.
    fn refine(&self, src: &[(f64, f64)], dst: &[(f64, f64)], mut current: Hypothesis) -> Hypothesis {
        for round in 0..self.config.refine_iterations.max(1) {
            let inlier_src: Vec<(f64, f64)> = current.inliers.iter().map(|&i| src[i]).collect();
            let inlier_dst: Vec<(f64, f64)> = current.inliers.iter().map(|&i| dst[i]).collect();

            let Some(transform) = estimate_homography(&inlier_src, &inlier_dst) else {
                warn!("RANSAC: refit on {} inliers failed, keeping the previous model", current.inliers.len());
                break;
            };

            let (inliers, error) = count_inliers(src, dst, &transform, self.config.inlier_threshold);
            if round > 0 && inliers.len() < current.inliers.len() {
                break;
            }
            let grew = inliers.len() > current.inliers.len();

            debug!("RANSAC: refit round {} -> {} inliers", round + 1, inliers.len());
            current = Hypothesis {
                iteration: current.iteration,
                transform,
                inliers,
                error,
            };
            if !grew {
                break;
            }
        }
        current
    }
}

/// Sample `k` distinct indices from `0..n` with Floyd's algorithm.
fn random_sample_into<R: Rng>(rng: &mut R, n: usize, k: usize, buffer: &mut Vec<usize>) {
    debug_assert!(k <= n, "Cannot sample {} indices from {}", k, n);
    buffer.clear();

    for j in (n - k)..n {
        let t = rng.random_range(0..=j);
        if buffer.contains(&t) {
            buffer.push(j);
        } else {
            buffer.push(t);
        }
    }
}

/// Ascending indices within `threshold` of their projection, and their summed error
fn count_inliers(
    src: &[(f64, f64)],
    dst: &[(f64, f64)],
    transform: &Homography,
    threshold: f64,
) -> (Vec<usize>, f64) {
    let mut inliers = Vec::new();
    let mut error = 0.0;
    for (i, (&s, &d)) in src.iter().zip(dst).enumerate() {
        let e = transform.reprojection_error(s, d);
        if e <= threshold {
            inliers.push(i);
            error += e;
        }
    }
    (inliers, error)
}

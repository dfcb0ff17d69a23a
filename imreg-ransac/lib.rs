//! Correspondence search and robust geometric model fitting.
//!
//! `Matcher` pairs binary descriptors between a moving and a reference
//! image; `RansacEstimator` fits the projective transform that explains the
//! largest consistent subset of those pairs.

pub mod homography;
pub mod matcher;
pub mod ransac;

pub use homography::{estimate_homography, is_degenerate_sample, Homography};
pub use matcher::{MatchError, Matcher};
pub use ransac::{EstimateError, RansacEstimator, RansacResult, SAMPLE_SIZE};

//! Feature-based image registration.
//!
//! Aligns a moving image onto a reference image: oriented FAST keypoints with
//! rotated BRIEF descriptors are matched by Hamming distance, a homography is
//! fitted with RANSAC, and the moving image is resampled into the reference
//! frame.

pub mod args;
pub mod error;
pub mod features;
pub mod logging;
pub mod output;
pub mod pipeline;
pub mod preprocess;
pub mod visualize;
pub mod warp;

pub use args::{CliCommand, RegisterArgs, help_text, parse_args, version_line};
pub use error::{COMMAND_LINE_FAIL, RegResult, RegistrationError};
pub use features::{FeatureExtractor, Features};
pub use imreg_core::RegistrationConfig;
pub use imreg_ransac::Homography;
pub use output::{MATCHES_FILE, aligned_output_path, write_outputs};
pub use pipeline::{Registration, RegistrationResult, RegistrationStats};
pub use preprocess::{CropRect, PromptSelector, RegionSelector, RegionSource, crop, resolve_region};
pub use visualize::draw_matches;
pub use warp::warp_perspective;

/// Environment variable naming a TOML configuration file
pub const CONFIG_ENV: &str = "IMREG_CONFIG";

/// Configuration from the file named by `IMREG_CONFIG`, or the defaults
pub fn load_config() -> RegResult<RegistrationConfig> {
    match std::env::var_os(CONFIG_ENV) {
        Some(path) => Ok(RegistrationConfig::load_toml(path)?),
        None => Ok(RegistrationConfig::default()),
    }
}

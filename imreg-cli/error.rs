use std::path::PathBuf;

use imreg_core::ConfigError;
use imreg_fast::FastError;
use imreg_ransac::{EstimateError, MatchError};
use thiserror::Error;

use crate::preprocess::CropRect;

/// Message printed for every malformed command line
pub const COMMAND_LINE_FAIL: &str =
    "Incorrect input. Please review the documentation or run the command 'image-registration -h' for more information.";

/// Every way a registration run can end without a result. All are terminal.
#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("{}", COMMAND_LINE_FAIL)]
    InvalidArguments,

    #[error("Loading of image '{}' failed. Please ensure that the name of the file is valid.", .path.display())]
    ImageDecode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("The region {rect} does not fit inside the {width}x{height} image.")]
    InvalidRegion { rect: CropRect, width: u32, height: u32 },

    #[error("No registration can be performed because the ROI was not selected. Terminating.")]
    SelectionCancelled,

    #[error("Not enough keypoints to match: {moving} in the image to register, {reference} in the reference image.")]
    InsufficientFeatures { moving: usize, reference: usize },

    #[error("{found} matches were found, which is insufficient. The minimum number is {required}.")]
    InsufficientCorrespondences { found: usize, required: usize },

    #[error("Matches were found, but too few were of sufficient quality to perform image registration.")]
    RegistrationFailed {
        inliers: usize,
        required: usize,
        total: usize,
    },

    #[error("The estimated transform cannot be inverted.")]
    SingularTransform,

    #[error("Feature detection failed: {0}")]
    Detection(#[from] FastError),

    #[error("Matching failed: {0}")]
    Matching(MatchError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    #[error("Writing '{}' failed: {source}", .path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<MatchError> for RegistrationError {
    fn from(err: MatchError) -> Self {
        match err {
            MatchError::InsufficientFeatures { moving, reference } => {
                RegistrationError::InsufficientFeatures { moving, reference }
            }
            other => RegistrationError::Matching(other),
        }
    }
}

impl From<EstimateError> for RegistrationError {
    fn from(err: EstimateError) -> Self {
        match err {
            EstimateError::InsufficientCorrespondences { found, required } => {
                RegistrationError::InsufficientCorrespondences { found, required }
            }
            EstimateError::RegistrationFailed { inliers, required, total } => {
                RegistrationError::RegistrationFailed { inliers, required, total }
            }
        }
    }
}

pub type RegResult<T> = Result<T, RegistrationError>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FastError {
    #[error("Invalid image dimensions: {width}x{height} (must be > 0)")]
    InvalidImageSize { width: usize, height: usize },
    #[error("Image data length mismatch: expected {expected_len}, got {actual_len}")]
    InvalidImageData { expected_len: usize, actual_len: usize },
    #[error("Invalid threshold: {0} (must be 1-127)")]
    InvalidThreshold(u8),
    #[error("Invalid patch size {patch_size} (must be odd and >= 7)")]
    InvalidPatchSize { patch_size: usize },
    #[error("Invalid pyramid: {n_levels} levels with scale factor {scale_factor}")]
    InvalidPyramid { n_levels: usize, scale_factor: f32 },
}

pub type FastResult<T> = Result<T, FastError>;

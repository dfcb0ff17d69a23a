use std::fs;
use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageFormat, RgbImage};
use log::{debug, warn};

use crate::error::{RegResult, RegistrationError};

/// Name of the match visualization, written to the working directory
pub const MATCHES_FILE: &str = "matching-keypoints.jpg";

/// `<dir>/<stem>-aligned.png` next to the moving image
pub fn aligned_output_path(moving: &Path) -> PathBuf {
    let stem = moving.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
    moving.with_file_name(format!("{stem}-aligned.png"))
}

/// Write the match visualization, then the aligned image.
///
/// Either both files exist afterwards or neither does: the visualization is
/// removed again when the aligned image cannot be written.
pub fn write_outputs(matches: &RgbImage, matches_path: &Path, aligned: &DynamicImage, aligned_path: &Path) -> RegResult<()> {
    matches
        .save_with_format(matches_path, ImageFormat::Jpeg)
        .map_err(|source| RegistrationError::Output {
            path: matches_path.to_path_buf(),
            source,
        })?;
    debug!("wrote {}", matches_path.display());

    if let Err(source) = aligned.save_with_format(aligned_path, ImageFormat::Png) {
        if let Err(err) = fs::remove_file(matches_path) {
            warn!("could not remove {}: {}", matches_path.display(), err);
        }
        return Err(RegistrationError::Output {
            path: aligned_path.to_path_buf(),
            source,
        });
    }
    debug!("wrote {}", aligned_path.display());
    Ok(())
}

use imreg_brief::BriefGenerator;
use imreg_core::{Descriptor, FeatureConfig, Image, Keypoint};
use imreg_fast::FastDetector;
use log::debug;

use crate::error::RegResult;

/// Keypoints of one image with their descriptors, index for index
#[derive(Debug, Clone, Default)]
pub struct Features {
    pub keypoints: Vec<Keypoint>,
    pub descriptors: Vec<Descriptor>,
}

impl Features {
    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }
}

/// Oriented multi-scale FAST keypoints described with steered BRIEF
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    config: FeatureConfig,
}

impl FeatureExtractor {
    pub fn new(config: FeatureConfig) -> Self {
        Self { config }
    }

    /// Detect and describe features of a `width` x `height` luma buffer.
    ///
    /// Descriptors are computed on the pyramid level each keypoint was
    /// detected on; keypoints are reported in full-resolution coordinates.
    pub fn extract(&self, img: &Image, width: usize, height: usize) -> RegResult<Features> {
        let detector = FastDetector::new(self.config.clone(), width, height)?;
        let detection = detector.detect(img)?;

        let mut descriptors = Vec::with_capacity(detection.keypoints.len());
        for (level, level_img) in detection.levels.iter().zip(&detection.pyramid) {
            let level_kps: Vec<Keypoint> = detection
                .keypoints
                .iter()
                .filter(|kp| kp.octave == level.level)
                .map(|kp| {
                    let (x, y) = level.from_base(kp.x, kp.y);
                    Keypoint { x, y, ..*kp }
                })
                .collect();
            if level_kps.is_empty() {
                continue;
            }

            let brief = BriefGenerator::new(level.width, level.height);
            descriptors.extend(brief.describe(level_img, &level_kps));
        }

        debug!("extracted {} features from {}x{} image", detection.keypoints.len(), width, height);

        Ok(Features {
            keypoints: detection.keypoints,
            descriptors,
        })
    }

    /// Extract features of two images concurrently
    pub fn extract_pair(
        &self,
        first: (&Image, usize, usize),
        second: (&Image, usize, usize),
    ) -> RegResult<(Features, Features)> {
        let (a, b) = rayon::join(
            || self.extract(first.0, first.1, first.2),
            || self.extract(second.0, second.1, second.2),
        );
        Ok((a?, b?))
    }
}

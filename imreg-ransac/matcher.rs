use imreg_core::{hamming_distance, Correspondence, Descriptor, Keypoint, MatcherConfig};
use log::debug;
use rayon::prelude::*;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MatchError {
    #[error("insufficient features: {moving} keypoints in the moving image, {reference} in the reference image")]
    InsufficientFeatures { moving: usize, reference: usize },
    #[error("{keypoints} keypoints but {descriptors} descriptors")]
    LengthMismatch { keypoints: usize, descriptors: usize },
}

/// Brute-force Hamming matcher with ratio test, distance cap and optional
/// symmetric cross-check.
#[derive(Debug, Clone)]
pub struct Matcher {
    ratio_threshold: f32,
    max_distance: u32,
    cross_check: bool,
}

impl Default for Matcher {
    fn default() -> Self {
        Self::new(&MatcherConfig::default())
    }
}

impl Matcher {
    pub fn new(config: &MatcherConfig) -> Self {
        Self {
            ratio_threshold: config.ratio,
            max_distance: config.max_distance,
            cross_check: config.cross_check,
        }
    }

    pub fn with_cross_check(mut self, enable: bool) -> Self {
        self.cross_check = enable;
        self
    }

    pub fn with_ratio_test(mut self, threshold: f32) -> Self {
        self.ratio_threshold = threshold;
        self
    }

    pub fn with_max_distance(mut self, max_distance: u32) -> Self {
        self.max_distance = max_distance;
        self
    }

    /// Pair moving descriptors with reference descriptors.
    ///
    /// A moving descriptor is matched to its nearest reference descriptor when
    /// the nearest distance is below `ratio * second nearest` and at most
    /// `max_distance`. Each reference keypoint keeps only its best match
    /// (lowest distance, then lowest moving index). The result is sorted by
    /// `(distance, moving_idx)`.
    pub fn match_descriptors(
        &self,
        moving_kps: &[Keypoint],
        moving: &[Descriptor],
        reference_kps: &[Keypoint],
        reference: &[Descriptor],
    ) -> Result<Vec<Correspondence>, MatchError> {
        for (kps, descriptors) in [(moving_kps, moving), (reference_kps, reference)] {
            if kps.len() != descriptors.len() {
                return Err(MatchError::LengthMismatch {
                    keypoints: kps.len(),
                    descriptors: descriptors.len(),
                });
            }
        }
        if moving.is_empty() || reference.is_empty() {
            return Err(MatchError::InsufficientFeatures {
                moving: moving.len(),
                reference: reference.len(),
            });
        }

        let candidates: Vec<(usize, usize, u32)> = moving
            .par_iter()
            .enumerate()
            .filter_map(|(moving_idx, query)| {
                let (reference_idx, distance) = self.accept(query, reference)?;
                Some((moving_idx, reference_idx, distance))
            })
            .collect();
        let n_candidates = candidates.len();

        // One correspondence per reference keypoint
        let mut best_for_reference: Vec<Option<(usize, u32)>> = vec![None; reference.len()];
        for (moving_idx, reference_idx, distance) in candidates {
            let replace = match best_for_reference[reference_idx] {
                Some((_, best)) => distance < best,
                None => true,
            };
            if replace {
                best_for_reference[reference_idx] = Some((moving_idx, distance));
            }
        }

        let mut matches: Vec<Correspondence> = best_for_reference
            .into_par_iter()
            .enumerate()
            .filter_map(|(reference_idx, best)| {
                let (moving_idx, distance) = best?;
                if self.cross_check {
                    let (back, _) = nearest_two(&reference[reference_idx], moving)?.0;
                    if back != moving_idx {
                        return None;
                    }
                }
                Some(Correspondence {
                    moving_idx,
                    reference_idx,
                    moving: moving_kps[moving_idx].position(),
                    reference: reference_kps[reference_idx].position(),
                    distance,
                })
            })
            .collect();

        matches.sort_by_key(|m| (m.distance, m.moving_idx));

        debug!(
            "matcher: {} candidates passed ratio/distance tests, {} kept after uniqueness{}",
            n_candidates,
            matches.len(),
            if self.cross_check { " and cross-check" } else { "" }
        );

        Ok(matches)
    }

    /// Nearest reference descriptor when it passes both tests
    fn accept(&self, query: &Descriptor, train: &[Descriptor]) -> Option<(usize, u32)> {
        let ((best_idx, best), second) = nearest_two(query, train)?;
        if best > self.max_distance {
            return None;
        }
        // With a single candidate there is nothing to compare against
        if let Some(second) = second {
            if best as f32 >= self.ratio_threshold * second as f32 {
                return None;
            }
        }
        Some((best_idx, best))
    }
}

/// Nearest `(index, distance)` and second-nearest distance. Ties keep the
/// lowest index as nearest.
fn nearest_two(query: &Descriptor, train: &[Descriptor]) -> Option<((usize, u32), Option<u32>)> {
    let mut best: Option<(usize, u32)> = None;
    let mut second: Option<u32> = None;

    for (idx, candidate) in train.iter().enumerate() {
        let distance = hamming_distance(query, candidate);
        match best {
            Some((_, best_dist)) if distance >= best_dist => {
                if second.is_none_or(|s| distance < s) {
                    second = Some(distance);
                }
            }
            Some((_, best_dist)) => {
                second = Some(best_dist);
                best = Some((idx, distance));
            }
            None => best = Some((idx, distance)),
        }
    }

    best.map(|b| (b, second))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn descriptor(bits: &[usize]) -> Descriptor {
        let mut d = [0u8; 32];
        for &b in bits {
            d[b / 8] |= 1 << (b % 8);
        }
        d
    }

    fn keypoints(n: usize) -> Vec<Keypoint> {
        (0..n).map(|i| Keypoint::new(i as f32, 2.0 * i as f32)).collect()
    }

    fn matcher() -> Matcher {
        Matcher::default()
    }

    #[test]
    fn test_empty_inputs_fail() {
        let d = vec![descriptor(&[1])];
        let err = matcher().match_descriptors(&[], &[], &keypoints(1), &d).unwrap_err();
        assert_eq!(err, MatchError::InsufficientFeatures { moving: 0, reference: 1 });
        let err = matcher().match_descriptors(&keypoints(1), &d, &[], &[]).unwrap_err();
        assert_eq!(err, MatchError::InsufficientFeatures { moving: 1, reference: 0 });
    }

    #[test]
    fn test_length_mismatch() {
        let d = vec![descriptor(&[1])];
        let err = matcher().match_descriptors(&keypoints(2), &d, &keypoints(1), &d).unwrap_err();
        assert!(matches!(err, MatchError::LengthMismatch { keypoints: 2, descriptors: 1 }));
    }

    #[test]
    fn test_single_reference_skips_ratio_test() {
        let moving = vec![descriptor(&[0, 1, 2])];
        let reference = vec![descriptor(&[0, 1])];
        let matches = matcher()
            .match_descriptors(&keypoints(1), &moving, &keypoints(1), &reference)
            .unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].distance, 1);
        assert_eq!(matches[0].reference, (0.0, 0.0));
    }

    #[test]
    fn test_ratio_test_rejects_ambiguous() {
        let moving = vec![descriptor(&(0..10).collect::<Vec<_>>())];
        // Distances 10 and 11: ratio 0.91 is not below 0.8
        let reference = vec![descriptor(&[]), descriptor(&(0..21).collect::<Vec<_>>())];
        let matches = matcher()
            .match_descriptors(&keypoints(1), &moving, &keypoints(2), &reference)
            .unwrap();
        assert!(matches.is_empty());

        let loose = matcher().with_ratio_test(0.95);
        let matches = loose.match_descriptors(&keypoints(1), &moving, &keypoints(2), &reference).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].reference_idx, 0);
    }

    #[test]
    fn test_max_distance() {
        let moving = vec![descriptor(&(0..100).collect::<Vec<_>>())];
        let reference = vec![descriptor(&[])];
        let matches = matcher()
            .match_descriptors(&keypoints(1), &moving, &keypoints(1), &reference)
            .unwrap();
        assert!(matches.is_empty());

        let matches = matcher()
            .with_max_distance(100)
            .match_descriptors(&keypoints(1), &moving, &keypoints(1), &reference)
            .unwrap();
        assert_eq!(matches.len(), 1);
    }

    #[test]
    fn test_one_match_per_reference() {
        // Two moving descriptors both closest to reference 0; the closer one wins
        let moving = vec![descriptor(&[0, 1, 2]), descriptor(&[0])];
        let reference = vec![descriptor(&[]), descriptor(&(100..200).collect::<Vec<_>>())];
        let matches = matcher()
            .match_descriptors(&keypoints(2), &moving, &keypoints(2), &reference)
            .unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!((matches[0].moving_idx, matches[0].reference_idx), (1, 0));
    }

    #[test]
    fn test_equal_distance_keeps_lowest_moving_index() {
        let moving = vec![descriptor(&[5]), descriptor(&[6])];
        let reference = vec![descriptor(&[])];
        let matches = matcher()
            .match_descriptors(&keypoints(2), &moving, &keypoints(1), &reference)
            .unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].moving_idx, 0);
    }

    #[test]
    fn test_sorted_by_distance() {
        let moving = vec![descriptor(&[0, 1, 2]), descriptor(&[100])];
        let reference = vec![descriptor(&[0, 1]), descriptor(&[100]), descriptor(&(150..250).collect::<Vec<_>>())];
        let matches = matcher()
            .match_descriptors(&keypoints(2), &moving, &keypoints(3), &reference)
            .unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!((matches[0].moving_idx, matches[0].distance), (1, 0));
        assert_eq!((matches[1].moving_idx, matches[1].distance), (0, 1));
    }

    #[test]
    fn test_cross_check() {
        // Moving 0 prefers reference 0, but reference 0 prefers moving 1
        // (which itself maps to reference 1)
        let moving = vec![descriptor(&[0, 1, 2, 3, 4, 5, 6, 7]), descriptor(&[0, 1, 2, 3, 4, 5, 6, 7, 8])];
        let reference = vec![
            descriptor(&(0..9).chain([40]).collect::<Vec<_>>()),
            descriptor(&(0..9).collect::<Vec<_>>()),
            descriptor(&(100..200).collect::<Vec<_>>()),
        ];
        let kps_m = keypoints(2);
        let kps_r = keypoints(3);

        let plain = matcher().with_ratio_test(1.0).match_descriptors(&kps_m, &moving, &kps_r, &reference).unwrap();
        let checked = matcher()
            .with_ratio_test(1.0)
            .with_cross_check(true)
            .match_descriptors(&kps_m, &moving, &kps_r, &reference)
            .unwrap();
        assert!(checked.len() <= plain.len());
        for m in &checked {
            let (back, _) = nearest_two(&reference[m.reference_idx], &moving).unwrap().0;
            assert_eq!(back, m.moving_idx);
        }
    }

    #[test]
    fn test_nearest_two() {
        let train = vec![descriptor(&[1, 2]), descriptor(&[1]), descriptor(&[1, 2, 3])];
        let ((idx, best), second) = nearest_two(&descriptor(&[]), &train).unwrap();
        assert_eq!((idx, best, second), (1, 1, Some(2)));
        assert!(nearest_two(&descriptor(&[]), &[]).is_none());
    }

    proptest! {
        #[test]
        fn correspondences_bounded_by_keypoints(
            moving in prop::collection::vec(prop::array::uniform32(any::<u8>()), 1..40),
            reference in prop::collection::vec(prop::array::uniform32(any::<u8>()), 1..40),
            cross_check in any::<bool>(),
        ) {
            let m = Matcher::default().with_max_distance(256).with_ratio_test(0.95).with_cross_check(cross_check);
            let matches = m
                .match_descriptors(&keypoints(moving.len()), &moving, &keypoints(reference.len()), &reference)
                .unwrap();

            prop_assert!(matches.len() <= moving.len().min(reference.len()));
            let mut seen_moving = std::collections::HashSet::new();
            let mut seen_reference = std::collections::HashSet::new();
            for pair in matches.windows(2) {
                prop_assert!((pair[0].distance, pair[0].moving_idx) <= (pair[1].distance, pair[1].moving_idx));
            }
            for c in &matches {
                prop_assert!(seen_moving.insert(c.moving_idx));
                prop_assert!(seen_reference.insert(c.reference_idx));
                prop_assert_eq!(c.distance, hamming_distance(&moving[c.moving_idx], &reference[c.reference_idx]));
            }
        }
    }
}

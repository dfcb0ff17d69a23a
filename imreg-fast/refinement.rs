use std::collections::HashMap;

use imreg_core::{Image, Keypoint};
use crate::types::ScoredKeypoint;

/// Subpixel refinement, orientation and suppression of detected corners
pub struct KeypointRefinement;

impl KeypointRefinement {
    /// Refine a keypoint to subpixel accuracy by fitting a quadratic surface to
    /// the corner response around it.
    ///
    /// `response` is evaluated on the 3x3 integer neighbourhood of the keypoint.
    /// The offset is clamped to half a pixel; a flat or saddle-shaped surface
    /// leaves the keypoint unchanged.
    pub fn refine_keypoint_subpixel<F>(kp: Keypoint, response: F) -> Keypoint
    where
        F: Fn(i32, i32) -> f32,
    {
        let (x, y) = (kp.x.round() as i32, kp.y.round() as i32);

        let mut s = [[0.0f32; 3]; 3];
        for (j, row) in s.iter_mut().enumerate() {
            for (i, v) in row.iter_mut().enumerate() {
                *v = response(x + i as i32 - 1, y + j as i32 - 1);
            }
        }

        // f(x,y) ≈ f + g·d + ½ dᵀ H d, solved with finite differences
        let dx = (s[1][2] - s[1][0]) / 2.0;
        let dy = (s[2][1] - s[0][1]) / 2.0;
        let dxx = s[1][2] - 2.0 * s[1][1] + s[1][0];
        let dyy = s[2][1] - 2.0 * s[1][1] + s[0][1];
        let dxy = (s[2][2] - s[2][0] - s[0][2] + s[0][0]) / 4.0;

        let det = dxx * dyy - dxy * dxy;

        // Only a maximum (negative definite Hessian) gives a meaningful peak
        if det <= 1e-6 || dxx >= 0.0 {
            return kp;
        }

        let offset_x = (-(dyy * dx - dxy * dy) / det).clamp(-0.5, 0.5);
        let offset_y = (-(dxx * dy - dxy * dx) / det).clamp(-0.5, 0.5);

        Keypoint {
            x: x as f32 + offset_x,
            y: y as f32 + offset_y,
            ..kp
        }
    }

    /// Orientation by the intensity centroid of a circular patch.
    ///
    /// The patch is clipped to the image; a patch with no moment returns 0.
    pub fn compute_orientation(img: &Image, width: usize, height: usize, x: f32, y: f32, patch_size: usize) -> f32 {
        let half = (patch_size / 2) as i32;
        let (cx, cy) = (x.round() as i32, y.round() as i32);
        let r2 = half * half;

        let mut m10 = 0i64;
        let mut m01 = 0i64;

        for dy in -half..=half {
            let yy = cy + dy;
            if yy < 0 || yy >= height as i32 {
                continue;
            }
            for dx in -half..=half {
                let xx = cx + dx;
                if xx < 0 || xx >= width as i32 || dx * dx + dy * dy > r2 {
                    continue;
                }
                let val = img[yy as usize * width + xx as usize] as i64;
                m10 += dx as i64 * val;
                m01 += dy as i64 * val;
            }
        }

        if m10 == 0 && m01 == 0 {
            0.0
        } else {
            (m01 as f32).atan2(m10 as f32)
        }
    }

    /// Greedy non-maximum suppression: strongest first, a candidate is dropped
    /// when an accepted keypoint lies closer than `min_distance`.
    ///
    /// Accepted keypoints are bucketed on a grid of `min_distance` cells so
    /// each candidate only inspects its 3x3 cell neighbourhood. Ties in
    /// response keep their input order.
    pub fn non_maximum_suppression(keypoints: &[ScoredKeypoint], min_distance: f32) -> Vec<ScoredKeypoint> {
        if keypoints.is_empty() {
            return Vec::new();
        }

        let mut sorted_keypoints = keypoints.to_vec();
        sorted_keypoints.sort_by(|a, b| b.response.total_cmp(&a.response));

        if min_distance <= 0.0 {
            return sorted_keypoints;
        }

        let cell = min_distance;
        let min_distance_sq = min_distance * min_distance;
        let mut grid: HashMap<(i32, i32), Vec<usize>> = HashMap::new();
        let mut suppressed: Vec<ScoredKeypoint> = Vec::new();

        for candidate in sorted_keypoints {
            let gx = (candidate.keypoint.x / cell).floor() as i32;
            let gy = (candidate.keypoint.y / cell).floor() as i32;

            let mut is_local_max = true;
            'search: for ny in gy - 1..=gy + 1 {
                for nx in gx - 1..=gx + 1 {
                    let Some(bucket) = grid.get(&(nx, ny)) else { continue };
                    for &idx in bucket {
                        let existing = &suppressed[idx].keypoint;
                        let dx = candidate.keypoint.x - existing.x;
                        let dy = candidate.keypoint.y - existing.y;
                        if dx * dx + dy * dy < min_distance_sq {
                            is_local_max = false;
                            break 'search;
                        }
                    }
                }
            }

            if is_local_max {
                grid.entry((gx, gy)).or_default().push(suppressed.len());
                suppressed.push(candidate);
            }
        }

        suppressed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scored(x: f32, y: f32, response: f32) -> ScoredKeypoint {
        let mut keypoint = Keypoint::new(x, y);
        keypoint.response = response;
        ScoredKeypoint { keypoint, response }
    }

    #[test]
    fn test_nms_keeps_strongest() {
        let kps = vec![scored(10.0, 10.0, 1.0), scored(11.0, 10.0, 5.0), scored(30.0, 30.0, 2.0)];
        let kept = KeypointRefinement::non_maximum_suppression(&kps, 3.0);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].response, 5.0);
        assert_eq!(kept[1].response, 2.0);
    }

    #[test]
    fn test_nms_across_cell_boundaries() {
        // 2.9 and 3.1 fall in different cells but are only 0.2 apart
        let kps = vec![scored(2.9, 0.0, 2.0), scored(3.1, 0.0, 1.0)];
        let kept = KeypointRefinement::non_maximum_suppression(&kps, 3.0);
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn test_nms_min_distance_holds() {
        let kps: Vec<_> = (0..200)
            .map(|i| scored((i * 7 % 50) as f32 * 0.9, (i * 13 % 40) as f32 * 0.8, (i % 17) as f32))
            .collect();
        let kept = KeypointRefinement::non_maximum_suppression(&kps, 4.0);
        for i in 0..kept.len() {
            for j in (i + 1)..kept.len() {
                let dx = kept[i].keypoint.x - kept[j].keypoint.x;
                let dy = kept[i].keypoint.y - kept[j].keypoint.y;
                assert!((dx * dx + dy * dy).sqrt() >= 4.0);
            }
        }
    }

    #[test]
    fn test_subpixel_finds_quadratic_peak() {
        // Paraboloid peaking at (10.3, 20.2)
        let peak = |x: i32, y: i32| {
            let dx = x as f32 - 10.3;
            let dy = y as f32 - 20.2;
            100.0 - dx * dx - 2.0 * dy * dy
        };
        let refined = KeypointRefinement::refine_keypoint_subpixel(Keypoint::new(10.0, 20.0), peak);
        assert!((refined.x - 10.3).abs() < 1e-3);
        assert!((refined.y - 20.2).abs() < 1e-3);
    }

    #[test]
    fn test_subpixel_flat_surface_unchanged() {
        let kp = Keypoint::new(5.0, 6.0);
        let refined = KeypointRefinement::refine_keypoint_subpixel(kp, |_, _| 1.0);
        assert_eq!(refined, kp);
    }

    #[test]
    fn test_orientation_points_to_bright_side() {
        let (w, h) = (31, 31);
        let mut img = vec![0u8; w * h];
        // Bright right half
        for y in 0..h {
            for x in 16..w {
                img[y * w + x] = 200;
            }
        }
        let angle = KeypointRefinement::compute_orientation(&img, w, h, 15.0, 15.0, 15);
        assert!(angle.abs() < 1e-3);

        // Bright bottom half
        let mut img = vec![0u8; w * h];
        for y in 16..h {
            for x in 0..w {
                img[y * w + x] = 200;
            }
        }
        let angle = KeypointRefinement::compute_orientation(&img, w, h, 15.0, 15.0, 15);
        assert!((angle - std::f32::consts::FRAC_PI_2).abs() < 1e-3);
    }

    #[test]
    fn test_orientation_uniform_patch() {
        let img = vec![0u8; 20 * 20];
        assert_eq!(KeypointRefinement::compute_orientation(&img, 20, 20, 10.0, 10.0, 7), 0.0);
    }
}

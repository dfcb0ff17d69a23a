use image::{DynamicImage, Rgb, RgbImage, imageops};
use imageproc::drawing::{draw_hollow_circle_mut, draw_line_segment_mut};
use imreg_core::{Correspondence, Keypoint};

const PALETTE: [Rgb<u8>; 6] = [
    Rgb([255, 0, 0]),
    Rgb([0, 255, 0]),
    Rgb([0, 128, 255]),
    Rgb([255, 255, 0]),
    Rgb([255, 0, 255]),
    Rgb([0, 255, 255]),
];

const MARKER_RADIUS: i32 = 4;

/// Side-by-side picture of the inlier correspondences.
///
/// The moving image sits on the left and the reference image on the right,
/// both top-aligned. `inliers` index into `correspondences`, whose indices in
/// turn point into the two keypoint slices.
pub fn draw_matches(
    moving: &DynamicImage,
    moving_kps: &[Keypoint],
    reference: &DynamicImage,
    reference_kps: &[Keypoint],
    correspondences: &[Correspondence],
    inliers: &[usize],
) -> RgbImage {
    let left = moving.to_rgb8();
    let right = reference.to_rgb8();
    let offset = left.width();

    let mut canvas = RgbImage::new(offset + right.width(), left.height().max(right.height()));
    imageops::replace(&mut canvas, &left, 0, 0);
    imageops::replace(&mut canvas, &right, offset as i64, 0);

    for (n, c) in inliers.iter().filter_map(|&i| correspondences.get(i)).enumerate() {
        let (Some(m), Some(r)) = (moving_kps.get(c.moving_idx), reference_kps.get(c.reference_idx)) else {
            continue;
        };
        let color = PALETTE[n % PALETTE.len()];
        let from = (m.x, m.y);
        let to = (r.x + offset as f32, r.y);

        draw_hollow_circle_mut(&mut canvas, (from.0.round() as i32, from.1.round() as i32), MARKER_RADIUS, color);
        draw_hollow_circle_mut(&mut canvas, (to.0.round() as i32, to.1.round() as i32), MARKER_RADIUS, color);
        draw_line_segment_mut(&mut canvas, from, to, color);
    }

    canvas
}

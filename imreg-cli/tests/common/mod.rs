#![allow(dead_code)]

use image::{DynamicImage, GrayImage, Luma};
use imreg_cli::{Homography, warp_perspective};

pub const WIDTH: u32 = 320;
pub const HEIGHT: u32 = 240;

/// Scattered bright and dark squares of varying size on a mid-gray background
pub fn textured(width: u32, height: u32, seed: u32) -> GrayImage {
    let mut img = GrayImage::from_pixel(width, height, Luma([110]));
    let mut state = seed | 1;
    let mut next = || {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        state
    };

    for _ in 0..(width * height / 700) {
        let size = 6 + next() % 14;
        let x0 = next() % (width - size);
        let y0 = next() % (height - size);
        let value = (if next() % 2 == 0 { 20 + next() % 60 } else { 170 + next() % 80 }) as u8;
        for y in y0..y0 + size {
            for x in x0..x0 + size {
                img.put_pixel(x, y, Luma([value]));
            }
        }
    }
    img
}

/// Rotation by `degrees` about the image center followed by a shift
pub fn rigid(degrees: f64, tx: f64, ty: f64) -> Homography {
    let (s, c) = degrees.to_radians().sin_cos();
    let (cx, cy) = (WIDTH as f64 / 2.0, HEIGHT as f64 / 2.0);
    Homography::from_rows([
        [c, -s, cx - c * cx + s * cy + tx],
        [s, c, cy - s * cx - c * cy + ty],
        [0.0, 0.0, 1.0],
    ])
    .unwrap()
}

/// Reference image and a moving image whose pixel `p` shows reference pixel
/// `to_reference(p)`.
pub fn pair(to_reference: &Homography) -> (DynamicImage, DynamicImage) {
    let reference = DynamicImage::ImageLuma8(textured(WIDTH, HEIGHT, 0x1234_5678));
    let to_moving = to_reference.inverse().unwrap();
    let moving = warp_perspective(&reference, &to_moving, WIDTH, HEIGHT).unwrap();
    (moving, reference)
}

/// Largest distance between where `estimated` and `expected` send interior points
pub fn max_deviation(estimated: &Homography, expected: &Homography) -> f64 {
    let mut worst: f64 = 0.0;
    for y in (60..=180).step_by(30) {
        for x in (80..=240).step_by(40) {
            let p = (x as f64, y as f64);
            let a = estimated.apply(p).unwrap();
            let b = expected.apply(p).unwrap();
            worst = worst.max(((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt());
        }
    }
    worst
}

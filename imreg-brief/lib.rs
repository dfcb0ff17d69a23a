use imreg_core::{Descriptor, Image, Keypoint, DESCRIPTOR_BITS};
use log::debug;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

const DESCRIPTOR_SIZE: usize = 32;

/// Largest offset of a test point from the keypoint, before rotation
pub const PATTERN_RADIUS: i32 = 13;

/// Seed of the sampling pattern. Descriptors are only comparable when both
/// sides use the same pattern, so this never changes between runs.
const PATTERN_SEED: u64 = 0x0b51_ef00;

/// Binomial approximation of a Gaussian, applied along each axis
const SMOOTHING_KERNEL: [u32; 5] = [1, 4, 6, 4, 1];

/// 256 intensity comparison pairs `(x1, y1, x2, y2)` relative to the keypoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplingPattern {
    pairs: Vec<(i8, i8, i8, i8)>,
}

impl SamplingPattern {
    /// The fixed pattern every descriptor is computed with
    pub fn standard() -> Self {
        Self::from_seed(PATTERN_SEED)
    }

    /// Uniformly distributed pairs inside the pattern square; the two points
    /// of a pair never coincide.
    pub fn from_seed(seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let point = |rng: &mut ChaCha8Rng| {
            (
                rng.random_range(-PATTERN_RADIUS..=PATTERN_RADIUS) as i8,
                rng.random_range(-PATTERN_RADIUS..=PATTERN_RADIUS) as i8,
            )
        };

        let mut pairs = Vec::with_capacity(DESCRIPTOR_BITS as usize);
        while pairs.len() < DESCRIPTOR_BITS as usize {
            let (x1, y1) = point(&mut rng);
            let (x2, y2) = point(&mut rng);
            if (x1, y1) != (x2, y2) {
                pairs.push((x1, y1, x2, y2));
            }
        }
        Self { pairs }
    }

    pub fn pairs(&self) -> &[(i8, i8, i8, i8)] {
        &self.pairs
    }
}

/// Separable `[1 4 6 4 1] / 16` smoothing with edge clamping.
///
/// Single-pixel comparisons are too noisy on the raw image; BRIEF bits are
/// taken on this smoothed copy.
pub fn smooth(img: &Image, width: usize, height: usize) -> Image {
    if width == 0 || height == 0 || img.len() != width * height {
        return img.clone();
    }

    let tap = |len: usize, i: usize, k: usize| (i + k).saturating_sub(2).min(len - 1);

    let mut horizontal = vec![0u32; img.len()];
    horizontal
        .par_chunks_mut(width)
        .zip(img.par_chunks(width))
        .for_each(|(out, row)| {
            for (x, o) in out.iter_mut().enumerate() {
                *o = SMOOTHING_KERNEL
                    .iter()
                    .enumerate()
                    .map(|(k, &w)| w * row[tap(width, x, k)] as u32)
                    .sum();
            }
        });

    let mut smoothed = vec![0u8; img.len()];
    smoothed
        .par_chunks_mut(width)
        .enumerate()
        .for_each(|(y, out)| {
            for (x, o) in out.iter_mut().enumerate() {
                let sum: u32 = SMOOTHING_KERNEL
                    .iter()
                    .enumerate()
                    .map(|(k, &w)| w * horizontal[tap(height, y, k) * width + x])
                    .sum();
                *o = ((sum + 128) / 256) as u8;
            }
        });
    smoothed
}

/// Computes steered BRIEF descriptors on one (smoothed) image
pub struct BriefGenerator {
    w: usize,
    h: usize,
    pattern: SamplingPattern,
}

impl BriefGenerator {
    pub fn new(width: usize, height: usize) -> Self {
        Self::with_pattern(width, height, SamplingPattern::standard())
    }

    pub fn with_pattern(width: usize, height: usize, pattern: SamplingPattern) -> Self {
        Self { w: width, h: height, pattern }
    }

    /// Smooth `img` then describe `kps`, whose coordinates are in `img`'s frame
    pub fn describe(&self, img: &Image, kps: &[Keypoint]) -> Vec<Descriptor> {
        let smoothed = smooth(img, self.w, self.h);
        self.generate_descriptors(&smoothed, kps)
    }

    /// One descriptor per keypoint, in input order. Bit `i` is set when the
    /// first point of pair `i`, rotated by the keypoint angle, is darker than
    /// the second.
    pub fn generate_descriptors(&self, img: &Image, kps: &[Keypoint]) -> Vec<Descriptor> {
        if self.w == 0 || self.h == 0 || img.len() != self.w * self.h {
            debug!("descriptor image does not match {}x{}, returning empty descriptors", self.w, self.h);
            return vec![[0u8; DESCRIPTOR_SIZE]; kps.len()];
        }

        kps.par_iter()
            .map(|kp| {
                let (s, c) = kp.angle.sin_cos();
                let (cx, cy) = (kp.x, kp.y);
                let mut d = [0u8; DESCRIPTOR_SIZE];

                for (i, &(x1, y1, x2, y2)) in self.pattern.pairs.iter().enumerate() {
                    let (dx1, dy1, dx2, dy2) = (x1 as f32, y1 as f32, x2 as f32, y2 as f32);
                    // Rotation and translation for subpixel coordinates
                    let (rx1, ry1) = (cx + c * dx1 - s * dy1, cy + s * dx1 + c * dy1);
                    let (rx2, ry2) = (cx + c * dx2 - s * dy2, cy + s * dx2 + c * dy2);

                    let val1 = self.bilinear_sample(img, rx1, ry1);
                    let val2 = self.bilinear_sample(img, rx2, ry2);

                    let bit = (val1 < val2) as u8;
                    d[i / 8] |= bit << (i % 8);
                }
                d
            })
            .collect()
    }

    /// Bilinear interpolation for subpixel sampling
    fn bilinear_sample(&self, img: &Image, x: f32, y: f32) -> f32 {
        let x0 = x.floor();
        let y0 = y.floor();

        // Outside the interpolable area fall back to the nearest pixel
        if x0 < 0.0 || y0 < 0.0 || x0 + 1.0 >= self.w as f32 || y0 + 1.0 >= self.h as f32 {
            let cx = x.round().clamp(0.0, (self.w - 1) as f32) as usize;
            let cy = y.round().clamp(0.0, (self.h - 1) as f32) as usize;
            return img[cy * self.w + cx] as f32;
        }

        let dx = x - x0;
        let dy = y - y0;
        let (x0, y0) = (x0 as usize, y0 as usize);

        let p00 = img[y0 * self.w + x0] as f32;
        let p10 = img[y0 * self.w + x0 + 1] as f32;
        let p01 = img[(y0 + 1) * self.w + x0] as f32;
        let p11 = img[(y0 + 1) * self.w + x0 + 1] as f32;

        let top = p00 * (1.0 - dx) + p10 * dx;
        let bottom = p01 * (1.0 - dx) + p11 * dx;
        top * (1.0 - dy) + bottom * dy
    }
}

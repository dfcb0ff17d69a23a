pub mod config;

pub use config::{
    ConfigError, FeatureConfig, MatcherConfig, RansacConfig, RegistrationConfig,
};

/// Row-major 8-bit grayscale image
pub type Image = Vec<u8>;

/// Key-point ≙ FAST corner + orientation (radians) with subpixel precision.
///
/// Coordinates are always expressed in the full-resolution frame of the image
/// the keypoint was extracted from, whatever pyramid level detected it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    pub x: f32,      // Subpixel x coordinate
    pub y: f32,      // Subpixel y coordinate
    pub angle: f32,
    /// Diameter of the orientation patch, in full-resolution pixels
    pub size: f32,
    /// Pyramid level the keypoint was detected on
    pub octave: usize,
    /// Corner response used for ranking
    pub response: f32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            angle: 0.0,
            size: 0.0,
            octave: 0,
            response: 0.0,
        }
    }

    pub fn position(&self) -> (f64, f64) {
        (self.x as f64, self.y as f64)
    }
}

/// 256-bit binary descriptor = 32 bytes
pub type Descriptor = [u8; 32];

/// Number of bits in a descriptor
pub const DESCRIPTOR_BITS: u32 = 256;

/// Hamming distance between two binary descriptors
#[inline]
pub fn hamming_distance(a: &Descriptor, b: &Descriptor) -> u32 {
    let mut dist = 0;
    for (ca, cb) in a.chunks_exact(8).zip(b.chunks_exact(8)) {
        let mut wa = [0u8; 8];
        let mut wb = [0u8; 8];
        wa.copy_from_slice(ca);
        wb.copy_from_slice(cb);
        dist += (u64::from_le_bytes(wa) ^ u64::from_le_bytes(wb)).count_ones();
    }
    dist
}

/// A descriptor match between the moving and the reference image.
///
/// Indices refer to the keypoint sequences the matcher was given; the point
/// locations are copied so the estimator does not need the keypoints.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correspondence {
    pub moving_idx: usize,
    pub reference_idx: usize,
    pub moving: (f64, f64),
    pub reference: (f64, f64),
    /// Hamming distance of the two descriptors (lower is better)
    pub distance: u32,
}

/// Initialize Rayon thread pool with the specified number of threads
pub fn init_thread_pool(n_threads: usize) -> Result<(), rayon::ThreadPoolBuildError> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(n_threads)
        .build_global()
}

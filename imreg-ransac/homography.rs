//! Projective transform between two images and its direct linear estimation.

use nalgebra::{DMatrix, Matrix3, Vector3, SVD};

/// Smallest |w| a projected point may have before it is treated as at infinity
const MIN_PROJECTIVE_W: f64 = 1e-10;

/// Accepted range for |det(H)|, rejects collapsed or exploding models
const MIN_DET: f64 = 1e-4;
const MAX_DET: f64 = 1e4;

/// Sine of the smallest angle three sample points may span
const COLLINEAR_SIN: f64 = 1e-3;

/// 3x3 homography mapping moving-image coordinates to reference coordinates,
/// normalized so that `h[(2, 2)] == 1`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Homography {
    pub h: Matrix3<f64>,
}

impl Homography {
    /// Normalize `h` by its bottom-right entry. Fails when that entry vanishes
    /// or the matrix holds non-finite values.
    pub fn new(h: Matrix3<f64>) -> Option<Self> {
        let scale = h[(2, 2)];
        if scale.abs() < MIN_PROJECTIVE_W || h.iter().any(|v| !v.is_finite()) {
            return None;
        }
        Some(Self { h: h / scale })
    }

    pub fn identity() -> Self {
        Self { h: Matrix3::identity() }
    }

    pub fn from_rows(rows: [[f64; 3]; 3]) -> Option<Self> {
        Self::new(Matrix3::from_fn(|r, c| rows[r][c]))
    }

    pub fn to_rows(&self) -> [[f64; 3]; 3] {
        std::array::from_fn(|r| std::array::from_fn(|c| self.h[(r, c)]))
    }

    /// Map a point; `None` when it lands on the line at infinity
    #[inline]
    pub fn apply(&self, (x, y): (f64, f64)) -> Option<(f64, f64)> {
        let p = self.h * Vector3::new(x, y, 1.0);
        if p.z.abs() < MIN_PROJECTIVE_W {
            return None;
        }
        Some((p.x / p.z, p.y / p.z))
    }

    pub fn inverse(&self) -> Option<Self> {
        self.h.try_inverse().and_then(Self::new)
    }

    /// Euclidean distance between the projection of `from` and `to`
    #[inline]
    pub fn reprojection_error(&self, from: (f64, f64), to: (f64, f64)) -> f64 {
        match self.apply(from) {
            Some((x, y)) => ((x - to.0).powi(2) + (y - to.1).powi(2)).sqrt(),
            None => f64::INFINITY,
        }
    }

    /// Finite and neither collapsing nor exploding areas
    pub fn is_valid(&self) -> bool {
        let det = self.h.determinant().abs();
        det.is_finite() && det > MIN_DET && det < MAX_DET
    }
}

impl Default for Homography {
    fn default() -> Self {
        Self::identity()
    }
}

/// True when any three of `points` are (nearly) collinear or coincide
pub fn is_degenerate_sample(points: &[(f64, f64)]) -> bool {
    let n = points.len();
    for i in 0..n {
        for j in (i + 1)..n {
            for k in (j + 1)..n {
                let (a, b, c) = (points[i], points[j], points[k]);
                let ab = (b.0 - a.0, b.1 - a.1);
                let ac = (c.0 - a.0, c.1 - a.1);
                let cross = (ab.0 * ac.1 - ab.1 * ac.0).abs();
                let lengths = ab.0.hypot(ab.1) * ac.0.hypot(ac.1);
                if cross <= COLLINEAR_SIN * lengths {
                    return true;
                }
            }
        }
    }
    false
}

/// Estimate the homography taking `src` onto `dst` with the normalized
/// direct linear transform. Four pairs give the exact solution, more give
/// the algebraic least-squares fit.
pub fn estimate_homography(src: &[(f64, f64)], dst: &[(f64, f64)]) -> Option<Homography> {
    if src.len() < 4 || src.len() != dst.len() {
        return None;
    }

    let (src_norm, src_t) = normalize_points(src);
    let (dst_norm, dst_t) = normalize_points(dst);

    // Each pair gives two rows of A h = 0:
    // [-x -y -1  0  0  0  x*x'  y*x'  x']
    // [ 0  0  0 -x -y -1  x*y'  y*y'  y']
    let n = src_norm.len();
    let mut a = DMatrix::<f64>::zeros(2 * n, 9);
    for (i, (&(x, y), &(u, v))) in src_norm.iter().zip(&dst_norm).enumerate() {
        let r = 2 * i;
        a[(r, 0)] = -x;
        a[(r, 1)] = -y;
        a[(r, 2)] = -1.0;
        a[(r, 6)] = x * u;
        a[(r, 7)] = y * u;
        a[(r, 8)] = u;

        a[(r + 1, 3)] = -x;
        a[(r + 1, 4)] = -y;
        a[(r + 1, 5)] = -1.0;
        a[(r + 1, 6)] = x * v;
        a[(r + 1, 7)] = y * v;
        a[(r + 1, 8)] = v;
    }

    let h_norm = solve_homogeneous_svd(a)?;

    // H = T_dst^-1 * H_norm * T_src
    let h = dst_t.try_inverse()? * h_norm * src_t;
    let homography = Homography::new(h)?;
    homography.is_valid().then_some(homography)
}

/// Translate to the centroid and scale to a mean distance of sqrt(2)
fn normalize_points(points: &[(f64, f64)]) -> (Vec<(f64, f64)>, Matrix3<f64>) {
    let n = points.len() as f64;
    let cx = points.iter().map(|p| p.0).sum::<f64>() / n;
    let cy = points.iter().map(|p| p.1).sum::<f64>() / n;

    let mean_dist = points.iter().map(|p| (p.0 - cx).hypot(p.1 - cy)).sum::<f64>() / n;
    if mean_dist < 1e-10 {
        return (points.to_vec(), Matrix3::identity());
    }

    let s = std::f64::consts::SQRT_2 / mean_dist;
    let normalized = points.iter().map(|p| ((p.0 - cx) * s, (p.1 - cy) * s)).collect();

    #[rustfmt::skip]
    let t = Matrix3::new(
        s,   0.0, -cx * s,
        0.0, s,   -cy * s,
        0.0, 0.0, 1.0,
    );
    (normalized, t)
}

/// Right singular vector of the smallest singular value of the m x 9 design matrix
fn solve_homogeneous_svd(a: DMatrix<f64>) -> Option<Matrix3<f64>> {
    let (nrows, ncols) = a.shape();

    // Thin SVD drops the null-space row when m < 9; zero rows keep it
    let a = if nrows < ncols {
        let mut padded = DMatrix::zeros(ncols, ncols);
        padded.view_mut((0, 0), (nrows, ncols)).copy_from(&a);
        padded
    } else {
        a
    };

    let svd = SVD::new(a, false, true);
    let v_t = svd.v_t?;
    let last = v_t.row(ncols - 1);

    Some(Matrix3::from_fn(|r, c| last[r * 3 + c]))
}

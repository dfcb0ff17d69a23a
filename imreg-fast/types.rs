use imreg_core::Keypoint;

/// Keypoint with corner response score for NMS
#[derive(Debug, Clone, Copy)]
pub struct ScoredKeypoint {
    pub keypoint: Keypoint,
    pub response: f32,
}

/// Scale information for pyramid levels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleLevel {
    pub level: usize,
    /// Nominal scale (`scale_factor^level`)
    pub scale: f32,
    pub width: usize,
    pub height: usize,
    /// Exact base-width / level-width ratio
    pub scale_x: f32,
    /// Exact base-height / level-height ratio
    pub scale_y: f32,
}

impl ScaleLevel {
    /// Map level coordinates to the full-resolution frame (pixel centers aligned)
    pub fn to_base(&self, x: f32, y: f32) -> (f32, f32) {
        ((x + 0.5) * self.scale_x - 0.5, (y + 0.5) * self.scale_y - 0.5)
    }

    /// Map full-resolution coordinates into this level
    pub fn from_base(&self, x: f32, y: f32) -> (f32, f32) {
        ((x + 0.5) / self.scale_x - 0.5, (y + 0.5) / self.scale_y - 0.5)
    }
}

/// Corner type classification of a circle pixel against the center
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum CornerType {
    Bright,
    Dark,
    None,
}

impl CornerType {
    #[inline]
    pub(crate) fn classify(pixel: u8, center: u8, threshold: u8) -> Self {
        if pixel as i32 >= center as i32 + threshold as i32 {
            CornerType::Bright
        } else if pixel as i32 + threshold as i32 <= center as i32 {
            CornerType::Dark
        } else {
            CornerType::None
        }
    }
}

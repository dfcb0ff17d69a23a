//! Region selection and photometric normalization before feature work.

use std::fmt;
use std::io::{BufRead, Write};

use image::DynamicImage;
use imreg_core::Image;
use log::debug;

use crate::error::{RegResult, RegistrationError};

/// Axis-aligned rectangle in pixel units, as given on the command line.
///
/// Values are signed so that a negative origin or size survives parsing and
/// can be reported as an invalid region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

impl CropRect {
    pub fn new(x: i64, y: i64, width: i64, height: i64) -> Self {
        Self { x, y, width, height }
    }

    /// True when the rectangle is non-empty and lies inside a `width` x `height` image
    pub fn fits(&self, width: u32, height: u32) -> bool {
        self.x >= 0
            && self.y >= 0
            && self.width > 0
            && self.height > 0
            && self.width <= width as i64 - self.x
            && self.height <= height as i64 - self.y
    }
}

impl fmt::Display for CropRect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {}x{})", self.x, self.y, self.width, self.height)
    }
}

/// Where the region of interest of one image comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RegionSource {
    #[default]
    Full,
    Rect(CropRect),
    Interactive,
}

/// Asks someone for a region of interest
pub trait RegionSelector {
    /// Pick a rectangle inside an image of the given size. `label` names the image.
    fn select(&mut self, label: &str, width: u32, height: u32) -> RegResult<CropRect>;
}

/// Text-mode selector: shows the image size and reads `x y width height`.
///
/// The rectangle is clamped to the image. An empty line or end of input
/// cancels the selection.
pub struct PromptSelector<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> PromptSelector<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl PromptSelector<std::io::StdinLock<'static>, std::io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(std::io::stdin().lock(), std::io::stdout())
    }
}

impl<R: BufRead, W: Write> RegionSelector for PromptSelector<R, W> {
    fn select(&mut self, label: &str, width: u32, height: u32) -> RegResult<CropRect> {
        loop {
            writeln!(
                self.output,
                "Select a ROI in '{}' ({}x{}): enter <top-left x> <top-left y> <width> <height>, or an empty line to cancel.",
                label, width, height
            )?;
            self.output.flush()?;

            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 || line.trim().is_empty() {
                return Err(RegistrationError::SelectionCancelled);
            }

            let values: Vec<i64> = line.split_whitespace().filter_map(|v| v.parse().ok()).collect();
            match values[..] {
                [x, y, w, h] if line.split_whitespace().count() == 4 => {
                    return clamp_selection(CropRect::new(x, y, w, h), width, height)
                        .ok_or(RegistrationError::SelectionCancelled);
                }
                _ => writeln!(self.output, "Four integers are expected.")?,
            }
        }
    }
}

/// Intersect a selection with the image; `None` when nothing is left
fn clamp_selection(rect: CropRect, width: u32, height: u32) -> Option<CropRect> {
    // Normalize rectangles drawn from any corner
    let (x_end, y_end) = (rect.x.saturating_add(rect.width), rect.y.saturating_add(rect.height));
    let (x0, x1) = (rect.x.min(x_end), rect.x.max(x_end));
    let (y0, y1) = (rect.y.min(y_end), rect.y.max(y_end));

    let (x0, y0) = (x0.max(0), y0.max(0));
    let (x1, y1) = (x1.min(width as i64), y1.min(height as i64));
    (x1 > x0 && y1 > y0).then(|| CropRect::new(x0, y0, x1 - x0, y1 - y0))
}

/// Reduce a region source to a rectangle, asking `selector` when interactive.
pub fn resolve_region(
    source: RegionSource,
    label: &str,
    image: &DynamicImage,
    selector: &mut dyn RegionSelector,
) -> RegResult<Option<CropRect>> {
    match source {
        RegionSource::Full => Ok(None),
        RegionSource::Rect(rect) => Ok(Some(rect)),
        RegionSource::Interactive => selector.select(label, image.width(), image.height()).map(Some),
    }
}

/// Copy of `image` bounded by `rect`, or the image itself without a rectangle
pub fn crop(image: DynamicImage, rect: Option<CropRect>) -> RegResult<DynamicImage> {
    let Some(rect) = rect else {
        return Ok(image);
    };

    let (width, height) = (image.width(), image.height());
    if !rect.fits(width, height) {
        return Err(RegistrationError::InvalidRegion { rect, width, height });
    }

    debug!("cropping {}x{} image to {}", width, height, rect);
    Ok(image.crop_imm(rect.x as u32, rect.y as u32, rect.width as u32, rect.height as u32))
}

/// 8-bit luma buffer for feature work, with its dimensions
pub fn to_luma(image: &DynamicImage) -> (Image, usize, usize) {
    let gray = image.to_luma8();
    let (w, h) = (gray.width() as usize, gray.height() as usize);
    (gray.into_raw(), w, h)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};
    use std::io::Cursor;

    fn gradient(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::from_fn(width, height, |x, y| Luma([(x + 10 * y) as u8])))
    }

    #[test]
    fn test_no_rect_returns_original() {
        let img = gradient(20, 10);
        let out = crop(img.clone(), None).unwrap();
        assert_eq!(out, img);
    }

    #[test]
    fn test_crop_inside_bounds() {
        let out = crop(gradient(20, 10), Some(CropRect::new(5, 2, 10, 4))).unwrap();
        assert_eq!((out.width(), out.height()), (10, 4));
        assert_eq!(out.to_luma8().get_pixel(0, 0)[0], 5 + 20);
    }

    #[test]
    fn test_invalid_regions() {
        for rect in [
            CropRect::new(-1, 0, 5, 5),
            CropRect::new(0, 0, 0, 5),
            CropRect::new(0, 0, 5, -2),
            CropRect::new(16, 0, 5, 5),
            CropRect::new(0, 8, 5, 3),
            CropRect::new(1, 0, i64::MAX, 5),
            CropRect::new(0, 1, 5, i64::MAX),
            CropRect::new(i64::MAX, 0, 1, 1),
        ] {
            let err = crop(gradient(20, 10), Some(rect)).unwrap_err();
            assert!(matches!(err, RegistrationError::InvalidRegion { width: 20, height: 10, .. }), "{rect}");
        }
        assert!(crop(gradient(20, 10), Some(CropRect::new(0, 0, 20, 10))).is_ok());
    }

    #[test]
    fn test_resolve_region() {
        let img = gradient(20, 10);
        let mut selector = PromptSelector::new(Cursor::new("1 2 3 4\n"), Vec::new());
        assert_eq!(resolve_region(RegionSource::Full, "a", &img, &mut selector).unwrap(), None);
        let rect = CropRect::new(0, 0, 4, 4);
        assert_eq!(resolve_region(RegionSource::Rect(rect), "a", &img, &mut selector).unwrap(), Some(rect));
        assert_eq!(
            resolve_region(RegionSource::Interactive, "a", &img, &mut selector).unwrap(),
            Some(CropRect::new(1, 2, 3, 4))
        );
    }

    #[test]
    fn test_prompt_selector_clamps() {
        let mut selector = PromptSelector::new(Cursor::new("-5 3 100 100\n"), Vec::new());
        let rect = selector.select("img.png", 40, 30).unwrap();
        assert_eq!(rect, CropRect::new(0, 3, 40, 27));
    }

    #[test]
    fn test_prompt_selector_huge_values() {
        let input = format!("{} 0 {} {}\n", i64::MAX - 1, i64::MAX, i64::MAX);
        let mut selector = PromptSelector::new(Cursor::new(input), Vec::new());
        assert!(matches!(selector.select("x", 40, 30), Err(RegistrationError::SelectionCancelled)));

        let input = format!("5 5 {} {}\n", i64::MAX, i64::MIN);
        let mut selector = PromptSelector::new(Cursor::new(input), Vec::new());
        assert_eq!(selector.select("x", 40, 30).unwrap(), CropRect::new(5, 0, 35, 5));
    }

    #[test]
    fn test_prompt_selector_reprompts_then_cancels() {
        let mut out = Vec::new();
        let mut selector = PromptSelector::new(Cursor::new("1 2 a b\n\n"), &mut out);
        let err = selector.select("img.png", 40, 30).unwrap_err();
        assert!(matches!(err, RegistrationError::SelectionCancelled));
        let printed = String::from_utf8(out).unwrap();
        assert!(printed.contains("40x30"));
        assert!(printed.contains("Four integers are expected."));
    }

    #[test]
    fn test_prompt_selector_outside_image_cancels() {
        let mut selector = PromptSelector::new(Cursor::new("50 50 10 10\n"), Vec::new());
        assert!(matches!(selector.select("x", 40, 30), Err(RegistrationError::SelectionCancelled)));
        let mut selector = PromptSelector::new(Cursor::new(""), Vec::new());
        assert!(matches!(selector.select("x", 40, 30), Err(RegistrationError::SelectionCancelled)));
    }

    #[test]
    fn test_to_luma() {
        let (buf, w, h) = to_luma(&gradient(7, 3));
        assert_eq!((w, h, buf.len()), (7, 3, 21));
        assert_eq!(buf[8], 11);
    }
}

//! Resampling of the moving image into the reference frame.

use image::{DynamicImage, ImageBuffer, Pixel};
use imreg_ransac::Homography;
use rayon::prelude::*;

use crate::error::{RegResult, RegistrationError};

/// Warp `moving` into a `width` x `height` reference frame.
///
/// `transform` maps moving coordinates to reference coordinates; every output
/// pixel is pulled back through its inverse and bilinearly sampled. Samples
/// falling outside the moving image are zero (black, and transparent when the
/// layout has alpha). The output keeps the moving image's channel layout;
/// 16-bit and float layouts are converted to 8-bit RGB or RGBA first.
pub fn warp_perspective(
    moving: &DynamicImage,
    transform: &Homography,
    width: u32,
    height: u32,
) -> RegResult<DynamicImage> {
    let inverse = transform.inverse().ok_or(RegistrationError::SingularTransform)?;

    Ok(match moving {
        DynamicImage::ImageLuma8(img) => DynamicImage::ImageLuma8(warp_buffer(img, &inverse, width, height)),
        DynamicImage::ImageLumaA8(img) => DynamicImage::ImageLumaA8(warp_buffer(img, &inverse, width, height)),
        DynamicImage::ImageRgb8(img) => DynamicImage::ImageRgb8(warp_buffer(img, &inverse, width, height)),
        DynamicImage::ImageRgba8(img) => DynamicImage::ImageRgba8(warp_buffer(img, &inverse, width, height)),
        other if other.color().has_alpha() => {
            DynamicImage::ImageRgba8(warp_buffer(&other.to_rgba8(), &inverse, width, height))
        }
        other => DynamicImage::ImageRgb8(warp_buffer(&other.to_rgb8(), &inverse, width, height)),
    })
}

/// Inverse-mapped bilinear warp of an 8-bit buffer, rows in parallel
fn warp_buffer<P>(
    src: &ImageBuffer<P, Vec<u8>>,
    inverse: &Homography,
    width: u32,
    height: u32,
) -> ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8> + Send + Sync,
{
    let channels = P::CHANNEL_COUNT as usize;
    let (src_w, src_h) = (src.width() as usize, src.height() as usize);
    let src_raw: &[u8] = src.as_raw();
    let mut out = vec![0u8; width as usize * height as usize * channels];

    if width == 0 || height == 0 || src_w == 0 || src_h == 0 {
        return ImageBuffer::from_raw(width, height, out).unwrap_or_else(|| ImageBuffer::new(width, height));
    }

    out.par_chunks_mut(width as usize * channels)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, pixel) in row.chunks_exact_mut(channels).enumerate() {
                let Some((sx, sy)) = inverse.apply((x as f64, y as f64)) else {
                    continue;
                };
                bilinear_sample(src_raw, src_w, src_h, channels, sx, sy, pixel);
            }
        });

    ImageBuffer::from_raw(width, height, out).unwrap_or_else(|| ImageBuffer::new(width, height))
}

/// Write the interpolated value at `(x, y)` into `pixel`; leaves it untouched
/// (the fill value) outside the image.
#[inline]
fn bilinear_sample(src: &[u8], w: usize, h: usize, channels: usize, x: f64, y: f64, pixel: &mut [u8]) {
    // Half-pixel tolerance so edge pixels are not lost to rounding
    const EDGE: f64 = 0.5;
    if !(x >= -EDGE && y >= -EDGE && x <= (w - 1) as f64 + EDGE && y <= (h - 1) as f64 + EDGE) {
        return;
    }

    let x = x.clamp(0.0, (w - 1) as f64);
    let y = y.clamp(0.0, (h - 1) as f64);
    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    let x1 = (x0 + 1).min(w - 1);
    let y1 = (y0 + 1).min(h - 1);
    let fx = x - x0 as f64;
    let fy = y - y0 as f64;

    let at = |xx: usize, yy: usize, c: usize| src[(yy * w + xx) * channels + c] as f64;
    for (c, value) in pixel.iter_mut().enumerate() {
        let top = at(x0, y0, c) * (1.0 - fx) + at(x1, y0, c) * fx;
        let bottom = at(x0, y1, c) * (1.0 - fx) + at(x1, y1, c) * fx;
        *value = (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8;
    }
}

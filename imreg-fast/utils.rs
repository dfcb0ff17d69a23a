/// Segment-test helpers for the 16-pixel Bresenham circle

/// Check whether `mask` holds at least `min_count` consecutive set bits,
/// wrapping around the circle.
#[inline]
pub fn has_consecutive_bits(mask: u16, min_count: usize) -> bool {
    if min_count == 0 || min_count > 16 {
        return false;
    }
    if mask == u16::MAX {
        return true;
    }

    // A run of length n survives n-1 "AND with rotated self" steps
    let mut test_mask = mask;
    for i in 1..min_count as u32 {
        test_mask &= mask.rotate_right(i);
        if test_mask == 0 {
            return false;
        }
    }

    test_mask != 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Pack a circular boolean array into a 16-bit mask (bit `i` = pixel `i`)
    fn pack_mask(pixels: &[bool; 16]) -> u16 {
        pixels
            .iter()
            .enumerate()
            .fold(0u16, |mask, (i, &set)| if set { mask | (1 << i) } else { mask })
    }

    /// Check if there are at least `min_count` consecutive true values in the circular array
    fn has_consecutive_pixels(pixels: &[bool; 16], min_count: usize) -> bool {
        has_consecutive_bits(pack_mask(pixels), min_count)
    }

    /// Straightforward run counter, used to cross-check the bitmask version
    fn has_consecutive_pixels_fallback(pixels: &[bool; 16], min_count: usize) -> bool {
        if min_count == 0 || min_count > 16 {
            return false;
        }

        let mut current_consecutive = 0;

        // Walk twice around the circle to handle wrap-around
        for i in 0..(16 * 2) {
            if pixels[i % 16] {
                current_consecutive += 1;
                if current_consecutive >= min_count {
                    return true;
                }
            } else {
                current_consecutive = 0;
            }
        }

        false
    }

    #[test]
    fn test_consecutive_pixels_simple() {
        let mut pixels = [false; 16];
        for p in pixels.iter_mut().take(9) {
            *p = true;
        }
        assert!(has_consecutive_pixels(&pixels, 9));
        assert!(!has_consecutive_pixels(&pixels, 10));
    }

    #[test]
    fn test_consecutive_pixels_wrap_around() {
        let mut pixels = [false; 16];
        for i in 12..16 {
            pixels[i] = true;
        }
        for i in 0..5 {
            pixels[i] = true;
        }
        assert!(has_consecutive_pixels(&pixels, 9));
        assert!(!has_consecutive_pixels(&pixels, 10));
    }

    #[test]
    fn test_non_consecutive_pixels() {
        let mut pixels = [false; 16];
        for i in (0..16).step_by(2) {
            pixels[i] = true;
        }
        assert!(!has_consecutive_pixels(&pixels, 2));
        assert!(has_consecutive_pixels(&pixels, 1));
    }

    #[test]
    fn test_full_circle() {
        assert!(has_consecutive_bits(u16::MAX, 16));
        assert!(!has_consecutive_bits(0, 1));
    }

    proptest! {
        #[test]
        fn bitmask_matches_fallback(mask in any::<u16>(), min_count in 1usize..=16) {
            let mut pixels = [false; 16];
            for (i, p) in pixels.iter_mut().enumerate() {
                *p = mask & (1 << i) != 0;
            }
            prop_assert_eq!(
                has_consecutive_pixels(&pixels, min_count),
                has_consecutive_pixels_fallback(&pixels, min_count)
            );
        }
    }
}

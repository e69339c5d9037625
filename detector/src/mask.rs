use image::{GrayImage, Luma};

pub const FOREGROUND: u8 = 255;

/// Binary change mask: 255 where `|current - previous| > threshold`, else 0.
/// Both images must have the same dimensions.
pub fn threshold_diff(current: &GrayImage, previous: &GrayImage, threshold: u8) -> GrayImage {
    debug_assert_eq!(current.dimensions(), previous.dimensions());
    let data: Vec<u8> = current
        .as_raw()
        .iter()
        .zip(previous.as_raw())
        .map(|(&a, &b)| {
            if a.abs_diff(b) > threshold {
                FOREGROUND
            } else {
                0
            }
        })
        .collect();
    GrayImage::from_raw(current.width(), current.height(), data)
        .unwrap_or_else(|| GrayImage::new(current.width(), current.height()))
}

/// Dilate with a 3×3 square structuring element, `iterations` times.
///
/// Pixels outside the image never contribute. The square element is
/// separable, so each iteration is a horizontal then a vertical 3-wide max.
pub fn dilate(mask: &GrayImage, iterations: u32) -> GrayImage {
    let mut current = mask.clone();
    let (w, h) = current.dimensions();
    if w == 0 || h == 0 {
        return current;
    }
    let mut scratch = GrayImage::new(w, h);
    for _ in 0..iterations {
        for y in 0..h {
            for x in 0..w {
                let lo = x.saturating_sub(1);
                let hi = (x + 1).min(w - 1);
                let v = (lo..=hi).map(|xx| current.get_pixel(xx, y)[0]).max().unwrap_or(0);
                scratch.put_pixel(x, y, Luma([v]));
            }
        }
        for y in 0..h {
            let lo = y.saturating_sub(1);
            let hi = (y + 1).min(h - 1);
            for x in 0..w {
                let v = (lo..=hi).map(|yy| scratch.get_pixel(x, yy)[0]).max().unwrap_or(0);
                current.put_pixel(x, y, Luma([v]));
            }
        }
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count_foreground(mask: &GrayImage) -> usize {
        mask.as_raw().iter().filter(|&&v| v == FOREGROUND).count()
    }

    #[test]
    fn threshold_is_strictly_greater() {
        let prev = GrayImage::from_raw(3, 1, vec![100, 100, 100]).unwrap();
        let cur = GrayImage::from_raw(3, 1, vec![125, 126, 74]).unwrap();
        let mask = threshold_diff(&cur, &prev, 25);
        assert_eq!(mask.as_raw(), &vec![0, 255, 255]);
    }

    #[test]
    fn identical_images_give_empty_mask() {
        let img = GrayImage::from_pixel(16, 16, Luma([90]));
        assert_eq!(count_foreground(&threshold_diff(&img, &img, 25)), 0);
    }

    #[test]
    fn dilation_grows_one_pixel_per_iteration() {
        let mut mask = GrayImage::new(11, 11);
        mask.put_pixel(5, 5, Luma([FOREGROUND]));
        assert_eq!(count_foreground(&dilate(&mask, 1)), 9);
        assert_eq!(count_foreground(&dilate(&mask, 2)), 25);
        assert_eq!(count_foreground(&dilate(&mask, 0)), 1);
    }

    #[test]
    fn dilation_is_clipped_at_borders() {
        let mut mask = GrayImage::new(4, 4);
        mask.put_pixel(0, 0, Luma([FOREGROUND]));
        let out = dilate(&mask, 2);
        assert_eq!(count_foreground(&out), 9);
        assert_eq!(out.get_pixel(2, 2)[0], FOREGROUND);
        assert_eq!(out.get_pixel(3, 3)[0], 0);
    }

    #[test]
    fn dilation_merges_close_blobs() {
        let mut mask = GrayImage::new(12, 3);
        mask.put_pixel(2, 1, Luma([FOREGROUND]));
        mask.put_pixel(6, 1, Luma([FOREGROUND]));
        let out = dilate(&mask, 2);
        assert!((0..=8).all(|x| out.get_pixel(x, 1)[0] == FOREGROUND));
    }
}

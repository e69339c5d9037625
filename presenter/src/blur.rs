use image::RgbImage;
use motion_pipeline_common::frame::MotionRegion;

use crate::kernel::GaussianKernel;

/// Index into `0..len` with reflect-101 borders (`dcb|abcd|cba`).
fn reflect_101(mut i: isize, len: usize) -> usize {
    if len == 1 {
        return 0;
    }
    let last = len as isize - 1;
    loop {
        if i < 0 {
            i = -i;
        } else if i > last {
            i = 2 * last - i;
        } else {
            return i as usize;
        }
    }
}

/// Blur the part of `region` that lies inside `image`, in place.
///
/// Only pixels of the clipped rectangle are read and written; its edges are
/// extended by reflection. Returns `false` when nothing of the region is
/// inside the image.
pub fn blur_region(image: &mut RgbImage, kernel: &GaussianKernel, region: MotionRegion) -> bool {
    let Some(r) = region.clip(image.width(), image.height()) else {
        return false;
    };
    let (rw, rh) = (r.width as usize, r.height as usize);
    let radius = kernel.radius() as isize;
    let taps = kernel.profile();

    let mut roi = vec![0f64; rw * rh * 3];
    for y in 0..rh {
        for x in 0..rw {
            let p = image.get_pixel(r.x + x as u32, r.y + y as u32);
            for c in 0..3 {
                roi[(y * rw + x) * 3 + c] = p[c] as f64;
            }
        }
    }

    let mut rows = vec![0f64; roi.len()];
    for y in 0..rh {
        for x in 0..rw {
            for c in 0..3 {
                rows[(y * rw + x) * 3 + c] = taps
                    .iter()
                    .enumerate()
                    .map(|(k, w)| {
                        let xx = reflect_101(x as isize + k as isize - radius, rw);
                        w * roi[(y * rw + xx) * 3 + c]
                    })
                    .sum();
            }
        }
    }

    for y in 0..rh {
        for x in 0..rw {
            let p = image.get_pixel_mut(r.x + x as u32, r.y + y as u32);
            for c in 0..3 {
                let v: f64 = taps
                    .iter()
                    .enumerate()
                    .map(|(k, w)| {
                        let yy = reflect_101(y as isize + k as isize - radius, rh);
                        w * rows[(yy * rw + x) * 3 + c]
                    })
                    .sum();
                p[c] = v.round().clamp(0.0, 255.0) as u8;
            }
        }
    }
    true
}

//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images. The
//! real backend and the test mock both size their output through them, so
//! "what size will this variant come out at" has a single answer.
//!
//! Rounding is half away from zero (`f64::round`), so a 200x150 source resized
//! to width 50 comes out 50x38.

fn scale(value: u32, factor: f64) -> u32 {
    ((value as f64 * factor).round() as u32).max(1)
}

fn cap(factor: f64, upsize: Option<f32>) -> f64 {
    match upsize {
        Some(limit) => factor.min(limit as f64),
        None => factor,
    }
}

/// Output dimensions of a resize that preserves aspect ratio where it can.
///
/// # Arguments
/// * `source` - Original image dimensions (width, height)
/// * `width` / `height` - Requested size; `None` means "follow the other axis"
/// * `upsize` - Maximum scale factor, `None` for unlimited
///
/// # Returns
/// * `(width, height)` - Natural size when neither axis is requested; each axis
///   scaled independently when both are.
pub fn resize_dimensions(
    source: (u32, u32),
    width: Option<u32>,
    height: Option<u32>,
    upsize: Option<f32>,
) -> (u32, u32) {
    let (src_w, src_h) = source;
    if src_w == 0 || src_h == 0 {
        return source;
    }

    match (width, height) {
        (None, None) => source,
        (Some(w), None) => {
            let factor = cap(w as f64 / src_w as f64, upsize);
            if factor < w as f64 / src_w as f64 {
                (scale(src_w, factor), scale(src_h, factor))
            } else {
                (w.max(1), scale(src_h, factor))
            }
        }
        (None, Some(h)) => {
            let factor = cap(h as f64 / src_h as f64, upsize);
            if factor < h as f64 / src_h as f64 {
                (scale(src_w, factor), scale(src_h, factor))
            } else {
                (scale(src_w, factor), h.max(1))
            }
        }
        (Some(w), Some(h)) => {
            let fx = w as f64 / src_w as f64;
            let fy = h as f64 / src_h as f64;
            let out_w = if cap(fx, upsize) < fx {
                scale(src_w, cap(fx, upsize))
            } else {
                w.max(1)
            };
            let out_h = if cap(fy, upsize) < fy {
                scale(src_h, cap(fy, upsize))
            } else {
                h.max(1)
            };
            (out_w, out_h)
        }
    }
}

/// Output dimensions of a cover-then-centre-crop into `target`.
///
/// The result is exactly `target` unless covering it would scale the source
/// past `upsize`; then the box shrinks proportionally to the capped scale.
pub fn fit_dimensions(source: (u32, u32), target: (u32, u32), upsize: Option<f32>) -> (u32, u32) {
    let (src_w, src_h) = source;
    let (tgt_w, tgt_h) = target;
    if src_w == 0 || src_h == 0 {
        return source;
    }

    let cover = (tgt_w as f64 / src_w as f64).max(tgt_h as f64 / src_h as f64);
    let capped = cap(cover, upsize);
    if capped < cover {
        let shrink = capped / cover;
        (scale(tgt_w, shrink), scale(tgt_h, shrink))
    } else {
        (tgt_w.max(1), tgt_h.max(1))
    }
}

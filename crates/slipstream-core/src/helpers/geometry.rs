// crates/slipstream-core/src/helpers/geometry.rs
//
// Output-size math for the max_pixels option.

/// Fit `(w, h)` into a pixel budget, preserving aspect ratio.
///
/// Returns dimensions whose product is at most `max_pixels`, rounded down to
/// even values (chroma subsampling needs even planes). Inputs already inside
/// the budget come back unchanged.
///
/// ```
/// use slipstream_core::helpers::geometry::fit_pixels;
/// assert_eq!(fit_pixels(1920, 1080, 640 * 360), (640, 360));
/// assert_eq!(fit_pixels(320, 240, 640 * 360), (320, 240));
/// ```
pub fn fit_pixels(w: u32, h: u32, max_pixels: u32) -> (u32, u32) {
    if w == 0 || h == 0 || (w as u64 * h as u64) <= max_pixels as u64 {
        return (w, h);
    }
    let scale = (max_pixels as f64 / (w as f64 * h as f64)).sqrt();
    let round_even = |v: f64| (((v / 2.0).round() * 2.0) as u32).max(2);
    let mut out_w = round_even(w as f64 * scale);
    let mut out_h = round_even(h as f64 * scale);
    // Rounding to the nearest even value can overshoot the budget by a
    // sliver; trim the larger dimension until the product fits again.
    while out_w as u64 * out_h as u64 > max_pixels as u64 && out_w > 2 && out_h > 2 {
        if out_w >= out_h {
            out_w -= 2;
        } else {
            out_h -= 2;
        }
    }
    (out_w, out_h)
}

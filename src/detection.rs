//! Vertical overlap detection between consecutive screenshots.
//!
//! Scrolling screenshots repeat a band of rows: the bottom of one capture shows
//! up again at the top of the next. The detector looks for that band by
//! sliding a block of [`MIN_CONFIRM_ROWS`] rows taken from the top of the
//! (header-cropped) lower image over the lower half of the upper image.
//!
//! The scan starts at the midpoint of the upper image and moves down, so the
//! smallest confirmed overlap wins.

use image::RgbaImage;

/// Consecutive matching rows required to accept an overlap.
///
/// Rejects coincidental matches on solid-color bands while still tolerating
/// minor rendering noise inside each row.
pub const MIN_CONFIRM_ROWS: u32 = 15;

/// Default fraction of pixels per row allowed to differ before the row stops
/// counting as a match.
pub const DEFAULT_ROW_TOLERANCE: f32 = 0.01;

/// Bytes per RGBA pixel.
const CHANNELS: usize = 4;

/// Detect how many rows at the bottom of `top` repeat at the top of `bottom`.
///
/// `crop_height` rows are stripped from the top of `bottom` before comparing;
/// `top` is never cropped. Uses [`DEFAULT_ROW_TOLERANCE`].
///
/// Returns 0 when no overlap is confirmed, including the degenerate cases
/// (zero comparison width, crop consuming the whole image, images shorter
/// than [`MIN_CONFIRM_ROWS`]).
#[must_use]
pub fn detect_overlap(top: &RgbaImage, bottom: &RgbaImage, crop_height: u32) -> u32 {
    detect_overlap_with_tolerance(top, bottom, crop_height, DEFAULT_ROW_TOLERANCE)
}

/// Like [`detect_overlap`], with an explicit per-row pixel tolerance.
///
/// A row matches when at most `row_tolerance * width` of its pixels differ in
/// any RGB channel. Alpha is ignored. A tolerance of `0.0` demands exact rows.
///
/// The result never exceeds `min(top.height(), bottom.height() - crop_height)`.
#[must_use]
pub fn detect_overlap_with_tolerance(
    top: &RgbaImage,
    bottom: &RgbaImage,
    crop_height: u32,
    row_tolerance: f32,
) -> u32 {
    let width = top.width().min(bottom.width());
    if width == 0 {
        return 0;
    }

    let Some(bottom_height) = bottom.height().checked_sub(crop_height).filter(|&h| h > 0) else {
        log::debug!(
            "crop of {crop_height} rows consumes the whole {}px image, no overlap",
            bottom.height()
        );
        return 0;
    };

    let top_height = top.height();
    if top_height < MIN_CONFIRM_ROWS || bottom_height < MIN_CONFIRM_ROWS {
        return 0;
    }

    // Overlap is `top_height - y1`, so skip candidates that would claim more
    // rows than the cropped bottom image has.
    let first = (top_height / 2).max(top_height.saturating_sub(bottom_height));
    let last = top_height - MIN_CONFIRM_ROWS;

    let max_diffs = f64::from(width) * f64::from(row_tolerance.max(0.0));

    for y1 in first..=last {
        let confirmed = (0..MIN_CONFIRM_ROWS).all(|r| {
            let a = row(top, y1 + r, width);
            let b = row(bottom, crop_height + r, width);
            #[allow(clippy::cast_precision_loss)]
            let diffs = differing_pixels(a, b) as f64;
            diffs <= max_diffs
        });

        if confirmed {
            return top_height - y1;
        }
    }

    0
}

/// Leftmost `width` pixels of row `y` as a raw RGBA slice.
fn row(img: &RgbaImage, y: u32, width: u32) -> &[u8] {
    let stride = img.width() as usize * CHANNELS;
    let start = y as usize * stride;
    &img.as_raw()[start..start + width as usize * CHANNELS]
}

/// Count pixels whose RGB channels differ. Alpha is ignored.
fn differing_pixels(a: &[u8], b: &[u8]) -> usize {
    debug_assert_eq!(a.len(), b.len());
    a.chunks_exact(CHANNELS)
        .zip(b.chunks_exact(CHANNELS))
        .filter(|(pa, pb)| pa[..3] != pb[..3])
        .count()
}

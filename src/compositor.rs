//! Canvas layout and painting.
//!
//! Images are stacked top to bottom on a canvas as wide as the widest image,
//! each centered horizontally. Every image after the first loses its header
//! rows and is shifted up by its overlap with the previous one. Seams without
//! an overlap can carry a colored separator band.

use image::{Rgb, RgbaImage};

use crate::error::{Error, Result};

const CHANNELS: usize = 4;

/// Separator band drawn at seams where no overlap was confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeparatorStyle {
    /// Band height in pixels. Zero disables separators.
    pub height_px: u32,
    /// Band color.
    pub color: Rgb<u8>,
}

impl Default for SeparatorStyle {
    fn default() -> Self {
        Self {
            height_px: 0,
            color: Rgb([0, 0, 0]),
        }
    }
}

impl SeparatorStyle {
    /// Slate gray used by the thin separator preset.
    pub const THIN_COLOR: Rgb<u8> = Rgb([0x4B, 0x55, 0x63]);

    /// Create a separator style.
    #[must_use]
    pub fn new(height_px: u32, color: Rgb<u8>) -> Self {
        Self { height_px, color }
    }

    /// 3px slate gray band.
    #[must_use]
    pub fn thin() -> Self {
        Self::new(3, Self::THIN_COLOR)
    }

    /// Parse a `#RRGGBB` (or `RRGGBB`) hex color.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidColor`] if the string is not six hex digits.
    pub fn parse_color(s: &str) -> Result<Rgb<u8>> {
        let hex = s.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::InvalidColor(s.to_string()));
        }
        let channel = |i: usize| {
            u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| Error::InvalidColor(s.to_string()))
        };
        Ok(Rgb([channel(0)?, channel(2)?, channel(4)?]))
    }
}

/// Where one source image lands on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    /// Left edge on the canvas.
    pub x: u32,
    /// Top edge on the canvas.
    pub y: u32,
    /// First source row copied (the header crop, or 0).
    pub source_y: u32,
    /// Number of source rows copied.
    pub height: u32,
}

/// Computed canvas geometry for one stitch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanvasLayout {
    /// Canvas width: the widest input.
    pub width: u32,
    /// Canvas height.
    pub height: u32,
    /// One placement per input image, in order.
    pub placements: Vec<Placement>,
    /// Top rows of the separator bands.
    pub separators: Vec<u32>,
}

/// Rows image `index` contributes before overlap is subtracted.
///
/// The first image is never cropped; later images lose `crop_height` rows
/// only when they are taller than the crop.
#[must_use]
pub fn effective_height(index: usize, height: u32, crop_height: u32) -> u32 {
    if index > 0 && crop_height > 0 && height > crop_height {
        height - crop_height
    } else {
        height
    }
}

fn source_top(index: usize, height: u32, crop_height: u32) -> u32 {
    height - effective_height(index, height, crop_height)
}

/// Check the overlap table against the image sequence.
fn validate_overlaps(images: &[RgbaImage], overlaps: &[u32], crop_height: u32) -> Result<()> {
    if overlaps.len() != images.len() {
        return Err(Error::OverlapCount {
            expected: images.len(),
            actual: overlaps.len(),
        });
    }
    if overlaps[0] != 0 {
        return Err(Error::InvalidOverlap {
            index: 0,
            overlap: overlaps[0],
            limit: 0,
        });
    }
    for (i, pair) in images.windows(2).enumerate() {
        let index = i + 1;
        let limit = effective_height(i, pair[0].height(), crop_height)
            .min(effective_height(index, pair[1].height(), crop_height));
        if overlaps[index] > limit {
            return Err(Error::InvalidOverlap {
                index,
                overlap: overlaps[index],
                limit,
            });
        }
    }
    Ok(())
}

/// Compute canvas size and every placement without painting.
///
/// # Errors
///
/// - [`Error::EmptyInput`] if `images` is empty.
/// - [`Error::OverlapCount`] / [`Error::InvalidOverlap`] if `overlaps` is not
///   a valid table for `images`.
/// - [`Error::Allocation`] if the canvas height does not fit in `u32`.
pub fn plan_layout(
    images: &[RgbaImage],
    overlaps: &[u32],
    crop_height: u32,
    separator: &SeparatorStyle,
) -> Result<CanvasLayout> {
    if images.is_empty() {
        return Err(Error::EmptyInput);
    }
    validate_overlaps(images, overlaps, crop_height)?;

    let width = images.iter().map(RgbaImage::width).max().unwrap_or(0);

    let mut total = u64::from(images[0].height());
    for (i, img) in images.iter().enumerate().skip(1) {
        total += u64::from(effective_height(i, img.height(), crop_height));
        total -= u64::from(overlaps[i]);
        if overlaps[i] == 0 {
            total += u64::from(separator.height_px);
        }
    }
    let height = u32::try_from(total).map_err(|_| Error::Allocation {
        width: u64::from(width),
        height: total,
    })?;

    let mut placements = Vec::with_capacity(images.len());
    let mut separators = Vec::new();
    let mut current_y = 0u32;
    for (i, img) in images.iter().enumerate() {
        let rows = effective_height(i, img.height(), crop_height);
        let y = current_y - overlaps[i];
        placements.push(Placement {
            x: (width - img.width()) / 2,
            y,
            source_y: source_top(i, img.height(), crop_height),
            height: rows,
        });
        current_y = y + rows;

        let next_is_seam = overlaps.get(i + 1).is_some_and(|&o| o == 0);
        if next_is_seam && separator.height_px > 0 {
            separators.push(current_y);
            current_y += separator.height_px;
        }
    }
    debug_assert_eq!(current_y, height);

    log::debug!(
        "layout {width}x{height}, {} images, {} separators",
        placements.len(),
        separators.len()
    );

    Ok(CanvasLayout {
        width,
        height,
        placements,
        separators,
    })
}

/// Composite `images` into a single canvas.
///
/// `overlaps[i]` is the overlap between image `i - 1` and image `i`;
/// `overlaps[0]` must be 0. Unpainted pixels stay fully transparent.
///
/// # Errors
///
/// Everything [`plan_layout`] returns, plus [`Error::Allocation`] if the
/// canvas buffer cannot be reserved.
pub fn stitch(
    images: &[RgbaImage],
    overlaps: &[u32],
    crop_height: u32,
    separator: &SeparatorStyle,
) -> Result<RgbaImage> {
    let layout = plan_layout(images, overlaps, crop_height, separator)?;
    let mut canvas = allocate_canvas(layout.width, layout.height)?;

    for (img, placement) in images.iter().zip(&layout.placements) {
        blit(&mut canvas, img, placement);
    }
    for &y in &layout.separators {
        fill_band(&mut canvas, y, separator);
    }

    Ok(canvas)
}

fn allocate_canvas(width: u32, height: u32) -> Result<RgbaImage> {
    let alloc_err = || Error::Allocation {
        width: u64::from(width),
        height: u64::from(height),
    };
    let len = u64::from(width)
        .checked_mul(u64::from(height))
        .and_then(|px| px.checked_mul(CHANNELS as u64))
        .and_then(|bytes| usize::try_from(bytes).ok())
        .ok_or_else(alloc_err)?;

    let mut buf = Vec::new();
    buf.try_reserve_exact(len).map_err(|_| alloc_err())?;
    buf.resize(len, 0);
    RgbaImage::from_raw(width, height, buf).ok_or_else(alloc_err)
}

/// Copy `placement.height` rows of `src` onto the canvas.
fn blit(canvas: &mut RgbaImage, src: &RgbaImage, placement: &Placement) {
    let canvas_stride = canvas.width() as usize * CHANNELS;
    let src_stride = src.width() as usize * CHANNELS;
    let x = placement.x as usize * CHANNELS;
    let raw = src.as_raw();
    let dst: &mut [u8] = canvas;

    for r in 0..placement.height as usize {
        let s = (placement.source_y as usize + r) * src_stride;
        let d = (placement.y as usize + r) * canvas_stride + x;
        dst[d..d + src_stride].copy_from_slice(&raw[s..s + src_stride]);
    }
}

/// Fill a full-width separator band starting at row `y`.
fn fill_band(canvas: &mut RgbaImage, y: u32, separator: &SeparatorStyle) {
    let stride = canvas.width() as usize * CHANNELS;
    let start = y as usize * stride;
    let end = start + separator.height_px as usize * stride;
    let [r, g, b] = separator.color.0;
    let dst: &mut [u8] = canvas;
    for px in dst[start..end].chunks_exact_mut(CHANNELS) {
        px.copy_from_slice(&[r, g, b, 255]);
    }
}

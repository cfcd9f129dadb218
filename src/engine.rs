//! Stitching pipeline: decode, detect overlaps, composite, encode.

use std::cmp::Ordering;
use std::iter::Peekable;
use std::path::{Path, PathBuf};
use std::str::Chars;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;

use image::buffer::ConvertBuffer;
use image::codecs::png::PngEncoder;
use image::{DynamicImage, ExtendedColorType, ImageEncoder, ImageFormat, RgbaImage};

use crate::compositor::{self, effective_height, SeparatorStyle};
use crate::detection::{self, DEFAULT_ROW_TOLERANCE};
use crate::error::{Error, Result};

/// Options controlling one stitch.
#[derive(Debug, Clone, PartialEq)]
pub struct StitchOptions {
    /// Rows stripped from the top of every image except the first.
    pub header_height: u32,
    /// Band drawn at seams without overlap.
    pub separator: SeparatorStyle,
    /// Fraction of pixels per row allowed to differ in overlap matching.
    pub row_tolerance: f32,
}

impl Default for StitchOptions {
    fn default() -> Self {
        Self {
            header_height: 0,
            separator: SeparatorStyle::default(),
            row_tolerance: DEFAULT_ROW_TOLERANCE,
        }
    }
}

/// Shared flag used to abandon a stitch in progress.
///
/// Clones observe the same flag. The engine checks it before every overlap
/// pair and before painting.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create a token that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, AtomicOrdering::Relaxed);
    }

    /// Whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(AtomicOrdering::Relaxed)
    }

    fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// A composited canvas and the overlap table that produced it.
#[derive(Debug, Clone)]
pub struct Stitched {
    /// The output raster.
    pub canvas: RgbaImage,
    /// `overlaps[i]` is the overlap between input `i - 1` and input `i`.
    pub overlaps: Vec<u32>,
}

/// Encoded stitch result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StitchOutput {
    /// PNG byte stream. Empty when there was nothing to stitch.
    pub png: Vec<u8>,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Overlap table used for the layout.
    pub overlaps: Vec<u32>,
}

impl StitchOutput {
    /// The result of stitching zero images.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether this is the empty result.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.png.is_empty()
    }
}

/// Stitching engine.
///
/// Holds no image state; every call works on its own inputs, so one engine
/// can serve concurrent requests. Create with [`StitchEngine::new()`].
#[derive(Debug, Clone, Default)]
pub struct StitchEngine {
    options: StitchOptions,
    cancel: CancelToken,
}

impl StitchEngine {
    /// Create an engine with the given options.
    #[must_use]
    pub fn new(options: StitchOptions) -> Self {
        Self {
            options,
            cancel: CancelToken::new(),
        }
    }

    /// Attach a cancellation token.
    #[must_use]
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// The options this engine stitches with.
    #[must_use]
    pub fn options(&self) -> &StitchOptions {
        &self.options
    }

    /// Compute the overlap table for `images`.
    ///
    /// Pairs are independent and run on the rayon pool when the `parallel`
    /// feature is enabled; the result is identical either way.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] if the token fires between pairs.
    pub fn overlaps(&self, images: &[RgbaImage]) -> Result<Vec<u32>> {
        if images.is_empty() {
            return Ok(Vec::new());
        }

        #[cfg(feature = "parallel")]
        let tail: Vec<u32> = {
            use rayon::prelude::*;
            (1..images.len())
                .into_par_iter()
                .map(|i| self.pair_overlap(images, i))
                .collect::<Result<_>>()?
        };

        #[cfg(not(feature = "parallel"))]
        let tail: Vec<u32> = (1..images.len())
            .map(|i| self.pair_overlap(images, i))
            .collect::<Result<_>>()?;

        let mut overlaps = Vec::with_capacity(images.len());
        overlaps.push(0);
        overlaps.extend(tail);
        Ok(overlaps)
    }

    /// Overlap between `images[i - 1]` and `images[i]`, kept within the rows
    /// both images show on the canvas.
    fn pair_overlap(&self, images: &[RgbaImage], i: usize) -> Result<u32> {
        self.cancel.check()?;

        let crop = self.options.header_height;
        let (top, bottom) = (&images[i - 1], &images[i]);
        if crop > 0 && bottom.height() <= crop {
            log::warn!(
                "header crop of {crop}px consumes image #{i} ({}px tall); it is kept uncropped",
                bottom.height()
            );
        }

        let overlap =
            detection::detect_overlap_with_tolerance(top, bottom, crop, self.options.row_tolerance);

        // The top image may itself be cropped on the canvas, hiding part of
        // the matched band.
        let visible = effective_height(i - 1, top.height(), crop);
        let limit = visible.min(effective_height(i, bottom.height(), crop));
        if overlap > limit {
            log::warn!(
                "overlap of {overlap}px between #{} and #{i} exceeds the {limit}px left after cropping, treating as a seam",
                i - 1
            );
            return Ok(0);
        }

        log::debug!("overlap #{}->#{i}: {overlap}px", i - 1);
        Ok(overlap)
    }

    /// Detect overlaps and composite `images`.
    ///
    /// # Errors
    ///
    /// - [`Error::EmptyInput`] if `images` is empty.
    /// - [`Error::Cancelled`] if the token fires before painting.
    /// - [`Error::Allocation`] if the canvas cannot be allocated.
    pub fn stitch(&self, images: &[RgbaImage]) -> Result<Stitched> {
        if images.is_empty() {
            return Err(Error::EmptyInput);
        }
        let overlaps = self.overlaps(images)?;
        self.cancel.check()?;

        let canvas = compositor::stitch(
            images,
            &overlaps,
            self.options.header_height,
            &self.options.separator,
        )?;
        log::info!(
            "stitched {} images into {}x{}",
            images.len(),
            canvas.width(),
            canvas.height()
        );
        Ok(Stitched { canvas, overlaps })
    }

    /// Decode, stitch and PNG-encode a sequence of encoded images.
    ///
    /// Zero payloads produce [`StitchOutput::empty()`] rather than an error.
    ///
    /// # Errors
    ///
    /// [`Error::Decode`] for the first payload that fails to decode, plus
    /// everything [`StitchEngine::stitch`] returns apart from `EmptyInput`.
    pub fn stitch_encoded<B>(&self, payloads: &[B]) -> Result<StitchOutput>
    where
        B: AsRef<[u8]> + Sync,
    {
        if payloads.is_empty() {
            return Ok(StitchOutput::empty());
        }
        let images = decode_images(payloads)?;
        let Stitched { canvas, overlaps } = self.stitch(&images)?;
        Ok(StitchOutput {
            png: encode_png(&canvas)?,
            width: canvas.width(),
            height: canvas.height(),
            overlaps,
        })
    }

    /// Read, decode and stitch image files in the given order.
    ///
    /// # Errors
    ///
    /// [`Error::Io`] if a file cannot be read, [`Error::Decode`] if one cannot
    /// be decoded, plus everything [`StitchEngine::stitch`] returns.
    pub fn stitch_files(&self, paths: &[PathBuf]) -> Result<Stitched> {
        let payloads = paths
            .iter()
            .map(std::fs::read)
            .collect::<std::io::Result<Vec<_>>>()?;
        let images = decode_images(&payloads)?;
        self.stitch(&images)
    }
}

/// Decode encoded images to RGBA8, preserving order.
///
/// # Errors
///
/// Returns [`Error::Decode`] naming the lowest-indexed payload that fails,
/// whether or not decoding runs in parallel.
pub fn decode_images<B>(payloads: &[B]) -> Result<Vec<RgbaImage>>
where
    B: AsRef<[u8]> + Sync,
{
    let decode = |(index, bytes): (usize, &B)| {
        image::load_from_memory(bytes.as_ref())
            .map(|img| img.to_rgba8())
            .map_err(|source| Error::Decode { index, source })
    };

    #[cfg(feature = "parallel")]
    let decoded: Vec<Result<RgbaImage>> = {
        use rayon::prelude::*;
        payloads.par_iter().enumerate().map(decode).collect()
    };

    #[cfg(not(feature = "parallel"))]
    let decoded: Vec<Result<RgbaImage>> = payloads.iter().enumerate().map(decode).collect();

    // Results are in input order, so the first error has the lowest index.
    decoded.into_iter().collect()
}

/// Encode an RGBA canvas as PNG.
///
/// # Errors
///
/// Returns [`Error::Image`] if the encoder fails (e.g. a zero-sized canvas).
pub fn encode_png(img: &RgbaImage) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    PngEncoder::new(&mut buf).write_image(
        img.as_raw(),
        img.width(),
        img.height(),
        ExtendedColorType::Rgba8,
    )?;
    Ok(buf)
}

/// Check if a file has a supported image extension.
#[must_use]
pub fn is_supported_image(path: &Path) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => matches!(
            ext.to_lowercase().as_str(),
            "jpg" | "jpeg" | "png" | "webp" | "bmp"
        ),
        None => false,
    }
}

/// Save a stitched canvas, choosing the encoder from the file extension.
///
/// PNG, WebP and BMP keep the alpha channel. JPEG drops it and is written at
/// quality 100.
///
/// # Errors
///
/// Returns an error if the format is unsupported or writing fails.
pub fn save_image(img: &RgbaImage, path: &Path) -> Result<()> {
    let format =
        ImageFormat::from_path(path).map_err(|e| Error::UnsupportedFormat(e.to_string()))?;

    match format {
        ImageFormat::Jpeg => {
            let rgb = DynamicImage::ImageRgb8(img.convert());
            let file = std::fs::File::create(path)?;
            let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(file, 100);
            encoder.encode_image(&rgb)?;
        }
        ImageFormat::Png | ImageFormat::WebP | ImageFormat::Bmp => {
            img.save_with_format(path, format)?;
        }
        _ => {
            return Err(Error::UnsupportedFormat(format!("{format:?}")));
        }
    }

    Ok(())
}

/// Generate a default output path from the first input.
///
/// Example: `"shots/01.png"` becomes `"shots/01_stitched.png"`.
#[must_use]
pub fn default_output_path(first_input: &Path) -> PathBuf {
    let stem = first_input.file_stem().unwrap_or_default().to_string_lossy();
    let parent = first_input.parent().unwrap_or(Path::new("."));
    parent.join(format!("{stem}_stitched.png"))
}

/// Expand directories to their supported image files and order the inputs.
///
/// Unless `keep_order` is set, all files are sorted by [`natural_cmp`] on
/// their file names, so `2.png` comes before `10.png`.
///
/// # Errors
///
/// Returns [`Error::Io`] if a directory cannot be read.
pub fn collect_inputs(inputs: &[PathBuf], keep_order: bool) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut entries = Vec::new();
            for entry in std::fs::read_dir(input)? {
                let path = entry?.path();
                if path.is_file() && is_supported_image(&path) {
                    entries.push(path);
                }
            }
            entries.sort_by(|a, b| natural_cmp(&file_name(a), &file_name(b)));
            files.extend(entries);
        } else {
            files.push(input.clone());
        }
    }

    if !keep_order {
        files.sort_by(|a, b| natural_cmp(&file_name(a), &file_name(b)));
    }
    Ok(files)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Case-insensitive comparison that orders digit runs by numeric value.
#[must_use]
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let (mut x, mut y) = (a.chars().peekable(), b.chars().peekable());
    loop {
        match (x.peek().copied(), y.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(ca), Some(cb)) if ca.is_ascii_digit() && cb.is_ascii_digit() => {
                let ord = cmp_digit_runs(&take_digits(&mut x), &take_digits(&mut y));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(ca), Some(cb)) => {
                x.next();
                y.next();
                let ord = ca.to_lowercase().cmp(cb.to_lowercase());
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

fn take_digits(it: &mut Peekable<Chars<'_>>) -> String {
    let mut run = String::new();
    while let Some(c) = it.next_if(char::is_ascii_digit) {
        run.push(c);
    }
    run
}

fn cmp_digit_runs(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn default_output_path_appends_stitched_suffix() {
        let p = default_output_path(Path::new("/tmp/shots/01.jpg"));
        assert_eq!(p, PathBuf::from("/tmp/shots/01_stitched.png"));

        let p = default_output_path(Path::new("page.png"));
        assert_eq!(
            p.file_name().unwrap().to_str().unwrap(),
            "page_stitched.png"
        );
    }

    #[test]
    fn is_supported_image_accepts_common_formats() {
        assert!(is_supported_image(Path::new("shot.jpg")));
        assert!(is_supported_image(Path::new("shot.JPEG")));
        assert!(is_supported_image(Path::new("shot.png")));
        assert!(is_supported_image(Path::new("shot.webp")));
        assert!(is_supported_image(Path::new("shot.bmp")));
    }

    #[test]
    fn is_supported_image_rejects_unsupported_formats() {
        assert!(!is_supported_image(Path::new("shot.gif")));
        assert!(!is_supported_image(Path::new("shot.txt")));
        assert!(!is_supported_image(Path::new("shot")));
    }

    #[test]
    fn natural_cmp_orders_numbers_by_value() {
        let mut names = vec!["10.png", "2.png", "1.png", "Shot 3.png", "shot 20.png", "02b.png"];
        names.sort_by(|a, b| natural_cmp(a, b));
        assert_eq!(
            names,
            vec!["1.png", "2.png", "02b.png", "10.png", "Shot 3.png", "shot 20.png"]
        );
    }

    #[test]
    fn natural_cmp_ignores_case() {
        assert_eq!(natural_cmp("ABC.png", "abc.png"), Ordering::Equal);
        assert_eq!(natural_cmp("a", "B"), Ordering::Less);
    }

    #[test]
    fn cancel_token_is_shared_between_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn overlap_beyond_cropped_top_becomes_seam() {
        // Uniform images match as soon as the scan starts. The middle image
        // is 60px tall and loses 40px to the crop, so it shows only 20 rows:
        // the 30px match against the last image cannot be honoured.
        let px = Rgba([5, 5, 5, 255]);
        let images = vec![
            RgbaImage::from_pixel(10, 100, px),
            RgbaImage::from_pixel(10, 60, px),
            RgbaImage::from_pixel(10, 100, px),
        ];
        let engine = StitchEngine::new(StitchOptions {
            header_height: 40,
            ..StitchOptions::default()
        });
        let overlaps = engine.overlaps(&images).unwrap();
        assert_eq!(overlaps, vec![0, 20, 0]);
    }

    #[test]
    fn encode_png_round_trips_pixels() {
        let img = RgbaImage::from_pixel(3, 2, Rgba([1, 2, 3, 4]));
        let bytes = encode_png(&img).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap().to_rgba8();
        assert_eq!(decoded, img);
    }

    #[test]
    fn decode_images_reports_lowest_failing_index() {
        let good = encode_png(&RgbaImage::from_pixel(4, 4, Rgba([7, 7, 7, 255]))).unwrap();
        let payloads = vec![good.clone(), b"junk".to_vec(), good, b"more junk".to_vec()];
        for _ in 0..8 {
            let err = decode_images(&payloads).unwrap_err();
            assert!(matches!(err, Error::Decode { index: 1, .. }), "{err}");
        }
    }

    #[test]
    fn save_image_writes_jpeg_without_alpha() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jpg");
        let img = RgbaImage::from_pixel(16, 9, Rgba([200, 100, 50, 128]));
        save_image(&img, &path).unwrap();

        let reopened = image::open(&path).unwrap();
        assert_eq!((reopened.width(), reopened.height()), (16, 9));
        assert!(!reopened.color().has_alpha());
    }

    #[test]
    fn collect_inputs_keeps_command_line_order() {
        let inputs = vec![PathBuf::from("shots/10.png"), PathBuf::from("shots/2.png")];
        assert_eq!(collect_inputs(&inputs, true).unwrap(), inputs);

        let sorted = collect_inputs(&inputs, false).unwrap();
        assert_eq!(
            sorted,
            vec![PathBuf::from("shots/2.png"), PathBuf::from("shots/10.png")]
        );
    }

    #[test]
    fn collect_inputs_expands_directories_between_files() {
        let dir = tempfile::tempdir().unwrap();
        let shots = dir.path().join("shots");
        std::fs::create_dir(&shots).unwrap();
        for name in ["10.png", "3.png", "notes.txt"] {
            std::fs::write(shots.join(name), b"").unwrap();
        }
        let first = dir.path().join("20.png");
        let last = dir.path().join("1.png");
        let inputs = vec![first.clone(), shots.clone(), last.clone()];

        // The directory expands in natural order and sits where it was named.
        let kept = collect_inputs(&inputs, true).unwrap();
        assert_eq!(
            kept,
            vec![first.clone(), shots.join("3.png"), shots.join("10.png"), last.clone()]
        );

        let sorted = collect_inputs(&inputs, false).unwrap();
        assert_eq!(
            sorted,
            vec![last, shots.join("3.png"), shots.join("10.png"), first]
        );
    }
}

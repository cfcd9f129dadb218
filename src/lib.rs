//! Stitch vertically scrolled screenshots into one image.
//!
//! Consecutive screenshots of a scrolling page usually repeat a band of rows.
//! This crate finds that band pixel by pixel, optionally strips a header
//! banner repeated on every capture, and paints the whole sequence onto a
//! single canvas.
//!
//! # Quick Start
//!
//! ```no_run
//! use screenshot_stitcher::{StitchEngine, StitchOptions};
//!
//! let images: Vec<_> = ["1.png", "2.png", "3.png"]
//!     .iter()
//!     .map(|p| image::open(p).unwrap().to_rgba8())
//!     .collect();
//!
//! let engine = StitchEngine::new(StitchOptions::default());
//! let stitched = engine.stitch(&images).expect("stitch failed");
//! println!("overlaps: {:?}", stitched.overlaps);
//! stitched.canvas.save("stitched.png").unwrap();
//! ```
//!
//! # Building blocks
//!
//! [`detection::detect_overlap`] and [`compositor::stitch`] can be used
//! directly when the overlap table comes from somewhere else.
//!
//! ```no_run
//! use screenshot_stitcher::compositor::{self, SeparatorStyle};
//! use screenshot_stitcher::detection;
//!
//! let a = image::open("1.png").unwrap().to_rgba8();
//! let b = image::open("2.png").unwrap().to_rgba8();
//! let crop = 48;
//! let overlap = detection::detect_overlap(&a, &b, crop);
//! let canvas = compositor::stitch(&[a, b], &[0, overlap], crop, &SeparatorStyle::thin())
//!     .expect("stitch failed");
//! ```

#![deny(missing_docs)]

pub mod analysis;
pub mod compositor;
pub mod detection;
mod engine;
pub mod error;

pub use analysis::{resolve_header_height, AnalysisIssue, AnalysisReport, IssueKind};
pub use compositor::{CanvasLayout, Placement, SeparatorStyle};
pub use engine::{
    collect_inputs, decode_images, default_output_path, encode_png, is_supported_image,
    natural_cmp, save_image, CancelToken, StitchEngine, StitchOptions, StitchOutput, Stitched,
};
pub use error::{Error, Result};

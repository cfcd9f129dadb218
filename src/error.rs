//! Error types for the screenshot-stitcher crate.

/// Errors that can occur while decoding, stitching or encoding screenshots.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An input payload could not be decoded as a raster image.
    #[error("failed to decode image #{index}: {source}")]
    Decode {
        /// Position of the offending input in the sequence.
        index: usize,
        /// Underlying decoder error.
        source: image::ImageError,
    },

    /// No images were supplied to the compositor.
    #[error("no images to stitch")]
    EmptyInput,

    /// The output canvas cannot be sized or allocated.
    #[error("cannot allocate {width}x{height} canvas")]
    Allocation {
        /// Requested canvas width in pixels.
        width: u64,
        /// Requested canvas height in pixels.
        height: u64,
    },

    /// The overlap table length does not match the image count.
    #[error("overlap table has {actual} entries, expected {expected}")]
    OverlapCount {
        /// Number of images.
        expected: usize,
        /// Number of overlap entries supplied.
        actual: usize,
    },

    /// An overlap entry is larger than the rows both neighbours contribute.
    #[error("overlap {overlap} at image #{index} exceeds limit {limit}")]
    InvalidOverlap {
        /// Index of the image the overlap belongs to.
        index: usize,
        /// Overlap value supplied.
        overlap: u32,
        /// Largest overlap allowed at this seam.
        limit: u32,
    },

    /// A separator color string is not `#RRGGBB`.
    #[error("invalid color {0:?}, expected #RRGGBB")]
    InvalidColor(String),

    /// The operation was cancelled before producing output.
    #[error("stitching cancelled")]
    Cancelled,

    /// An analysis report could not be parsed.
    #[error("invalid analysis report: {0}")]
    Analysis(#[from] serde_json::Error),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The image format is not supported.
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),

    /// An error occurred during image processing (encode, save).
    #[error("image processing error: {0}")]
    Image(#[from] image::ImageError),
}

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let io_err = Error::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert!(io_err.to_string().contains("gone"));

        let unsupported = Error::UnsupportedFormat("tiff".to_string());
        assert!(unsupported.to_string().contains("tiff"));

        let alloc = Error::Allocation {
            width: 10,
            height: 20,
        };
        assert!(alloc.to_string().contains("10x20"));

        let overlap = Error::InvalidOverlap {
            index: 2,
            overlap: 90,
            limit: 40,
        };
        let msg = overlap.to_string();
        assert!(msg.contains("#2"));
        assert!(msg.contains("90"));
        assert!(msg.contains("40"));

        let color = Error::InvalidColor("blue".to_string());
        assert!(color.to_string().contains("\"blue\""));
    }
}

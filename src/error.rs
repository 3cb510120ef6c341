//! Contains the error type shared by every fallible operation in the crate.

use std::path::PathBuf;
use thiserror::Error;

/// The broad category a [`MosaicError`] belongs to.
///
/// Callers that only need to decide how to react to an error (e.g., which message to show)
/// can match on this instead of the individual [`MosaicError`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A precondition on the input was violated: a zero dimension, an empty image,
    /// an empty palette, an out of range cluster count, or a malformed color.
    InvalidInput,
    /// The image loader could not decode the given file.
    UnsupportedImageFormat,
    /// The chip is larger than the wall, so the grid would not have any cells.
    GeometryDegenerate,
}

/// An error returned by the clustering, indexing, or composition functions.
#[derive(Debug, Error)]
pub enum MosaicError {
    /// The image does not contain any pixels.
    #[error("empty image")]
    EmptyImage,

    /// The number of clusters requested was zero or more than the number of pixels.
    #[error("invalid cluster count {k}: must be between 1 and {max}")]
    InvalidClusterCount {
        /// The requested number of clusters.
        k: usize,
        /// The number of pixels available to cluster.
        max: u64,
    },

    /// A nearest color query was made against an empty palette.
    #[error("no chip colors available")]
    EmptyPalette,

    /// One of the wall or chip dimensions was zero.
    #[error("{name} must be a positive integer")]
    NonPositiveDimension {
        /// The name of the offending dimension, e.g., `chip_width`.
        name: &'static str,
    },

    /// A nearest color query had a NaN or infinite component.
    #[error("color {0:?} has a non-finite component")]
    NonFiniteColor([f64; 3]),

    /// The text could not be parsed as a `#rrggbb` color.
    #[error("invalid hex color {0:?}")]
    InvalidHexColor(String),

    /// A chip of the given size does not fit on the wall even once.
    #[error(
        "a {chip_width}x{chip_height} chip does not fit on a {wall_width}x{wall_height} wall"
    )]
    GeometryDegenerate {
        /// The wall width.
        wall_width: u32,
        /// The wall height.
        wall_height: u32,
        /// The chip width.
        chip_width: u32,
        /// The chip height.
        chip_height: u32,
    },

    /// The image at `path` could not be decoded.
    #[error("image {} could not be loaded", path.display())]
    UnsupportedImageFormat {
        /// The path that was read.
        path: PathBuf,
        /// The underlying decoding error.
        source: image::ImageError,
    },
}

impl MosaicError {
    /// Returns the category of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            MosaicError::EmptyImage
            | MosaicError::InvalidClusterCount { .. }
            | MosaicError::EmptyPalette
            | MosaicError::NonPositiveDimension { .. }
            | MosaicError::NonFiniteColor(_)
            | MosaicError::InvalidHexColor(_) => ErrorKind::InvalidInput,
            MosaicError::GeometryDegenerate { .. } => ErrorKind::GeometryDegenerate,
            MosaicError::UnsupportedImageFormat { .. } => ErrorKind::UnsupportedImageFormat,
        }
    }
}

/// A `Result` with [`MosaicError`] as the default error type.
pub type Result<T, E = MosaicError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_taxonomy() {
        assert_eq!(MosaicError::EmptyImage.kind(), ErrorKind::InvalidInput);
        assert_eq!(MosaicError::EmptyPalette.kind(), ErrorKind::InvalidInput);
        assert_eq!(
            MosaicError::InvalidClusterCount { k: 0, max: 4 }.kind(),
            ErrorKind::InvalidInput
        );
        assert_eq!(
            MosaicError::NonFiniteColor([f64::NAN, 0.0, 0.0]).kind(),
            ErrorKind::InvalidInput
        );
        assert_eq!(
            MosaicError::NonPositiveDimension { name: "chip_width" }.kind(),
            ErrorKind::InvalidInput
        );
        assert_eq!(
            MosaicError::GeometryDegenerate {
                wall_width: 10,
                wall_height: 10,
                chip_width: 20,
                chip_height: 5,
            }
            .kind(),
            ErrorKind::GeometryDegenerate
        );
    }

    #[test]
    fn messages() {
        assert_eq!(MosaicError::EmptyImage.to_string(), "empty image");
        assert_eq!(MosaicError::EmptyPalette.to_string(), "no chip colors available");
        assert_eq!(
            MosaicError::InvalidClusterCount { k: 0, max: 4 }.to_string(),
            "invalid cluster count 0: must be between 1 and 4"
        );
    }
}

//! Color helpers: distances in RGB space and `#rrggbb` formatting.

use crate::{MosaicError, Result};
use palette::{cast, Srgb};

/// Squared euclidean distance between two points.
#[inline]
#[must_use]
pub fn squared_distance<const N: usize>(x: [f64; N], y: [f64; N]) -> f64 {
    let mut dist = 0.0;
    for c in 0..N {
        let d = x[c] - y[c];
        dist += d * d;
    }
    dist
}

/// The euclidean distance between two colors in RGB space.
///
/// # Examples
/// ```
/// # use chipwall::distance;
/// # use palette::Srgb;
/// let d = distance(Srgb::new(0, 0, 0), Srgb::new(3, 4, 0));
/// assert!((d - 5.0).abs() < 1e-12);
/// ```
#[must_use]
pub fn distance(a: Srgb<u8>, b: Srgb<u8>) -> f64 {
    squared_distance(components(a), components(b)).sqrt()
}

/// Converts a color into a point in RGB space.
#[inline]
#[must_use]
pub fn components(color: Srgb<u8>) -> [f64; 3] {
    cast::into_array(color).map(f64::from)
}

/// Rounds a point in RGB space to the nearest color, clamping each component to `0..=255`.
#[must_use]
pub fn from_components(point: [f64; 3]) -> Srgb<u8> {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let components = point.map(|c| c.round().clamp(0.0, 255.0) as u8);
    cast::from_array(components)
}

/// Formats a color as `#rrggbb` using lowercase hexadecimal digits.
///
/// # Examples
/// ```
/// # use chipwall::to_hex;
/// # use palette::Srgb;
/// assert_eq!(to_hex(Srgb::new(16, 2, 200)), "#1002c8");
/// ```
#[must_use]
pub fn to_hex(color: Srgb<u8>) -> String {
    let (r, g, b) = color.into_components();
    format!("#{r:02x}{g:02x}{b:02x}")
}

/// Parses a color from `#rrggbb`, `rrggbb`, or the shorthand `#rgb`.
///
/// # Errors
/// Returns [`MosaicError::InvalidHexColor`] if `text` is not a hex color.
pub fn parse_hex(text: &str) -> Result<Srgb<u8>> {
    text.trim()
        .parse::<Srgb<u8>>()
        .map_err(|_| MosaicError::InvalidHexColor(text.to_owned()))
}

//! Contains the code for color/pixel deduplication.

use crate::types::image_colors;
use image::RgbImage;
use palette::Srgb;
#[cfg(feature = "threads")]
use rayon::prelude::*;

/// Packs a color into a `u32` key that sorts in the same order as its components.
#[inline]
fn pack(color: Srgb<u8>) -> u32 {
    let (r, g, b) = color.into_components();
    (u32::from(r) << 16) | (u32::from(g) << 8) | u32::from(b)
}

/// The inverse of [`pack`].
#[inline]
#[allow(clippy::cast_possible_truncation)]
fn unpack(key: u32) -> Srgb<u8> {
    Srgb::new((key >> 16) as u8, (key >> 8) as u8, key as u8)
}

/// The distinct colors of an image together with the number of pixels having each color.
///
/// Clustering the distinct colors weighted by their counts gives the same result
/// as clustering every pixel, but is usually much faster since photos tend to repeat colors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueColorCounts {
    /// The distinct colors in ascending component order.
    colors: Vec<Srgb<u8>>,
    /// The number of times each color in `colors` was present.
    counts: Vec<u64>,
    /// The number of input colors, i.e., the sum of `counts`.
    total_count: u64,
}

impl UniqueColorCounts {
    /// Deduplicates the given colors.
    #[must_use]
    pub fn new(colors: &[Srgb<u8>]) -> Self {
        let mut keys = colors.iter().copied().map(pack).collect::<Vec<_>>();
        keys.sort_unstable();
        Self::from_sorted_keys(&keys)
    }

    /// Deduplicates the given colors in parallel.
    #[cfg(feature = "threads")]
    #[must_use]
    pub fn new_par(colors: &[Srgb<u8>]) -> Self {
        let mut keys = colors.par_iter().copied().map(pack).collect::<Vec<_>>();
        keys.par_sort_unstable();
        Self::from_sorted_keys(&keys)
    }

    /// Deduplicates the pixels of an image.
    #[must_use]
    pub fn from_rgbimage(image: &RgbImage) -> Self {
        Self::new(image_colors(image))
    }

    /// Deduplicates the pixels of an image in parallel.
    #[cfg(feature = "threads")]
    #[must_use]
    pub fn from_rgbimage_par(image: &RgbImage) -> Self {
        Self::new_par(image_colors(image))
    }

    /// Run-length encodes sorted keys.
    fn from_sorted_keys(keys: &[u32]) -> Self {
        let mut colors = Vec::new();
        let mut counts = Vec::new();

        let mut rest = keys;
        while let Some(&key) = rest.first() {
            let run = rest.iter().take_while(|&&k| k == key).count();
            colors.push(unpack(key));
            counts.push(run as u64);
            rest = &rest[run..];
        }

        Self {
            colors,
            counts,
            total_count: keys.len() as u64,
        }
    }

    /// The distinct colors in ascending component order.
    #[must_use]
    pub fn colors(&self) -> &[Srgb<u8>] {
        &self.colors
    }

    /// The number of pixels having each color returned by [`UniqueColorCounts::colors`].
    ///
    /// Every count is nonzero.
    #[must_use]
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// The number of pixels before deduplication.
    #[must_use]
    pub const fn total_count(&self) -> u64 {
        self.total_count
    }

    /// The number of distinct colors.
    #[must_use]
    pub fn num_colors(&self) -> usize {
        self.colors.len()
    }

    /// Whether there are no colors at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }
}

//! Contains the palette and grid geometry types needed across the crate.

use crate::{color::to_hex, MosaicError, Result};
use image::RgbImage;
use palette::{cast::ComponentsAs, Srgb};
use std::ops::{Deref, Range};

/// An ordered list of chip colors owned by the caller.
///
/// Colors need not be unique. The order of the colors is the tie-break order for
/// nearest color queries: when two chips are equally close to a color, the one that
/// comes first in the palette is chosen.
///
/// # Examples
/// ```
/// # use chipwall::Palette;
/// # use palette::Srgb;
/// let mut palette = Palette::new();
/// palette.push(Srgb::new(255, 0, 0));
/// palette.push(Srgb::new(0, 0, 255));
/// palette.remove(0);
/// assert_eq!(palette.as_slice(), &[Srgb::new(0, 0, 255)]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[repr(transparent)]
pub struct Palette(Vec<Srgb<u8>>);

impl Palette {
    /// Creates an empty [`Palette`].
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Appends a chip color to the end of the palette.
    pub fn push(&mut self, color: Srgb<u8>) {
        self.0.push(color);
    }

    /// Inserts a chip color at `index`, shifting later colors back.
    ///
    /// Returns `false` and leaves the palette unchanged if `index` is greater than the length.
    pub fn insert(&mut self, index: usize, color: Srgb<u8>) -> bool {
        if index <= self.0.len() {
            self.0.insert(index, color);
            true
        } else {
            false
        }
    }

    /// Removes and returns the chip color at `index`, or `None` if it is out of bounds.
    pub fn remove(&mut self, index: usize) -> Option<Srgb<u8>> {
        (index < self.0.len()).then(|| self.0.remove(index))
    }

    /// Removes all colors from the palette.
    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// The colors as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[Srgb<u8>] {
        &self.0
    }

    /// Gets the inner `Vec` of colors.
    #[must_use]
    pub fn into_inner(self) -> Vec<Srgb<u8>> {
        self.0
    }

    /// Formats every color as `#rrggbb`, in palette order.
    #[must_use]
    pub fn to_hex(&self) -> Vec<String> {
        self.0.iter().copied().map(to_hex).collect()
    }
}

impl Deref for Palette {
    type Target = [Srgb<u8>];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<[Srgb<u8>]> for Palette {
    fn as_ref(&self) -> &[Srgb<u8>] {
        self
    }
}

impl From<Vec<Srgb<u8>>> for Palette {
    fn from(colors: Vec<Srgb<u8>>) -> Self {
        Self(colors)
    }
}

impl From<&[Srgb<u8>]> for Palette {
    fn from(colors: &[Srgb<u8>]) -> Self {
        Self(colors.to_vec())
    }
}

impl From<Palette> for Vec<Srgb<u8>> {
    fn from(palette: Palette) -> Self {
        palette.into_inner()
    }
}

impl FromIterator<Srgb<u8>> for Palette {
    fn from_iter<I: IntoIterator<Item = Srgb<u8>>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<Srgb<u8>> for Palette {
    fn extend<I: IntoIterator<Item = Srgb<u8>>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

impl IntoIterator for Palette {
    type Item = Srgb<u8>;
    type IntoIter = std::vec::IntoIter<Srgb<u8>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Palette {
    type Item = &'a Srgb<u8>;
    type IntoIter = std::slice::Iter<'a, Srgb<u8>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// The size of the wall and of each chip, and the grid of cells they produce.
///
/// All four dimensions share one linear unit, which is also the pixel unit of the composed mosaic.
/// The grid has `wall_width / chip_width` columns and `wall_height / chip_height` rows,
/// rounded down.
/// Any strip of the wall narrower than a chip is not part of the grid and is left uncovered.
///
/// # Examples
/// ```
/// # use chipwall::Geometry;
/// # fn main() -> Result<(), chipwall::MosaicError> {
/// let geometry = Geometry::new(100, 50, 30, 25)?;
/// assert_eq!((geometry.cols(), geometry.rows()), (3, 2));
/// assert_eq!(geometry.uncovered_width(), 10);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Geometry {
    /// The wall width.
    wall_width: u32,
    /// The wall height.
    wall_height: u32,
    /// The chip width.
    chip_width: u32,
    /// The chip height.
    chip_height: u32,
}

impl Geometry {
    /// Creates a new [`Geometry`] after validating the dimensions.
    ///
    /// # Errors
    /// Returns [`MosaicError::NonPositiveDimension`] if any dimension is zero,
    /// or [`MosaicError::GeometryDegenerate`] if the chip is wider or taller than the wall.
    pub fn new(
        wall_width: u32,
        wall_height: u32,
        chip_width: u32,
        chip_height: u32,
    ) -> Result<Self> {
        for (name, value) in [
            ("wall_width", wall_width),
            ("wall_height", wall_height),
            ("chip_width", chip_width),
            ("chip_height", chip_height),
        ] {
            if value == 0 {
                return Err(MosaicError::NonPositiveDimension { name });
            }
        }

        if chip_width > wall_width || chip_height > wall_height {
            return Err(MosaicError::GeometryDegenerate {
                wall_width,
                wall_height,
                chip_width,
                chip_height,
            });
        }

        Ok(Self { wall_width, wall_height, chip_width, chip_height })
    }

    /// The wall width.
    #[must_use]
    pub const fn wall_width(&self) -> u32 {
        self.wall_width
    }

    /// The wall height.
    #[must_use]
    pub const fn wall_height(&self) -> u32 {
        self.wall_height
    }

    /// The chip width.
    #[must_use]
    pub const fn chip_width(&self) -> u32 {
        self.chip_width
    }

    /// The chip height.
    #[must_use]
    pub const fn chip_height(&self) -> u32 {
        self.chip_height
    }

    /// The number of grid columns. Always at least `1`.
    #[must_use]
    pub const fn cols(&self) -> u32 {
        self.wall_width / self.chip_width
    }

    /// The number of grid rows. Always at least `1`.
    #[must_use]
    pub const fn rows(&self) -> u32 {
        self.wall_height / self.chip_height
    }

    /// The total number of cells in the grid.
    #[must_use]
    pub const fn num_cells(&self) -> u64 {
        self.cols() as u64 * self.rows() as u64
    }

    /// The width of the wall covered by chips.
    #[must_use]
    pub const fn covered_width(&self) -> u32 {
        self.cols() * self.chip_width
    }

    /// The height of the wall covered by chips.
    #[must_use]
    pub const fn covered_height(&self) -> u32 {
        self.rows() * self.chip_height
    }

    /// The width of the uncovered strip along the right edge of the wall.
    #[must_use]
    pub const fn uncovered_width(&self) -> u32 {
        self.wall_width - self.covered_width()
    }

    /// The height of the uncovered strip along the bottom edge of the wall.
    #[must_use]
    pub const fn uncovered_height(&self) -> u32 {
        self.wall_height - self.covered_height()
    }

    /// The horizontal and vertical pixel ranges of the cell at (`col`, `row`).
    ///
    /// Returns `None` if the cell is outside the grid.
    #[must_use]
    pub fn cell_rect(&self, col: u32, row: u32) -> Option<(Range<u32>, Range<u32>)> {
        (col < self.cols() && row < self.rows()).then(|| {
            let x = col * self.chip_width;
            let y = row * self.chip_height;
            (x..(x + self.chip_width), y..(y + self.chip_height))
        })
    }
}

/// Reinterprets the pixels of an image as a slice of colors in row-major order.
pub(crate) fn image_colors(image: &RgbImage) -> &[Srgb<u8>] {
    let pixels = image.pixels().len();
    image.as_raw()[..(pixels * 3)].components_as()
}

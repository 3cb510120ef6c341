//! Mosaic composition: reduces an image to one representative color per grid cell
//! and fills each cell of the wall with the closest chip color.

use crate::{Geometry, MosaicError, NearestColorIndex, Palette, Result};

use image::{
    imageops::{self, FilterType},
    Rgb, RgbImage,
};
use log::debug;
use palette::{cast, Srgb};
use std::ops::Range;

#[cfg(feature = "threads")]
use rayon::prelude::*;

/// How the representative color of each grid cell is taken from the source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Sampling {
    /// The mean of all source pixels in the block that maps to the cell,
    /// where the image is split into `cols × rows` blocks of (nearly) equal area.
    ///
    /// If the image has fewer pixels than the grid along a dimension,
    /// neighboring cells share the same source pixels.
    #[default]
    BlockAverage,
    /// Resizes the whole image to `cols × rows` pixels with a bilinear filter
    /// and uses each resized pixel as the color of its cell.
    Resize,
}

/// A builder struct to specify options for mosaic composition.
///
/// # Examples
/// ```
/// # use chipwall::{MosaicOptions, Sampling};
/// # use palette::Srgb;
/// let options = MosaicOptions::new()
///     .sampling(Sampling::Resize)
///     .background(Srgb::new(255, 255, 255));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MosaicOptions {
    /// How cell colors are sampled.
    sampling: Sampling,
    /// The color of the wall area not covered by any cell.
    background: Srgb<u8>,
}

impl Default for MosaicOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl MosaicOptions {
    /// The default background color, black.
    pub const DEFAULT_BACKGROUND: Srgb<u8> = Srgb::new(0, 0, 0);

    /// Creates a new [`MosaicOptions`] with default values.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            sampling: Sampling::BlockAverage,
            background: Self::DEFAULT_BACKGROUND,
        }
    }

    /// Sets how the color of each cell is sampled from the image.
    ///
    /// The default is [`Sampling::BlockAverage`].
    #[must_use]
    pub const fn sampling(mut self, sampling: Sampling) -> Self {
        self.sampling = sampling;
        self
    }

    /// Sets the color of the uncovered strips along the right and bottom edges of the wall.
    ///
    /// The default is [`MosaicOptions::DEFAULT_BACKGROUND`].
    #[must_use]
    pub const fn background(mut self, background: Srgb<u8>) -> Self {
        self.background = background;
        self
    }

    /// Gets the sampling method.
    #[must_use]
    pub const fn get_sampling(&self) -> Sampling {
        self.sampling
    }

    /// Gets the background color.
    #[must_use]
    pub const fn get_background(&self) -> Srgb<u8> {
        self.background
    }
}

/// A composed mosaic: the rendered wall and the layout plan behind it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mosaic {
    /// The rendered wall of `wall_width × wall_height` pixels.
    image: RgbImage,
    /// The wall and chip dimensions.
    geometry: Geometry,
    /// The palette the cells index into.
    palette: Vec<Srgb<u8>>,
    /// The palette index of every cell, row by row.
    cells: Vec<u32>,
    /// The number of cells using each palette color.
    counts: Vec<u64>,
}

impl Mosaic {
    /// The rendered wall.
    #[must_use]
    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    /// Takes the rendered wall.
    #[must_use]
    pub fn into_image(self) -> RgbImage {
        self.image
    }

    /// The wall and chip dimensions.
    #[must_use]
    pub const fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// The palette colors, in their original order.
    #[must_use]
    pub fn palette(&self) -> &[Srgb<u8>] {
        &self.palette
    }

    /// The palette index assigned to every cell, in row-major order.
    #[must_use]
    pub fn cells(&self) -> &[u32] {
        &self.cells
    }

    /// The palette index assigned to the cell at (`col`, `row`).
    #[must_use]
    pub fn cell(&self, col: u32, row: u32) -> Option<usize> {
        let cols = self.geometry.cols();
        (col < cols && row < self.geometry.rows())
            .then(|| self.cells[row as usize * cols as usize + col as usize] as usize)
    }

    /// The chip color assigned to the cell at (`col`, `row`).
    #[must_use]
    pub fn cell_color(&self, col: u32, row: u32) -> Option<Srgb<u8>> {
        self.cell(col, row).map(|i| self.palette[i])
    }

    /// The number of chips of each palette color needed to build the wall.
    ///
    /// The counts are in palette order and sum to the number of cells.
    #[must_use]
    pub fn chip_counts(&self) -> &[u64] {
        &self.counts
    }

    /// Pairs each palette color with the number of chips of that color.
    pub fn bill_of_materials(&self) -> impl Iterator<Item = (Srgb<u8>, u64)> + '_ {
        self.palette.iter().copied().zip(self.counts.iter().copied())
    }
}

/// The source pixel range for cell `i` out of `n` along an image dimension of length `len`.
///
/// The range is never empty. Ranges of neighboring cells overlap by at most one pixel.
fn source_span(i: u32, n: u32, len: u32) -> Range<u32> {
    let (i, n, len) = (u64::from(i), u64::from(n), u64::from(len));
    let start = i * len / n;
    let end = ((i + 1) * len).div_ceil(n);

    #[allow(clippy::cast_possible_truncation)]
    {
        (start as u32)..(end as u32)
    }
}

/// The mean color of the source block that maps to the cell at (`col`, `row`).
#[allow(clippy::cast_precision_loss)]
fn block_average(image: &RgbImage, cols: u32, rows: u32, col: u32, row: u32) -> [f64; 3] {
    let xs = source_span(col, cols, image.width());
    let ys = source_span(row, rows, image.height());

    let stride = image.width() as usize * 3;
    let raw = image.as_raw();

    let mut sum = [0u64; 3];
    for y in ys.clone() {
        let offset = y as usize * stride;
        let pixels = &raw[(offset + xs.start as usize * 3)..(offset + xs.end as usize * 3)];
        for pixel in pixels.chunks_exact(3) {
            for (s, &c) in sum.iter_mut().zip(pixel) {
                *s += u64::from(c);
            }
        }
    }

    let n = (xs.len() * ys.len()) as f64;
    sum.map(|s| s as f64 / n)
}

/// The representative color of every cell, in row-major order.
fn cell_colors(image: &RgbImage, geometry: &Geometry, sampling: Sampling) -> Vec<[f64; 3]> {
    let (cols, rows) = (geometry.cols(), geometry.rows());
    match sampling {
        Sampling::BlockAverage => (0..rows)
            .flat_map(|row| (0..cols).map(move |col| block_average(image, cols, rows, col, row)))
            .collect(),
        Sampling::Resize => resized_colors(image, cols, rows),
    }
}

#[cfg(feature = "threads")]
fn cell_colors_par(image: &RgbImage, geometry: &Geometry, sampling: Sampling) -> Vec<[f64; 3]> {
    let (cols, rows) = (geometry.cols(), geometry.rows());
    match sampling {
        Sampling::BlockAverage => (0..(rows as usize * cols as usize))
            .into_par_iter()
            .map(|i| {
                #[allow(clippy::cast_possible_truncation)]
                let (col, row) = ((i % cols as usize) as u32, (i / cols as usize) as u32);
                block_average(image, cols, rows, col, row)
            })
            .collect(),
        Sampling::Resize => resized_colors(image, cols, rows),
    }
}

fn resized_colors(image: &RgbImage, cols: u32, rows: u32) -> Vec<[f64; 3]> {
    imageops::resize(image, cols, rows, FilterType::Triangle)
        .pixels()
        .map(|&Rgb(pixel)| pixel.map(f64::from))
        .collect()
}

/// Sets every pixel in `pixels` to `color`.
#[inline]
fn fill(pixels: &mut [u8], color: [u8; 3]) {
    for pixel in pixels.chunks_exact_mut(3) {
        pixel.copy_from_slice(&color);
    }
}

/// Paints one pixel row `y` of the wall.
fn paint_row(
    row: &mut [u8],
    y: u32,
    geometry: &Geometry,
    cells: &[u32],
    palette: &[Srgb<u8>],
    background: [u8; 3],
) {
    let grid_row = y / geometry.chip_height();
    if grid_row >= geometry.rows() {
        fill(row, background);
        return;
    }

    let cols = geometry.cols() as usize;
    let chip = geometry.chip_width() as usize * 3;
    let start = grid_row as usize * cols;

    let (covered, uncovered) = row.split_at_mut(cols * chip);
    for (pixels, &cell) in covered.chunks_exact_mut(chip).zip(&cells[start..(start + cols)]) {
        fill(pixels, cast::into_array(palette[cell as usize]));
    }
    fill(uncovered, background);
}

fn paint(
    geometry: &Geometry,
    cells: &[u32],
    palette: &[Srgb<u8>],
    background: Srgb<u8>,
) -> RgbImage {
    let mut image = RgbImage::new(geometry.wall_width(), geometry.wall_height());
    let stride = geometry.wall_width() as usize * 3;
    let background = cast::into_array(background);

    for (y, row) in image.chunks_exact_mut(stride).enumerate() {
        #[allow(clippy::cast_possible_truncation)]
        let y = y as u32;
        paint_row(row, y, geometry, cells, palette, background);
    }

    image
}

#[cfg(feature = "threads")]
fn paint_par(
    geometry: &Geometry,
    cells: &[u32],
    palette: &[Srgb<u8>],
    background: Srgb<u8>,
) -> RgbImage {
    let mut image = RgbImage::new(geometry.wall_width(), geometry.wall_height());
    let stride = geometry.wall_width() as usize * 3;
    let background = cast::into_array(background);

    image
        .par_chunks_exact_mut(stride)
        .enumerate()
        .for_each(|(y, row)| {
            #[allow(clippy::cast_possible_truncation)]
            let y = y as u32;
            paint_row(row, y, geometry, cells, palette, background);
        });

    image
}

fn chip_counts(cells: &[u32], len: usize) -> Vec<u64> {
    let mut counts = vec![0; len];
    for &cell in cells {
        counts[cell as usize] += 1;
    }
    counts
}

fn check_inputs(image: &RgbImage, index: &NearestColorIndex) -> Result<()> {
    if image.width() == 0 || image.height() == 0 {
        Err(MosaicError::EmptyImage)
    } else if index.is_empty() {
        Err(MosaicError::EmptyPalette)
    } else {
        Ok(())
    }
}

fn nearest_cell(index: &NearestColorIndex, color: [f64; 3]) -> Result<u32> {
    index.nearest_index(color).ok_or(MosaicError::EmptyPalette)
}

/// Composes a mosaic of the image with the default [`MosaicOptions`].
///
/// The returned image is exactly `wall_width × wall_height` pixels. Every cell of the grid
/// is filled with the palette color closest to the average color of the matching image region,
/// and the strips of the wall not covered by the grid are black.
///
/// # Examples
/// ```
/// # use chipwall::{compose, Geometry, Palette};
/// # use image::{Rgb, RgbImage};
/// # use palette::Srgb;
/// # fn main() -> Result<(), chipwall::MosaicError> {
/// let image = RgbImage::from_pixel(64, 32, Rgb([250, 10, 10]));
/// let palette = Palette::from(vec![Srgb::new(0, 0, 0), Srgb::new(255, 0, 0)]);
/// let geometry = Geometry::new(100, 50, 30, 25)?;
///
/// let mosaic = compose(&image, &geometry, &palette)?;
/// assert_eq!(mosaic.dimensions(), (100, 50));
/// assert_eq!(mosaic.get_pixel(0, 0), &Rgb([255, 0, 0]));
/// # Ok(())
/// # }
/// ```
///
/// # Errors
/// Returns [`MosaicError::EmptyImage`] if the image has no pixels,
/// or [`MosaicError::EmptyPalette`] if the palette is empty.
pub fn compose(image: &RgbImage, geometry: &Geometry, palette: &Palette) -> Result<RgbImage> {
    let index = NearestColorIndex::new(palette);
    compose_with(image, geometry, &index, &MosaicOptions::new()).map(Mosaic::into_image)
}

/// Composes a mosaic of the image using a prebuilt index, returning the full layout plan.
///
/// # Errors
/// Returns [`MosaicError::EmptyImage`] if the image has no pixels,
/// or [`MosaicError::EmptyPalette`] if the index was built from an empty palette.
pub fn compose_with(
    image: &RgbImage,
    geometry: &Geometry,
    index: &NearestColorIndex,
    options: &MosaicOptions,
) -> Result<Mosaic> {
    check_inputs(image, index)?;

    debug!(
        "composing a {}x{} grid of {}x{} chips from a {}x{} image",
        geometry.cols(),
        geometry.rows(),
        geometry.chip_width(),
        geometry.chip_height(),
        image.width(),
        image.height(),
    );

    let cells = cell_colors(image, geometry, options.sampling)
        .into_iter()
        .map(|color| nearest_cell(index, color))
        .collect::<Result<Vec<_>>>()?;

    let palette = index.colors();
    Ok(Mosaic {
        image: paint(geometry, &cells, palette, options.background),
        geometry: *geometry,
        palette: palette.to_vec(),
        counts: chip_counts(&cells, palette.len()),
        cells,
    })
}

/// Composes a mosaic of the image in parallel with the default [`MosaicOptions`].
///
/// The output is identical to [`compose`].
///
/// # Errors
/// See [`compose`].
#[cfg(feature = "threads")]
pub fn compose_par(image: &RgbImage, geometry: &Geometry, palette: &Palette) -> Result<RgbImage> {
    let index = NearestColorIndex::new(palette);
    compose_with_par(image, geometry, &index, &MosaicOptions::new()).map(Mosaic::into_image)
}

/// Composes a mosaic of the image in parallel using a prebuilt index.
///
/// The output is identical to [`compose_with`].
///
/// # Errors
/// See [`compose_with`].
#[cfg(feature = "threads")]
pub fn compose_with_par(
    image: &RgbImage,
    geometry: &Geometry,
    index: &NearestColorIndex,
    options: &MosaicOptions,
) -> Result<Mosaic> {
    check_inputs(image, index)?;

    debug!(
        "composing a {}x{} grid of {}x{} chips from a {}x{} image in parallel",
        geometry.cols(),
        geometry.rows(),
        geometry.chip_width(),
        geometry.chip_height(),
        image.width(),
        image.height(),
    );

    let cells = cell_colors_par(image, geometry, options.sampling)
        .into_par_iter()
        .map(|color| nearest_cell(index, color))
        .collect::<Result<Vec<_>>>()?;

    let palette = index.colors();
    Ok(Mosaic {
        image: paint_par(geometry, &cells, palette, options.background),
        geometry: *geometry,
        palette: palette.to_vec(),
        counts: chip_counts(&cells, palette.len()),
        cells,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::{tests::*, ErrorKind};

    const RED: Srgb<u8> = Srgb::new(255, 0, 0);
    const BLUE: Srgb<u8> = Srgb::new(0, 0, 255);
    const PURPLE: Srgb<u8> = Srgb::new(128, 0, 128);

    fn rgb(color: Srgb<u8>) -> Rgb<u8> {
        Rgb(cast::into_array(color))
    }

    /// Checks that every cell is a solid rectangle of its assigned color
    /// and that everything outside the grid is `background`.
    fn assert_valid_mosaic(mosaic: &Mosaic, background: Srgb<u8>) {
        let geometry = mosaic.geometry();
        let image = mosaic.image();
        assert_eq!(image.dimensions(), (geometry.wall_width(), geometry.wall_height()));
        assert_eq!(mosaic.cells().len() as u64, geometry.num_cells());
        assert_eq!(mosaic.chip_counts().iter().sum::<u64>(), geometry.num_cells());

        for (x, y, &pixel) in image.enumerate_pixels() {
            let col = x / geometry.chip_width();
            let row = y / geometry.chip_height();
            let expected = mosaic.cell_color(col, row).unwrap_or(background);
            assert_eq!(pixel, rgb(expected), "pixel ({x}, {y})");
        }
    }

    #[test]
    fn spans_cover_the_image() {
        for (n, len) in [(3, 100), (4, 2), (7, 7), (5, 13), (1, 1)] {
            let mut covered = vec![false; len as usize];
            let mut prev_start = 0;
            for i in 0..n {
                let span = source_span(i, n, len);
                assert!(!span.is_empty());
                assert!(span.end <= len);
                assert!(span.start >= prev_start);
                prev_start = span.start;
                for j in span {
                    covered[j as usize] = true;
                }
            }
            assert!(covered.into_iter().all(|c| c));
        }

        assert_eq!(source_span(0, 3, 90), 0..30);
        assert_eq!(source_span(2, 3, 90), 60..90);
    }

    #[test]
    fn wall_with_uncovered_strip() {
        let image = gradient_image(40, 20);
        let palette = Palette::from(test_data_256()[..16].to_vec());
        let geometry = Geometry::new(100, 50, 30, 25).unwrap();

        let mosaic = compose_with(
            &image,
            &geometry,
            &NearestColorIndex::new(&palette),
            &MosaicOptions::new(),
        )
        .unwrap();

        assert_eq!((mosaic.geometry().cols(), mosaic.geometry().rows()), (3, 2));
        assert_valid_mosaic(&mosaic, MosaicOptions::DEFAULT_BACKGROUND);

        let image = mosaic.image();
        for y in 0..50 {
            for x in 90..100 {
                assert_eq!(image.get_pixel(x, y), &Rgb([0, 0, 0]));
            }
        }
    }

    #[test]
    fn custom_background_on_both_strips() {
        let image = gradient_image(10, 10);
        let palette = Palette::from(vec![RED, BLUE]);
        let geometry = Geometry::new(23, 17, 5, 4).unwrap();
        let background = Srgb::new(1, 2, 3);
        let options = MosaicOptions::new().background(background);

        let mosaic = compose_with(&image, &geometry, &NearestColorIndex::new(&palette), &options)
            .unwrap();
        assert_eq!(geometry.uncovered_width(), 3);
        assert_eq!(geometry.uncovered_height(), 1);
        assert_valid_mosaic(&mosaic, background);
        assert_eq!(mosaic.image().get_pixel(22, 16), &rgb(background));
    }

    #[test]
    fn cells_use_only_palette_colors() {
        let image = gradient_image(97, 61);
        let palette = Palette::from(test_data_256()[..24].to_vec());
        let geometry = Geometry::new(120, 80, 7, 9).unwrap();

        let composed = compose(&image, &geometry, &palette).unwrap();
        assert_eq!(composed.dimensions(), (120, 80));

        for y in 0..geometry.covered_height() {
            for x in 0..geometry.covered_width() {
                let Rgb([r, g, b]) = *composed.get_pixel(x, y);
                assert!(palette.contains(&Srgb::new(r, g, b)));
            }
        }
    }

    #[test]
    fn single_color_palette() {
        let image = gradient_image(50, 50);
        let palette = Palette::from(vec![PURPLE]);
        let geometry = Geometry::new(64, 48, 8, 8).unwrap();

        let mosaic = compose_with(
            &image,
            &geometry,
            &NearestColorIndex::new(&palette),
            &MosaicOptions::new(),
        )
        .unwrap();

        assert!(mosaic.cells().iter().all(|&cell| cell == 0));
        assert_eq!(mosaic.chip_counts(), &[48]);
        assert!(mosaic.image().pixels().all(|&pixel| pixel == rgb(PURPLE)));
    }

    #[test]
    fn block_average_picks_region_colors() {
        let image = RgbImage::from_fn(4, 2, |x, _| if x < 2 { rgb(RED) } else { rgb(BLUE) });
        let palette = Palette::from(vec![RED, BLUE, PURPLE]);
        let geometry = Geometry::new(20, 10, 10, 10).unwrap();

        let mosaic = compose_with(
            &image,
            &geometry,
            &NearestColorIndex::new(&palette),
            &MosaicOptions::new(),
        )
        .unwrap();

        assert_eq!(mosaic.cells(), &[0, 1]);
        assert_eq!(mosaic.cell_color(1, 0), Some(BLUE));
        assert_eq!(mosaic.cell(2, 0), None);
        assert_eq!(
            mosaic.bill_of_materials().collect::<Vec<_>>(),
            [(RED, 1), (BLUE, 1), (PURPLE, 0)]
        );

        // one cell over the whole image averages red and blue
        let geometry = Geometry::new(10, 10, 10, 10).unwrap();
        let mosaic = compose_with(
            &image,
            &geometry,
            &NearestColorIndex::new(&palette),
            &MosaicOptions::new(),
        )
        .unwrap();
        assert_eq!(mosaic.cells(), &[2]);
    }

    #[test]
    fn grid_finer_than_image() {
        let quadrants = [RED, BLUE, PURPLE, Srgb::new(0, 200, 0)];
        let image = RgbImage::from_fn(2, 2, |x, y| rgb(quadrants[(y * 2 + x) as usize]));
        let palette = Palette::from(quadrants.to_vec());
        let geometry = Geometry::new(4, 4, 1, 1).unwrap();

        let mosaic = compose_with(
            &image,
            &geometry,
            &NearestColorIndex::new(&palette),
            &MosaicOptions::new(),
        )
        .unwrap();

        #[rustfmt::skip]
        let expected = [
            0, 0, 1, 1,
            0, 0, 1, 1,
            2, 2, 3, 3,
            2, 2, 3, 3,
        ];
        assert_eq!(mosaic.cells(), &expected);
        assert_valid_mosaic(&mosaic, MosaicOptions::DEFAULT_BACKGROUND);
    }

    #[test]
    fn resize_sampling() {
        let image = RgbImage::from_pixel(37, 23, rgb(BLUE));
        let palette = Palette::from(vec![RED, PURPLE, BLUE]);
        let geometry = Geometry::new(50, 30, 10, 10).unwrap();
        let options = MosaicOptions::new().sampling(Sampling::Resize);

        let mosaic = compose_with(&image, &geometry, &NearestColorIndex::new(&palette), &options)
            .unwrap();
        assert!(mosaic.cells().iter().all(|&cell| cell == 2));
        assert_valid_mosaic(&mosaic, MosaicOptions::DEFAULT_BACKGROUND);

        let image = gradient_image(80, 40);
        let palette = Palette::from(test_data_256()[..32].to_vec());
        let mosaic = compose_with(&image, &geometry, &NearestColorIndex::new(&palette), &options)
            .unwrap();
        assert_valid_mosaic(&mosaic, MosaicOptions::DEFAULT_BACKGROUND);
    }

    #[test]
    fn invalid_inputs() {
        let geometry = Geometry::new(10, 10, 2, 2).unwrap();

        let err = compose(&RgbImage::new(0, 0), &geometry, &Palette::from(vec![RED])).unwrap_err();
        assert!(matches!(err, MosaicError::EmptyImage));

        let err = compose(&gradient_image(4, 4), &geometry, &Palette::new()).unwrap_err();
        assert!(matches!(err, MosaicError::EmptyPalette));
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    #[cfg(feature = "threads")]
    fn single_and_multi_threaded_match() {
        let image = gradient_image(123, 77);
        let palette = Palette::from(test_data_256()[..40].to_vec());
        let index = NearestColorIndex::new(&palette);
        let geometry = Geometry::new(211, 97, 6, 5).unwrap();

        for sampling in [Sampling::BlockAverage, Sampling::Resize] {
            let options = MosaicOptions::new().sampling(sampling);
            let single = compose_with(&image, &geometry, &index, &options).unwrap();
            let par = compose_with_par(&image, &geometry, &index, &options).unwrap();
            assert_eq!(single, par);
        }

        assert_eq!(
            compose(&image, &geometry, &palette).unwrap(),
            compose_par(&image, &geometry, &palette).unwrap()
        );
    }
}

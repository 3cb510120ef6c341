//! A planner for chip walls: pictures built from a grid of small, solid-colored rectangular chips.
//!
//! `chipwall` has two halves:
//! - Palette recommendation: [`recommend`] clusters the colors of a photo with k-means
//!   and returns the cluster centers as chip colors to buy.
//! - Mosaic composition: [`compose`] divides the wall into a grid of chip-sized cells,
//!   reduces the photo to one representative color per cell,
//!   and paints each cell with the closest color from the caller's [`Palette`].
//!
//! Nearest color queries go through a [`NearestColorIndex`], a k-d tree built once per palette.
//!
//! # Features
//! - `threads`: exposes parallel versions of the clustering and composition functions via [`rayon`].
//!   Their results are identical to the single-threaded versions.
//! - `cli`: builds the `chipwall` command line tool.
//!
//! # Example
//! ```no_run
//! # use chipwall::{compose, load_image, recommend, Geometry, DEFAULT_RECOMMENDED_COLORS};
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let photo = load_image("photo.jpg")?;
//!
//! // suggest chip colors for the photo
//! let palette = recommend(&photo, DEFAULT_RECOMMENDED_COLORS)?;
//! for hex in palette.to_hex() {
//!     println!("{hex}");
//! }
//!
//! // a 2m x 1m wall made out of 4cm x 2cm chips, in millimeters
//! let geometry = Geometry::new(2000, 1000, 40, 20)?;
//! let preview = compose(&photo, &geometry, &palette)?;
//! preview.save("preview.png")?;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code, unsafe_op_in_unsafe_fn)]
#![warn(
    clippy::pedantic,
    clippy::cargo,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::todo,
    clippy::unimplemented,
    clippy::unwrap_used,
    clippy::unwrap_in_result,
    clippy::expect_used,
    clippy::unneeded_field_pattern,
    clippy::rest_pat_in_fully_bound_structs,
    clippy::unnecessary_self_imports,
    clippy::str_to_string,
    clippy::string_to_string,
    clippy::string_slice,
    missing_docs,
    clippy::missing_docs_in_private_items,
    rustdoc::all,
    clippy::float_cmp_const,
    clippy::lossy_float_literal
)]
#![allow(
    clippy::doc_markdown,
    clippy::module_name_repetitions,
    clippy::many_single_char_names,
    clippy::missing_panics_doc,
    clippy::unreadable_literal,
    clippy::wildcard_imports
)]

mod color;
mod color_counts;
mod error;
mod kdtree;
mod kmeans;
mod loader;
mod mosaic;
mod types;

pub use color::*;
pub use color_counts::*;
pub use error::*;
pub use kdtree::{Nearest, NearestColorIndex};
pub use kmeans::{
    kmeans, recommend, recommend_with, Clusters, KmeansOptions, DEFAULT_RECOMMENDED_COLORS,
};
pub use loader::load_image;
pub use mosaic::*;
pub use types::{Geometry, Palette};

#[cfg(feature = "threads")]
pub use kmeans::{kmeans_par, recommend_par, recommend_with_par};

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
pub(crate) mod tests {
    use image::{Rgb, RgbImage};
    use palette::Srgb;
    use rand::{Rng, SeedableRng};
    use rand_xoshiro::Xoroshiro128PlusPlus;

    fn random_colors(len: usize, seed: u64) -> Vec<Srgb<u8>> {
        let mut rng = Xoroshiro128PlusPlus::seed_from_u64(seed);
        (0..len)
            .map(|_| Srgb::new(rng.gen(), rng.gen(), rng.gen()))
            .collect()
    }

    pub fn test_data_256() -> Vec<Srgb<u8>> {
        random_colors(256, 42)
    }

    pub fn test_data_1024() -> Vec<Srgb<u8>> {
        random_colors(1024, 7)
    }

    /// Red increases left to right, green top to bottom, and blue along the diagonal.
    ///
    /// Every pixel has a distinct color as long as both dimensions are at most 256.
    pub fn gradient_image(width: u32, height: u32) -> RgbImage {
        let scale = |i: u32, n: u32| (i * 255 / n.saturating_sub(1).max(1)) as u8;
        RgbImage::from_fn(width, height, |x, y| {
            Rgb([
                scale(x, width),
                scale(y, height),
                scale(x + y, width + height - 1),
            ])
        })
    }

    /// One row of `per_cluster` pixels for each center, with every component jittered by at most `spread`.
    ///
    /// Also returns the exact mean color of each row.
    pub fn clustered_image(
        centers: &[[u8; 3]],
        per_cluster: u32,
        spread: u8,
        seed: u64,
    ) -> (RgbImage, Vec<[f64; 3]>) {
        let mut rng = Xoroshiro128PlusPlus::seed_from_u64(seed);
        let spread = i16::from(spread);
        let mut image = RgbImage::new(per_cluster, centers.len() as u32);
        let mut means = Vec::with_capacity(centers.len());

        for (row, center) in centers.iter().enumerate() {
            let mut sum = [0u64; 3];
            for x in 0..per_cluster {
                let pixel = center
                    .map(|c| (i16::from(c) + rng.gen_range(-spread..=spread)).clamp(0, 255) as u8);
                for (s, &c) in sum.iter_mut().zip(&pixel) {
                    *s += u64::from(c);
                }
                image.put_pixel(x, row as u32, Rgb(pixel));
            }
            means.push(sum.map(|s| s as f64 / f64::from(per_cluster)));
        }

        (image, means)
    }
}

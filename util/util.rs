#![allow(dead_code)]

use std::sync::OnceLock;

use image::{Rgb, RgbImage};
use palette::Srgb;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoroshiro128PlusPlus;

/// A photo-like image: a few smooth color gradients with some per-pixel noise.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
pub fn synthetic_photo(width: u32, height: u32, seed: u64) -> RgbImage {
    let mut rng = Xoroshiro128PlusPlus::seed_from_u64(seed);
    let phase: [f64; 3] = [rng.gen(), rng.gen(), rng.gen()];

    RgbImage::from_fn(width, height, |x, y| {
        let u = f64::from(x) / f64::from(width);
        let v = f64::from(y) / f64::from(height);
        Rgb(std::array::from_fn(|i| {
            let t = u * (i + 1) as f64 + v * (3 - i) as f64 + phase[i];
            let wave = (std::f64::consts::TAU * t).sin();
            let noise = rng.gen_range(-12.0..12.0);
            (127.5 + 110.0 * wave + noise).clamp(0.0, 255.0) as u8
        }))
    })
}

pub fn synthetic_images() -> &'static [(String, RgbImage)] {
    static IMAGES: OnceLock<Vec<(String, RgbImage)>> = OnceLock::new();
    IMAGES.get_or_init(|| {
        [(640, 480), (1920, 1080), (1000, 3000)]
            .into_iter()
            .enumerate()
            .map(|(seed, (width, height))| {
                (
                    format!("{width}x{height}"),
                    synthetic_photo(width, height, seed as u64),
                )
            })
            .collect()
    })
}

pub fn random_palette(len: usize, seed: u64) -> Vec<Srgb<u8>> {
    let mut rng = Xoroshiro128PlusPlus::seed_from_u64(seed);
    (0..len)
        .map(|_| Srgb::new(rng.gen(), rng.gen(), rng.gen()))
        .collect()
}

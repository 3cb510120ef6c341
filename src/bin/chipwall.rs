#![deny(unsafe_code, unsafe_op_in_unsafe_fn)]
#![warn(
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::todo,
    clippy::unimplemented,
    clippy::unneeded_field_pattern,
    clippy::rest_pat_in_fully_bound_structs,
    clippy::unnecessary_self_imports,
    clippy::str_to_string,
    clippy::string_to_string,
    clippy::string_slice
)]

use std::{fmt::Display, path::PathBuf};

use anyhow::Context;
use chipwall::{
    compose_with, compose_with_par, load_image, parse_hex, to_hex, Geometry,
    KmeansOptions, Mosaic, MosaicOptions, NearestColorIndex, Palette, Sampling,
};
use clap::{Parser, ValueEnum};
use log::{debug, info};
use palette::Srgb;

#[derive(Copy, Clone, ValueEnum)]
enum CliSampling {
    Block,
    Resize,
}

impl From<CliSampling> for Sampling {
    fn from(value: CliSampling) -> Self {
        match value {
            CliSampling::Block => Sampling::BlockAverage,
            CliSampling::Resize => Sampling::Resize,
        }
    }
}

impl Display for CliSampling {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                CliSampling::Block => "block",
                CliSampling::Resize => "resize",
            }
        )
    }
}

/// Plans a chip wall for a photo and renders a preview of it.
///
/// Prints every chip color as hex together with the number of chips of that color.
#[derive(Parser)]
#[command(version)]
struct Options {
    /// The photo to turn into a wall.
    input: PathBuf,

    /// Where to save the rendered wall preview.
    output: PathBuf,

    #[arg(long)]
    wall_width: u32,

    #[arg(long)]
    wall_height: u32,

    #[arg(long)]
    chip_width: u32,

    #[arg(long)]
    chip_height: u32,

    /// An available chip color like `#ff8800`. Can be given multiple times.
    #[arg(long = "chip", value_parser = parse_color)]
    chips: Vec<Srgb<u8>>,

    /// Appends this many colors recommended from the photo to the chip colors (10 if no count is given).
    #[arg(long, num_args = 0..=1, default_missing_value = "10")]
    recommend: Option<usize>,

    #[arg(long, default_value_t = 0)]
    seed: u64,

    #[arg(long, default_value_t = CliSampling::Block)]
    sampling: CliSampling,

    #[arg(long, value_parser = parse_color)]
    background: Option<Srgb<u8>>,

    /// The number of worker threads, or `0` to use all cores.
    #[arg(short, long, default_value_t = 0)]
    threads: u8,

    #[arg(short, long)]
    verbose: bool,
}

fn parse_color(s: &str) -> Result<Srgb<u8>, String> {
    parse_hex(s).map_err(|e| e.to_string())
}

fn main() -> anyhow::Result<()> {
    let Options {
        input,
        output,
        wall_width,
        wall_height,
        chip_width,
        chip_height,
        chips,
        recommend,
        seed,
        sampling,
        background,
        threads,
        verbose,
    } = Options::parse();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if verbose { "debug" } else { "warn" }),
    )
    .init();

    macro_rules! timed {
        ($name: literal, $val: expr) => {{
            let time = std::time::Instant::now();
            let value = $val;
            debug!("{} took {}ms", $name, time.elapsed().as_millis());
            value
        }};
    }

    let geometry = Geometry::new(wall_width, wall_height, chip_width, chip_height)
        .context("invalid wall geometry")?;

    let image = timed!("read image", load_image(&input))?;

    let run = || -> anyhow::Result<Mosaic> {
        let mut palette = Palette::from(chips);

        if let Some(k) = recommend {
            let options = KmeansOptions::new().seed(seed);
            let clusters = timed!(
                "palette recommendation",
                if threads == 1 {
                    chipwall::recommend_with(&image, k, &options)
                } else {
                    chipwall::recommend_with_par(&image, k, &options)
                }
            )
            .context("failed to recommend colors")?;

            info!(
                "recommended {k} colors after {} iterations (inertia {:.1})",
                clusters.iterations, clusters.inertia
            );
            palette.extend(clusters.palette);
        }

        let mut options = MosaicOptions::new().sampling(sampling.into());
        if let Some(background) = background {
            options = options.background(background);
        }

        let index = NearestColorIndex::new(&palette);
        let mosaic = timed!(
            "composition",
            if threads == 1 {
                compose_with(&image, &geometry, &index, &options)
            } else {
                compose_with_par(&image, &geometry, &index, &options)
            }
        )
        .context("failed to compose the mosaic")?;

        Ok(mosaic)
    };

    let mosaic = match threads {
        0 | 1 => run()?,
        t => rayon::ThreadPoolBuilder::new()
            .num_threads(t.into())
            .build()?
            .install(run)?,
    };

    timed!("write image", mosaic.image().save(&output))
        .with_context(|| format!("failed to save {}", output.display()))?;

    let geometry = mosaic.geometry();
    info!(
        "{} x {} chips, {} x {} uncovered",
        geometry.cols(),
        geometry.rows(),
        geometry.uncovered_width(),
        geometry.uncovered_height()
    );

    for (color, count) in mosaic.bill_of_materials() {
        println!("{} {count}", to_hex(color));
    }

    Ok(())
}

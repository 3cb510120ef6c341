//! Palette recommendation through k-means clustering of an image's colors.
//!
//! The clustering is Lloyd's algorithm: starting from k-means++ seeds, every color is assigned
//! to its nearest centroid and each centroid is moved to the mean of its colors, until the
//! centroids stop moving or an iteration limit is reached.
//!
//! Pixels are deduplicated first (see [`UniqueColorCounts`]), and each distinct color is
//! weighted by the number of pixels having it, which gives the same result as clustering
//! every pixel on its own.

use crate::{
    color::{components, from_components, squared_distance},
    kdtree::KdTree,
    MosaicError, Palette, Result, UniqueColorCounts,
};

use image::RgbImage;
use log::{debug, trace, warn};
use rand::{
    distributions::{Distribution, WeightedIndex},
    SeedableRng,
};
use rand_xoshiro::Xoroshiro128PlusPlus;

#[cfg(feature = "threads")]
use rayon::prelude::*;

/// The number of colors suggested when the caller has no preference.
pub const DEFAULT_RECOMMENDED_COLORS: usize = 10;

/// A builder struct to specify the parameters for k-means.
///
/// # Examples
/// ```
/// # use chipwall::KmeansOptions;
/// let options = KmeansOptions::new()
///     .max_iterations(100)
///     .tolerance(0.5)
///     .seed(42);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KmeansOptions {
    /// The maximum number of assignment and update rounds.
    max_iterations: u32,
    /// Clustering stops once no centroid moves farther than this.
    tolerance: f64,
    /// The seed value for the random number generator.
    seed: u64,
}

impl Default for KmeansOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl KmeansOptions {
    /// The default maximum number of iterations.
    pub const DEFAULT_MAX_ITERATIONS: u32 = 300;

    /// The default convergence tolerance, in RGB units.
    pub const DEFAULT_TOLERANCE: f64 = 1e-2;

    /// Creates a new [`KmeansOptions`] with default values.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_iterations: Self::DEFAULT_MAX_ITERATIONS,
            tolerance: Self::DEFAULT_TOLERANCE,
            seed: 0,
        }
    }

    /// Sets the maximum number of iterations.
    ///
    /// The default is [`KmeansOptions::DEFAULT_MAX_ITERATIONS`].
    #[must_use]
    pub const fn max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Sets the distance in RGB units below which a centroid counts as having stopped moving.
    ///
    /// The default is [`KmeansOptions::DEFAULT_TOLERANCE`].
    #[must_use]
    pub const fn tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Sets the seed value for the random number generator used to pick the initial centroids.
    ///
    /// The default seed is `0`.
    #[must_use]
    pub const fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Gets the maximum number of iterations.
    #[must_use]
    pub const fn get_max_iterations(&self) -> u32 {
        self.max_iterations
    }

    /// Gets the convergence tolerance.
    #[must_use]
    pub const fn get_tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Gets the seed.
    #[must_use]
    pub const fn get_seed(&self) -> u64 {
        self.seed
    }
}

/// The output of k-means clustering.
#[derive(Debug, Clone, PartialEq)]
pub struct Clusters {
    /// The cluster centroids rounded to the nearest color.
    ///
    /// The colors are not guaranteed to be unique.
    pub palette: Palette,
    /// The number of pixels assigned to each color in `palette`.
    ///
    /// A count may be zero.
    pub counts: Vec<u64>,
    /// The number of iterations that were run.
    pub iterations: u32,
    /// The sum of squared distances between each pixel and its (unrounded) centroid.
    pub inertia: f64,
}

/// Per cluster totals gathered in one assignment pass.
#[derive(Debug, Clone)]
struct Assignment {
    sums: Vec<[f64; 3]>,
    counts: Vec<u64>,
    inertia: f64,
}

impl Assignment {
    fn new(k: usize) -> Self {
        Self {
            sums: vec![[0.0; 3]; k],
            counts: vec![0; k],
            inertia: 0.0,
        }
    }

    #[inline]
    fn add_nearest(&mut self, tree: &KdTree<3>, point: [f64; 3], count: u64) {
        // the tree is never empty since k >= 1
        if let Some((key, dist)) = tree.nearest_neighbor(point) {
            let i = key as usize;
            #[allow(clippy::cast_precision_loss)]
            let weight = count as f64;
            for (s, p) in self.sums[i].iter_mut().zip(point) {
                *s += p * weight;
            }
            self.counts[i] += count;
            self.inertia += dist * weight;
        }
    }

    fn merge(mut self, other: Self) -> Self {
        for (a, b) in self.sums.iter_mut().zip(other.sums) {
            for (a, b) in a.iter_mut().zip(b) {
                *a += b;
            }
        }
        for (a, b) in self.counts.iter_mut().zip(other.counts) {
            *a += b;
        }
        self.inertia += other.inertia;
        self
    }
}

fn assign(tree: &KdTree<3>, points: &[[f64; 3]], counts: &[u64]) -> Assignment {
    points
        .iter()
        .zip(counts)
        .fold(Assignment::new(tree.len()), |mut acc, (&point, &count)| {
            acc.add_nearest(tree, point, count);
            acc
        })
}

#[cfg(feature = "threads")]
fn assign_par(tree: &KdTree<3>, points: &[[f64; 3]], counts: &[u64]) -> Assignment {
    let k = tree.len();
    points
        .par_iter()
        .zip(counts)
        .fold(
            || Assignment::new(k),
            |mut acc, (&point, &count)| {
                acc.add_nearest(tree, point, count);
                acc
            },
        )
        .reduce(|| Assignment::new(k), Assignment::merge)
}

/// Checks the cluster count and converts the distinct colors to points.
fn prepare(color_counts: &UniqueColorCounts, k: usize) -> Result<Vec<[f64; 3]>> {
    if color_counts.is_empty() {
        return Err(MosaicError::EmptyImage);
    }

    let max = color_counts.total_count();
    if k == 0 || k as u64 > max {
        return Err(MosaicError::InvalidClusterCount { k, max });
    }

    Ok(color_counts.colors().iter().copied().map(components).collect())
}

/// Picks `k` initial centroids with k-means++: each new centroid is sampled with probability
/// proportional to its squared distance from the closest centroid picked so far.
///
/// If there are fewer distinct colors than `k`, the remaining centroids repeat the first one.
fn kmeans_plus_plus(
    points: &[[f64; 3]],
    counts: &[u64],
    k: usize,
    rng: &mut Xoroshiro128PlusPlus,
) -> Vec<[f64; 3]> {
    // WeightedIndex::new fails if the weights are empty or all zero,
    // but the caller checked that there is at least one color and every count is nonzero.
    #[allow(clippy::unwrap_used)]
    let first = WeightedIndex::new(counts).unwrap().sample(rng);

    let mut centroids = Vec::with_capacity(k);
    centroids.push(points[first]);

    let mut min_dist = points
        .iter()
        .map(|&p| squared_distance(p, points[first]))
        .collect::<Vec<_>>();

    while centroids.len() < k {
        #[allow(clippy::cast_precision_loss)]
        let weights = min_dist.iter().zip(counts).map(|(&d, &n)| d * n as f64);

        let next = match WeightedIndex::new(weights) {
            Ok(distribution) => distribution.sample(rng),
            // every color already coincides with a centroid
            Err(_) => first,
        };

        let centroid = points[next];
        centroids.push(centroid);
        for (d, &p) in min_dist.iter_mut().zip(points) {
            *d = d.min(squared_distance(p, centroid));
        }
    }

    centroids
}

/// Runs Lloyd's algorithm from the given initial centroids.
fn lloyd(
    points: &[[f64; 3]],
    counts: &[u64],
    mut centroids: Vec<[f64; 3]>,
    options: &KmeansOptions,
    assign: impl Fn(&KdTree<3>, &[[f64; 3]], &[u64]) -> Assignment,
) -> Clusters {
    let mut iterations = 0;
    let mut converged = false;

    while iterations < options.max_iterations {
        iterations += 1;

        let tree = KdTree::new(&centroids);
        let assignment = assign(&tree, points, counts);

        let mut shift = 0.0_f64;
        for (centroid, (sum, &count)) in centroids
            .iter_mut()
            .zip(assignment.sums.iter().zip(&assignment.counts))
        {
            // an empty cluster keeps its previous centroid
            if count > 0 {
                #[allow(clippy::cast_precision_loss)]
                let n = count as f64;
                let mean = sum.map(|s| s / n);
                shift = shift.max(squared_distance(*centroid, mean));
                *centroid = mean;
            }
        }

        let shift = shift.sqrt();
        trace!(
            "k-means iteration {iterations}: inertia {}, max centroid shift {shift}",
            assignment.inertia
        );

        if shift <= options.tolerance {
            converged = true;
            break;
        }
    }

    if converged {
        debug!("k-means converged after {iterations} iterations");
    } else {
        warn!("k-means stopped after {iterations} iterations without converging");
    }

    let Assignment { counts, inertia, .. } = assign(&KdTree::new(&centroids), points, counts);

    Clusters {
        palette: centroids.into_iter().map(from_components).collect(),
        counts,
        iterations,
        inertia,
    }
}

/// Clusters deduplicated colors into `k` groups.
///
/// # Errors
/// Returns [`MosaicError::EmptyImage`] if there are no colors,
/// or [`MosaicError::InvalidClusterCount`] if `k` is zero or greater than
/// [`UniqueColorCounts::total_count`].
pub fn kmeans(
    color_counts: &UniqueColorCounts,
    k: usize,
    options: &KmeansOptions,
) -> Result<Clusters> {
    let points = prepare(color_counts, k)?;
    let counts = color_counts.counts();

    debug!(
        "clustering {} distinct colors into {k} clusters",
        color_counts.num_colors()
    );

    let mut rng = Xoroshiro128PlusPlus::seed_from_u64(options.seed);
    let initial = kmeans_plus_plus(&points, counts, k, &mut rng);
    Ok(lloyd(&points, counts, initial, options, assign))
}

/// Clusters deduplicated colors into `k` groups in parallel.
///
/// The result is the same as [`kmeans`] for the same options,
/// except for rounding differences in [`Clusters::inertia`].
///
/// # Errors
/// See [`kmeans`].
#[cfg(feature = "threads")]
pub fn kmeans_par(
    color_counts: &UniqueColorCounts,
    k: usize,
    options: &KmeansOptions,
) -> Result<Clusters> {
    let points = prepare(color_counts, k)?;
    let counts = color_counts.counts();

    debug!(
        "clustering {} distinct colors into {k} clusters",
        color_counts.num_colors()
    );

    let mut rng = Xoroshiro128PlusPlus::seed_from_u64(options.seed);
    let initial = kmeans_plus_plus(&points, counts, k, &mut rng);
    Ok(lloyd(&points, counts, initial, options, assign_par))
}

/// Suggests a palette of exactly `k` chip colors for an image using the default [`KmeansOptions`].
///
/// # Examples
/// ```
/// # use chipwall::recommend;
/// # use image::{Rgb, RgbImage};
/// # fn main() -> Result<(), chipwall::MosaicError> {
/// let image = RgbImage::from_fn(8, 8, |x, _| {
///     if x < 4 { Rgb([200, 0, 0]) } else { Rgb([0, 0, 200]) }
/// });
/// let palette = recommend(&image, 2)?;
/// assert_eq!(palette.len(), 2);
/// # Ok(())
/// # }
/// ```
///
/// # Errors
/// Returns [`MosaicError::EmptyImage`] if the image has no pixels,
/// or [`MosaicError::InvalidClusterCount`] if `k` is zero or greater than the number of pixels.
pub fn recommend(image: &RgbImage, k: usize) -> Result<Palette> {
    recommend_with(image, k, &KmeansOptions::new()).map(|clusters| clusters.palette)
}

/// Clusters the pixels of an image into `k` groups.
///
/// # Errors
/// See [`recommend`].
pub fn recommend_with(image: &RgbImage, k: usize, options: &KmeansOptions) -> Result<Clusters> {
    kmeans(&UniqueColorCounts::from_rgbimage(image), k, options)
}

/// Suggests a palette of exactly `k` chip colors for an image in parallel.
///
/// # Errors
/// See [`recommend`].
#[cfg(feature = "threads")]
pub fn recommend_par(image: &RgbImage, k: usize) -> Result<Palette> {
    recommend_with_par(image, k, &KmeansOptions::new()).map(|clusters| clusters.palette)
}

/// Clusters the pixels of an image into `k` groups in parallel.
///
/// # Errors
/// See [`recommend`].
#[cfg(feature = "threads")]
pub fn recommend_with_par(
    image: &RgbImage,
    k: usize,
    options: &KmeansOptions,
) -> Result<Clusters> {
    kmeans_par(&UniqueColorCounts::from_rgbimage_par(image), k, options)
}

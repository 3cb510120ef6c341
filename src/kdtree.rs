//! Nearest color lookups over a palette using a k-d tree.

use crate::{
    color::{components, squared_distance},
    MosaicError, Palette, Result,
};

use log::debug;
use ordered_float::OrderedFloat;
use palette::Srgb;

/// The maximum number of points in a leaf.
const B: usize = 8;

#[derive(Debug, Clone, Copy)]
enum Node {
    /// A range into the tree's `keys` and `points`.
    Leaf { start: u32, end: u32 },
    /// Points in the left subtree are `<= value` along the split dimension,
    /// and points in the right subtree are `>= value`.
    Branch { left_right: [u32; 2], value: f64 },
}

struct NearestNeighborState<const N: usize> {
    point: [f64; N],
    /// Per dimension offset from `point` to the region currently being searched.
    offsets: [f64; N],
    min_dist: f64,
    key: u32,
}

/// A balanced k-d tree over a fixed set of points, built by median splits
/// that cycle through the dimensions.
///
/// Each point is identified by its key, the index it had in the input slice.
/// Queries return the closest point with the lowest key.
#[derive(Debug, Clone)]
pub(crate) struct KdTree<const N: usize> {
    root: u32,
    nodes: Vec<Node>,
    /// The keys in leaf order.
    keys: Vec<u32>,
    /// The points in leaf order.
    points: Vec<[f64; N]>,
}

impl<const N: usize> KdTree<N> {
    pub fn new(points: &[[f64; N]]) -> Self {
        #[allow(clippy::cast_possible_truncation)]
        let mut keys = (0..points.len()).map(|i| i as u32).collect::<Vec<_>>();

        let mut tree = Self {
            root: 0,
            nodes: Vec::with_capacity(2 * points.len().div_ceil(B) + 1),
            keys: Vec::new(),
            points: Vec::new(),
        };

        tree.root = tree.build_rec(points, &mut keys, 0, 0);
        tree.points = keys.iter().map(|&k| points[k as usize]).collect();
        tree.keys = keys;
        tree
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[allow(clippy::cast_possible_truncation)]
    fn build_rec(
        &mut self,
        points: &[[f64; N]],
        keys: &mut [u32],
        offset: usize,
        dim: usize,
    ) -> u32 {
        let len = keys.len();

        let node = if len <= B {
            Node::Leaf {
                start: offset as u32,
                end: (offset + len) as u32,
            }
        } else {
            let split = len / 2;
            keys.select_nth_unstable_by_key(split, |&k| (OrderedFloat(points[k as usize][dim]), k));
            let value = points[keys[split] as usize][dim];

            let next = (dim + 1) % N;
            let (left, right) = keys.split_at_mut(split);
            let left = self.build_rec(points, left, offset, next);
            let right = self.build_rec(points, right, offset + split, next);

            Node::Branch { left_right: [left, right], value }
        };

        self.nodes.push(node);
        (self.nodes.len() - 1) as u32
    }

    /// Returns the key of the nearest point and its squared distance to `point`,
    /// or `None` if the tree is empty or no distance to `point` compares (a NaN component).
    pub fn nearest_neighbor(&self, point: [f64; N]) -> Option<(u32, f64)> {
        if self.keys.is_empty() {
            return None;
        }

        let mut state = NearestNeighborState {
            point,
            offsets: [0.0; N],
            min_dist: f64::INFINITY,
            key: u32::MAX,
        };

        self.nearest_neighbor_rec(&mut state, self.root, 0);

        (state.key != u32::MAX).then_some((state.key, state.min_dist))
    }

    #[allow(clippy::float_cmp)]
    fn nearest_neighbor_rec(&self, state: &mut NearestNeighborState<N>, node: u32, dim: usize) {
        match self.nodes[node as usize] {
            Node::Leaf { start, end } => {
                let range = (start as usize)..(end as usize);
                for (&key, &p) in self.keys[range.clone()].iter().zip(&self.points[range]) {
                    let dist = squared_distance(p, state.point);
                    if dist < state.min_dist || (dist == state.min_dist && key < state.key) {
                        state.min_dist = dist;
                        state.key = key;
                    }
                }
            }
            Node::Branch { left_right: [left, right], value } => {
                let diff = state.point[dim] - value;
                let (closer, farther) = if diff < 0.0 { (left, right) } else { (right, left) };
                let next = (dim + 1) % N;

                self.nearest_neighbor_rec(state, closer, next);

                // Visit the farther side on equal distance too, it may hold a lower key.
                let old = state.offsets[dim];
                state.offsets[dim] = diff;
                if squared_distance(state.offsets, [0.0; N]) <= state.min_dist {
                    self.nearest_neighbor_rec(state, farther, next);
                }
                state.offsets[dim] = old;
            }
        }
    }
}

/// The result of a nearest color query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Nearest {
    /// The index of the matched color in the palette.
    pub index: usize,
    /// The matched palette color.
    pub color: Srgb<u8>,
    /// The euclidean distance between the query and the matched color.
    pub distance: f64,
}

/// An immutable index over a palette answering nearest color queries.
///
/// The index owns a copy of the palette it was built from,
/// so editing the original palette afterwards requires building a new index.
///
/// When several palette colors are equally close to a query,
/// the one with the lowest index in the palette is returned.
///
/// # Examples
/// ```
/// # use chipwall::{NearestColorIndex, Palette};
/// # use palette::Srgb;
/// # fn main() -> Result<(), chipwall::MosaicError> {
/// let palette = Palette::from(vec![Srgb::new(0, 0, 0), Srgb::new(10, 0, 0)]);
/// let index = NearestColorIndex::new(&palette);
///
/// // equally close to both colors, so the first one wins
/// let nearest = index.nearest([5.0, 0.0, 0.0])?;
/// assert_eq!(nearest.index, 0);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct NearestColorIndex {
    /// The palette colors.
    colors: Vec<Srgb<u8>>,
    /// The k-d tree over `colors`.
    tree: KdTree<3>,
}

impl NearestColorIndex {
    /// Builds an index over the given palette.
    ///
    /// An empty palette is accepted, but every query against it will fail.
    #[must_use]
    pub fn new(palette: &Palette) -> Self {
        Self::from_colors(palette)
    }

    /// Builds an index over a slice of colors.
    #[must_use]
    pub fn from_colors(colors: &[Srgb<u8>]) -> Self {
        let points = colors.iter().copied().map(components).collect::<Vec<_>>();
        let tree = KdTree::new(&points);
        debug!("built nearest color index over {} colors", tree.len());
        Self { colors: colors.to_vec(), tree }
    }

    /// The number of colors in the index.
    #[must_use]
    pub fn len(&self) -> usize {
        self.colors.len()
    }

    /// Whether the index was built from an empty palette.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// The palette colors, in their original order.
    #[must_use]
    pub fn colors(&self) -> &[Srgb<u8>] {
        &self.colors
    }

    /// Finds the palette color closest to `color`, a point in RGB space
    /// which need not have integer components.
    ///
    /// # Errors
    /// Returns [`MosaicError::EmptyPalette`] if the index was built from an empty palette,
    /// or [`MosaicError::NonFiniteColor`] if a component of `color` is NaN or infinite.
    pub fn nearest(&self, color: [f64; 3]) -> Result<Nearest> {
        if self.is_empty() {
            return Err(MosaicError::EmptyPalette);
        }
        if !color.iter().all(|c| c.is_finite()) {
            return Err(MosaicError::NonFiniteColor(color));
        }

        let (key, dist) = self
            .tree
            .nearest_neighbor(color)
            .ok_or(MosaicError::NonFiniteColor(color))?;
        let index = key as usize;
        Ok(Nearest {
            index,
            color: self.colors[index],
            distance: dist.sqrt(),
        })
    }

    /// Finds the palette color closest to the given color.
    ///
    /// # Errors
    /// Returns [`MosaicError::EmptyPalette`] if the index was built from an empty palette.
    pub fn nearest_color(&self, color: Srgb<u8>) -> Result<Nearest> {
        self.nearest(components(color))
    }

    /// The palette index of the color closest to `color`, or `None` for an empty palette.
    pub(crate) fn nearest_index(&self, color: [f64; 3]) -> Option<u32> {
        self.tree.nearest_neighbor(color).map(|(key, _)| key)
    }
}

impl From<&Palette> for NearestColorIndex {
    fn from(palette: &Palette) -> Self {
        Self::new(palette)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::{tests::*, ErrorKind};
    use rand::{seq::SliceRandom, Rng, SeedableRng};
    use rand_xoshiro::Xoroshiro128PlusPlus;

    /// Linear scan keeping the first of equally close colors.
    fn naive_nearest(colors: &[Srgb<u8>], query: [f64; 3]) -> (usize, f64) {
        let mut best = (0, f64::INFINITY);
        for (i, &color) in colors.iter().enumerate() {
            let dist = squared_distance(components(color), query);
            if dist < best.1 {
                best = (i, dist);
            }
        }
        best
    }

    fn assert_matches_oracle(colors: &[Srgb<u8>], queries: &[[f64; 3]]) {
        let index = NearestColorIndex::from_colors(colors);
        for &query in queries {
            let expected = naive_nearest(colors, query);
            let actual = index.nearest(query).unwrap();
            assert_eq!(actual.index, expected.0, "query {query:?}");
            assert_eq!(actual.color, colors[expected.0]);
            assert!((actual.distance - expected.1.sqrt()).abs() < 1e-9);
        }
    }

    #[test]
    fn empty_palette() {
        let index = NearestColorIndex::new(&Palette::new());
        assert!(index.is_empty());

        let err = index.nearest([1.0, 2.0, 3.0]).unwrap_err();
        assert!(matches!(err, MosaicError::EmptyPalette));
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert_eq!(index.nearest_index([0.0; 3]), None);
    }

    #[test]
    fn non_finite_queries() {
        let index = NearestColorIndex::from_colors(&[Srgb::new(0, 0, 0), Srgb::new(255, 255, 255)]);

        for query in [
            [f64::NAN, 0.0, 0.0],
            [0.0, f64::NAN, f64::NAN],
            [f64::INFINITY, 0.0, 0.0],
            [0.0, 0.0, f64::NEG_INFINITY],
        ] {
            let err = index.nearest(query).unwrap_err();
            assert!(matches!(err, MosaicError::NonFiniteColor(_)));
            assert_eq!(err.kind(), ErrorKind::InvalidInput);
        }

        assert_eq!(index.nearest_index([f64::NAN, 0.0, 0.0]), None);
        assert_eq!(index.nearest([0.0, 0.0, 0.0]).unwrap().index, 0);
    }

    #[test]
    fn exact_match_has_zero_distance() {
        let colors = test_data_256();
        let index = NearestColorIndex::from_colors(&colors);
        for (i, &color) in colors.iter().enumerate() {
            let nearest = index.nearest_color(color).unwrap();
            assert_eq!(nearest.color, color);
            #[allow(clippy::float_cmp)]
            {
                assert_eq!(nearest.distance, 0.0);
            }
            // the random test data may contain duplicates, in which case the first one wins
            assert_eq!(nearest.index, colors.iter().position(|&c| c == color).unwrap());
            assert!(nearest.index <= i);
        }
    }

    #[test]
    fn ties_prefer_lower_index() {
        let a = Srgb::new(0, 0, 0);
        let b = Srgb::new(10, 0, 0);

        let index = NearestColorIndex::from_colors(&[a, b]);
        for _ in 0..3 {
            assert_eq!(index.nearest([5.0, 0.0, 0.0]).unwrap().index, 0);
        }

        let index = NearestColorIndex::from_colors(&[b, a]);
        let nearest = index.nearest([5.0, 0.0, 0.0]).unwrap();
        assert_eq!((nearest.index, nearest.color), (0, b));

        let index = NearestColorIndex::from_colors(&[b, a, b, a]);
        assert_eq!(index.nearest_color(a).unwrap().index, 1);
        assert_eq!(index.nearest_color(b).unwrap().index, 0);
    }

    #[test]
    fn ties_across_leaves() {
        // a shuffled lattice has many equidistant neighbors for the midpoints
        // between lattice points,
        // and they end up spread over different leaves
        let steps = [0, 64, 128, 192, 255];
        let mut colors = Vec::new();
        for &r in &steps {
            for &g in &steps {
                for &b in &steps {
                    colors.push(Srgb::new(r, g, b));
                }
            }
        }
        colors.shuffle(&mut Xoroshiro128PlusPlus::seed_from_u64(7));

        let mids = [32.0, 96.0, 160.0, 223.5];
        let mut queries = Vec::new();
        for &r in &mids {
            for &g in &mids {
                for &b in &mids {
                    queries.push([r, g, b]);
                }
            }
        }
        for &r in &mids {
            for &g in &steps {
                queries.push([r, f64::from(g), 64.0]);
            }
        }

        assert_matches_oracle(&colors, &queries);
    }

    #[test]
    fn naive_nearest_neighbor_oracle() {
        let mut rng = Xoroshiro128PlusPlus::seed_from_u64(42);
        let queries = (0..512)
            .map(|_| [(); 3].map(|()| rng.gen_range(-10.0..265.0)))
            .collect::<Vec<_>>();

        let colors = test_data_256();
        for len in [1, 2, 7, 8, 9, 17, 100, 256] {
            assert_matches_oracle(&colors[..len], &queries);
        }

        // many duplicates
        let duplicated = [&colors[..5]; 20].concat();
        assert_matches_oracle(&duplicated, &queries);

        // a single repeated color
        let same = vec![Srgb::new(9, 9, 9); 40];
        let index = NearestColorIndex::from_colors(&same);
        assert_eq!(index.nearest([200.0, 0.0, 3.0]).unwrap().index, 0);
    }
}

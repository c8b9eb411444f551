//! Seeded isolation forest
//!
//! Outliers are easier to isolate with random axis-aligned splits, so they
//! end up on shorter root-to-leaf paths. The score of a row is
//! `2^(-E[h(x)] / c(psi))` where `psi` is the per-tree sample size; scores
//! near 1 are outliers, scores near 0.5 or below are ordinary.
//!
//! Every random choice comes from one `StdRng` seeded at fit time, so the
//! same rows and seed always yield the same scores.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Euler-Mascheroni constant
const EULER_GAMMA: f64 = 0.5772156649;

/// Average path length of an unsuccessful BST search over `n` items
pub fn average_path_length(n: usize) -> f64 {
    if n <= 1 {
        return 0.0;
    }
    let n = n as f64;
    2.0 * (n.ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
}

#[derive(Debug, Clone)]
enum Node {
    Internal {
        feature: usize,
        split: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
    Leaf {
        size: usize,
    },
}

impl Node {
    fn path_length(&self, row: &[f64], depth: usize) -> f64 {
        match self {
            Node::Leaf { size } => depth as f64 + average_path_length(*size),
            Node::Internal {
                feature,
                split,
                left,
                right,
            } => {
                let value = row.get(*feature).copied().unwrap_or(0.0);
                if value < *split {
                    left.path_length(row, depth + 1)
                } else {
                    right.path_length(row, depth + 1)
                }
            }
        }
    }
}

/// Fitted forest
#[derive(Debug, Clone)]
pub struct IsolationForest {
    trees: Vec<Node>,
    /// Rows drawn per tree
    sample_size: usize,
    /// `c(sample_size)`
    normalizer: f64,
}

impl IsolationForest {
    /// Fit on `rows` (all rows must have the same width)
    ///
    /// # Arguments
    /// * `n_trees` - Number of trees (at least one is built)
    /// * `max_samples` - Rows drawn without replacement per tree
    /// * `seed` - RNG seed
    pub fn fit(rows: &[Vec<f64>], n_trees: usize, max_samples: usize, seed: u64) -> Self {
        let sample_size = max_samples.min(rows.len());
        let mut forest = Self {
            trees: Vec::new(),
            sample_size,
            normalizer: average_path_length(sample_size),
        };
        if rows.is_empty() {
            return forest;
        }

        let width = rows.iter().map(Vec::len).min().unwrap_or(0);
        let max_depth = (sample_size.max(2) as f64).log2().ceil() as usize;
        let mut rng = StdRng::seed_from_u64(seed);

        for _ in 0..n_trees.max(1) {
            let indices = rand::seq::index::sample(&mut rng, rows.len(), sample_size).into_vec();
            let tree = build_node(rows, indices, width, 0, max_depth, &mut rng);
            forest.trees.push(tree);
        }

        tracing::trace!(
            trees = forest.trees.len(),
            sample_size,
            max_depth,
            "isolation_forest_fitted"
        );
        forest
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }

    pub fn sample_size(&self) -> usize {
        self.sample_size
    }

    /// Anomaly score in `(0, 1]`
    ///
    /// An unfitted forest, or one fitted on a single row, scores every row 0.5.
    pub fn score(&self, row: &[f64]) -> f64 {
        if self.trees.is_empty() || self.normalizer <= 0.0 {
            return 0.5;
        }
        let total: f64 = self.trees.iter().map(|t| t.path_length(row, 0)).sum();
        let avg = total / self.trees.len() as f64;
        2.0_f64.powf(-avg / self.normalizer)
    }

    pub fn score_all(&self, rows: &[Vec<f64>]) -> Vec<f64> {
        rows.iter().map(|row| self.score(row)).collect()
    }
}

fn build_node(
    rows: &[Vec<f64>],
    indices: Vec<usize>,
    width: usize,
    depth: usize,
    max_depth: usize,
    rng: &mut StdRng,
) -> Node {
    if depth >= max_depth || indices.len() <= 1 || width == 0 {
        return Node::Leaf {
            size: indices.len(),
        };
    }

    // Only features that still vary can split this node
    let candidates: Vec<(usize, f64, f64)> = (0..width)
        .filter_map(|feature| {
            let (min, max) = indices.iter().map(|&i| rows[i][feature]).fold(
                (f64::INFINITY, f64::NEG_INFINITY),
                |(lo, hi), v| (lo.min(v), hi.max(v)),
            );
            (min.is_finite() && max.is_finite() && max > min).then_some((feature, min, max))
        })
        .collect();

    if candidates.is_empty() {
        return Node::Leaf {
            size: indices.len(),
        };
    }

    let (feature, min, max) = candidates[rng.gen_range(0..candidates.len())];
    let split = min + rng.gen::<f64>() * (max - min);

    let (left, right): (Vec<usize>, Vec<usize>) =
        indices.into_iter().partition(|&i| rows[i][feature] < split);

    Node::Internal {
        feature,
        split,
        left: Box::new(build_node(rows, left, width, depth + 1, max_depth, rng)),
        right: Box::new(build_node(rows, right, width, depth + 1, max_depth, rng)),
    }
}

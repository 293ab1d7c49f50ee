//! Histogram regression trees
//!
//! Shared by both ensembles. Each feature is discretized once per fit into at
//! most [`MAX_BINS`] bins whose cut points come from training data only. Split
//! search then scans per-bin gradient sums instead of sorted raw values.
//!
//! # Split rule
//!
//! Bin `b` holds values in `(cuts[b-1], cuts[b]]`. A split at bin `b` sends
//! `x <= cuts[b]` left, so prediction on raw values agrees with training on
//! bins.
//!
//! # Gain
//!
//! With `G`/`n` the target sum/count of a node and `λ` the L2 leaf penalty:
//!
//! ```text
//! gain = G_L²/(n_L+λ) + G_R²/(n_R+λ) − G²/(n+λ)      leaf = G/(n+λ)
//! ```
//!
//! With `λ = 0` this is the squared-error impurity decrease (forest); with
//! `λ > 0` it is the second-order boosting gain for squared loss (boosting).

use crate::parallel;
use crate::split::FeatureMatrix;
use crate::{Error, Result};

/// Upper bound on bins per feature (bins are stored as `u8`)
pub const MAX_BINS: usize = 256;

/// Nodes with fewer rows sort their bins instead of filling a dense histogram
const SMALL_NODE_ROWS: usize = 64;

/// Splits must improve the objective by more than this
const MIN_SPLIT_GAIN: f64 = 1e-12;

/// Per-feature cut points learned from training data.
#[derive(Debug, Clone, PartialEq)]
pub struct BinMapper {
    cuts: Vec<Vec<f64>>,
}

impl BinMapper {
    /// Learn cut points for every column of `x`.
    ///
    /// Features with at most `max_bins` distinct values get one bin per value
    /// (cuts at midpoints); others get quantile cuts.
    ///
    /// # Errors
    /// Returns [`Error::InvalidInput`] if `max_bins` is outside `2..=256`
    pub fn fit(x: &FeatureMatrix, max_bins: usize) -> Result<Self> {
        if !(2..=MAX_BINS).contains(&max_bins) {
            return Err(Error::InvalidInput(format!(
                "max_bins must be in 2..={MAX_BINS}, got {max_bins}"
            )));
        }
        let columns: Vec<usize> = (0..x.n_cols()).collect();
        let cuts = parallel::map_slice(&columns, |&j| feature_cuts(x.column(j), max_bins));
        Ok(Self { cuts })
    }

    /// Number of features.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.cuts.len()
    }

    /// Number of bins used by `feature`.
    #[must_use]
    pub fn n_bins(&self, feature: usize) -> usize {
        self.cuts[feature].len() + 1
    }

    /// Raw-value threshold of a split at `bin`.
    #[must_use]
    pub fn threshold(&self, feature: usize, bin: u8) -> f64 {
        self.cuts[feature][usize::from(bin)]
    }

    /// Bin index of a raw value.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn bin(&self, feature: usize, value: f64) -> u8 {
        // cuts.len() < MAX_BINS, so the index fits
        self.cuts[feature].partition_point(|&c| c < value) as u8
    }

    /// Discretize a matrix with these cut points.
    ///
    /// # Errors
    /// Returns error if `x` has a different column count
    pub fn transform(&self, x: &FeatureMatrix) -> Result<BinnedMatrix> {
        if x.n_cols() != self.n_features() {
            return Err(Error::LengthMismatch {
                expected: self.n_features(),
                actual: x.n_cols(),
            });
        }
        let n_rows = x.n_rows();
        let mut bins = vec![0u8; n_rows * x.n_cols()];
        for (i, row) in x.rows().enumerate() {
            for (j, &v) in row.iter().enumerate() {
                bins[j * n_rows + i] = self.bin(j, v);
            }
        }
        Ok(BinnedMatrix { bins, n_rows })
    }
}

fn feature_cuts(mut values: Vec<f64>, max_bins: usize) -> Vec<f64> {
    values.sort_by(f64::total_cmp);
    let mut distinct = values.clone();
    distinct.dedup();

    if distinct.len() <= max_bins {
        return distinct
            .windows(2)
            .map(|w| w[0] + (w[1] - w[0]) / 2.0)
            .collect();
    }

    let n = values.len();
    let max = values[n - 1];
    let mut cuts: Vec<f64> = (1..max_bins)
        .map(|k| values[(k * n / max_bins).min(n - 1)])
        .collect();
    cuts.dedup();
    // a cut at the maximum would leave the top bin empty
    cuts.retain(|&c| c < max);
    cuts
}

/// Column-major bin indices of a feature matrix.
#[derive(Debug, Clone)]
pub struct BinnedMatrix {
    bins: Vec<u8>,
    n_rows: usize,
}

impl BinnedMatrix {
    /// Number of rows.
    #[must_use]
    pub const fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Bin of one cell.
    #[inline]
    #[must_use]
    pub fn get(&self, row: usize, feature: usize) -> u8 {
        self.bins[feature * self.n_rows + row]
    }
}

/// Growth limits for one tree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeParams {
    /// Maximum depth; `None` grows until leaves are pure or too small
    pub max_depth: Option<usize>,
    /// Minimum rows on each side of a split
    pub min_samples_leaf: usize,
    /// L2 penalty on leaf values
    pub reg_lambda: f64,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_leaf: 1,
            reg_lambda: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        bin: u8,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// A fitted regression tree.
#[derive(Debug, Clone)]
pub struct RegressionTree {
    nodes: Vec<Node>,
    gains: Vec<f64>,
    splits: Vec<usize>,
}

struct PendingNode {
    node: usize,
    start: usize,
    end: usize,
    depth: usize,
}

#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature: usize,
    bin: u8,
    gain: f64,
}

impl RegressionTree {
    /// Grow a tree on `rows` (repeats allowed, e.g. a bootstrap sample),
    /// considering only `features`.
    #[must_use]
    pub fn grow(
        binned: &BinnedMatrix,
        mapper: &BinMapper,
        targets: &[f64],
        mut rows: Vec<u32>,
        features: &[usize],
        params: &TreeParams,
    ) -> Self {
        let mut tree = Self {
            nodes: vec![Node::Leaf { value: 0.0 }],
            gains: vec![0.0; mapper.n_features()],
            splits: vec![0; mapper.n_features()],
        };
        let mut stack = vec![PendingNode {
            node: 0,
            start: 0,
            end: rows.len(),
            depth: 0,
        }];

        while let Some(pending) = stack.pop() {
            let node_rows = &mut rows[pending.start..pending.end];
            let stats = NodeStats::of(node_rows, targets);
            tree.nodes[pending.node] = Node::Leaf {
                value: stats.leaf_value(params.reg_lambda),
            };

            let depth_left = params.max_depth.map_or(true, |d| pending.depth < d);
            if !depth_left || stats.pure || node_rows.len() < 2 * params.min_samples_leaf {
                continue;
            }
            let Some(best) = best_split(binned, mapper, targets, node_rows, features, params, &stats)
            else {
                continue;
            };

            let mid = pending.start
                + partition(node_rows, |r| binned.get(r as usize, best.feature) <= best.bin);
            let left = tree.nodes.len();
            tree.nodes.push(Node::Leaf { value: 0.0 });
            tree.nodes.push(Node::Leaf { value: 0.0 });
            tree.nodes[pending.node] = Node::Split {
                feature: best.feature,
                bin: best.bin,
                threshold: mapper.threshold(best.feature, best.bin),
                left,
                right: left + 1,
            };
            tree.gains[best.feature] += best.gain;
            tree.splits[best.feature] += 1;

            stack.push(PendingNode {
                node: left + 1,
                start: mid,
                end: pending.end,
                depth: pending.depth + 1,
            });
            stack.push(PendingNode {
                node: left,
                start: pending.start,
                end: mid,
                depth: pending.depth + 1,
            });
        }
        tree
    }

    /// Predict one row of raw feature values.
    #[must_use]
    pub fn predict_row(&self, row: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match self.nodes[idx] {
                Node::Leaf { value } => return value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => idx = if row[feature] <= threshold { left } else { right },
            }
        }
    }

    /// Predict one row of a binned matrix.
    #[must_use]
    pub fn predict_binned(&self, binned: &BinnedMatrix, row: usize) -> f64 {
        let mut idx = 0;
        loop {
            match self.nodes[idx] {
                Node::Leaf { value } => return value,
                Node::Split {
                    feature,
                    bin,
                    left,
                    right,
                    ..
                } => idx = if binned.get(row, feature) <= bin { left } else { right },
            }
        }
    }

    /// Total split gain per feature.
    #[must_use]
    pub fn feature_gains(&self) -> &[f64] {
        &self.gains
    }

    /// Number of splits per feature.
    #[must_use]
    pub fn split_counts(&self) -> &[usize] {
        &self.splits
    }

    /// Number of leaves.
    #[must_use]
    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }

    /// Depth of the deepest leaf (a lone root has depth 0).
    #[must_use]
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack = vec![(0usize, 0usize)];
        while let Some((idx, depth)) = stack.pop() {
            match self.nodes[idx] {
                Node::Leaf { .. } => deepest = deepest.max(depth),
                Node::Split { left, right, .. } => {
                    stack.push((left, depth + 1));
                    stack.push((right, depth + 1));
                }
            }
        }
        deepest
    }
}

struct NodeStats {
    sum: f64,
    count: usize,
    pure: bool,
}

impl NodeStats {
    #[allow(clippy::float_cmp)]
    fn of(rows: &[u32], targets: &[f64]) -> Self {
        let first = rows.first().map_or(0.0, |&r| targets[r as usize]);
        let mut sum = 0.0;
        let mut pure = true;
        for &r in rows {
            let t = targets[r as usize];
            sum += t;
            pure &= t == first;
        }
        Self {
            sum,
            count: rows.len(),
            pure,
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn leaf_value(&self, lambda: f64) -> f64 {
        let denom = self.count as f64 + lambda;
        if denom > 0.0 {
            self.sum / denom
        } else {
            0.0
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn score(sum: f64, count: usize, lambda: f64) -> f64 {
    sum * sum / (count as f64 + lambda)
}

/// Non-empty bins of one feature within a node, ascending: (bin, sum, count).
#[allow(clippy::cast_possible_truncation)]
fn bin_totals(binned: &BinnedMatrix, targets: &[f64], rows: &[u32], feature: usize) -> Vec<(u8, f64, usize)> {
    if rows.len() < SMALL_NODE_ROWS {
        let mut pairs: Vec<(u8, f64)> = rows
            .iter()
            .map(|&r| (binned.get(r as usize, feature), targets[r as usize]))
            .collect();
        pairs.sort_by_key(|&(b, _)| b);
        let mut totals: Vec<(u8, f64, usize)> = Vec::new();
        for (b, t) in pairs {
            match totals.last_mut() {
                Some(last) if last.0 == b => {
                    last.1 += t;
                    last.2 += 1;
                }
                _ => totals.push((b, t, 1)),
            }
        }
        return totals;
    }

    let mut sums = [0.0f64; MAX_BINS];
    let mut counts = [0usize; MAX_BINS];
    for &r in rows {
        let b = usize::from(binned.get(r as usize, feature));
        sums[b] += targets[r as usize];
        counts[b] += 1;
    }
    (0..MAX_BINS)
        .filter(|&b| counts[b] > 0)
        .map(|b| (b as u8, sums[b], counts[b]))
        .collect()
}

fn best_split(
    binned: &BinnedMatrix,
    mapper: &BinMapper,
    targets: &[f64],
    rows: &[u32],
    features: &[usize],
    params: &TreeParams,
    stats: &NodeStats,
) -> Option<SplitCandidate> {
    let lambda = params.reg_lambda;
    let parent = score(stats.sum, stats.count, lambda);
    let mut best: Option<SplitCandidate> = None;

    for &feature in features {
        if mapper.n_bins(feature) < 2 {
            continue;
        }
        let totals = bin_totals(binned, targets, rows, feature);
        let (mut left_sum, mut left_count) = (0.0, 0usize);

        // the last non-empty bin cannot be a split point
        for &(bin, sum, count) in totals.iter().take(totals.len().saturating_sub(1)) {
            left_sum += sum;
            left_count += count;
            let right_count = stats.count - left_count;
            if left_count < params.min_samples_leaf || right_count < params.min_samples_leaf {
                continue;
            }
            let gain = score(left_sum, left_count, lambda)
                + score(stats.sum - left_sum, right_count, lambda)
                - parent;
            if gain > MIN_SPLIT_GAIN && best.map_or(true, |b| gain > b.gain) {
                best = Some(SplitCandidate { feature, bin, gain });
            }
        }
    }
    best
}

/// Stable partition; returns the number of rows sent left.
fn partition(rows: &mut [u32], goes_left: impl Fn(u32) -> bool) -> usize {
    let (left, right): (Vec<u32>, Vec<u32>) = rows.iter().partition(|&&r| goes_left(r));
    let mid = left.len();
    rows[..mid].copy_from_slice(&left);
    rows[mid..].copy_from_slice(&right);
    mid
}

//! CART regression tree
//!
//! Nodes live in a flat arena; children are referenced by index. Splits send a
//! sample left when `x[feature] <= threshold`.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Node in a regression tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Leaf {
        value: f64,
        samples: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
        /// Reduction in sum of squared errors achieved by this split
        gain: f64,
    },
}

/// Growth limits for a single tree
#[derive(Debug, Clone, Copy)]
pub struct TreeParams {
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Non-constant candidate features examined per split
    pub max_features: usize,
}

#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature: usize,
    threshold: f64,
    child_sse: f64,
}

/// A fitted regression tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
    n_features: usize,
}

impl RegressionTree {
    /// Grow a tree on the given rows of `x`/`y`. Rows may repeat (bootstrap).
    pub fn fit<R: Rng + ?Sized>(
        x: &[Vec<f64>],
        y: &[f64],
        rows: &[usize],
        params: &TreeParams,
        rng: &mut R,
    ) -> Self {
        let n_features = x.first().map_or(0, |row| row.len());
        let mut builder = TreeBuilder {
            x,
            y,
            params,
            n_features,
            nodes: Vec::new(),
        };
        let mut indices = rows.to_vec();
        builder.grow(&mut indices, rng);

        RegressionTree {
            nodes: builder.nodes,
            n_features,
        }
    }

    pub fn predict(&self, sample: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value, .. } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    idx = if sample[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }

    /// Longest root-to-leaf path, in edges. Relies on children being stored
    /// after their parent.
    pub fn depth(&self) -> usize {
        let mut depths = vec![0usize; self.nodes.len()];
        let mut deepest = 0;
        for (i, node) in self.nodes.iter().enumerate() {
            let d = depths[i];
            deepest = deepest.max(d);
            if let Node::Split { left, right, .. } = node {
                for child in [*left, *right] {
                    if let Some(slot) = depths.get_mut(child) {
                        *slot = d + 1;
                    }
                }
            }
        }
        deepest
    }

    /// Add each split's gain to `totals[feature]`
    pub fn accumulate_gain(&self, totals: &mut [f64]) {
        for node in &self.nodes {
            if let Node::Split { feature, gain, .. } = node {
                totals[*feature] += gain;
            }
        }
    }

    /// Check node links and feature references (for trees loaded from disk)
    pub fn is_well_formed(&self) -> bool {
        if self.nodes.is_empty() {
            return false;
        }
        self.nodes.iter().enumerate().all(|(i, node)| match node {
            Node::Leaf { value, .. } => value.is_finite(),
            Node::Split {
                feature,
                left,
                right,
                ..
            } => {
                *feature < self.n_features
                    && *left > i
                    && *right > i
                    && *left < self.nodes.len()
                    && *right < self.nodes.len()
            }
        })
    }
}

struct TreeBuilder<'a> {
    x: &'a [Vec<f64>],
    y: &'a [f64],
    params: &'a TreeParams,
    n_features: usize,
    nodes: Vec<Node>,
}

impl TreeBuilder<'_> {
    /// Grow the tree over `indices` depth-first with an explicit work stack.
    /// Children are always appended after their parent.
    fn grow<R: Rng + ?Sized>(&mut self, indices: &mut [usize], rng: &mut R) {
        self.nodes.push(leaf(self.y, indices));
        let mut stack = vec![(0, 0, indices.len(), 0)];

        while let Some((node_idx, start, end, depth)) = stack.pop() {
            let rows = &mut indices[start..end];
            let Some((best, gain)) = self.try_split(rows, depth, rng) else {
                continue;
            };

            let x = self.x;
            let split_at = start + partition(rows, |i| x[i][best.feature] <= best.threshold);

            let left = self.nodes.len();
            self.nodes.push(leaf(self.y, &indices[start..split_at]));
            let right = self.nodes.len();
            self.nodes.push(leaf(self.y, &indices[split_at..end]));

            self.nodes[node_idx] = Node::Split {
                feature: best.feature,
                threshold: best.threshold,
                left,
                right,
                gain,
            };

            // Left subtree is expanded first
            stack.push((right, split_at, end, depth + 1));
            stack.push((left, start, split_at, depth + 1));
        }
    }

    /// Best split for a node and its gain, or `None` if the node stays a leaf
    fn try_split<R: Rng + ?Sized>(
        &self,
        rows: &[usize],
        depth: usize,
        rng: &mut R,
    ) -> Option<(SplitCandidate, f64)> {
        let n = rows.len();
        let mean = rows.iter().map(|&i| self.y[i]).sum::<f64>() / n as f64;
        let sse = rows.iter().map(|&i| (self.y[i] - mean).powi(2)).sum::<f64>();

        let depth_reached = self.params.max_depth.is_some_and(|d| depth >= d);
        if depth_reached
            || n < self.params.min_samples_split
            || n < 2 * self.params.min_samples_leaf
            || sse <= f64::EPSILON * mean.abs().max(1.0)
        {
            return None;
        }

        let best = self.best_split(rows, mean, rng)?;
        let gain = sse - best.child_sse;
        (gain > 0.0).then_some((best, gain))
    }

    /// Best split over a random subset of non-constant features
    fn best_split<R: Rng + ?Sized>(
        &self,
        indices: &[usize],
        mean: f64,
        rng: &mut R,
    ) -> Option<SplitCandidate> {
        let mut order: Vec<usize> = (0..self.n_features).collect();
        order.shuffle(rng);

        let mut best: Option<SplitCandidate> = None;
        let mut examined = 0;
        let mut sorted = indices.to_vec();

        for feature in order {
            if examined >= self.params.max_features {
                break;
            }

            sorted.sort_by(|&a, &b| self.x[a][feature].total_cmp(&self.x[b][feature]));
            let lo = self.x[sorted[0]][feature];
            let hi = self.x[sorted[sorted.len() - 1]][feature];
            if lo == hi {
                continue;
            }
            examined += 1;

            if let Some(candidate) = self.scan_feature(&sorted, feature, mean) {
                if best.map_or(true, |b| candidate.child_sse < b.child_sse) {
                    best = Some(candidate);
                }
            }
        }

        best
    }

    /// Sweep split positions along rows sorted by `feature`
    fn scan_feature(&self, sorted: &[usize], feature: usize, mean: f64) -> Option<SplitCandidate> {
        let n = sorted.len();
        let min_leaf = self.params.min_samples_leaf;

        // Centered sums keep the SSE arithmetic well conditioned
        let (total_sum, total_sq) = sorted.iter().fold((0.0, 0.0), |(s, q), &i| {
            let d = self.y[i] - mean;
            (s + d, q + d * d)
        });

        let mut left_sum = 0.0;
        let mut left_sq = 0.0;
        let mut best: Option<SplitCandidate> = None;

        for k in 1..n {
            let d = self.y[sorted[k - 1]] - mean;
            left_sum += d;
            left_sq += d * d;

            let below = self.x[sorted[k - 1]][feature];
            let above = self.x[sorted[k]][feature];
            if below == above || k < min_leaf || n - k < min_leaf {
                continue;
            }

            let n_left = k as f64;
            let n_right = (n - k) as f64;
            let right_sum = total_sum - left_sum;
            let right_sq = total_sq - left_sq;
            let child_sse = (left_sq - left_sum * left_sum / n_left)
                + (right_sq - right_sum * right_sum / n_right);

            if best.map_or(true, |b| child_sse < b.child_sse) {
                let mid = below + (above - below) / 2.0;
                let threshold = if mid < above { mid } else { below };
                best = Some(SplitCandidate {
                    feature,
                    threshold,
                    child_sse: child_sse.max(0.0),
                });
            }
        }

        best
    }
}

/// Reorder so rows matching `pred` come first; returns how many matched
fn leaf(y: &[f64], rows: &[usize]) -> Node {
    let mean = rows.iter().map(|&i| y[i]).sum::<f64>() / rows.len() as f64;
    Node::Leaf {
        value: mean,
        samples: rows.len(),
    }
}

fn partition(indices: &mut [usize], pred: impl Fn(usize) -> bool) -> usize {
    let mut boundary = 0;
    for k in 0..indices.len() {
        if pred(indices[k]) {
            indices.swap(boundary, k);
            boundary += 1;
        }
    }
    boundary
}

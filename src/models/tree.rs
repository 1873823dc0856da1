//! Second-order regression trees grown on feature histograms

use crate::models::histogram::{BinMapper, BinnedMatrix, MISSING_BIN};
use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

/// Tree node. Children are indices into the owning tree's node list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Split {
        feature: usize,
        threshold: f64,
        /// Direction taken by NaN values
        default_left: bool,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

/// A fitted regression tree producing a margin contribution per row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

impl RegressionTree {
    pub fn predict_row(&self, row: ArrayView1<'_, f64>) -> f64 {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    default_left,
                    left,
                    right,
                } => {
                    let v = row[*feature];
                    index = if v.is_nan() {
                        if *default_left {
                            *left
                        } else {
                            *right
                        }
                    } else if v < *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }
}

/// Growth limits and regularisation for a single tree
#[derive(Debug, Clone, Copy)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_child_weight: f64,
    pub reg_lambda: f64,
    pub gamma: f64,
    pub learning_rate: f64,
}

impl TreeParams {
    fn leaf_value(&self, g: f64, h: f64) -> f64 {
        -g / (h + self.reg_lambda) * self.learning_rate
    }

    fn score(&self, g: f64, h: f64) -> f64 {
        g * g / (h + self.reg_lambda)
    }
}

#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature: usize,
    bin: usize,
    default_left: bool,
    gain: f64,
}

/// Grows one tree from gradients and hessians of the current ensemble
pub struct TreeBuilder<'a> {
    mapper: &'a BinMapper,
    binned: &'a BinnedMatrix,
    grad: &'a [f64],
    hess: &'a [f64],
    features: &'a [usize],
    params: TreeParams,
    nodes: Vec<Node>,
}

impl<'a> TreeBuilder<'a> {
    pub fn new(
        mapper: &'a BinMapper,
        binned: &'a BinnedMatrix,
        grad: &'a [f64],
        hess: &'a [f64],
        features: &'a [usize],
        params: TreeParams,
    ) -> Self {
        Self {
            mapper,
            binned,
            grad,
            hess,
            features,
            params,
            nodes: Vec::new(),
        }
    }

    /// Grow a tree over `rows`
    pub fn build(mut self, rows: Vec<usize>) -> RegressionTree {
        self.grow(rows, 0);
        RegressionTree { nodes: self.nodes }
    }

    fn grow(&mut self, rows: Vec<usize>, depth: usize) -> usize {
        let (g, h) = rows
            .iter()
            .fold((0.0, 0.0), |(g, h), &r| (g + self.grad[r], h + self.hess[r]));

        let index = self.nodes.len();
        self.nodes.push(Node::Leaf {
            value: self.params.leaf_value(g, h),
        });

        if depth >= self.params.max_depth || rows.len() < 2 {
            return index;
        }

        let Some(split) = self.best_split(&rows, g, h) else {
            return index;
        };

        let column = self.binned.column(split.feature);
        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows.into_iter().partition(|&r| {
            let bin = column[r];
            if bin == MISSING_BIN {
                split.default_left
            } else {
                bin as usize <= split.bin
            }
        });

        let left = self.grow(left_rows, depth + 1);
        let right = self.grow(right_rows, depth + 1);
        self.nodes[index] = Node::Split {
            feature: split.feature,
            threshold: self.mapper.threshold(split.feature, split.bin),
            default_left: split.default_left,
            left,
            right,
        };

        index
    }

    fn best_split(&self, rows: &[usize], g_total: f64, h_total: f64) -> Option<SplitCandidate> {
        let parent_score = self.params.score(g_total, h_total);
        let mut best: Option<SplitCandidate> = None;

        for &feature in self.features {
            let n_bins = self.mapper.n_bins(feature);
            if n_bins < 2 {
                continue;
            }

            let column = self.binned.column(feature);
            let mut hist = vec![(0.0f64, 0.0f64); n_bins];
            let (mut g_missing, mut h_missing) = (0.0, 0.0);
            for &r in rows {
                let bin = column[r];
                if bin == MISSING_BIN {
                    g_missing += self.grad[r];
                    h_missing += self.hess[r];
                } else {
                    let slot = &mut hist[bin as usize];
                    slot.0 += self.grad[r];
                    slot.1 += self.hess[r];
                }
            }

            let (mut g_left, mut h_left) = (0.0, 0.0);
            for (bin, &(g_bin, h_bin)) in hist.iter().enumerate().take(n_bins - 1) {
                g_left += g_bin;
                h_left += h_bin;

                for default_left in [false, true] {
                    let (gl, hl) = if default_left {
                        (g_left + g_missing, h_left + h_missing)
                    } else {
                        (g_left, h_left)
                    };
                    let (gr, hr) = (g_total - gl, h_total - hl);
                    if hl < self.params.min_child_weight || hr < self.params.min_child_weight {
                        continue;
                    }

                    let gain = 0.5
                        * (self.params.score(gl, hl) + self.params.score(gr, hr) - parent_score)
                        - self.params.gamma;
                    if gain > best.map_or(0.0, |b| b.gain) {
                        best = Some(SplitCandidate {
                            feature,
                            bin,
                            default_left,
                            gain,
                        });
                    }
                }
            }
        }

        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    fn params() -> TreeParams {
        TreeParams {
            max_depth: 3,
            min_child_weight: 0.0,
            reg_lambda: 1.0,
            gamma: 0.0,
            learning_rate: 1.0,
        }
    }

    fn grow(x: &Array2<f64>, grad: &[f64], hess: &[f64]) -> RegressionTree {
        let mapper = BinMapper::fit(x, 256);
        let binned = mapper.transform(x);
        let features: Vec<usize> = (0..x.ncols()).collect();
        TreeBuilder::new(&mapper, &binned, grad, hess, &features, params())
            .build((0..x.nrows()).collect())
    }

    #[test]
    fn test_separable_feature_splits() {
        let x = array![[0.0, 5.0], [1.0, 5.0], [10.0, 5.0], [11.0, 5.0]];
        // negative gradient pushes rows 2 and 3 up
        let grad = [1.0, 1.0, -1.0, -1.0];
        let hess = [1.0; 4];

        let tree = grow(&x, &grad, &hess);

        match &tree.nodes()[0] {
            Node::Split { feature, threshold, .. } => {
                assert_eq!(*feature, 0);
                assert_eq!(*threshold, 5.5);
            }
            other => panic!("expected split, got {:?}", other),
        }
        assert!(tree.predict_row(x.row(0)) < 0.0);
        assert!(tree.predict_row(x.row(3)) > 0.0);
    }

    #[test]
    fn test_leaf_value_is_newton_step() {
        let x = array![[1.0], [1.0]];
        let tree = grow(&x, &[0.5, 0.5], &[0.25, 0.25]);

        assert_eq!(tree.n_leaves(), 1);
        assert!((tree.predict_row(x.row(0)) - (-1.0 / 1.5)).abs() < 1e-12);
    }

    #[test]
    fn test_missing_values_follow_default_direction() {
        let x = array![[0.0], [1.0], [f64::NAN], [f64::NAN], [10.0], [11.0]];
        let grad = [1.0, 1.0, -1.0, -1.0, -1.0, -1.0];
        let hess = [1.0; 6];

        let tree = grow(&x, &grad, &hess);

        match &tree.nodes()[0] {
            Node::Split { default_left, .. } => assert!(!*default_left),
            other => panic!("expected split, got {:?}", other),
        }
        let nan_row = array![f64::NAN];
        assert!(tree.predict_row(nan_row.view()) > 0.0);
    }

    #[test]
    fn test_depth_limit() {
        let x = Array2::from_shape_fn((64, 1), |(r, _)| r as f64);
        let grad: Vec<f64> = (0..64).map(|r| if r % 2 == 0 { 1.0 } else { -1.0 }).collect();
        let hess = vec![1.0; 64];

        let tree = grow(&x, &grad, &hess);
        assert!(tree.n_leaves() <= 8);
    }
}

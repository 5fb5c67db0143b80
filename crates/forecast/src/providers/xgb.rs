//! Gradient-boosted regression trees over lag and calendar features.

use stockcast_core::{stats, DemandSeries, ProviderName};

use crate::features::FeatureSpec;
use crate::provider::{ensure_history, ForecastProvider};
use crate::result::ProviderError;

/// Training rows required past the feature warmup.
const MIN_TRAINING_ROWS: usize = 7;

#[derive(Debug, Clone, PartialEq)]
pub struct GradientBoostedProvider {
    features: FeatureSpec,
    n_trees: usize,
    learning_rate: f64,
    max_depth: usize,
    min_leaf: usize,
}

impl Default for GradientBoostedProvider {
    fn default() -> Self {
        Self {
            features: FeatureSpec::default(),
            n_trees: 100,
            learning_rate: 0.1,
            max_depth: 3,
            min_leaf: 3,
        }
    }
}

impl GradientBoostedProvider {
    pub fn with_features(mut self, features: FeatureSpec) -> Self {
        self.features = features;
        self
    }

    pub fn with_trees(mut self, n_trees: usize, learning_rate: f64) -> Self {
        self.n_trees = n_trees;
        self.learning_rate = learning_rate;
        self
    }

    pub fn with_depth(mut self, max_depth: usize, min_leaf: usize) -> Self {
        self.max_depth = max_depth;
        self.min_leaf = min_leaf.max(1);
        self
    }

    fn fit(&self, x: &[Vec<f64>], y: &[f64]) -> Ensemble {
        let base = stats::mean(y);
        let mut pred = vec![base; y.len()];
        let mut trees = Vec::with_capacity(self.n_trees);

        for _ in 0..self.n_trees {
            let residual: Vec<f64> = y.iter().zip(&pred).map(|(t, p)| t - p).collect();
            let idx: Vec<usize> = (0..y.len()).collect();
            let tree = self.grow(x, &residual, idx, 0);
            for (i, p) in pred.iter_mut().enumerate() {
                *p += self.learning_rate * tree.predict(&x[i]);
            }
            trees.push(tree);
        }

        Ensemble {
            base,
            learning_rate: self.learning_rate,
            trees,
        }
    }

    fn grow(&self, x: &[Vec<f64>], r: &[f64], idx: Vec<usize>, depth: usize) -> Node {
        let n = idx.len();
        let total: f64 = idx.iter().map(|&i| r[i]).sum();
        let leaf = Node::Leaf(total / n as f64);

        if depth >= self.max_depth || n < 2 * self.min_leaf {
            return leaf;
        }

        let Some(split) = self.best_split(x, r, &idx, total) else {
            return leaf;
        };

        let (left, right): (Vec<usize>, Vec<usize>) = idx
            .into_iter()
            .partition(|&i| x[i][split.feature] <= split.threshold);

        Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left: Box::new(self.grow(x, r, left, depth + 1)),
            right: Box::new(self.grow(x, r, right, depth + 1)),
        }
    }

    /// Exhaustive search for the split maximising the squared-error reduction.
    fn best_split(&self, x: &[Vec<f64>], r: &[f64], idx: &[usize], total: f64) -> Option<Split> {
        let n = idx.len();
        let parent = total * total / n as f64;
        let width = x.get(idx[0]).map_or(0, Vec::len);
        let mut best: Option<Split> = None;
        let mut best_gain = 1e-12;

        for feature in 0..width {
            let mut order = idx.to_vec();
            order.sort_by(|&a, &b| x[a][feature].total_cmp(&x[b][feature]));

            let mut left_sum = 0.0;
            for pos in 0..n - 1 {
                left_sum += r[order[pos]];
                let left_n = pos + 1;
                let right_n = n - left_n;
                if left_n < self.min_leaf || right_n < self.min_leaf {
                    continue;
                }
                let here = x[order[pos]][feature];
                let next = x[order[pos + 1]][feature];
                if here == next {
                    continue;
                }

                let right_sum = total - left_sum;
                let gain = left_sum * left_sum / left_n as f64
                    + right_sum * right_sum / right_n as f64
                    - parent;
                if gain > best_gain {
                    best_gain = gain;
                    best = Some(Split {
                        feature,
                        threshold: 0.5 * (here + next),
                    });
                }
            }
        }
        best
    }
}

impl ForecastProvider for GradientBoostedProvider {
    fn name(&self) -> ProviderName {
        ProviderName::XGB
    }

    fn min_history(&self) -> usize {
        self.features.warmup() + MIN_TRAINING_ROWS
    }

    fn forecast(&self, history: &DemandSeries, horizon: usize) -> Result<Vec<f64>, ProviderError> {
        ensure_history(history, self.min_history())?;

        let (x, y) = self.features.matrix(history.values(), history.dates());
        if y.is_empty() {
            return Err(ProviderError::InvalidInput(
                "no training rows after feature warmup".to_string(),
            ));
        }
        let model = self.fit(&x, &y);

        // Recursive: each prediction becomes the next step's lag input.
        let mut values = history.values().to_vec();
        let mut out = Vec::with_capacity(horizon);
        for date in history.future_dates(horizon) {
            let row = self.features.row(&values, date).ok_or_else(|| {
                ProviderError::FitFailed("feature row unavailable during recursion".to_string())
            })?;
            let yhat = model.predict(&row);
            if !yhat.is_finite() {
                return Err(ProviderError::FitFailed("non-finite prediction".to_string()));
            }
            out.push(yhat);
            values.push(yhat.max(0.0));
        }
        Ok(out)
    }
}

struct Split {
    feature: usize,
    threshold: f64,
}

#[derive(Debug)]
enum Node {
    Leaf(f64),
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    fn predict(&self, row: &[f64]) -> f64 {
        let mut node = self;
        loop {
            match node {
                Node::Leaf(v) => return *v,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row[*feature] <= *threshold { left } else { right };
                }
            }
        }
    }
}

#[derive(Debug)]
struct Ensemble {
    base: f64,
    learning_rate: f64,
    trees: Vec<Node>,
}

impl Ensemble {
    fn predict(&self, row: &[f64]) -> f64 {
        self.base
            + self.learning_rate * self.trees.iter().map(|t| t.predict(row)).sum::<f64>()
    }
}

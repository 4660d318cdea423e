//! Random-forest classifier over the five risk features.
//!
//! Each tree is a CART tree grown on a bootstrap sample with Gini impurity,
//! considering a random subset of features at every node. Trees are fitted
//! in parallel; tree `t` draws from its own RNG seeded with `seed + t`, so a
//! fixed seed gives the same forest regardless of thread scheduling.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::ForestConfig;
use crate::error::{ModelError, ModelResult};

use super::features::N_FEATURES;

/// One training/prediction row.
pub type Sample = [f64; N_FEATURES];

#[derive(Debug, Clone, Serialize, Deserialize)]
enum Node {
    /// Class probabilities of the training samples that reached this leaf.
    Leaf { distribution: Vec<f64> },
    /// Samples with `x[feature] <= threshold` go left.
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// A single fitted tree. The root is `nodes[0]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
}

impl DecisionTree {
    fn predict_proba(&self, x: &Sample) -> &[f64] {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { distribution } => return distribution,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if x[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    /// Every path from the root ends at a leaf of `n_classes` probabilities
    /// and every split reads a feature inside a [`Sample`].
    ///
    /// Children always sit after their parent, so checking `parent < child`
    /// also rules out cycles.
    fn is_well_formed(&self, n_classes: usize) -> bool {
        !self.nodes.is_empty()
            && self.nodes.iter().enumerate().all(|(idx, node)| match node {
                Node::Leaf { distribution } => distribution.len() == n_classes,
                Node::Split {
                    feature,
                    left,
                    right,
                    ..
                } => {
                    *feature < N_FEATURES
                        && [*left, *right]
                            .iter()
                            .all(|&child| child > idx && child < self.nodes.len())
                }
            })
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match &nodes[idx] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        walk(&self.nodes, 0)
    }
}

struct TreeBuilder<'a> {
    x: &'a [Sample],
    y: &'a [usize],
    n_classes: usize,
    max_depth: Option<usize>,
    min_samples_split: usize,
    max_features: usize,
    rng: StdRng,
    nodes: Vec<Node>,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    impurity: f64,
}

impl<'a> TreeBuilder<'a> {
    fn build(mut self, sample: Vec<usize>) -> DecisionTree {
        self.grow(&sample, 0);
        DecisionTree { nodes: self.nodes }
    }

    fn grow(&mut self, sample: &[usize], depth: usize) -> usize {
        let counts = self.class_counts(sample);
        let is_pure = counts.iter().filter(|&&c| c > 0).count() <= 1;
        let depth_reached = self.max_depth.is_some_and(|max| depth >= max);

        if is_pure || depth_reached || sample.len() < self.min_samples_split {
            return self.leaf(&counts, sample.len());
        }

        let Some(split) = self.best_split(sample) else {
            return self.leaf(&counts, sample.len());
        };

        let x = self.x;
        let (left, right): (Vec<usize>, Vec<usize>) = sample
            .iter()
            .partition(|&&i| x[i][split.feature] <= split.threshold);

        let idx = self.nodes.len();
        self.nodes.push(Node::Leaf {
            distribution: Vec::new(),
        });
        let left_idx = self.grow(&left, depth + 1);
        let right_idx = self.grow(&right, depth + 1);
        self.nodes[idx] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left: left_idx,
            right: right_idx,
        };
        idx
    }

    fn leaf(&mut self, counts: &[usize], total: usize) -> usize {
        let total = total.max(1) as f64;
        let distribution = counts.iter().map(|&c| c as f64 / total).collect();
        self.nodes.push(Node::Leaf { distribution });
        self.nodes.len() - 1
    }

    fn class_counts(&self, sample: &[usize]) -> Vec<usize> {
        let mut counts = vec![0; self.n_classes];
        for &i in sample {
            counts[self.y[i]] += 1;
        }
        counts
    }

    /// Scan features in random order until `max_features` non-constant ones
    /// have been evaluated, keeping the lowest weighted Gini impurity.
    fn best_split(&mut self, sample: &[usize]) -> Option<BestSplit> {
        let mut order: Vec<usize> = (0..N_FEATURES).collect();
        order.shuffle(&mut self.rng);

        let mut best: Option<BestSplit> = None;
        let mut visited = 0;
        let mut column: Vec<(f64, usize)> = Vec::with_capacity(sample.len());

        for feature in order {
            if visited >= self.max_features {
                break;
            }

            column.clear();
            column.extend(sample.iter().map(|&i| (self.x[i][feature], self.y[i])));
            column.sort_by(|a, b| a.0.total_cmp(&b.0));
            if column[0].0 == column[column.len() - 1].0 {
                continue;
            }
            visited += 1;

            if let Some(candidate) = self.scan_column(feature, &column) {
                if best.as_ref().is_none_or(|b| candidate.impurity < b.impurity) {
                    best = Some(candidate);
                }
            }
        }

        best
    }

    fn scan_column(&self, feature: usize, column: &[(f64, usize)]) -> Option<BestSplit> {
        let n = column.len();
        let mut right = vec![0usize; self.n_classes];
        for &(_, class) in column {
            right[class] += 1;
        }
        let mut left = vec![0usize; self.n_classes];

        let mut best: Option<BestSplit> = None;
        for pos in 0..n - 1 {
            let (value, class) = column[pos];
            left[class] += 1;
            right[class] -= 1;

            let next = column[pos + 1].0;
            if value == next {
                continue;
            }

            let n_left = pos + 1;
            let n_right = n - n_left;
            let impurity = (n_left as f64 * gini(&left, n_left)
                + n_right as f64 * gini(&right, n_right))
                / n as f64;

            if best.as_ref().is_none_or(|b| impurity < b.impurity) {
                best = Some(BestSplit {
                    feature,
                    threshold: (value + next) / 2.0,
                    impurity,
                });
            }
        }
        best
    }
}

fn gini(counts: &[usize], total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let total = total as f64;
    1.0 - counts
        .iter()
        .map(|&c| {
            let p = c as f64 / total;
            p * p
        })
        .sum::<f64>()
}

/// Bagged ensemble of [`DecisionTree`]s.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    n_classes: usize,
}

impl RandomForest {
    /// Fit `config.n_trees` trees on `(x, y)`. Labels must lie in `0..n_classes`.
    pub fn fit(
        x: &[Sample],
        y: &[usize],
        n_classes: usize,
        config: &ForestConfig,
    ) -> ModelResult<Self> {
        if x.is_empty() || n_classes == 0 {
            return Err(ModelError::EmptyTrainingSet);
        }
        debug_assert_eq!(x.len(), y.len());
        if let Some(&bad) = y.iter().find(|&&c| c >= n_classes) {
            return Err(ModelError::UnknownClass {
                index: bad,
                classes: n_classes,
            });
        }

        let max_features = config
            .max_features
            .unwrap_or_else(|| (N_FEATURES as f64).sqrt().floor() as usize)
            .clamp(1, N_FEATURES);
        let n = x.len();

        let trees = (0..config.n_trees)
            .into_par_iter()
            .map(|t| {
                let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(t as u64));
                let bootstrap: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                TreeBuilder {
                    x,
                    y,
                    n_classes,
                    max_depth: config.max_depth,
                    min_samples_split: config.min_samples_split.max(2),
                    max_features,
                    rng,
                    nodes: Vec::new(),
                }
                .build(bootstrap)
            })
            .collect();

        Ok(Self { trees, n_classes })
    }

    /// Mean of the trees' leaf distributions.
    pub fn predict_proba(&self, x: &Sample) -> Vec<f64> {
        let mut acc = vec![0.0; self.n_classes];
        for tree in &self.trees {
            for (a, p) in acc.iter_mut().zip(tree.predict_proba(x)) {
                *a += p;
            }
        }
        let n = self.trees.len().max(1) as f64;
        acc.iter_mut().for_each(|a| *a /= n);
        acc
    }

    /// Most probable class index; ties resolve to the lowest index.
    pub fn predict(&self, x: &Sample) -> usize {
        let proba = self.predict_proba(x);
        let mut best = 0;
        for (idx, p) in proba.iter().enumerate().skip(1) {
            if *p > proba[best] {
                best = idx;
            }
        }
        best
    }

    pub fn predict_batch(&self, xs: &[Sample]) -> Vec<usize> {
        xs.par_iter().map(|x| self.predict(x)).collect()
    }

    /// Fraction of rows whose prediction equals the label. `NaN` for no rows.
    pub fn score(&self, x: &[Sample], y: &[usize]) -> f64 {
        if x.is_empty() {
            return f64::NAN;
        }
        let hits = self
            .predict_batch(x)
            .iter()
            .zip(y)
            .filter(|(p, t)| p == t)
            .count();
        hits as f64 / x.len() as f64
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    /// Whether prediction can walk every tree without leaving its node table.
    /// Fitted forests always are; a decoded one may not be.
    pub fn is_well_formed(&self) -> bool {
        self.n_classes > 0
            && !self.trees.is_empty()
            && self.trees.iter().all(|t| t.is_well_formed(self.n_classes))
    }

    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }
}

/// Hand-built forests with broken node tables.
#[cfg(test)]
pub(crate) mod malformed {
    use super::*;

    fn forest(nodes: Vec<Node>, n_classes: usize) -> RandomForest {
        RandomForest {
            trees: vec![DecisionTree { nodes }],
            n_classes,
        }
    }

    pub(crate) fn empty_tree(n_classes: usize) -> RandomForest {
        forest(Vec::new(), n_classes)
    }

    pub(crate) fn split_on_missing_feature(n_classes: usize) -> RandomForest {
        let leaf = || Node::Leaf {
            distribution: vec![1.0 / n_classes as f64; n_classes],
        };
        let split = Node::Split {
            feature: N_FEATURES + 4,
            threshold: 0.5,
            left: 1,
            right: 2,
        };
        forest(vec![split, leaf(), leaf()], n_classes)
    }

    pub(crate) fn child_out_of_range(n_classes: usize) -> RandomForest {
        let split = Node::Split {
            feature: 0,
            threshold: 0.5,
            left: 1,
            right: 7,
        };
        let leaf = Node::Leaf {
            distribution: vec![1.0 / n_classes as f64; n_classes],
        };
        forest(vec![split, leaf], n_classes)
    }

    pub(crate) fn self_loop(n_classes: usize) -> RandomForest {
        let split = Node::Split {
            feature: 0,
            threshold: 0.5,
            left: 0,
            right: 0,
        };
        forest(vec![split], n_classes)
    }

    pub(crate) fn short_leaf(n_classes: usize) -> RandomForest {
        forest(
            vec![Node::Leaf {
                distribution: vec![1.0],
            }],
            n_classes,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(n_trees: usize) -> ForestConfig {
        ForestConfig {
            n_trees,
            ..ForestConfig::default()
        }
    }

    /// Class 1 iff age > 35; other columns are noise.
    fn threshold_data() -> (Vec<Sample>, Vec<usize>) {
        let mut rng = StdRng::seed_from_u64(7);
        let mut x = Vec::new();
        let mut y = Vec::new();
        for _ in 0..200 {
            let age = rng.gen_range(14..46) as f64;
            x.push([
                age,
                rng.gen_range(0..6) as f64,
                rng.gen_range(0..2) as f64,
                rng.gen_range(0..4) as f64,
                rng.gen_range(0..4) as f64,
            ]);
            y.push(usize::from(age > 35.0));
        }
        (x, y)
    }

    #[test]
    fn learns_a_threshold() {
        let (x, y) = threshold_data();
        let forest = RandomForest::fit(&x, &y, 2, &config(25)).unwrap();
        assert!(forest.score(&x, &y) > 0.95);
        assert_eq!(forest.predict(&[20.0, 1.0, 0.0, 0.0, 0.0]), 0);
        assert_eq!(forest.predict(&[44.0, 1.0, 0.0, 0.0, 0.0]), 1);
    }

    #[test]
    fn same_seed_same_forest() {
        let (x, y) = threshold_data();
        let a = RandomForest::fit(&x, &y, 2, &config(10)).unwrap();
        let b = RandomForest::fit(&x, &y, 2, &config(10)).unwrap();
        for row in &x {
            assert_eq!(a.predict_proba(row), b.predict_proba(row));
        }
    }

    #[test]
    fn probabilities_sum_to_one() {
        let (x, y) = threshold_data();
        let forest = RandomForest::fit(&x, &y, 2, &config(10)).unwrap();
        let p = forest.predict_proba(&x[0]);
        assert!((p.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn single_class_predicts_it() {
        let x = vec![[20.0, 0.0, 0.0, 0.0, 0.0], [30.0, 1.0, 0.0, 0.0, 0.0]];
        let forest = RandomForest::fit(&x, &[0, 0], 1, &config(3)).unwrap();
        assert_eq!(forest.predict(&[50.0, 9.0, 1.0, 9.0, 9.0]), 0);
        assert_eq!(forest.score(&x, &[0, 0]), 1.0);
    }

    #[test]
    fn max_depth_is_respected() {
        let (x, y) = threshold_data();
        let cfg = ForestConfig {
            n_trees: 5,
            max_depth: Some(2),
            ..ForestConfig::default()
        };
        let forest = RandomForest::fit(&x, &y, 2, &cfg).unwrap();
        assert!(forest.trees().iter().all(|t| t.depth() <= 2));
    }

    #[test]
    fn empty_input_is_rejected() {
        let err = RandomForest::fit(&[], &[], 3, &config(3)).unwrap_err();
        assert!(matches!(err, ModelError::EmptyTrainingSet));
    }

    #[test]
    fn out_of_range_label_is_rejected() {
        let err = RandomForest::fit(&[[1.0; N_FEATURES]], &[3], 3, &config(1)).unwrap_err();
        assert!(matches!(err, ModelError::UnknownClass { index: 3, classes: 3 }));
    }

    #[test]
    fn fitted_forest_is_well_formed() {
        let (x, y) = threshold_data();
        let forest = RandomForest::fit(&x, &y, 2, &config(5)).unwrap();
        assert!(forest.is_well_formed());
    }

    #[test]
    fn broken_node_tables_are_not_well_formed() {
        assert!(!malformed::empty_tree(3).is_well_formed());
        assert!(!malformed::split_on_missing_feature(3).is_well_formed());
        assert!(!malformed::child_out_of_range(3).is_well_formed());
        assert!(!malformed::self_loop(3).is_well_formed());
        assert!(!malformed::short_leaf(3).is_well_formed());
    }

    #[test]
    fn gini_of_pure_and_even_nodes() {
        assert_eq!(gini(&[4, 0], 4), 0.0);
        assert!((gini(&[2, 2], 4) - 0.5).abs() < 1e-12);
    }
}

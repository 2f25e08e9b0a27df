//! Tree ensembles for small-sample pose classification.
//!
//! Entropy decision trees, an importance-biased bagged forest, gradient-boosted
//! residual trees over class log-priors, and the feature-importance and
//! confusion-matrix helpers built on them. Pure math: no I/O and no global
//! state; every source of randomness is an injected [`rand::Rng`].

mod boost;
mod confusion;
mod dataset;
mod error;
mod forest;
mod importance;
mod node;
mod predict;
mod regression;
mod sampling;
mod split;
mod tree;

pub use boost::{GradientBoostedTrees, GradientBoostingConfig};
pub use confusion::{ClassMetrics, ConfusionMatrix};
pub use dataset::TrainingSet;
pub use error::TreeError;
pub use forest::{RandomForest, RandomForestConfig};
pub use importance::{
    BOOST_GAIN_WEIGHT, F_SCORE_MAX, FeatureImportance, RankedFeature, f_scores, normalize_by_max,
};
pub use node::{ClassLeaf, FeatureIndex, Node, NodeIndex, ResidualLeaf};
pub use predict::{ClassDistribution, LOG_FLOOR, argmax, floored_ln, softmax_in_place};
pub use regression::{BOOST_EPSILON, MIN_RESIDUAL_SIDE_FRACTION, ResidualTree};
pub use split::{GAIN_EPSILON, MIN_SIDE_FRACTION, entropy};
pub use tree::{DecisionTree, DecisionTreeConfig, Tree};

//! Regression model
//!
//! - tree: CART regression tree over a node arena
//! - forest: bagged ensemble with per-split feature subsampling
//! - artifact: preprocessing + forest persisted together

pub mod artifact;
pub mod forest;
pub mod tree;

pub use artifact::{TrainedArtifact, TrainingMetadata};
pub use forest::RandomForest;
pub use tree::RegressionTree;

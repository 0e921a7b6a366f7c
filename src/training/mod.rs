//! Model training
//!
//! Training pipeline and regression metrics.

pub mod metrics;
pub mod trainer;

pub use metrics::{Metrics, RegressionMetrics};
pub use trainer::{evaluate, Trainer, TrainingReport};

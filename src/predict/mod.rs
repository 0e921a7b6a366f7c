//! Prediction and inference
//!
//! Load a trained artifact and score records against it.

pub mod inference;
pub mod input;

pub use inference::{format_prediction, Predictor};
pub use input::PredictionInput;

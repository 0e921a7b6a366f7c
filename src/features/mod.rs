//! Feature extraction and encoding
//!
//! Converts raw observations into model-ready numeric vectors.

pub mod preprocessing;
pub mod temporal;
pub mod traffic_repr;

pub use preprocessing::{FittedPreprocessor, PreprocessorBuilder};
pub use temporal::CalendarFeatures;
pub use traffic_repr::{derive, DerivedFeatures};

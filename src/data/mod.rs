//! Data ingestion
//!
//! CSV loading with row quarantine, and the in-memory dataset used for training.

pub mod dataset;
pub mod loader;

pub use dataset::TrafficDataset;
pub use loader::{load_records, LoadReport};

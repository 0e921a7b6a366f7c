//! Traffic volume prediction
//!
//! Derives calendar features from hourly weather/traffic observations, fits a
//! standardizing + one-hot preprocessing pipeline, and trains a random forest
//! regressor that predicts vehicles per hour.

pub mod data;
pub mod features;
pub mod model;
pub mod predict;
pub mod training;

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// One hourly observation as it arrives from the input file.
///
/// Weather values are carried as-is; only the timestamp is interpreted
/// (see [`features::derive`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    /// Local timestamp, e.g. `2012-10-02 09:00:00`
    pub date_time: String,
    /// Holiday name, `None` on regular days
    pub holiday: String,
    /// Temperature (Kelvin in the reference dataset)
    pub temp: f64,
    /// Rainfall in the last hour (mm)
    pub rain_1h: f64,
    /// Snowfall in the last hour (mm)
    pub snow_1h: f64,
    /// Cloud coverage percentage
    pub clouds_all: f64,
    /// Short weather category (`Clouds`, `Rain`, ...)
    pub weather_main: String,
}

/// A raw record paired with its observed traffic volume (training target)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub record: RawRecord,
    pub traffic_volume: u32,
}

/// Kind of categorical field, used in error and log messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CategoricalField {
    Holiday,
    WeatherMain,
}

impl CategoricalField {
    pub fn name(&self) -> &'static str {
        match self {
            CategoricalField::Holiday => "holiday",
            CategoricalField::WeatherMain => "weather_main",
        }
    }
}

impl fmt::Display for CategoricalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Application-wide errors
#[derive(Debug, Error)]
pub enum TrafficError {
    #[error("Malformed timestamp: {0:?}")]
    MalformedTimestamp(String),

    #[error("Degenerate feature '{field}': zero variance in training data")]
    DegenerateFeature { field: String },

    #[error("Artifact mismatch: {0}")]
    ArtifactMismatch(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Dataset is empty: {0}")]
    EmptyDataset(String),

    #[error("Model not trained - run `traffic train` first")]
    NoModel,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TrafficError>;

/// Application configuration loaded from config.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub forest: ForestConfig,
    #[serde(default)]
    pub training: TrainingConfig,
    #[serde(default)]
    pub preprocessing: PreprocessingConfig,
    #[serde(default)]
    pub data: DataConfig,
}

/// How many candidate features are drawn at each split
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaxFeatures {
    /// Every feature is a candidate (plain bagging)
    All,
    /// `ceil(sqrt(n_features))`
    Sqrt,
    /// `ceil(n_features / 3)`, the usual choice for regression forests
    Third,
    /// Fixed count, capped at the number of features
    Count(usize),
}

impl MaxFeatures {
    /// Resolve to a concrete count for `n_features` inputs (always at least 1)
    pub fn resolve(&self, n_features: usize) -> usize {
        let k = match *self {
            MaxFeatures::All => n_features,
            MaxFeatures::Sqrt => (n_features as f64).sqrt().ceil() as usize,
            MaxFeatures::Third => n_features.div_ceil(3),
            MaxFeatures::Count(k) => k.min(n_features),
        };
        k.max(1)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestConfig {
    pub n_trees: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    pub bootstrap: bool,
    /// Fixed seed for reproducible training; `None` draws a fresh one per run
    pub seed: Option<u64>,
}

impl Default for ForestConfig {
    fn default() -> Self {
        ForestConfig {
            n_trees: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Third,
            bootstrap: true,
            seed: Some(42),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Fraction of observations held out for evaluation (0 disables the split)
    pub test_fraction: f64,
    pub split_seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        TrainingConfig {
            test_fraction: 0.2,
            split_seed: 42,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessingConfig {
    /// Fail fitting on zero-variance numeric fields instead of using scale 1
    pub strict_variance: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub dataset_path: String,
    pub artifact_path: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        DataConfig {
            dataset_path: "data/Metro_Interstate_Traffic_Volume.csv".to_string(),
            artifact_path: "model/traffic_model.json".to_string(),
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            TrafficError::Config(format!("Failed to read config file {}: {}", path, e))
        })?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| TrafficError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| TrafficError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject settings that would make training meaningless
    pub fn validate(&self) -> Result<()> {
        if self.forest.n_trees == 0 {
            return Err(TrafficError::Config("forest.n_trees must be at least 1".into()));
        }
        if self.forest.min_samples_split < 2 {
            return Err(TrafficError::Config(
                "forest.min_samples_split must be at least 2".into(),
            ));
        }
        if self.forest.min_samples_leaf == 0 {
            return Err(TrafficError::Config(
                "forest.min_samples_leaf must be at least 1".into(),
            ));
        }
        if self.forest.max_features == MaxFeatures::Count(0) {
            return Err(TrafficError::Config(
                "forest.max_features count must be at least 1".into(),
            ));
        }
        if !(0.0..1.0).contains(&self.training.test_fraction) {
            return Err(TrafficError::Config(format!(
                "training.test_fraction must be in [0, 1), got {}",
                self.training.test_fraction
            )));
        }
        Ok(())
    }
}

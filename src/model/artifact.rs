//! Persisted model artifact
//!
//! The fitted preprocessor and the forest are only meaningful together, so they
//! are written and read as a single JSON document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use crate::features::FittedPreprocessor;
use crate::model::RandomForest;
use crate::training::metrics::RegressionMetrics;
use crate::{ForestConfig, Result, TrafficError};

/// Bump when the serialized layout changes
pub const FORMAT_VERSION: u32 = 1;

/// Provenance recorded at training time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetadata {
    pub trained_at: DateTime<Utc>,
    pub train_samples: usize,
    pub test_samples: usize,
    pub train_metrics: RegressionMetrics,
    pub test_metrics: Option<RegressionMetrics>,
    pub forest_config: ForestConfig,
}

/// Fitted preprocessing state and forest, bundled as one unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainedArtifact {
    pub format_version: u32,
    pub preprocessor: FittedPreprocessor,
    pub forest: RandomForest,
    pub metadata: TrainingMetadata,
}

impl TrainedArtifact {
    pub fn new(
        preprocessor: FittedPreprocessor,
        forest: RandomForest,
        metadata: TrainingMetadata,
    ) -> Self {
        TrainedArtifact {
            format_version: FORMAT_VERSION,
            preprocessor,
            forest,
            metadata,
        }
    }

    /// Write the artifact as JSON, creating parent directories as needed
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(&mut writer, self)
            .map_err(|e| TrafficError::Parse(format!("Failed to serialize model: {}", e)))?;
        writer.flush()?;

        log::info!(
            "Saved model ({} trees, {} features) to {}",
            self.forest.n_trees(),
            self.forest.n_features(),
            path.display()
        );
        Ok(())
    }

    /// Read an artifact written by [`Self::save`]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(TrafficError::NoModel);
        }

        let reader = BufReader::new(File::open(path)?);
        let artifact: TrainedArtifact = serde_json::from_reader(reader).map_err(|e| {
            TrafficError::Parse(format!("Failed to load model from {}: {}", path.display(), e))
        })?;

        if artifact.format_version != FORMAT_VERSION {
            return Err(TrafficError::ArtifactMismatch(format!(
                "artifact format version {} is not supported (expected {})",
                artifact.format_version, FORMAT_VERSION
            )));
        }

        log::debug!("Loaded model from {}", path.display());
        Ok(artifact)
    }
}

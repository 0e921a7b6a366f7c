//! Model inference for predictions

use std::path::Path;

use crate::features::{derive, DerivedFeatures};
use crate::model::TrainedArtifact;
use crate::predict::input::PredictionInput;
use crate::{RawRecord, Result, TrafficError};

/// Scores records against a loaded artifact. Never mutates the artifact,
/// so one instance can serve concurrent callers by shared reference.
#[derive(Debug, Clone)]
pub struct Predictor {
    artifact: TrainedArtifact,
    feature_names: Vec<String>,
}

impl Predictor {
    /// Wrap an artifact after checking that its parts fit together
    pub fn new(artifact: TrainedArtifact) -> Result<Self> {
        artifact.preprocessor.validate()?;

        let input_dim = artifact.preprocessor.output_dim();
        let model_dim = artifact.forest.n_features();
        if input_dim != model_dim {
            return Err(TrafficError::ArtifactMismatch(format!(
                "preprocessing produces {} features but the model expects {}",
                input_dim, model_dim
            )));
        }
        if artifact.forest.n_trees() == 0 {
            return Err(TrafficError::ArtifactMismatch(
                "model contains no trees".to_string(),
            ));
        }
        if let Some(i) = artifact
            .forest
            .trees()
            .iter()
            .position(|t| t.n_features() != model_dim || !t.is_well_formed())
        {
            return Err(TrafficError::ArtifactMismatch(format!(
                "tree {} is malformed or built for a different feature count",
                i
            )));
        }

        let feature_names = artifact.preprocessor.feature_names();
        Ok(Predictor {
            artifact,
            feature_names,
        })
    }

    /// Load and validate an artifact from disk
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::new(TrainedArtifact::load(path)?)
    }

    pub fn artifact(&self) -> &TrainedArtifact {
        &self.artifact
    }

    pub fn into_artifact(self) -> TrainedArtifact {
        self.artifact
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Predict traffic volume for a raw timestamped record
    pub fn predict(&self, record: &RawRecord) -> Result<u32> {
        let features = derive(record)?;
        Ok(self.predict_features(&features))
    }

    /// Predict from caller-supplied calendar and weather fields
    pub fn predict_input(&self, input: &PredictionInput) -> Result<u32> {
        let features = input.to_features()?;
        Ok(self.predict_features(&features))
    }

    pub fn predict_features(&self, features: &DerivedFeatures) -> u32 {
        to_volume(self.predict_raw(features))
    }

    /// Unclamped ensemble output
    pub fn predict_raw(&self, features: &DerivedFeatures) -> f64 {
        let vector = self.artifact.preprocessor.transform(features);
        self.artifact.forest.predict(&vector)
    }

    /// Predict each input independently; one bad row does not fail the others
    pub fn predict_batch(&self, inputs: &[PredictionInput]) -> Vec<Result<u32>> {
        inputs.iter().map(|input| self.predict_input(input)).collect()
    }

    /// Importance per output column, in column order
    pub fn feature_importance(&self) -> Vec<(String, f64)> {
        self.feature_names
            .iter()
            .cloned()
            .zip(self.artifact.forest.feature_importance())
            .collect()
    }

    /// Top `top_k` features by descending importance. Ties keep column order.
    pub fn feature_importance_ranked(&self, top_k: usize) -> Vec<(String, f64)> {
        let mut ranked = self.feature_importance();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked.truncate(top_k);
        ranked
    }
}

/// `max(0, round(value))`; non-finite output maps to 0
fn to_volume(value: f64) -> u32 {
    if !value.is_finite() || value <= 0.0 {
        return 0;
    }
    value.round().min(u32::MAX as f64) as u32
}

/// Format a prediction for display
pub fn format_prediction(input: &PredictionInput, volume: u32) -> String {
    let day = match input.day_of_week {
        0 => "Mon",
        1 => "Tue",
        2 => "Wed",
        3 => "Thu",
        4 => "Fri",
        5 => "Sat",
        _ => "Sun",
    };
    let mut flags = Vec::new();
    if input.is_weekend {
        flags.push("weekend");
    }
    if input.is_rush_hour {
        flags.push("rush hour");
    }
    let flags = if flags.is_empty() {
        String::new()
    } else {
        format!(" ({})", flags.join(", "))
    };

    format!(
        r#"
┌─────────────────────────────────────────────────┐
│  {} {:02}:00, month {}{}
├─────────────────────────────────────────────────┤
│  Weather:          {} ({:.1} K)
│  Holiday:          {}
│  Predicted volume: {} vehicles/hour
└─────────────────────────────────────────────────┘
"#,
        day,
        input.hour,
        input.month,
        flags,
        input.weather_main,
        input.temp,
        input.holiday,
        volume
    )
}

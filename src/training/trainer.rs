//! Training pipeline: split, derive, fit preprocessing, grow the forest, evaluate

use chrono::Utc;
use std::fmt;

use crate::data::TrafficDataset;
use crate::features::{derive, DerivedFeatures, PreprocessorBuilder};
use crate::model::{RandomForest, TrainedArtifact, TrainingMetadata};
use crate::predict::Predictor;
use crate::training::metrics::{Metrics, RegressionMetrics};
use crate::{
    Config, ForestConfig, Observation, PreprocessingConfig, Result, TrafficError, TrainingConfig,
};

/// Outcome of one training run
#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub train: RegressionMetrics,
    pub test: Option<RegressionMetrics>,
    pub n_features: usize,
    pub degenerate_fields: Vec<String>,
}

impl fmt::Display for TrainingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Features: {}", self.n_features)?;
        if !self.degenerate_fields.is_empty() {
            writeln!(f, "Constant fields: {}", self.degenerate_fields.join(", "))?;
        }
        writeln!(f, "Train: {}", self.train)?;
        match &self.test {
            Some(test) => write!(f, "Test:  {}", test),
            None => write!(f, "Test:  (no hold-out set)"),
        }
    }
}

/// Runs the full training pipeline from configuration
pub struct Trainer {
    forest: ForestConfig,
    training: TrainingConfig,
    preprocessing: PreprocessingConfig,
}

impl Trainer {
    pub fn new(config: &Config) -> Self {
        Trainer {
            forest: config.forest.clone(),
            training: config.training.clone(),
            preprocessing: config.preprocessing.clone(),
        }
    }

    /// Train on `dataset`. Any error aborts the run before an artifact exists.
    pub fn train(&self, dataset: &TrafficDataset) -> Result<(TrainedArtifact, TrainingReport)> {
        if dataset.is_empty() {
            return Err(TrafficError::EmptyDataset(
                "no observations to train on".to_string(),
            ));
        }

        let (train_set, test_set) = if self.training.test_fraction > 0.0 {
            dataset.split(self.training.test_fraction, self.training.split_seed)
        } else {
            (dataset.clone(), TrafficDataset::default())
        };

        let features: Vec<DerivedFeatures> = train_set
            .records()
            .map(derive)
            .collect::<Result<Vec<_>>>()?;

        let preprocessor = PreprocessorBuilder::new()
            .strict_variance(self.preprocessing.strict_variance)
            .fit(&features)?;
        let x = preprocessor.transform_batch(&features);
        let y = train_set.targets();

        let forest = RandomForest::train(&x, &y, &self.forest)?;

        // Record the seed actually used so an unseeded run can be replayed
        let mut forest_config = self.forest.clone();
        forest_config.seed = Some(forest.seed());

        let degenerate_fields: Vec<String> = preprocessor
            .degenerate_fields()
            .into_iter()
            .map(String::from)
            .collect();

        let metadata = TrainingMetadata {
            trained_at: Utc::now(),
            train_samples: train_set.len(),
            test_samples: test_set.len(),
            train_metrics: Metrics::new().summary(),
            test_metrics: None,
            forest_config,
        };
        let predictor = Predictor::new(TrainedArtifact::new(preprocessor, forest, metadata))?;

        let train_metrics = evaluate(&predictor, train_set.observations())?;
        log::info!("Train {}", train_metrics);
        let test_metrics = if test_set.is_empty() {
            None
        } else {
            let metrics = evaluate(&predictor, test_set.observations())?;
            log::info!("Test  {}", metrics);
            Some(metrics)
        };

        let n_features = predictor.feature_names().len();
        let mut artifact = predictor.into_artifact();
        artifact.metadata.train_metrics = train_metrics;
        artifact.metadata.test_metrics = test_metrics;

        let report = TrainingReport {
            train: train_metrics,
            test: test_metrics,
            n_features,
            degenerate_fields,
        };
        Ok((artifact, report))
    }
}

/// Score served predictions (clamped integers) against observed volumes
pub fn evaluate(predictor: &Predictor, observations: &[Observation]) -> Result<RegressionMetrics> {
    let predicted = observations
        .iter()
        .map(|obs| predictor.predict(&obs.record).map(f64::from))
        .collect::<Result<Vec<f64>>>()?;
    let targets: Vec<f64> = observations
        .iter()
        .map(|obs| f64::from(obs.traffic_volume))
        .collect();
    Ok(Metrics::from_predictions(&predicted, &targets).summary())
}

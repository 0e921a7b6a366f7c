//! Preprocessing pipeline: z-score standardization and one-hot encoding
//!
//! [`PreprocessorBuilder::fit`] consumes the builder and returns an immutable
//! [`FittedPreprocessor`]; there is no way to refit a fitted pipeline.
//!
//! Output vector layout: one standardized column per numeric field (in
//! [`DerivedFeatures::NUMERIC_FIELDS`] order) followed by one one-hot block per
//! categorical field, categories in first-seen order.

use serde::{Deserialize, Serialize};

use crate::features::DerivedFeatures;
use crate::{CategoricalField, Result, TrafficError};

/// Relative spread below which a numeric field is treated as constant
const MIN_RELATIVE_STD: f64 = 1e-9;

/// Standardization parameters for one numeric field
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NumericScaler {
    pub mean: f64,
    pub std: f64,
    /// Zero variance at fit time; `std` holds the fallback scale of 1
    pub degenerate: bool,
}

impl NumericScaler {
    /// Population mean/std of the values (missing values ignored)
    fn fit(values: &[f64]) -> Self {
        if values.is_empty() {
            return NumericScaler {
                mean: 0.0,
                std: 1.0,
                degenerate: true,
            };
        }

        let first = values[0];
        if values.iter().all(|v| *v == first) {
            return NumericScaler {
                mean: first,
                std: 1.0,
                degenerate: true,
            };
        }

        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
        let std = variance.sqrt();

        // Summation error alone leaves a spread proportional to |mean|
        if std.is_finite() && std > MIN_RELATIVE_STD * mean.abs().max(1.0) {
            NumericScaler {
                mean,
                std,
                degenerate: false,
            }
        } else {
            NumericScaler {
                mean,
                std: 1.0,
                degenerate: true,
            }
        }
    }

    /// Standardize; a missing value is imputed with the mean (maps to 0)
    pub fn normalize(&self, value: Option<f64>) -> f64 {
        match value {
            Some(v) => (v - self.mean) / self.std,
            None => 0.0,
        }
    }

    pub fn denormalize(&self, z: f64) -> f64 {
        z * self.std + self.mean
    }
}

/// Category vocabulary for one categorical field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryEncoder {
    pub field: CategoricalField,
    pub categories: Vec<String>,
}

impl CategoryEncoder {
    fn fit<'a>(field: CategoricalField, values: impl Iterator<Item = &'a str>) -> Self {
        let mut categories: Vec<String> = Vec::new();
        for value in values {
            if !categories.iter().any(|c| c == value) {
                categories.push(value.to_string());
            }
        }
        CategoryEncoder { field, categories }
    }

    pub fn position(&self, value: &str) -> Option<usize> {
        self.categories.iter().position(|c| c == value)
    }

    /// Append the one-hot block for `value`; unseen values give all zeros
    fn encode_into(&self, value: &str, out: &mut Vec<f64>) {
        let hot = self.position(value);
        if hot.is_none() {
            log::debug!("Unseen {} category {:?}, encoding as zeros", self.field, value);
        }
        out.extend((0..self.categories.len()).map(|i| if Some(i) == hot { 1.0 } else { 0.0 }));
    }
}

/// Single-use builder that learns preprocessing state from training features
#[derive(Debug, Clone, Default)]
pub struct PreprocessorBuilder {
    strict_variance: bool,
}

impl PreprocessorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail with [`TrafficError::DegenerateFeature`] on zero-variance fields
    /// instead of substituting a scale of 1
    pub fn strict_variance(mut self, strict: bool) -> Self {
        self.strict_variance = strict;
        self
    }

    /// Learn per-field statistics and category sets
    pub fn fit(self, features: &[DerivedFeatures]) -> Result<FittedPreprocessor> {
        if features.is_empty() {
            return Err(TrafficError::EmptyDataset(
                "cannot fit preprocessing on zero records".to_string(),
            ));
        }

        let rows: Vec<[Option<f64>; DerivedFeatures::NUMERIC_DIM]> =
            features.iter().map(|f| f.numeric_values()).collect();

        let mut scalers = Vec::with_capacity(DerivedFeatures::NUMERIC_DIM);
        for (j, name) in DerivedFeatures::NUMERIC_FIELDS.iter().enumerate() {
            let column: Vec<f64> = rows.iter().filter_map(|row| row[j]).collect();
            let scaler = NumericScaler::fit(&column);

            if scaler.degenerate {
                if self.strict_variance {
                    return Err(TrafficError::DegenerateFeature {
                        field: name.to_string(),
                    });
                }
                log::warn!(
                    "Numeric field '{}' has zero variance (mean={:.3}), using scale 1",
                    name,
                    scaler.mean
                );
            }
            scalers.push(scaler);
        }

        let encoders: Vec<CategoryEncoder> = DerivedFeatures::CATEGORICAL_FIELDS
            .iter()
            .map(|&field| CategoryEncoder::fit(field, features.iter().map(|f| f.category(field))))
            .collect();

        for encoder in &encoders {
            log::debug!(
                "Field '{}': {} categories {:?}",
                encoder.field,
                encoder.categories.len(),
                encoder.categories
            );
        }

        let fitted = FittedPreprocessor { scalers, encoders };
        log::info!(
            "Fitted preprocessing on {} records: {} output features",
            features.len(),
            fitted.output_dim()
        );
        Ok(fitted)
    }
}

/// Immutable preprocessing state learned from training data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedPreprocessor {
    scalers: Vec<NumericScaler>,
    encoders: Vec<CategoryEncoder>,
}

impl FittedPreprocessor {
    pub fn scalers(&self) -> &[NumericScaler] {
        &self.scalers
    }

    pub fn numeric_dim(&self) -> usize {
        self.scalers.len()
    }

    /// Length of every vector produced by [`Self::transform`]
    pub fn output_dim(&self) -> usize {
        self.numeric_dim() + self.encoders.iter().map(|e| e.categories.len()).sum::<usize>()
    }

    /// Column names, e.g. `temp`, `holiday=None`, `weather_main=Rain`
    pub fn feature_names(&self) -> Vec<String> {
        let numeric = DerivedFeatures::NUMERIC_FIELDS
            .iter()
            .take(self.scalers.len())
            .map(|name| name.to_string());
        let categorical = self.encoders.iter().flat_map(|e| {
            e.categories
                .iter()
                .map(move |c| format!("{}={}", e.field, c))
        });
        numeric.chain(categorical).collect()
    }

    /// Numeric fields that were constant in the training data
    pub fn degenerate_fields(&self) -> Vec<&'static str> {
        DerivedFeatures::NUMERIC_FIELDS
            .iter()
            .zip(&self.scalers)
            .filter(|(_, s)| s.degenerate)
            .map(|(name, _)| *name)
            .collect()
    }

    /// Map features to a numeric vector of length [`Self::output_dim`]
    pub fn transform(&self, features: &DerivedFeatures) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.output_dim());

        out.extend(
            features
                .numeric_values()
                .iter()
                .zip(&self.scalers)
                .map(|(value, scaler)| scaler.normalize(*value)),
        );

        for encoder in &self.encoders {
            encoder.encode_into(features.category(encoder.field), &mut out);
        }

        out
    }

    pub fn transform_batch(&self, features: &[DerivedFeatures]) -> Vec<Vec<f64>> {
        features.iter().map(|f| self.transform(f)).collect()
    }

    /// Recover original numeric values from the standardized slice of a vector
    pub fn inverse_standardize(&self, vector: &[f64]) -> Vec<f64> {
        vector
            .iter()
            .zip(&self.scalers)
            .map(|(z, scaler)| scaler.denormalize(*z))
            .collect()
    }

    /// Structural checks for state loaded from disk
    pub fn validate(&self) -> Result<()> {
        if self.scalers.len() != DerivedFeatures::NUMERIC_DIM {
            return Err(TrafficError::ArtifactMismatch(format!(
                "preprocessor has {} numeric scalers, expected {}",
                self.scalers.len(),
                DerivedFeatures::NUMERIC_DIM
            )));
        }
        if let Some(bad) = self
            .scalers
            .iter()
            .position(|s| !(s.std.is_finite() && s.std > 0.0 && s.mean.is_finite()))
        {
            return Err(TrafficError::ArtifactMismatch(format!(
                "invalid scale for numeric field '{}'",
                DerivedFeatures::NUMERIC_FIELDS[bad]
            )));
        }
        let fields: Vec<CategoricalField> = self.encoders.iter().map(|e| e.field).collect();
        if fields != DerivedFeatures::CATEGORICAL_FIELDS {
            return Err(TrafficError::ArtifactMismatch(format!(
                "preprocessor encodes {:?}, expected {:?}",
                fields,
                DerivedFeatures::CATEGORICAL_FIELDS
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_features(
        holiday: &str,
        weather: &str,
        temp: f64,
        hour: u32,
        day_of_week: u32,
    ) -> DerivedFeatures {
        DerivedFeatures {
            holiday: holiday.to_string(),
            temp,
            rain_1h: temp / 100.0,
            snow_1h: 0.0,
            clouds_all: Some(hour as f64 * 4.0),
            weather_main: weather.to_string(),
            hour,
            day_of_week,
            month: 1 + hour % 12,
            is_weekend: day_of_week >= 5,
            is_rush_hour: (7..=9).contains(&hour),
        }
    }

    fn training_set() -> Vec<DerivedFeatures> {
        vec![
            make_features("None", "Clouds", 280.0, 8, 0),
            make_features("None", "Rain", 290.5, 13, 3),
            make_features("Christmas Day", "Snow", 265.0, 2, 6),
            make_features("None", "Clouds", 300.2, 17, 5),
            make_features("None", "Clear", 295.0, 22, 1),
        ]
    }

    #[test]
    fn test_output_dim_and_names() {
        let fitted = PreprocessorBuilder::new().fit(&training_set()).unwrap();

        // 9 numeric + 2 holiday + 4 weather
        assert_eq!(fitted.output_dim(), 15);
        let names = fitted.feature_names();
        assert_eq!(names.len(), fitted.output_dim());
        assert_eq!(names[0], "temp");
        assert_eq!(names[9], "holiday=None");
        assert_eq!(names[10], "holiday=Christmas Day");
        assert_eq!(names[11], "weather_main=Clouds");
        assert_eq!(names[14], "weather_main=Clear");
    }

    #[test]
    fn test_standardized_columns_have_zero_mean() {
        let train = training_set();
        let fitted = PreprocessorBuilder::new().fit(&train).unwrap();
        let matrix = fitted.transform_batch(&train);

        for j in 0..fitted.numeric_dim() {
            let column: Vec<f64> = matrix.iter().map(|row| row[j]).collect();
            let mean = column.iter().sum::<f64>() / column.len() as f64;
            assert!(mean.abs() < 1e-9, "column {} mean {}", j, mean);
        }
    }

    #[test]
    fn test_inverse_standardize_round_trip() {
        let train = training_set();
        let fitted = PreprocessorBuilder::new().fit(&train).unwrap();

        for features in &train {
            let vector = fitted.transform(features);
            let recovered = fitted.inverse_standardize(&vector);
            let original = features.numeric_values();

            assert_eq!(recovered.len(), original.len());
            for (r, o) in recovered.iter().zip(original.iter()) {
                assert!((r - o.unwrap()).abs() < 1e-9, "{} != {:?}", r, o);
            }
        }
    }

    #[test]
    fn test_one_hot_encoding() {
        let train = training_set();
        let fitted = PreprocessorBuilder::new().fit(&train).unwrap();
        let vector = fitted.transform(&make_features("None", "Rain", 290.0, 9, 2));

        let holiday = &vector[9..11];
        let weather = &vector[11..15];
        assert_eq!(holiday, &[1.0, 0.0]);
        assert_eq!(weather, &[0.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_unseen_category_encodes_as_zeros() {
        let fitted = PreprocessorBuilder::new().fit(&training_set()).unwrap();
        let vector = fitted.transform(&make_features("Labor Day", "Thunderstorm", 290.0, 9, 2));

        assert_eq!(vector.len(), fitted.output_dim());
        assert!(vector[9..15].iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_transform_does_not_change_state() {
        let fitted = PreprocessorBuilder::new().fit(&training_set()).unwrap();
        let before = fitted.clone();

        let _ = fitted.transform(&make_features("Labor Day", "Haze", 500.0, 3, 4));
        assert_eq!(fitted, before);
    }

    #[test]
    fn test_degenerate_feature_uses_unit_scale() {
        // snow_1h is always 0 in the training set
        let fitted = PreprocessorBuilder::new().fit(&training_set()).unwrap();
        let snow = fitted.scalers()[2];

        assert!(snow.degenerate);
        assert_eq!(snow.std, 1.0);
        assert!(fitted.degenerate_fields().contains(&"snow_1h"));

        let mut features = make_features("None", "Snow", 270.0, 3, 3);
        features.snow_1h = 2.5;
        let vector = fitted.transform(&features);
        assert_eq!(vector[2], 2.5);
    }

    #[test]
    fn test_strict_variance_fails() {
        let result = PreprocessorBuilder::new()
            .strict_variance(true)
            .fit(&training_set());

        match result {
            Err(TrafficError::DegenerateFeature { field }) => assert_eq!(field, "snow_1h"),
            other => panic!("expected DegenerateFeature, got {:?}", other),
        }
    }

    #[test]
    fn test_constant_inexact_value_is_degenerate() {
        // 288.28 has no exact binary form; the summed mean drifts off it
        let train: Vec<DerivedFeatures> = (0..10_000)
            .map(|i| make_features("None", "Clouds", 288.28, (i % 24) as u32, (i % 7) as u32))
            .collect();
        let fitted = PreprocessorBuilder::new().fit(&train).unwrap();
        let temp = fitted.scalers()[0];

        assert!(temp.degenerate);
        assert_eq!(temp.mean, 288.28);
        assert_eq!(temp.std, 1.0);

        let mut features = make_features("None", "Clouds", 290.0, 9, 2);
        assert!((fitted.transform(&features)[0] - 1.72).abs() < 1e-9);
        features.temp = 288.28;
        assert_eq!(fitted.transform(&features)[0], 0.0);

        let result = PreprocessorBuilder::new().strict_variance(true).fit(&train);
        match result {
            Err(TrafficError::DegenerateFeature { field }) => assert_eq!(field, "temp"),
            other => panic!("expected DegenerateFeature, got {:?}", other),
        }
    }

    #[test]
    fn test_small_real_spread_is_not_degenerate() {
        let train: Vec<DerivedFeatures> = (0..100)
            .map(|i| make_features("None", "Clouds", 288.0 + (i % 2) as f64 * 1e-3, 8, 1))
            .collect();
        let fitted = PreprocessorBuilder::new().fit(&train).unwrap();
        assert!(!fitted.scalers()[0].degenerate);
    }

    #[test]
    fn test_missing_clouds_imputed_with_mean() {
        let fitted = PreprocessorBuilder::new().fit(&training_set()).unwrap();
        let mut features = make_features("None", "Clouds", 290.0, 9, 2);
        features.clouds_all = None;

        let vector = fitted.transform(&features);
        assert_eq!(vector[3], 0.0);
    }

    #[test]
    fn test_fit_empty_fails() {
        let result = PreprocessorBuilder::new().fit(&[]);
        assert!(matches!(result, Err(TrafficError::EmptyDataset(_))));
    }

    #[test]
    fn test_validate_rejects_truncated_state() {
        let mut fitted = PreprocessorBuilder::new().fit(&training_set()).unwrap();
        assert!(fitted.validate().is_ok());

        fitted.scalers.pop();
        assert!(matches!(
            fitted.validate(),
            Err(TrafficError::ArtifactMismatch(_))
        ));
    }
}

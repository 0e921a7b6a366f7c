//! Prediction request payload
//!
//! Callers supply calendar fields directly instead of a timestamp. Flags are
//! accepted as JSON booleans or as 0/1.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

use crate::data::loader::NO_HOLIDAY;
use crate::features::temporal::{is_rush_hour, is_weekend};
use crate::features::DerivedFeatures;
use crate::{Result, TrafficError};

/// One row to score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionInput {
    #[serde(default = "default_holiday")]
    pub holiday: String,
    pub temp: f64,
    pub rain_1h: f64,
    pub snow_1h: f64,
    /// Imputed with the training mean when absent
    #[serde(default)]
    pub clouds_all: Option<f64>,
    pub weather_main: String,
    pub month: u32,
    pub hour: u32,
    pub day_of_week: u32,
    #[serde(deserialize_with = "deserialize_flag")]
    pub is_weekend: bool,
    #[serde(deserialize_with = "deserialize_flag")]
    pub is_rush_hour: bool,
}

fn default_holiday() -> String {
    NO_HOLIDAY.to_string()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Int(i64),
}

fn deserialize_flag<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => Ok(b),
        Flag::Int(0) => Ok(false),
        Flag::Int(1) => Ok(true),
        Flag::Int(n) => Err(de::Error::custom(format!(
            "flag must be 0, 1, true or false, got {}",
            n
        ))),
    }
}

impl PredictionInput {
    /// Parse a single JSON object or an array of objects
    pub fn from_json(json: &str) -> Result<Vec<PredictionInput>> {
        let value: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| TrafficError::Parse(format!("Invalid prediction JSON: {}", e)))?;

        let inputs = match value {
            serde_json::Value::Array(_) => serde_json::from_value(value),
            other => serde_json::from_value(other).map(|input| vec![input]),
        };
        inputs.map_err(|e| TrafficError::Parse(format!("Invalid prediction input: {}", e)))
    }

    /// Range checks on calendar fields, flag consistency with them, and
    /// finiteness of weather values
    pub fn validate(&self) -> Result<()> {
        if self.hour > 23 {
            return Err(TrafficError::InvalidInput(format!(
                "hour must be 0-23, got {}",
                self.hour
            )));
        }
        if !(1..=12).contains(&self.month) {
            return Err(TrafficError::InvalidInput(format!(
                "month must be 1-12, got {}",
                self.month
            )));
        }
        if self.day_of_week > 6 {
            return Err(TrafficError::InvalidInput(format!(
                "day_of_week must be 0-6 (Monday=0), got {}",
                self.day_of_week
            )));
        }
        if self.is_weekend != is_weekend(self.day_of_week) {
            return Err(TrafficError::InvalidInput(format!(
                "is_weekend={} contradicts day_of_week {}",
                self.is_weekend, self.day_of_week
            )));
        }
        if self.is_rush_hour != is_rush_hour(self.hour) {
            return Err(TrafficError::InvalidInput(format!(
                "is_rush_hour={} contradicts hour {}",
                self.is_rush_hour, self.hour
            )));
        }
        for (name, value) in [
            ("temp", Some(self.temp)),
            ("rain_1h", Some(self.rain_1h)),
            ("snow_1h", Some(self.snow_1h)),
            ("clouds_all", self.clouds_all),
        ] {
            if value.is_some_and(|v| !v.is_finite()) {
                return Err(TrafficError::InvalidInput(format!(
                    "{} must be a finite number",
                    name
                )));
            }
        }
        if self.weather_main.trim().is_empty() {
            return Err(TrafficError::InvalidInput(
                "weather_main must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Validate and convert to the feature set the preprocessor consumes
    pub fn to_features(&self) -> Result<DerivedFeatures> {
        self.validate()?;

        let holiday = match self.holiday.trim() {
            "" => NO_HOLIDAY.to_string(),
            h => h.to_string(),
        };

        Ok(DerivedFeatures {
            holiday,
            temp: self.temp,
            rain_1h: self.rain_1h,
            snow_1h: self.snow_1h,
            clouds_all: self.clouds_all,
            weather_main: self.weather_main.trim().to_string(),
            hour: self.hour,
            day_of_week: self.day_of_week,
            month: self.month,
            is_weekend: self.is_weekend,
            is_rush_hour: self.is_rush_hour,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO: &str = r#"{
        "holiday": "None", "temp": 22.5, "rain_1h": 0.0, "snow_1h": 0.0,
        "weather_main": "Clouds", "month": 6, "hour": 17, "day_of_week": 2,
        "is_weekend": 0, "is_rush_hour": 1
    }"#;

    #[test]
    fn test_parse_integer_flags() {
        let inputs = PredictionInput::from_json(SCENARIO).unwrap();
        assert_eq!(inputs.len(), 1);
        let input = &inputs[0];
        assert!(!input.is_weekend);
        assert!(input.is_rush_hour);
        assert_eq!(input.clouds_all, None);
        assert_eq!(input.hour, 17);
    }

    #[test]
    fn test_parse_bool_flags_and_array() {
        let json = r#"[
            {"temp": 280.0, "rain_1h": 0.0, "snow_1h": 0.0, "clouds_all": 90,
             "weather_main": "Rain", "month": 1, "hour": 3, "day_of_week": 6,
             "is_weekend": true, "is_rush_hour": false},
            {"holiday": "Christmas Day", "temp": 260.0, "rain_1h": 0.0, "snow_1h": 1.2,
             "weather_main": "Snow", "month": 12, "hour": 12, "day_of_week": 0,
             "is_weekend": false, "is_rush_hour": false}
        ]"#;
        let inputs = PredictionInput::from_json(json).unwrap();
        assert_eq!(inputs.len(), 2);
        assert_eq!(inputs[0].holiday, "None");
        assert_eq!(inputs[0].clouds_all, Some(90.0));
        assert!(inputs[0].is_weekend);
        assert_eq!(inputs[1].holiday, "Christmas Day");
    }

    #[test]
    fn test_flag_out_of_range() {
        let json = SCENARIO.replace("\"is_weekend\": 0", "\"is_weekend\": 2");
        assert!(matches!(
            PredictionInput::from_json(&json),
            Err(TrafficError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_field_is_parse_error() {
        let json = r#"{"temp": 280.0}"#;
        assert!(matches!(
            PredictionInput::from_json(json),
            Err(TrafficError::Parse(_))
        ));
    }

    #[test]
    fn test_range_validation() {
        let base = PredictionInput::from_json(SCENARIO).unwrap().remove(0);

        let mut bad = base.clone();
        bad.hour = 24;
        assert!(matches!(bad.validate(), Err(TrafficError::InvalidInput(_))));

        let mut bad = base.clone();
        bad.month = 0;
        assert!(matches!(bad.validate(), Err(TrafficError::InvalidInput(_))));

        let mut bad = base.clone();
        bad.day_of_week = 7;
        assert!(matches!(bad.validate(), Err(TrafficError::InvalidInput(_))));

        let mut bad = base.clone();
        bad.temp = f64::NAN;
        assert!(matches!(bad.to_features(), Err(TrafficError::InvalidInput(_))));

        assert!(base.validate().is_ok());
    }

    #[test]
    fn test_contradictory_flags_rejected() {
        let base = PredictionInput::from_json(SCENARIO).unwrap().remove(0);

        let mut weekday_weekend = base.clone();
        weekday_weekend.is_weekend = true;
        match weekday_weekend.validate() {
            Err(TrafficError::InvalidInput(msg)) => assert!(msg.contains("is_weekend")),
            other => panic!("expected InvalidInput, got {:?}", other),
        }

        let mut night_rush = base.clone();
        night_rush.hour = 3;
        match night_rush.to_features() {
            Err(TrafficError::InvalidInput(msg)) => assert!(msg.contains("is_rush_hour")),
            other => panic!("expected InvalidInput, got {:?}", other),
        }

        let mut saturday = base.clone();
        saturday.day_of_week = 5;
        assert!(saturday.validate().is_err());
        saturday.is_weekend = true;
        assert!(saturday.validate().is_ok());
    }

    #[test]
    fn test_to_features() {
        let mut input = PredictionInput::from_json(SCENARIO).unwrap().remove(0);
        input.holiday = "  ".to_string();
        let features = input.to_features().unwrap();

        assert_eq!(features.holiday, NO_HOLIDAY);
        assert_eq!(features.weather_main, "Clouds");
        assert_eq!(features.month, 6);
        assert_eq!(features.day_of_week, 2);
        assert!(features.is_rush_hour);
        assert_eq!(features.clouds_all, None);
    }
}

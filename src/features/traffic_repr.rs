//! Feature representation of a single hourly observation
//!
//! A [`RawRecord`] minus its timestamp, plus the calendar fields derived from it.

use serde::{Deserialize, Serialize};

use crate::features::temporal::CalendarFeatures;
use crate::{CategoricalField, RawRecord, Result};

/// Model-facing view of one observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedFeatures {
    pub holiday: String,
    pub temp: f64,
    pub rain_1h: f64,
    pub snow_1h: f64,
    /// Cloud coverage; absent when the caller did not supply it
    pub clouds_all: Option<f64>,
    pub weather_main: String,
    pub hour: u32,
    pub day_of_week: u32,
    pub month: u32,
    pub is_weekend: bool,
    pub is_rush_hour: bool,
}

impl DerivedFeatures {
    /// Number of numeric fields
    pub const NUMERIC_DIM: usize = 9;

    /// Numeric field names, in vector order
    pub const NUMERIC_FIELDS: [&'static str; Self::NUMERIC_DIM] = [
        "temp",
        "rain_1h",
        "snow_1h",
        "clouds_all",
        "hour",
        "day_of_week",
        "month",
        "is_weekend",
        "is_rush_hour",
    ];

    /// Categorical fields, in encoding order
    pub const CATEGORICAL_FIELDS: [CategoricalField; 2] =
        [CategoricalField::Holiday, CategoricalField::WeatherMain];

    /// Combine weather values with calendar context
    pub fn from_parts(record: &RawRecord, calendar: CalendarFeatures) -> Self {
        DerivedFeatures {
            holiday: record.holiday.clone(),
            temp: record.temp,
            rain_1h: record.rain_1h,
            snow_1h: record.snow_1h,
            clouds_all: Some(record.clouds_all),
            weather_main: record.weather_main.clone(),
            hour: calendar.hour,
            day_of_week: calendar.day_of_week,
            month: calendar.month,
            is_weekend: calendar.is_weekend,
            is_rush_hour: calendar.is_rush_hour,
        }
    }

    /// Numeric values in [`Self::NUMERIC_FIELDS`] order; flags become 0/1
    pub fn numeric_values(&self) -> [Option<f64>; Self::NUMERIC_DIM] {
        [
            Some(self.temp),
            Some(self.rain_1h),
            Some(self.snow_1h),
            self.clouds_all,
            Some(self.hour as f64),
            Some(self.day_of_week as f64),
            Some(self.month as f64),
            Some(if self.is_weekend { 1.0 } else { 0.0 }),
            Some(if self.is_rush_hour { 1.0 } else { 0.0 }),
        ]
    }

    /// Category value for a categorical field
    pub fn category(&self, field: CategoricalField) -> &str {
        match field {
            CategoricalField::Holiday => &self.holiday,
            CategoricalField::WeatherMain => &self.weather_main,
        }
    }
}

/// Derive model features from a raw record.
///
/// Only the timestamp is validated; weather values pass through unchanged.
pub fn derive(record: &RawRecord) -> Result<DerivedFeatures> {
    let calendar = CalendarFeatures::from_timestamp(&record.date_time)?;
    Ok(DerivedFeatures::from_parts(record, calendar))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TrafficError;

    fn make_record(date_time: &str) -> RawRecord {
        RawRecord {
            date_time: date_time.to_string(),
            holiday: "None".to_string(),
            temp: 288.28,
            rain_1h: 0.0,
            snow_1h: 0.0,
            clouds_all: 40.0,
            weather_main: "Clouds".to_string(),
        }
    }

    #[test]
    fn test_derive_rush_hour_weekday() {
        // 2012-10-02 is a Tuesday
        let features = derive(&make_record("2012-10-02 17:00:00")).unwrap();
        assert_eq!(features.hour, 17);
        assert_eq!(features.day_of_week, 1);
        assert_eq!(features.month, 10);
        assert!(!features.is_weekend);
        assert!(features.is_rush_hour);
        assert_eq!(features.weather_main, "Clouds");
        assert_eq!(features.clouds_all, Some(40.0));
    }

    #[test]
    fn test_weather_values_pass_through() {
        let mut record = make_record("2012-10-02 03:00:00");
        record.rain_1h = -3.5;
        record.temp = 0.0;
        record.weather_main = "Volcanic Ash".to_string();

        let features = derive(&record).unwrap();
        assert_eq!(features.rain_1h, -3.5);
        assert_eq!(features.temp, 0.0);
        assert_eq!(features.weather_main, "Volcanic Ash");
    }

    #[test]
    fn test_derive_rejects_bad_timestamp() {
        let result = derive(&make_record("not a date"));
        assert!(matches!(result, Err(TrafficError::MalformedTimestamp(_))));
    }

    #[test]
    fn test_derived_fields_depend_only_on_timestamp() {
        let a = make_record("2013-07-06 08:00:00");
        let mut b = a.clone();
        b.temp = 250.0;
        b.holiday = "Independence Day".to_string();
        b.weather_main = "Snow".to_string();

        let fa = derive(&a).unwrap();
        let fb = derive(&b).unwrap();
        assert_eq!(
            (fa.hour, fa.day_of_week, fa.month, fa.is_weekend, fa.is_rush_hour),
            (fb.hour, fb.day_of_week, fb.month, fb.is_weekend, fb.is_rush_hour)
        );
    }

    #[test]
    fn test_numeric_values_order() {
        let features = derive(&make_record("2013-07-06 08:00:00")).unwrap();
        let values = features.numeric_values();
        assert_eq!(values.len(), DerivedFeatures::NUMERIC_FIELDS.len());
        assert_eq!(values[0], Some(288.28));
        assert_eq!(values[4], Some(8.0));
        // Saturday, morning peak
        assert_eq!(values[7], Some(1.0));
        assert_eq!(values[8], Some(1.0));
    }
}

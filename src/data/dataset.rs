//! In-memory dataset of labelled observations
//!
//! Provides seeded train/test splits and summary statistics.

use chrono::NaiveDateTime;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::features::temporal::parse_timestamp;
use crate::{Observation, RawRecord};

/// Summary of the traffic volume target
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeStats {
    pub min: u32,
    pub max: u32,
    pub mean: f64,
    pub std: f64,
}

/// Labelled observations used for training and evaluation
#[derive(Debug, Clone, Default)]
pub struct TrafficDataset {
    observations: Vec<Observation>,
}

impl TrafficDataset {
    pub fn new(observations: Vec<Observation>) -> Self {
        TrafficDataset { observations }
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn records(&self) -> impl Iterator<Item = &RawRecord> {
        self.observations.iter().map(|o| &o.record)
    }

    /// Targets as floats, in observation order
    pub fn targets(&self) -> Vec<f64> {
        self.observations
            .iter()
            .map(|o| o.traffic_volume as f64)
            .collect()
    }

    /// Shuffle with a fixed seed and hold out `test_fraction` of the rows.
    /// A fraction of 0 returns everything as training data.
    pub fn split(&self, test_fraction: f64, seed: u64) -> (TrafficDataset, TrafficDataset) {
        let n = self.len();
        let n_test = ((n as f64) * test_fraction.clamp(0.0, 1.0)).round() as usize;
        let n_test = n_test.min(n.saturating_sub(1));

        let mut shuffled = self.observations.clone();
        let mut rng = StdRng::seed_from_u64(seed);
        shuffled.shuffle(&mut rng);

        let train = shuffled.split_off(n_test);
        log::info!("Split {} observations: train={}, test={}", n, train.len(), shuffled.len());

        (TrafficDataset::new(train), TrafficDataset::new(shuffled))
    }

    pub fn volume_stats(&self) -> Option<VolumeStats> {
        if self.is_empty() {
            return None;
        }
        let volumes: Vec<f64> = self.targets();
        let n = volumes.len() as f64;
        let mean = volumes.iter().sum::<f64>() / n;
        let variance = volumes.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;

        Some(VolumeStats {
            min: self.observations.iter().map(|o| o.traffic_volume).min()?,
            max: self.observations.iter().map(|o| o.traffic_volume).max()?,
            mean,
            std: variance.sqrt(),
        })
    }

    /// Earliest and latest timestamps
    pub fn date_range(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        let mut stamps = self
            .records()
            .filter_map(|r| parse_timestamp(&r.date_time).ok());
        let first = stamps.next()?;
        Some(stamps.fold((first, first), |(lo, hi), t| (lo.min(t), hi.max(t))))
    }
}

/// Deterministic hourly observations with rush-hour, weekend and weather
/// effects, for tests across the crate
#[cfg(test)]
pub(crate) fn synthetic_observations(n: usize) -> Vec<Observation> {
    use chrono::{Datelike, Duration, NaiveDate, Timelike};

    const WEATHER: [&str; 5] = ["Clouds", "Clear", "Rain", "Snow", "Mist"];
    // 2016-01-04 is a Monday
    let start = NaiveDate::from_ymd_opt(2016, 1, 4)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();

    (0..n)
        .map(|i| {
            let ts = start + Duration::hours(i as i64);
            let hour = ts.hour();
            let weekend = ts.weekday().num_days_from_monday() >= 5;
            let weather = WEATHER[(i / 7) % WEATHER.len()];
            let holiday = if ts.day() == 1 && hour == 0 { "New Years Day" } else { "None" };

            let mut volume: f64 = match hour {
                7..=9 | 16..=18 => 5200.0,
                10..=15 => 4300.0,
                19..=22 => 2800.0,
                _ => 600.0,
            };
            if weekend {
                volume *= 0.6;
            }
            if weather == "Snow" {
                volume -= 400.0;
            }

            Observation {
                record: RawRecord {
                    date_time: ts.format("%Y-%m-%d %H:%M:%S").to_string(),
                    holiday: holiday.to_string(),
                    temp: 265.0 + ((i % 24) as f64) * 0.8,
                    rain_1h: if weather == "Rain" { 1.5 } else { 0.0 },
                    snow_1h: if weather == "Snow" { 0.4 } else { 0.0 },
                    clouds_all: ((i * 37) % 100) as f64,
                    weather_main: weather.to_string(),
                },
                traffic_volume: volume.max(0.0) as u32,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_sizes_and_disjointness() {
        let dataset = TrafficDataset::new(synthetic_observations(100));
        let (train, test) = dataset.split(0.2, 42);

        assert_eq!(train.len(), 80);
        assert_eq!(test.len(), 20);

        let mut stamps: Vec<&str> = train
            .records()
            .chain(test.records())
            .map(|r| r.date_time.as_str())
            .collect();
        stamps.sort();
        stamps.dedup();
        assert_eq!(stamps.len(), 100);
    }

    #[test]
    fn test_split_is_seeded() {
        let dataset = TrafficDataset::new(synthetic_observations(50));
        let (a, _) = dataset.split(0.3, 7);
        let (b, _) = dataset.split(0.3, 7);
        assert_eq!(a.observations(), b.observations());
    }

    #[test]
    fn test_zero_fraction_keeps_everything() {
        let dataset = TrafficDataset::new(synthetic_observations(10));
        let (train, test) = dataset.split(0.0, 1);
        assert_eq!(train.len(), 10);
        assert!(test.is_empty());
    }

    #[test]
    fn test_split_never_empties_training_set() {
        let dataset = TrafficDataset::new(synthetic_observations(1));
        let (train, test) = dataset.split(0.9, 1);
        assert_eq!(train.len(), 1);
        assert!(test.is_empty());
    }

    #[test]
    fn test_volume_stats() {
        let observations: Vec<Observation> = synthetic_observations(3)
            .into_iter()
            .zip([100, 200, 300])
            .map(|(mut o, v)| {
                o.traffic_volume = v;
                o
            })
            .collect();
        let stats = TrafficDataset::new(observations).volume_stats().unwrap();

        assert_eq!(stats.min, 100);
        assert_eq!(stats.max, 300);
        assert!((stats.mean - 200.0).abs() < 1e-9);
        assert!((stats.std - (20000.0f64 / 3.0).sqrt()).abs() < 1e-9);
        assert!(TrafficDataset::default().volume_stats().is_none());
    }

    #[test]
    fn test_date_range() {
        let dataset = TrafficDataset::new(synthetic_observations(48));
        let (first, last) = dataset.date_range().unwrap();
        assert_eq!(first.to_string(), "2016-01-04 00:00:00");
        assert_eq!(last.to_string(), "2016-01-05 23:00:00");
    }
}

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};

use housing_service::{FEATURE_NAMES, Result, TrainingConfig, dataset::DatasetSource};
use ml_core::Dataset;

/// A deterministic stand-in for the census table that counts its fetches.
pub struct SyntheticHousing {
    rows: usize,
    names: Vec<String>,
    fetches: AtomicUsize,
}

impl SyntheticHousing {
    pub fn new(rows: usize) -> Self {
        Self::with_names(rows, FEATURE_NAMES)
    }

    pub fn with_names(rows: usize, names: [&str; 8]) -> Self {
        Self {
            rows,
            names: names.iter().map(|s| s.to_string()).collect(),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl DatasetSource for SyntheticHousing {
    fn fetch(&self) -> Result<Dataset> {
        self.fetches.fetch_add(1, Ordering::SeqCst);

        let mut features = Vec::with_capacity(self.rows * 8);
        let mut targets = Vec::with_capacity(self.rows);

        for i in 0..self.rows {
            let med_inc = 1.0 + (i % 37) as f64 * 0.25;
            let house_age = (i % 52) as f64;
            let ave_rooms = 3.0 + (i % 11) as f64 * 0.4;
            let ave_bedrms = 1.0 + (i % 5) as f64 * 0.05;
            let population = 200.0 + (i % 97) as f64 * 15.0;
            let ave_occup = 2.0 + (i % 7) as f64 * 0.3;
            let latitude = 32.5 + (i % 19) as f64 * 0.5;
            let longitude = -124.0 + (i % 23) as f64 * 0.4;

            features.extend([
                med_inc, house_age, ave_rooms, ave_bedrms, population, ave_occup, latitude,
                longitude,
            ]);
            targets.push(0.3 + 0.4 * med_inc + 0.01 * house_age);
        }

        Ok(Dataset::from_rows(features, targets, self.names.clone())?)
    }
}

pub fn small_training() -> TrainingConfig {
    TrainingConfig {
        seed: 42,
        n_trees: 8,
        test_fraction: 0.2,
    }
}

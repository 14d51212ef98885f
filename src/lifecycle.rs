use std::{path::Path, time::Instant};

use log::info;
use ml_core::{ForestParams, RandomForestRegressor, Regressor, r2_score, root_mean_squared_error};

use crate::{
    artifact::{ARTIFACT_VERSION, Artifact, ArtifactHeader},
    config::TrainingConfig,
    dataset::DatasetSource,
    error::{Result, ServiceErr},
    features::FEATURE_NAMES,
};

/// Outcome of `ensure_model_ready`.
#[derive(Debug, Clone, PartialEq)]
pub enum Readiness {
    /// An artifact was already on disk, nothing was trained.
    AlreadyPresent,
    /// A new artifact was trained and written.
    Trained(TrainReport),
}

/// Summary of a training run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainReport {
    pub train_rows: usize,
    pub test_rows: usize,
    pub held_out_rmse: f64,
}

/// Makes sure a model artifact exists at `path`, training one if it doesn't.
///
/// An existing file is trusted as is; its header is only checked when the
/// artifact is loaded. Otherwise the dataset is fetched, split into training
/// and held-out rows, a forest is fit on the training rows and persisted, and
/// the held-out RMSE is logged. Calling this again once it succeeded does nothing.
///
/// # Args
/// * `path` - Where the artifact lives.
/// * `config` - Seed, forest size and held-out share.
/// * `source` - Where the dataset comes from, only used when training.
///
/// # Returns
/// Whether training happened and, if so, its report.
///
/// # Errors
/// Any fetch, fit or write failure. Nothing is retried.
pub fn ensure_model_ready(
    path: &Path,
    config: &TrainingConfig,
    source: &dyn DatasetSource,
) -> Result<Readiness> {
    if path.exists() {
        info!("model artifact found at {}, skipping training", path.display());
        return Ok(Readiness::AlreadyPresent);
    }

    info!("no model artifact at {}, training a new one", path.display());
    let artifact = train(config, source)?;
    artifact.save(path)?;

    let header = artifact.header();
    info!(
        rmse = header.held_out_rmse;
        "model saved to {}, test RMSE: {:.4}",
        path.display(),
        header.held_out_rmse
    );

    Ok(Readiness::Trained(TrainReport {
        train_rows: header.train_rows,
        test_rows: header.test_rows,
        held_out_rmse: header.held_out_rmse,
    }))
}

/// Fetches the dataset and fits a forest, without touching the disk.
///
/// # Errors
/// Any fetch or fit failure, or a dataset whose columns aren't `FEATURE_NAMES`.
pub fn train(config: &TrainingConfig, source: &dyn DatasetSource) -> Result<Artifact> {
    let dataset = source.fetch()?;
    if dataset.feature_names() != FEATURE_NAMES {
        return Err(ServiceErr::MalformedDataset {
            line: None,
            reason: format!(
                "expected columns {FEATURE_NAMES:?}, got {:?}",
                dataset.feature_names()
            ),
        });
    }

    info!(
        "fetched dataset: {} rows, features {:?}",
        dataset.len(),
        dataset.feature_names()
    );

    let (train, test) = dataset.train_test_split(config.test_fraction, config.seed)?;
    let params = ForestParams::default()
        .with_n_trees(config.n_trees)
        .with_seed(config.seed);

    info!(
        "fitting {} trees on {} rows ({} held out)",
        params.n_trees,
        train.len(),
        test.len()
    );
    let started = Instant::now();
    let model = RandomForestRegressor::fit(&train, &params)?;
    let leaves: usize = model.trees().iter().map(|tree| tree.n_leaves()).sum();
    let depth = model.trees().iter().map(|tree| tree.depth()).max().unwrap_or(0);
    info!(
        "fit finished in {:.1?}: {leaves} leaves, deepest tree {depth}",
        started.elapsed()
    );

    let predictions = model.predict(test.features())?;
    let held_out_rmse = root_mean_squared_error(test.targets(), predictions.view())?;
    let held_out_r2 = r2_score(test.targets(), predictions.view())?;
    info!(r2 = held_out_r2; "held-out R²: {held_out_r2:.4}");

    let header = ArtifactHeader {
        format_version: ARTIFACT_VERSION,
        feature_names: train.feature_names().to_vec(),
        seed: config.seed,
        train_rows: train.len(),
        test_rows: test.len(),
        held_out_rmse,
    };

    Ok(Artifact::new(header, model))
}

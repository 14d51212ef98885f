use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use log::debug;
use tokio::task;

use crate::{
    artifact::Artifact,
    config::ModelLoading,
    error::Result,
    features::FeatureVector,
};

/// The read-only model shared by every request handler.
///
/// It bridges the async handlers with the blocking, CPU-bound prediction.
#[derive(Debug, Clone)]
pub enum ModelHandle {
    /// The artifact lives in memory for the whole process.
    Resident(Arc<Artifact>),
    /// The artifact is decoded from disk on every prediction.
    PerRequest(Arc<PathBuf>),
}

impl ModelHandle {
    /// Opens the artifact at `path`.
    ///
    /// The artifact is loaded and validated once in both modes, so an
    /// unusable file stops the service before it accepts traffic.
    ///
    /// # Arguments
    /// * `path` - Where the artifact lives.
    /// * `loading` - Whether to keep it in memory or re-read it per request.
    ///
    /// # Returns
    /// A new `ModelHandle`, or the load error.
    pub fn open(path: &Path, loading: ModelLoading) -> Result<Self> {
        let artifact = Artifact::load(path)?;

        Ok(match loading {
            ModelLoading::Resident => Self::Resident(Arc::new(artifact)),
            ModelLoading::PerRequest => Self::PerRequest(Arc::new(path.to_path_buf())),
        })
    }

    /// Predicts synchronously, reading the artifact first in per-request mode.
    ///
    /// # Returns
    /// The prediction, or a missing/corrupt artifact error in per-request mode.
    pub fn predict_blocking(&self, features: &FeatureVector) -> Result<f64> {
        match self {
            Self::Resident(artifact) => artifact.predict(features),
            Self::PerRequest(path) => {
                debug!("loading model artifact from {}", path.display());
                Artifact::load(path)?.predict(features)
            }
        }
    }

    /// Async call to `predict_blocking`.
    ///
    /// Must run on a multi-threaded runtime.
    pub async fn predict(&self, features: &FeatureVector) -> Result<f64> {
        task::block_in_place(|| self.predict_blocking(features))
    }
}

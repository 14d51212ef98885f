//! Median house value predictions for California districts.
//!
//! At startup the service makes sure a trained random forest is on disk,
//! training one from the census housing table if needed, then serves it
//! over `POST /predict`.

pub mod artifact;
pub mod config;
pub mod dataset;
pub mod error;
pub mod features;
pub mod handle;
pub mod http;
pub mod lifecycle;

pub use artifact::{ARTIFACT_VERSION, Artifact, ArtifactHeader};
pub use config::{DatasetConfig, ModelLoading, ServiceConfig, TrainingConfig};
pub use error::{Result, ServiceErr};
pub use features::{FEATURE_NAMES, FeatureVector, FieldError};
pub use handle::ModelHandle;
pub use lifecycle::{Readiness, TrainReport, ensure_model_ready};

use std::{
    fs::{self, File},
    io::{self, BufReader, BufWriter, Write},
    path::Path,
};

use bincode::Options;
use ml_core::{RandomForestRegressor, Regressor};
use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

use crate::{
    error::{Result, ServiceErr},
    features::{FEATURE_NAMES, FeatureVector},
};

/// Bumped whenever the encoded layout of `Artifact` changes.
pub const ARTIFACT_VERSION: u32 = 1;

fn codec() -> impl Options {
    bincode::DefaultOptions::new().with_fixint_encoding()
}

/// Describes how an artifact was produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactHeader {
    pub format_version: u32,
    pub feature_names: Vec<String>,
    pub seed: u64,
    pub train_rows: usize,
    pub test_rows: usize,
    pub held_out_rmse: f64,
}

/// A trained model together with its header, as persisted on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    header: ArtifactHeader,
    model: RandomForestRegressor,
}

impl Artifact {
    /// Wraps a freshly trained model.
    pub fn new(header: ArtifactHeader, model: RandomForestRegressor) -> Self {
        Self { header, model }
    }

    pub fn header(&self) -> &ArtifactHeader {
        &self.header
    }

    pub fn model(&self) -> &RandomForestRegressor {
        &self.model
    }

    /// Predicts the median house value of one district.
    ///
    /// # Errors
    /// - `ServiceErr::Ml` if the model and the row disagree on the feature count.
    /// - `ServiceErr::Internal` if the model yields a non-finite value.
    pub fn predict(&self, features: &FeatureVector) -> Result<f64> {
        let row = features.to_row();
        let prediction = self.model.predict_row(ArrayView1::from(&row[..]))?;

        if !prediction.is_finite() {
            return Err(ServiceErr::Internal(format!(
                "the model predicted {prediction}"
            )));
        }

        Ok(prediction)
    }

    /// Writes the artifact to `path`.
    ///
    /// The bytes go to a sibling `.tmp` file first, which is renamed over
    /// `path` once fully flushed. Missing parent directories are created.
    ///
    /// # Errors
    /// `ServiceErr::Io` or `ServiceErr::ArtifactCodec`.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let tmp = path.with_extension("tmp");
        let mut writer = BufWriter::new(File::create(&tmp)?);
        codec().serialize_into(&mut writer, self)?;
        writer.flush()?;
        writer.into_inner().map_err(|e| e.into_error())?.sync_all()?;

        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Reads and validates the artifact at `path`.
    ///
    /// # Errors
    /// - `ServiceErr::ArtifactMissing` if there's no file at `path`.
    /// - `ServiceErr::ArtifactCodec` if the file can't be decoded.
    /// - `ServiceErr::IncompatibleArtifact` if it was written for another
    ///   format version or feature schema.
    /// - `ServiceErr::Ml` if the decoded forest is structurally broken.
    pub fn load(path: &Path) -> Result<Self> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(ServiceErr::ArtifactMissing(path.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };

        // a corrupt length prefix can't make the decoder read past the file
        let limit = file.metadata()?.len();
        let artifact: Self = codec()
            .with_limit(limit)
            .deserialize_from(BufReader::new(file))?;
        artifact.validate()?;
        Ok(artifact)
    }

    fn validate(&self) -> Result<()> {
        let header = &self.header;

        if header.format_version != ARTIFACT_VERSION {
            return Err(ServiceErr::IncompatibleArtifact(format!(
                "format version {} is not the supported {ARTIFACT_VERSION}",
                header.format_version
            )));
        }

        if header.feature_names != FEATURE_NAMES {
            return Err(ServiceErr::IncompatibleArtifact(format!(
                "trained on features {:?}, expected {FEATURE_NAMES:?}",
                header.feature_names
            )));
        }

        if self.model.n_features() != FEATURE_NAMES.len() {
            return Err(ServiceErr::IncompatibleArtifact(format!(
                "model expects {} features, expected {}",
                self.model.n_features(),
                FEATURE_NAMES.len()
            )));
        }

        self.model.check()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ml_core::{Dataset, ForestParams, MlError};

    // Same encoded layout as the ml_core types, to write damaged forests.
    #[derive(Serialize)]
    enum RawNode {
        Leaf { value: f64 },
        Split {
            feature: usize,
            threshold: f64,
            left: usize,
            right: usize,
        },
    }

    #[derive(Serialize)]
    struct RawTree {
        nodes: Vec<RawNode>,
        n_features: usize,
    }

    #[derive(Serialize)]
    struct RawForest {
        trees: Vec<RawTree>,
        n_features: usize,
    }

    #[derive(Serialize)]
    struct RawArtifact {
        header: ArtifactHeader,
        model: RawForest,
    }

    fn write_raw(path: &Path, trees: Vec<RawTree>) {
        let raw = RawArtifact {
            header: trained(FEATURE_NAMES).header,
            model: RawForest {
                trees,
                n_features: FEATURE_NAMES.len(),
            },
        };
        let bytes = codec().serialize(&raw).unwrap();
        fs::write(path, bytes).unwrap();
    }

    fn trained(feature_names: [&str; 8]) -> Artifact {
        let rows = (0..40).flat_map(|i| [i as f64; 8]).collect();
        let targets = (0..40).map(|i| i as f64 * 0.1).collect();
        let ds = Dataset::from_rows(rows, targets, feature_names).unwrap();
        let params = ForestParams::default().with_n_trees(3).with_seed(42);
        let model = RandomForestRegressor::fit(&ds, &params).unwrap();

        let header = ArtifactHeader {
            format_version: ARTIFACT_VERSION,
            feature_names: feature_names.iter().map(|s| s.to_string()).collect(),
            seed: 42,
            train_rows: 40,
            test_rows: 0,
            held_out_rmse: 0.0,
        };
        Artifact::new(header, model)
    }

    #[test]
    fn save_then_load_restores_the_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("model.bin");

        let artifact = trained(FEATURE_NAMES);
        artifact.save(&path).unwrap();
        assert!(!path.with_extension("tmp").exists());

        let loaded = Artifact::load(&path).unwrap();
        assert_eq!(loaded, artifact);
    }

    #[test]
    fn missing_file_is_reported_as_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.bin");
        assert!(matches!(Artifact::load(&path), Err(ServiceErr::ArtifactMissing(p)) if p == path));
    }

    #[test]
    fn garbage_is_a_codec_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.bin");
        fs::write(&path, b"definitely not a forest").unwrap();
        assert!(matches!(Artifact::load(&path), Err(ServiceErr::ArtifactCodec(_))));
    }

    #[test]
    fn other_versions_and_schemas_are_incompatible() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.bin");

        let mut old = trained(FEATURE_NAMES);
        old.header.format_version = ARTIFACT_VERSION + 1;
        old.save(&path).unwrap();
        assert!(matches!(Artifact::load(&path), Err(ServiceErr::IncompatibleArtifact(_))));

        let renamed = ["a", "b", "c", "d", "e", "f", "g", "h"];
        trained(renamed).save(&path).unwrap();
        assert!(matches!(Artifact::load(&path), Err(ServiceErr::IncompatibleArtifact(_))));
    }

    #[test]
    fn predict_follows_the_trained_trend() {
        let artifact = trained(FEATURE_NAMES);
        let low = FeatureVector::from_row([1.0; 8]);
        let high = FeatureVector::from_row([38.0; 8]);
        assert!(artifact.predict(&low).unwrap() < artifact.predict(&high).unwrap());
    }

    #[test]
    fn a_forest_without_trees_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.bin");
        write_raw(&path, Vec::new());

        assert!(matches!(
            Artifact::load(&path),
            Err(ServiceErr::Ml(MlError::MalformedModel(_)))
        ));
    }

    #[test]
    fn dangling_or_looping_children_are_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.bin");

        for (left, right) in [(99, 99), (0, 0)] {
            let tree = RawTree {
                nodes: vec![RawNode::Split {
                    feature: 0,
                    threshold: 1.0,
                    left,
                    right,
                }],
                n_features: FEATURE_NAMES.len(),
            };
            write_raw(&path, vec![tree]);

            assert!(matches!(
                Artifact::load(&path),
                Err(ServiceErr::Ml(MlError::MalformedModel(_)))
            ));
        }

        let empty = RawTree {
            nodes: Vec::new(),
            n_features: FEATURE_NAMES.len(),
        };
        write_raw(&path, vec![empty]);
        assert!(matches!(
            Artifact::load(&path),
            Err(ServiceErr::Ml(MlError::MalformedModel(_)))
        ));
    }

    #[test]
    fn the_raw_layout_matches_a_real_forest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.bin");
        let tree = RawTree {
            nodes: vec![
                RawNode::Split {
                    feature: 0,
                    threshold: 5.0,
                    left: 1,
                    right: 2,
                },
                RawNode::Leaf { value: 1.5 },
                RawNode::Leaf { value: 3.5 },
            ],
            n_features: FEATURE_NAMES.len(),
        };
        write_raw(&path, vec![tree]);

        let artifact = Artifact::load(&path).unwrap();
        assert_eq!(artifact.predict(&FeatureVector::from_row([2.0; 8])).unwrap(), 1.5);
        assert_eq!(artifact.predict(&FeatureVector::from_row([8.0; 8])).unwrap(), 3.5);
    }
}

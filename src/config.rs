use std::{env, fmt, path::PathBuf, str::FromStr};

use crate::error::{Result, ServiceErr};

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8000;
const DEFAULT_MODEL_PATH: &str = "model.bin";
const DEFAULT_DATA_HOME: &str = "data";
pub const DEFAULT_DATASET_URL: &str = "https://ndownloader.figshare.com/files/5976036";
const DEFAULT_SEED: u64 = 42;
const DEFAULT_TREES: usize = 100;
const DEFAULT_TEST_FRACTION: f64 = 0.2;

/// How the prediction handler gets hold of the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelLoading {
    /// Load the artifact once at startup and share it across requests.
    Resident,
    /// Read the artifact from disk on every request.
    PerRequest,
}

impl FromStr for ModelLoading {
    type Err = ServiceErr;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "resident" => Ok(Self::Resident),
            "per-request" => Ok(Self::PerRequest),
            other => Err(ServiceErr::InvalidConfig(format!(
                "MODEL_LOADING must be `resident` or `per-request`, got `{other}`"
            ))),
        }
    }
}

impl fmt::Display for ModelLoading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resident => write!(f, "resident"),
            Self::PerRequest => write!(f, "per-request"),
        }
    }
}

/// Where the training data comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum DatasetConfig {
    /// The California housing archive, cached under `data_home`.
    California { data_home: PathBuf, url: String },
    /// A local headered CSV file.
    Csv { path: PathBuf },
}

/// Knobs for the train-or-load step.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingConfig {
    pub seed: u64,
    pub n_trees: usize,
    pub test_fraction: f64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            seed: DEFAULT_SEED,
            n_trees: DEFAULT_TREES,
            test_fraction: DEFAULT_TEST_FRACTION,
        }
    }
}

/// Immutable service configuration, read once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub model_path: PathBuf,
    pub model_loading: ModelLoading,
    pub dataset: DatasetConfig,
    pub training: TrainingConfig,
}

impl ServiceConfig {
    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    /// `ServiceErr::InvalidConfig` if a variable is set to an unusable value.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Reads the configuration through `lookup`, unset keys take their default.
    ///
    /// # Args
    /// * `lookup` - Maps a variable name to its value, if any.
    ///
    /// # Errors
    /// `ServiceErr::InvalidConfig` if a variable is set to an unusable value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let dataset = match lookup("DATASET_PATH") {
            Some(path) => DatasetConfig::Csv { path: path.into() },
            None => DatasetConfig::California {
                data_home: lookup("DATA_HOME")
                    .unwrap_or_else(|| DEFAULT_DATA_HOME.to_string())
                    .into(),
                url: lookup("DATASET_URL").unwrap_or_else(|| DEFAULT_DATASET_URL.to_string()),
            },
        };

        let training = TrainingConfig {
            seed: parse(&lookup, "TRAIN_SEED", DEFAULT_SEED)?,
            n_trees: parse(&lookup, "N_TREES", DEFAULT_TREES)?,
            test_fraction: parse(&lookup, "TEST_FRACTION", DEFAULT_TEST_FRACTION)?,
        };

        if training.n_trees == 0 {
            return Err(ServiceErr::InvalidConfig("N_TREES must be at least 1".into()));
        }

        if !(training.test_fraction > 0.0 && training.test_fraction < 1.0) {
            return Err(ServiceErr::InvalidConfig(format!(
                "TEST_FRACTION must be strictly between 0 and 1, got {}",
                training.test_fraction
            )));
        }

        let model_loading = match lookup("MODEL_LOADING") {
            Some(mode) => mode.parse()?,
            None => ModelLoading::Resident,
        };

        Ok(Self {
            host: lookup("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: parse(&lookup, "PORT", DEFAULT_PORT)?,
            model_path: lookup("MODEL_PATH")
                .unwrap_or_else(|| DEFAULT_MODEL_PATH.to_string())
                .into(),
            model_loading,
            dataset,
            training,
        })
    }

    /// Returns the `host:port` pair to bind.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| ServiceErr::InvalidConfig(format!("{key}=`{raw}`: {e}"))),
    }
}

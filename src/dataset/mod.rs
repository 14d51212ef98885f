mod california;
mod csv;

pub use california::{ARCHIVE_MEMBER, CaliforniaHousing, extract_member, parse_raw};
pub use csv::{CsvFile, parse_csv};

use ml_core::Dataset;

use crate::{
    config::DatasetConfig,
    error::{Result, ServiceErr},
};

/// Provides the labeled table the model is trained on.
///
/// Implementations must yield columns in `FEATURE_NAMES` order.
pub trait DatasetSource {
    /// Loads the full dataset.
    ///
    /// # Errors
    /// Any failure to obtain or parse the data, training can't go on without it.
    fn fetch(&self) -> Result<Dataset>;
}

/// Resolves the configured dataset into a source.
pub fn from_config(config: &DatasetConfig) -> Box<dyn DatasetSource> {
    match config {
        DatasetConfig::California { data_home, url } => {
            Box::new(CaliforniaHousing::new(data_home.clone(), url.clone()))
        }
        DatasetConfig::Csv { path } => Box::new(CsvFile::new(path.clone())),
    }
}

/// Parses one numeric cell, rejecting non-finite values.
fn parse_number(raw: &str, line: usize, column: &str) -> Result<f64> {
    let value = raw.trim().parse::<f64>().map_err(|_| ServiceErr::MalformedDataset {
        line: Some(line),
        reason: format!("`{}` in column {column} is not a number", raw.trim()),
    })?;

    if !value.is_finite() {
        return Err(ServiceErr::MalformedDataset {
            line: Some(line),
            reason: format!("column {column} is not finite"),
        });
    }

    Ok(value)
}

use std::{fs::File, io::Read, path::PathBuf};

use csv::{ReaderBuilder, Trim};
use ml_core::Dataset;

use super::{DatasetSource, parse_number};
use crate::{
    error::{Result, ServiceErr},
    features::{FEATURE_NAMES, TARGET_NAME},
};

/// A local comma-separated file with a header row naming the 8 feature
/// columns and the `MedHouseVal` target, in any order.
pub struct CsvFile {
    path: PathBuf,
}

impl CsvFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl DatasetSource for CsvFile {
    fn fetch(&self) -> Result<Dataset> {
        parse_csv(File::open(&self.path)?)
    }
}

/// Parses a headered CSV table, reordering columns into `FEATURE_NAMES` order.
///
/// Columns are looked up by header name; quoting follows RFC 4180.
///
/// # Errors
/// `ServiceErr::MalformedDataset` if the header lacks a column or a row is
/// malformed.
pub fn parse_csv<R: Read>(input: R) -> Result<Dataset> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(input);

    let header = reader.headers()?.clone();
    if header.is_empty() {
        return Err(ServiceErr::MalformedDataset {
            line: None,
            reason: "the file is empty".into(),
        });
    }

    let column = |name: &str| {
        header
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| ServiceErr::MalformedDataset {
                line: Some(1),
                reason: format!("missing column {name}"),
            })
    };

    let feature_cols = FEATURE_NAMES
        .iter()
        .map(|name| column(*name))
        .collect::<Result<Vec<usize>>>()?;
    let target_col = column(TARGET_NAME)?;

    let mut rows = Vec::new();
    let mut targets = Vec::new();

    for record in reader.records() {
        let record = record?;
        let line_no = record.position().map_or(0, |pos| pos.line() as usize);

        if record.len() != header.len() {
            return Err(ServiceErr::MalformedDataset {
                line: Some(line_no),
                reason: format!("expected {} columns, got {}", header.len(), record.len()),
            });
        }

        for (&col, name) in feature_cols.iter().zip(FEATURE_NAMES) {
            rows.push(parse_number(&record[col], line_no, name)?);
        }
        targets.push(parse_number(&record[target_col], line_no, TARGET_NAME)?);
    }

    Ok(Dataset::from_rows(rows, targets, FEATURE_NAMES)?)
}

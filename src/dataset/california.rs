use std::{
    fs::{self, File},
    io::Read,
    path::{Path, PathBuf},
    time::Duration,
};

use csv::{ReaderBuilder, Trim};
use flate2::read::GzDecoder;
use log::info;
use ml_core::Dataset;

use super::{DatasetSource, parse_number};
use crate::{
    error::{Result, ServiceErr},
    features::FEATURE_NAMES,
};

/// Path of the raw table inside the downloaded archive.
pub const ARCHIVE_MEMBER: &str = "CaliforniaHousing/cal_housing.data";

const CACHED_FILE: &str = "cal_housing.data";
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// Raw column order of `cal_housing.data`.
const RAW_COLUMNS: [&str; 9] = [
    "longitude",
    "latitude",
    "housingMedianAge",
    "totalRooms",
    "totalBedrooms",
    "population",
    "households",
    "medianIncome",
    "medianHouseValue",
];

/// The 1990 California census housing table, 20640 districts.
///
/// The raw file is downloaded once and cached under `data_home`; later
/// fetches read the cached copy.
pub struct CaliforniaHousing {
    data_home: PathBuf,
    url: String,
}

impl CaliforniaHousing {
    /// Creates a new `CaliforniaHousing` source.
    ///
    /// # Args
    /// * `data_home` - Directory where the raw table is cached.
    /// * `url` - Where to download the `.tgz` archive from.
    pub fn new(data_home: PathBuf, url: String) -> Self {
        Self { data_home, url }
    }

    /// Returns where the raw table is cached.
    pub fn cached_path(&self) -> PathBuf {
        self.data_home.join(CACHED_FILE)
    }

    /// Makes sure the raw table is on disk, downloading it if needed.
    ///
    /// # Returns
    /// The path of the cached raw table.
    fn ensure_cached(&self) -> Result<PathBuf> {
        let path = self.cached_path();
        if path.exists() {
            info!("using cached dataset at {}", path.display());
            return Ok(path);
        }

        fs::create_dir_all(&self.data_home)?;

        info!("downloading dataset from {}", self.url);
        let archive = self.download()?;
        let raw = extract_member(archive.as_slice(), ARCHIVE_MEMBER)?;

        let tmp = path.with_extension("part");
        fs::write(&tmp, raw)?;
        fs::rename(&tmp, &path)?;
        info!("cached dataset at {}", path.display());

        Ok(path)
    }

    fn download(&self) -> Result<Vec<u8>> {
        let fetch_err = |source| ServiceErr::Fetch {
            url: self.url.clone(),
            source,
        };

        let client = reqwest::blocking::Client::builder()
            .timeout(DOWNLOAD_TIMEOUT)
            .build()
            .map_err(fetch_err)?;

        let bytes = client
            .get(&self.url)
            .send()
            .and_then(|res| res.error_for_status())
            .and_then(|res| res.bytes())
            .map_err(fetch_err)?;

        Ok(bytes.to_vec())
    }
}

impl DatasetSource for CaliforniaHousing {
    fn fetch(&self) -> Result<Dataset> {
        let path = self.ensure_cached()?;
        parse_raw(File::open(&path)?)
    }
}

/// Reads a single file out of a gzipped tarball.
///
/// # Args
/// * `archive` - The `.tgz` bytes.
/// * `member` - Path of the wanted entry, matched on trailing components.
///
/// # Returns
/// The entry's content.
///
/// # Errors
/// `ServiceErr::MalformedDataset` if no entry matches, `ServiceErr::Io` if
/// the archive can't be read.
pub fn extract_member<R: Read>(archive: R, member: &str) -> Result<Vec<u8>> {
    let mut archive = tar::Archive::new(GzDecoder::new(archive));

    for entry in archive.entries()? {
        let mut entry = entry?;
        if !entry.path()?.ends_with(Path::new(member)) {
            continue;
        }

        let mut buf = Vec::new();
        entry.read_to_end(&mut buf)?;
        return Ok(buf);
    }

    Err(ServiceErr::MalformedDataset {
        line: None,
        reason: format!("archive has no `{member}` entry"),
    })
}

/// Turns the raw census table into the model's features.
///
/// Per-district totals become per-household averages and the target is
/// expressed in units of $100,000:
/// - `AveRooms = totalRooms / households`
/// - `AveBedrms = totalBedrooms / households`
/// - `AveOccup = population / households`
///
/// # Errors
/// `ServiceErr::MalformedDataset` naming the first offending line.
pub fn parse_raw<R: Read>(input: R) -> Result<Dataset> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(input);

    let mut rows = Vec::new();
    let mut targets = Vec::new();

    for record in reader.records() {
        let record = record?;
        let line_no = record.position().map_or(0, |pos| pos.line() as usize);

        if record.len() != RAW_COLUMNS.len() {
            return Err(ServiceErr::MalformedDataset {
                line: Some(line_no),
                reason: format!("expected {} columns, got {}", RAW_COLUMNS.len(), record.len()),
            });
        }

        let mut raw = [0.0; 9];
        for ((slot, cell), column) in raw.iter_mut().zip(record.iter()).zip(RAW_COLUMNS) {
            *slot = parse_number(cell, line_no, column)?;
        }

        let [
            longitude,
            latitude,
            median_age,
            total_rooms,
            total_bedrooms,
            population,
            households,
            median_income,
            median_value,
        ] = raw;

        if households <= 0.0 {
            return Err(ServiceErr::MalformedDataset {
                line: Some(line_no),
                reason: "households must be positive".into(),
            });
        }

        rows.extend([
            median_income,
            median_age,
            total_rooms / households,
            total_bedrooms / households,
            population,
            population / households,
            latitude,
            longitude,
        ]);
        targets.push(median_value / 100_000.0);
    }

    Ok(Dataset::from_rows(rows, targets, FEATURE_NAMES)?)
}

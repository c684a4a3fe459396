use std::{
    collections::BTreeMap,
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const FILE_URL_SCHEME: &str = "file://";

/// Contents of an analysis description file
///
/// ```yaml
/// datasets:
///   global_file_prefix: root://cms-xrd-global.cern.ch/
///   cache_location: file:///scratch/cache
///   use_cache: false
///   workdirectory: data
///   simulation:
///     dy:
///       - name: /DYJetsToLL/RunIIFall17/NANOAODSIM
///   data:
///     SingleMuon:
///       - name: /SingleMuon/Run2017B/NANOAOD
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct AnalysisConfig {
    pub datasets: DatasetsConfig,
}

/// The `datasets` section of an analysis description
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct DatasetsConfig {
    /// Prefix turning a logical file name into a remotely readable location
    pub global_file_prefix: String,
    /// Location of the local file cache
    pub cache_location: String,
    /// Whether jobs should read from the local cache
    #[serde(default)]
    pub use_cache: bool,
    /// Directory for catalog caches, job descriptors and job outputs
    #[serde(default = "default_workdirectory")]
    pub workdirectory: PathBuf,
    /// Simulated datasets grouped by process
    #[serde(default)]
    pub simulation: BTreeMap<String, Vec<DatasetEntry>>,
    /// Recorded datasets grouped by process
    #[serde(default)]
    pub data: BTreeMap<String, Vec<DatasetEntry>>,
}

/// A single dataset in the analysis description
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct DatasetEntry {
    /// Catalog name, e.g. `/SingleMuon/Run2017B/NANOAOD`
    pub name: String,
    /// Explicit list of logical file names
    ///
    /// If non-empty, this is used instead of the cached catalog query.
    #[serde(default)]
    pub files: Vec<String>,
}

fn default_workdirectory() -> PathBuf {
    PathBuf::from("data")
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to open {0:?}: {1}")]
    Open(PathBuf, std::io::Error),
    #[error("Failed to parse analysis description {0:?}: {1}")]
    Parse(PathBuf, serde_yaml::Error),
}

impl AnalysisConfig {
    /// Read the analysis description from a YAML file
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        debug!("Reading analysis description from {path:?}");
        let file =
            File::open(path).map_err(|err| ConfigError::Open(path.to_owned(), err))?;
        serde_yaml::from_reader(BufReader::new(file))
            .map_err(|err| ConfigError::Parse(path.to_owned(), err))
    }
}

/// Turn a cache location into a `file://` URL
///
/// Locations that already are `file://` URLs are left alone, everything
/// else is taken relative to `cwd`.
pub fn sanitize_cache_location(location: &str, cwd: &Path) -> String {
    if location.starts_with(FILE_URL_SCHEME) {
        location.to_owned()
    } else {
        format!("{FILE_URL_SCHEME}{}/{location}", cwd.display())
    }
}

use std::path::Path;

use crate::report::FileReport;

/// Progress indicator
pub trait Progress {
    fn inc(&self, i: u64);
    fn finish(&self);
}

/// Source of the logical file names belonging to a dataset
pub trait Catalog {
    type Error;

    /// Query the logical file names (LFNs) of the dataset with the given name
    fn query_files(&self, dataset: &str) -> Result<Vec<String>, Self::Error>;
}

/// Copy a single file between two storage locations
pub trait Transfer {
    type Error;

    fn copy(
        &self,
        source: &str,
        destination: &str,
        options: &crate::transfer::CopyOptions,
    ) -> Result<(), Self::Error>;
}

/// Process one job
///
/// `job` is the job descriptor, `report` the location where the
/// per-file reports should be written.
pub trait Looper {
    type Error;

    fn run(&self, job: &Path, report: &Path) -> Result<Vec<FileReport>, Self::Error>;
}

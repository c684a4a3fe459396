use std::{
    fmt::{self, Display},
    fs::{self, File},
    io::{BufRead, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use log::{debug, info, warn};
use thiserror::Error;
use typed_builder::TypedBuilder;

use crate::{
    catalog::is_root_file,
    job::{job_file_name, job_index, output_file_name, report_path, Job, JobError, JobOptions},
    traits::{Catalog, Transfer},
    transfer::{copy_files, CopyOptions, CopySummary},
};

const CATALOG_CACHE_DIR: &str = "das_cache";
const JOB_DIR: &str = "jobs";

/// A dataset registered in the catalog
///
/// All locations derived from a dataset (catalog cache, job
/// descriptors, job outputs) only depend on its name, process, and
/// working directory.
#[derive(Clone, Debug, PartialEq, Eq, Hash, TypedBuilder)]
pub struct Dataset {
    /// Catalog name, e.g. `/SingleMuon/Run2017B/NANOAOD`
    #[builder(setter(into))]
    name: String,
    /// Nickname of the physics process this dataset belongs to
    #[builder(setter(into))]
    process: String,
    /// Prefix turning a logical file name into a remotely readable location
    #[builder(setter(into))]
    global_file_prefix: String,
    /// Prefix of the local file cache
    #[builder(setter(into))]
    cache_location: String,
    /// Whether jobs should read from the local cache
    #[builder(default)]
    use_cache: bool,
    #[builder(default = PathBuf::from("data"), setter(into))]
    workdir: PathBuf,
    /// Logical file names given explicitly instead of through the catalog
    #[builder(default)]
    files: Vec<String>,
}

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("I/O error for {0:?}: {1}")]
    Io(PathBuf, std::io::Error),
    #[error("No cached file list for {dataset} at {path:?}, query the catalog first")]
    NotCached { dataset: String, path: PathBuf },
    #[error("Job files for {dataset} not created in {dir:?}, create them first")]
    NoJobFiles { dataset: String, dir: PathBuf },
    #[error("Number of files per job has to be positive")]
    ZeroFilesPerJob,
    #[error("{0}")]
    Job(#[from] JobError),
}

#[derive(Debug, Error)]
pub enum CacheError<E> {
    #[error("Catalog query for {0} failed: {1}")]
    Query(String, E),
    #[error("Failed to write file list to {0:?}: {1}")]
    Write(PathBuf, std::io::Error),
}

impl Dataset {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn process(&self) -> &str {
        &self.process
    }

    pub fn global_file_prefix(&self) -> &str {
        &self.global_file_prefix
    }

    pub fn cache_location(&self) -> &str {
        &self.cache_location
    }

    pub fn use_cache(&self) -> bool {
        self.use_cache
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// The dataset name in a form that can be used as a file name
    ///
    /// Slashes are replaced by `__`, and a leading `__` is dropped.
    pub fn escape_name(&self) -> String {
        let name = self.name.replace('/', "__");
        match name.strip_prefix("__") {
            Some(stripped) => stripped.to_owned(),
            None => name,
        }
    }

    /// Where the file list returned by the catalog is stored
    pub fn catalog_cache_path(&self) -> PathBuf {
        let mut path = self.workdir.join(CATALOG_CACHE_DIR);
        path.push(&self.process);
        path.push(self.escape_name() + ".txt");
        path
    }

    /// Directory holding the job descriptors and job outputs
    pub fn job_dir(&self) -> PathBuf {
        let mut path = self.workdir.join(JOB_DIR);
        path.push(&self.process);
        path.push(self.escape_name());
        path
    }

    /// Location of the descriptor of the job with index `n`
    pub fn job_path(&self, n: usize) -> PathBuf {
        self.job_dir().join(job_file_name(n))
    }

    /// Turn a logical file name into the location read by jobs
    pub fn lfn_to_pfn(&self, lfn: &str) -> String {
        let prefix = if self.use_cache {
            &self.cache_location
        } else {
            &self.global_file_prefix
        };
        format!("{prefix}{lfn}")
    }

    /// Query the catalog and store the list of files
    ///
    /// Returns the number of files.
    pub fn cache_catalog<C: Catalog>(&self, catalog: &C) -> Result<usize, CacheError<C::Error>> {
        info!("Caching file list of {}", self.name);
        let files: Vec<_> = catalog
            .query_files(&self.name)
            .map_err(|err| CacheError::Query(self.name.clone(), err))?
            .into_iter()
            .map(|file| file.trim().to_owned())
            .filter(|file| is_root_file(file))
            .collect();
        let path = self.catalog_cache_path();
        write_lines(&path, &files).map_err(|err| CacheError::Write(path, err))?;
        info!("Retrieved {} files from the catalog", files.len());
        Ok(files.len())
    }

    /// The logical file names of this dataset
    ///
    /// These are the explicitly configured files if there are any, and
    /// otherwise the cached catalog query.
    pub fn files(&self) -> Result<Vec<String>, DatasetError> {
        if !self.files.is_empty() {
            return Ok(self.files.clone());
        }
        let path = self.catalog_cache_path();
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(DatasetError::NotCached {
                    dataset: self.name.clone(),
                    path,
                })
            }
            Err(err) => return Err(DatasetError::Io(path, err)),
        };
        let mut files = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|err| DatasetError::Io(path.clone(), err))?;
            let line = line.trim();
            if !line.is_empty() {
                files.push(line.to_owned());
            }
        }
        Ok(files)
    }

    /// Copy all files from remote storage to the local cache
    pub fn stage_files<T>(
        &self,
        transfer: &T,
        options: &CopyOptions,
    ) -> Result<CopySummary, DatasetError>
    where
        T: Transfer,
        T::Error: Display,
    {
        info!(
            "Copying files of {} from {} to {}",
            self.name, self.global_file_prefix, self.cache_location
        );
        let files = self.files()?;
        debug!("{} has {} files", self.name, files.len());
        let pairs: Vec<_> = files
            .iter()
            .map(|lfn| {
                (
                    format!("{}{lfn}", self.global_file_prefix),
                    format!("{}{lfn}", self.cache_location),
                )
            })
            .collect();
        Ok(copy_files(transfer, pairs, options))
    }

    /// Split the dataset into jobs and write their descriptors
    ///
    /// Descriptors left over from earlier calls are removed first.
    /// Returns the number of jobs.
    pub fn create_jobfiles(&self, options: &JobOptions) -> Result<usize, DatasetError> {
        if options.files_per_job == 0 {
            return Err(DatasetError::ZeroFilesPerJob);
        }
        info!("Creating job files for {self}");
        let files: Vec<_> = self.files()?.iter().map(|lfn| self.lfn_to_pfn(lfn)).collect();
        if files.is_empty() {
            warn!("{} has no files", self.name);
        }

        let dir = self.job_dir();
        if dir.exists() {
            let nremoved = self.remove_jobfiles()?;
            if nremoved > 0 {
                debug!("Removed {nremoved} old job files from {dir:?}");
            }
        }
        fs::create_dir_all(&dir).map_err(|err| DatasetError::Io(dir.clone(), err))?;

        let mut njobs = 0;
        for (n, chunk) in files.chunks(options.files_per_job).enumerate() {
            let output_filename = match &options.output_filename {
                Some(name) => name.clone(),
                None => dir.join(output_file_name(n)).to_string_lossy().into_owned(),
            };
            let job = Job {
                input_filenames: chunk.to_vec(),
                output_filename,
                max_events: options.max_events,
                report_period: options.report_period,
            };
            job.write_to(self.job_path(n))?;
            njobs += 1;
        }
        info!("{njobs} job files created in {dir:?}");
        Ok(njobs)
    }

    /// The existing job descriptors, ordered by job index
    pub fn jobfiles(&self) -> Result<Vec<PathBuf>, DatasetError> {
        let dir = self.job_dir();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(DatasetError::NoJobFiles {
                    dataset: self.name.clone(),
                    dir,
                })
            }
            Err(err) => return Err(DatasetError::Io(dir, err)),
        };
        let mut jobs = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|err| DatasetError::Io(dir.clone(), err))?
                .path();
            if let Some(n) = job_index(&path) {
                jobs.push((n, path));
            }
        }
        jobs.sort_unstable();
        Ok(jobs.into_iter().map(|(_, path)| path).collect())
    }

    /// Delete the job descriptors and their reports
    ///
    /// Returns the number of deleted descriptors.
    pub fn remove_jobfiles(&self) -> Result<usize, DatasetError> {
        let jobs = self.jobfiles()?;
        for job in &jobs {
            debug!("Removing {job:?}");
            fs::remove_file(job).map_err(|err| DatasetError::Io(job.clone(), err))?;
            let report = report_path(job);
            match fs::remove_file(&report) {
                Err(err) if err.kind() != std::io::ErrorKind::NotFound => {
                    return Err(DatasetError::Io(report, err))
                }
                _ => {}
            }
        }
        Ok(jobs.len())
    }
}

impl Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Dataset(name={})", self.name)
    }
}

fn write_lines(path: &Path, lines: &[String]) -> Result<(), std::io::Error> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let mut out = BufWriter::new(File::create(path)?);
    for line in lines {
        writeln!(out, "{line}")?;
    }
    out.flush()
}

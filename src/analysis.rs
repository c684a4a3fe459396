use std::{
    collections::BTreeMap,
    fmt::{self, Display},
    path::Path,
};

use log::info;
use thiserror::Error;

use crate::{
    config::{sanitize_cache_location, AnalysisConfig, ConfigError, DatasetEntry, DatasetsConfig},
    dataset::{CacheError, Dataset, DatasetError},
    dispatch::{run_jobs, DispatchError, RunSummary},
    job::{report_path, JobOptions},
    traits::{Catalog, Looper, Transfer},
    transfer::{CopyOptions, CopySummary},
};

/// All simulated and recorded datasets of an analysis
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Analysis {
    mc_datasets: Vec<Dataset>,
    data_datasets: Vec<Dataset>,
}

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("{0}")]
    Config(#[from] ConfigError),
    #[error("Unknown dataset or process: {0}")]
    UnknownDataset(String),
    #[error("{0}")]
    Dataset(#[from] DatasetError),
    #[error("{0}")]
    Dispatch(#[from] DispatchError),
}

impl Analysis {
    pub fn new(mc_datasets: Vec<Dataset>, data_datasets: Vec<Dataset>) -> Self {
        Self {
            mc_datasets,
            data_datasets,
        }
    }

    /// Load an analysis description
    ///
    /// A relative cache location is taken relative to `cwd`.
    pub fn from_yaml<P: AsRef<Path>>(path: P, cwd: &Path) -> Result<Self, AnalysisError> {
        info!("Loading analysis from {:?}", path.as_ref());
        let config = AnalysisConfig::from_path(path)?;
        Ok(Self::from_config(config, cwd))
    }

    pub fn from_config(config: AnalysisConfig, cwd: &Path) -> Self {
        let DatasetsConfig {
            global_file_prefix,
            cache_location,
            use_cache,
            workdirectory,
            simulation,
            data,
        } = config.datasets;
        let cache_location = sanitize_cache_location(&cache_location, cwd);
        let to_datasets = |groups: BTreeMap<String, Vec<DatasetEntry>>| {
            let mut datasets = Vec::new();
            for (process, entries) in groups {
                for DatasetEntry { name, files } in entries {
                    let dataset = Dataset::builder()
                        .name(name)
                        .process(process.clone())
                        .global_file_prefix(global_file_prefix.clone())
                        .cache_location(cache_location.clone())
                        .use_cache(use_cache)
                        .workdir(workdirectory.clone())
                        .files(files)
                        .build();
                    datasets.push(dataset);
                }
            }
            datasets
        };
        Self::new(to_datasets(simulation), to_datasets(data))
    }

    pub fn mc_datasets(&self) -> &[Dataset] {
        &self.mc_datasets
    }

    pub fn data_datasets(&self) -> &[Dataset] {
        &self.data_datasets
    }

    /// All datasets, simulation first
    pub fn datasets(&self) -> impl Iterator<Item = &Dataset> {
        self.mc_datasets.iter().chain(&self.data_datasets)
    }

    /// Datasets matching the given names
    ///
    /// A name matches a dataset if it is either the catalog name or
    /// the process name. Without any names, all datasets are selected.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<&Dataset>, AnalysisError> {
        if names.is_empty() {
            return Ok(self.datasets().collect());
        }
        for name in names {
            let name = name.as_ref();
            if !self.datasets().any(|ds| matches_name(ds, name)) {
                return Err(AnalysisError::UnknownDataset(name.to_owned()));
            }
        }
        Ok(self
            .datasets()
            .filter(|ds| names.iter().any(|n| matches_name(ds, n.as_ref())))
            .collect())
    }

    /// Query the catalog for each dataset and cache the file lists
    pub fn cache_catalog<C: Catalog>(
        &self,
        datasets: &[&Dataset],
        catalog: &C,
    ) -> Result<usize, CacheError<C::Error>> {
        let mut nfiles = 0;
        for ds in datasets {
            nfiles += ds.cache_catalog(catalog)?;
        }
        Ok(nfiles)
    }

    /// Copy the files of each dataset into the local cache
    pub fn stage_files<T>(
        &self,
        datasets: &[&Dataset],
        transfer: &T,
        options: &CopyOptions,
    ) -> Result<CopySummary, AnalysisError>
    where
        T: Transfer,
        T::Error: Display,
    {
        let mut summary = CopySummary::default();
        for ds in datasets {
            let CopySummary { succeeded, failed } = ds.stage_files(transfer, options)?;
            summary.succeeded += succeeded;
            summary.failed.extend(failed);
        }
        Ok(summary)
    }

    /// Write job descriptors for each dataset
    ///
    /// Returns the total number of jobs.
    pub fn create_jobfiles(
        &self,
        datasets: &[&Dataset],
        options: &JobOptions,
    ) -> Result<usize, AnalysisError> {
        info!("Creating job files for {} datasets", datasets.len());
        let mut njobs = 0;
        for ds in datasets {
            njobs += ds.create_jobfiles(options)?;
        }
        Ok(njobs)
    }

    /// Delete the job descriptors of each dataset
    ///
    /// Datasets without job files are skipped.
    pub fn remove_jobfiles(&self, datasets: &[&Dataset]) -> Result<usize, AnalysisError> {
        let mut nremoved = 0;
        for ds in datasets {
            match ds.remove_jobfiles() {
                Ok(n) => nremoved += n,
                Err(DatasetError::NoJobFiles { .. }) => {}
                Err(err) => return Err(err.into()),
            }
        }
        info!("Removed {nremoved} job files");
        Ok(nremoved)
    }

    /// Run all jobs of the given datasets
    ///
    /// The report of each job is written next to its descriptor.
    pub fn run_jobs<L>(
        &self,
        datasets: &[&Dataset],
        looper: &L,
        num_procs: usize,
    ) -> Result<RunSummary, AnalysisError>
    where
        L: Looper + Sync,
        L::Error: Display,
    {
        let mut jobs = Vec::new();
        for ds in datasets {
            for job in ds.jobfiles()? {
                let report = report_path(&job);
                jobs.push((job, report));
            }
        }
        Ok(run_jobs(looper, jobs, num_procs)?)
    }
}

fn matches_name(ds: &Dataset, name: &str) -> bool {
    ds.name() == name || ds.process() == name
}

impl Display for Analysis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Analysis({} MC datasets, {} real data datasets)",
            self.mc_datasets.len(),
            self.data_datasets.len()
        )
    }
}

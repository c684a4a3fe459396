use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use nanoflow::{
    catalog::DASGOCLIENT,
    job::{JobOptions, ALL_EVENTS, DEFAULT_REPORT_PERIOD},
    looper::DEFAULT_LOOPER,
    transfer::{CopyOptions, GFAL_COPY},
};
use strum::Display;

pub(crate) fn parse_perjob(s: &str) -> Result<usize, String> {
    use std::str::FromStr;

    match usize::from_str(s) {
        Ok(0) => Err("has to be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(err) => Err(err.to_string()),
    }
}

/// How files are staged into the local cache
#[derive(Copy, Clone, Debug, Default, Display, Eq, PartialEq, ValueEnum)]
#[strum(serialize_all = "lowercase")]
pub(crate) enum CopyTool {
    /// The `gfal-copy` grid transfer tool
    #[default]
    Gfal,
    /// Plain copy between local files
    Local,
}

#[derive(Debug, Clone, Parser)]
pub(crate) struct JobOpt {
    /// Number of input files per job.
    #[clap(long, default_value = "1", value_parser = parse_perjob)]
    pub(crate) perjob: usize,

    /// Maximum number of events per input file. Negative means all events.
    #[clap(long, default_value_t = ALL_EVENTS, allow_negative_numbers = true)]
    pub(crate) max_events: i64,

    /// Number of events between looper progress messages.
    #[clap(long, default_value_t = DEFAULT_REPORT_PERIOD)]
    pub(crate) report_period: u64,

    /// Common output file name for all jobs.
    ///
    /// By default, each job writes to `out_N.root` in its job directory.
    #[clap(long)]
    pub(crate) output_filename: Option<String>,
}

impl From<JobOpt> for JobOptions {
    fn from(opt: JobOpt) -> Self {
        JobOptions {
            files_per_job: opt.perjob,
            max_events: opt.max_events,
            report_period: opt.report_period,
            output_filename: opt.output_filename,
        }
    }
}

#[derive(Debug, Copy, Clone, Parser)]
pub(crate) struct CopyOpt {
    /// Program used to copy files into the local cache.
    #[clap(value_enum, long, default_value_t)]
    pub(crate) copy_tool: CopyTool,

    /// Replace files already present in the local cache.
    #[clap(long)]
    pub(crate) overwrite: bool,

    /// Verify checksums after copying.
    #[clap(long)]
    pub(crate) validate: bool,
}

impl From<CopyOpt> for CopyOptions {
    fn from(opt: CopyOpt) -> Self {
        CopyOptions {
            overwrite: opt.overwrite,
            validate: opt.validate,
        }
    }
}

#[derive(Debug, Parser)]
#[clap(about, author, version)]
pub(crate) struct Opt {
    /// The analysis description file.
    #[clap(short, long, default_value = "./data/analysis.yaml", value_parser)]
    pub(crate) analysis: PathBuf,

    /// Datasets to process, by catalog name or process name.
    ///
    /// Can be given multiple times. By default, all datasets are processed.
    #[clap(short, long = "datasets")]
    pub(crate) datasets: Vec<String>,

    /// Cache the file lists of the datasets from the catalog.
    #[clap(long)]
    pub(crate) cache_das: bool,

    /// Catalog client executable.
    #[clap(long, default_value = DASGOCLIENT, value_parser)]
    pub(crate) das_client: PathBuf,

    /// Copy the dataset files from remote storage to the local cache.
    #[clap(long)]
    pub(crate) copy_files: bool,

    #[clap(flatten)]
    pub(crate) copy: CopyOpt,

    /// Grid copy executable used with `--copy-tool gfal`.
    #[clap(long, default_value = GFAL_COPY, value_parser)]
    pub(crate) gfal_copy: PathBuf,

    /// Remove existing job files.
    #[clap(long)]
    pub(crate) remove_jobfiles: bool,

    /// Create the job files for the looper.
    #[clap(long)]
    pub(crate) create_jobfiles: bool,

    #[clap(flatten)]
    pub(crate) job: JobOpt,

    /// Run the looper on all job files.
    #[clap(long)]
    pub(crate) run_jobs: bool,

    /// Looper executable.
    #[clap(long, default_value = DEFAULT_LOOPER, value_parser)]
    pub(crate) looper: PathBuf,

    #[clap(
        short = 'j',
        long = "jobs",
        default_value_t,
        help = "Number of jobs to run in parallel.

If set to 0, a default number is chosen.
The default can be set with the `RAYON_NUM_THREADS` environment
variable."
    )]
    pub(crate) num_procs: usize,

    /// Write all looper reports to this file.
    #[clap(short = 'o', long, value_parser)]
    pub(crate) report: Option<PathBuf>,

    /// Verbosity level
    #[clap(
        short,
        long,
        default_value = "Info",
        help = "Verbosity level.
Possible values with increasing amount of output are
'off', 'error', 'warn', 'info', 'debug', 'trace'.\n"
    )]
    pub(crate) loglevel: String,
}

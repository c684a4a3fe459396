use std::{
    ffi::OsString,
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use typed_builder::TypedBuilder;

/// Process all events in the input files
pub const ALL_EVENTS: i64 = -1;
/// Default number of events between progress messages of the looper
pub const DEFAULT_REPORT_PERIOD: u64 = 10_000;

const REPORT_SUFFIX: &str = ".out";

lazy_static! {
    static ref JOB_FILE_RE: Regex = Regex::new(r"^job_(?P<n>\d+)\.json$").unwrap();
}

/// Descriptor of a single looper job
///
/// This is the JSON document read by the looper executable.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Job {
    /// Physical locations of the input files
    pub input_filenames: Vec<String>,
    /// Where the looper writes its output
    pub output_filename: String,
    /// Maximum number of events per input file, negative means all
    pub max_events: i64,
    /// Number of events between progress messages
    pub report_period: u64,
}

/// How to split a dataset into jobs
#[derive(Clone, Debug, PartialEq, Eq, TypedBuilder)]
pub struct JobOptions {
    /// Number of input files per job, at least 1
    #[builder(default = 1)]
    pub files_per_job: usize,
    #[builder(default = ALL_EVENTS)]
    pub max_events: i64,
    #[builder(default = DEFAULT_REPORT_PERIOD)]
    pub report_period: u64,
    /// Fixed output file name for every job
    ///
    /// By default, each job writes to `out_N.root` next to its descriptor.
    #[builder(default, setter(strip_option, into))]
    pub output_filename: Option<String>,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[derive(Debug, Error)]
pub enum JobError {
    #[error("Failed to access job file {0:?}: {1}")]
    Io(PathBuf, std::io::Error),
    #[error("Failed to (de)serialise job file {0:?}: {1}")]
    Json(PathBuf, serde_json::Error),
}

impl Job {
    /// Read a job descriptor
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, JobError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|err| JobError::Io(path.to_owned(), err))?;
        serde_json::from_reader(BufReader::new(file))
            .map_err(|err| JobError::Json(path.to_owned(), err))
    }

    /// Write the job descriptor as pretty-printed JSON
    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> Result<(), JobError> {
        let path = path.as_ref();
        let io_err = |err| JobError::Io(path.to_owned(), err);
        let mut out = BufWriter::new(File::create(path).map_err(io_err)?);
        serde_json::to_writer_pretty(&mut out, self)
            .map_err(|err| JobError::Json(path.to_owned(), err))?;
        out.flush().map_err(io_err)
    }
}

/// Name of the job descriptor file with the given index
pub fn job_file_name(n: usize) -> String {
    format!("job_{n}.json")
}

/// Name of the default output file of the job with the given index
pub fn output_file_name(n: usize) -> String {
    format!("out_{n}.root")
}

/// Index of a job descriptor file, if `path` is one
pub fn job_index(path: &Path) -> Option<usize> {
    let name = path.file_name()?.to_str()?;
    JOB_FILE_RE.captures(name)?["n"].parse().ok()
}

/// Where the looper writes the report for the given job
pub fn report_path(job: &Path) -> PathBuf {
    let mut path = OsString::from(job.as_os_str());
    path.push(REPORT_SUFFIX);
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_names() {
        assert_eq!(job_file_name(0), "job_0.json");
        assert_eq!(job_index(Path::new("a/b/job_17.json")), Some(17));
        assert_eq!(job_index(Path::new(&job_file_name(3))), Some(3));
        assert_eq!(job_index(Path::new("job_17.json.out")), None);
        assert_eq!(job_index(Path::new("job_.json")), None);
        assert_eq!(job_index(Path::new("myjob_1.json")), None);
    }

    #[test]
    fn options() {
        let options = JobOptions::default();
        assert_eq!(options.files_per_job, 1);
        assert_eq!(options.max_events, ALL_EVENTS);
        assert_eq!(options.report_period, DEFAULT_REPORT_PERIOD);
        assert_eq!(options.output_filename, None);

        let options = JobOptions::builder()
            .files_per_job(5)
            .output_filename("out.root")
            .build();
        assert_eq!(options.files_per_job, 5);
        assert_eq!(options.output_filename.as_deref(), Some("out.root"));
    }

    #[test]
    fn report_location() {
        assert_eq!(
            report_path(Path::new("data/jobs/dy/job_2.json")),
            PathBuf::from("data/jobs/dy/job_2.json.out")
        );
    }

    #[test]
    fn json_layout() {
        let job = Job {
            input_filenames: vec!["root://host//store/a.root".to_owned()],
            output_filename: "out_0.root".to_owned(),
            max_events: ALL_EVENTS,
            report_period: DEFAULT_REPORT_PERIOD,
        };
        let json: serde_json::Value = serde_json::to_value(&job).unwrap();
        assert_eq!(json["input_filenames"][0], "root://host//store/a.root");
        assert_eq!(json["output_filename"], "out_0.root");
        assert_eq!(json["max_events"], -1);
        assert_eq!(json["report_period"], 10000);
    }

    #[test]
    fn write_and_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(job_file_name(0));
        let job = Job {
            input_filenames: vec!["a.root".to_owned(), "b.root".to_owned()],
            output_filename: "out.root".to_owned(),
            max_events: 100,
            report_period: 10,
        };
        job.write_to(&path).unwrap();
        assert_eq!(Job::from_path(&path).unwrap(), job);

        let missing = Job::from_path(dir.path().join("job_1.json"));
        assert!(matches!(missing, Err(JobError::Io(..))));
    }
}

use std::{
    path::{Path, PathBuf},
    process::Command,
};

use derive_builder::Builder;
use log::{debug, log_enabled, trace, Level};
use thiserror::Error;

use crate::report::{read_reports, FileReport, ReportError};
use crate::traits::Looper;

/// Default location of the looper executable
pub const DEFAULT_LOOPER: &str = "./looper";

/// An external looper executable
///
/// The executable is called as `program JOB REPORT` and is expected to
/// write a JSON list of [FileReport]s to `REPORT`.
#[derive(Builder, Clone, Debug, PartialEq, Eq)]
pub struct Executable {
    #[builder(default = "PathBuf::from(DEFAULT_LOOPER)", setter(into))]
    program: PathBuf,
    /// Working directory of the looper, defaults to the current one
    #[builder(default, setter(into, strip_option))]
    working_dir: Option<PathBuf>,
    /// Additional environment variables
    #[builder(default)]
    env: Vec<(String, String)>,
}

impl Default for Executable {
    fn default() -> Self {
        Self {
            program: PathBuf::from(DEFAULT_LOOPER),
            working_dir: None,
            env: Vec::new(),
        }
    }
}

impl Executable {
    pub fn program(&self) -> &Path {
        &self.program
    }
}

#[derive(Debug, Error)]
pub enum LooperError {
    #[error("Failed to start looper {0:?}: {1}")]
    Spawn(PathBuf, std::io::Error),
    #[error("Looper failed on {job:?} ({status}): {stderr}")]
    Failed {
        job: PathBuf,
        status: std::process::ExitStatus,
        stderr: String,
    },
    #[error("Failed to remove old report {0:?}: {1}")]
    StaleReport(PathBuf, std::io::Error),
    #[error("Failed to read looper report: {0}")]
    Report(#[from] ReportError),
}

impl Looper for Executable {
    type Error = LooperError;

    fn run(&self, job: &Path, report: &Path) -> Result<Vec<FileReport>, Self::Error> {
        debug!("Running {:?} {job:?} {report:?}", self.program);
        match std::fs::remove_file(report) {
            Err(err) if err.kind() != std::io::ErrorKind::NotFound => {
                return Err(LooperError::StaleReport(report.to_owned(), err))
            }
            _ => {}
        }
        let mut cmd = Command::new(&self.program);
        cmd.arg(job).arg(report).envs(self.env.iter().map(|(k, v)| (k, v)));
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        let output = cmd
            .output()
            .map_err(|err| LooperError::Spawn(self.program.clone(), err))?;
        if log_enabled!(Level::Trace) {
            for line in String::from_utf8_lossy(&output.stdout).lines() {
                trace!("[{}] {line}", job.display());
            }
        }
        if !output.status.success() {
            return Err(LooperError::Failed {
                job: job.to_owned(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }
        Ok(read_reports(report)?)
    }
}

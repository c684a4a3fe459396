use std::{fmt::Display, path::PathBuf};

use log::{debug, error, info};
use rayon::prelude::*;
use thiserror::Error;

use crate::progress_bar::{Progress, ProgressBar};
use crate::report::FileReport;
use crate::traits::Looper;

/// Reports of a successful job
#[derive(Clone, Debug, Default, PartialEq)]
pub struct JobReport {
    pub job: PathBuf,
    pub report: PathBuf,
    pub files: Vec<FileReport>,
}

/// A job that didn't produce a report
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct JobFailure {
    pub job: PathBuf,
    pub error: String,
}

/// Outcome of running a batch of jobs
///
/// Both lists keep the order in which the jobs were submitted.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunSummary {
    pub completed: Vec<JobReport>,
    pub failed: Vec<JobFailure>,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// All file reports of all successful jobs
    pub fn file_reports(&self) -> Vec<FileReport> {
        self.completed
            .iter()
            .flat_map(|job| job.files.iter().cloned())
            .collect()
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Failed to set up worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Run each `(job, report)` pair with the given looper
///
/// Jobs are distributed over `num_procs` worker threads, each of which
/// waits on one looper process at a time. If `num_procs` is 0, rayon
/// picks the number of workers. A failing job doesn't stop the others.
pub fn run_jobs<L>(
    looper: &L,
    jobs: Vec<(PathBuf, PathBuf)>,
    num_procs: usize,
) -> Result<RunSummary, DispatchError>
where
    L: Looper + Sync,
    L::Error: Display,
{
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(num_procs)
        .thread_name(|n| format!("looper-{n}"))
        .build()?;
    info!(
        "Running {} jobs on {} workers",
        jobs.len(),
        pool.current_num_threads()
    );

    let progress = ProgressBar::new(jobs.len() as u64, "jobs done:");
    let results: Vec<_> = pool.install(|| {
        jobs.into_par_iter()
            .map(|(job, report)| {
                let res = looper.run(&job, &report).map_err(|err| err.to_string());
                progress.inc(1);
                (job, report, res)
            })
            .collect()
    });
    progress.finish();

    let mut summary = RunSummary::default();
    for (job, report, res) in results {
        match res {
            Ok(files) => {
                debug!("{job:?}: {} file reports", files.len());
                summary.completed.push(JobReport { job, report, files })
            }
            Err(error) => {
                error!("{job:?} failed: {error}");
                summary.failed.push(JobFailure { job, error })
            }
        }
    }
    info!(
        "{} jobs completed, {} failed",
        summary.completed.len(),
        summary.failed.len()
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    /// Looper that derives its report from the job name
    struct NameLooper {}

    impl Looper for NameLooper {
        type Error = String;

        fn run(&self, job: &Path, _report: &Path) -> Result<Vec<FileReport>, String> {
            let name = job.to_string_lossy().into_owned();
            if name.contains("bad") {
                return Err(format!("cannot process {name}"));
            }
            Ok(vec![FileReport {
                filename: name,
                num_events_processed: 1,
                ..Default::default()
            }])
        }
    }

    fn jobs(names: &[&str]) -> Vec<(PathBuf, PathBuf)> {
        names
            .iter()
            .map(|n| (PathBuf::from(n), PathBuf::from(format!("{n}.out"))))
            .collect()
    }

    #[test]
    fn all_succeed() {
        let names: Vec<_> = (0..20).map(|n| format!("job_{n}.json")).collect();
        let names: Vec<_> = names.iter().map(String::as_str).collect();
        let summary = run_jobs(&NameLooper {}, jobs(&names), 4).unwrap();
        assert!(summary.is_success());
        assert_eq!(summary.completed.len(), 20);
        // submission order is kept
        for (job, name) in summary.completed.iter().zip(&names) {
            assert_eq!(job.job, PathBuf::from(name));
            assert_eq!(job.report, PathBuf::from(format!("{name}.out")));
        }
        let reports = summary.file_reports();
        assert_eq!(reports.len(), 20);
        assert_eq!(reports[3].filename, "job_3.json");
    }

    #[test]
    fn failures_are_collected() {
        let summary = run_jobs(
            &NameLooper {},
            jobs(&["job_0.json", "bad/job_1.json", "job_2.json"]),
            0,
        )
        .unwrap();
        assert!(!summary.is_success());
        assert_eq!(summary.completed.len(), 2);
        assert_eq!(
            summary.failed,
            [JobFailure {
                job: PathBuf::from("bad/job_1.json"),
                error: "cannot process bad/job_1.json".to_owned()
            }]
        );
    }

    #[test]
    fn no_jobs() {
        let summary = run_jobs(&NameLooper {}, Vec::new(), 2).unwrap();
        assert_eq!(summary, RunSummary::default());
        assert!(summary.file_reports().is_empty());
    }
}

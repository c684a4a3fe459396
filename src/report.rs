use std::{
    collections::BTreeMap,
    fmt::{self, Display},
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Name under which the construction of the event representation is reported
pub const EVENT_CONSTRUCTION: &str = "NanoEvent";

/// Report of the looper after processing one input file
///
/// All durations are in nanoseconds, `cpu_time` and `real_time` in
/// seconds.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct FileReport {
    pub filename: String,
    pub num_events_processed: u64,
    pub cpu_time: f64,
    pub real_time: f64,
    pub speed: f64,
    /// Total time spent constructing the event representation
    pub event_duration: u64,
    /// Total time spent in each analyzer
    pub analyzer_durations: Vec<u64>,
    pub analyzer_names: Vec<String>,
}

impl FileReport {
    /// Ratio of CPU time to wall-clock time
    pub fn cpu_efficiency(&self) -> Option<f64> {
        if self.real_time > 0. {
            Some(self.cpu_time / self.real_time)
        } else {
            None
        }
    }

    /// Share of each analyzer in the total processing time
    ///
    /// Event construction comes last, under the name [EVENT_CONSTRUCTION].
    pub fn runtime_fractions(&self) -> Vec<(&str, f64)> {
        let total = self.analyzer_durations.iter().sum::<u64>() + self.event_duration;
        let frac = |d: u64| if total > 0 { d as f64 / total as f64 } else { 0. };
        self.analyzer_names
            .iter()
            .map(String::as_str)
            .zip(self.analyzer_durations.iter().map(|d| frac(*d)))
            .chain(std::iter::once((EVENT_CONSTRUCTION, frac(self.event_duration))))
            .collect()
    }
}

impl Display for FileReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileReport eff=")?;
        match self.cpu_efficiency() {
            Some(eff) => write!(f, "{eff:.3},")?,
            None => write!(f, "n/a,")?,
        }
        let fractions = self.runtime_fractions();
        // event construction first, analyzers after
        if let Some((name, frac)) = fractions.last() {
            write!(f, "{name}={frac:.3},")?;
        }
        for (name, frac) in &fractions[..fractions.len() - 1] {
            write!(f, "{name}={frac:.3},")?;
        }
        Ok(())
    }
}

/// Aggregate over many file reports
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReportSummary {
    pub num_files: usize,
    pub num_events_processed: u64,
    pub cpu_time: f64,
    pub real_time: f64,
    pub event_duration: u64,
    /// Total time per analyzer, summed by name
    pub analyzer_durations: BTreeMap<String, u64>,
}

impl ReportSummary {
    pub fn from_reports<'a, I>(reports: I) -> Self
    where
        I: IntoIterator<Item = &'a FileReport>,
    {
        let mut summary = Self::default();
        for report in reports {
            summary.add(report);
        }
        summary
    }

    pub fn add(&mut self, report: &FileReport) {
        self.num_files += 1;
        self.num_events_processed += report.num_events_processed;
        self.cpu_time += report.cpu_time;
        self.real_time += report.real_time;
        self.event_duration += report.event_duration;
        for (name, duration) in report
            .analyzer_names
            .iter()
            .zip(&report.analyzer_durations)
        {
            *self.analyzer_durations.entry(name.clone()).or_default() += duration;
        }
    }

    /// Share of each analyzer in the total processing time
    ///
    /// Analyzers are sorted by name, event construction comes last.
    pub fn runtime_fractions(&self) -> Vec<(&str, f64)> {
        let total = self.analyzer_durations.values().sum::<u64>() + self.event_duration;
        let frac = |d: u64| if total > 0 { d as f64 / total as f64 } else { 0. };
        self.analyzer_durations
            .iter()
            .map(|(name, d)| (name.as_str(), frac(*d)))
            .chain(std::iter::once((EVENT_CONSTRUCTION, frac(self.event_duration))))
            .collect()
    }

    /// Processed events per second of wall-clock time
    pub fn speed(&self) -> Option<f64> {
        if self.real_time > 0. {
            Some(self.num_events_processed as f64 / self.real_time)
        } else {
            None
        }
    }
}

impl Display for ReportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} events in {} files, cpu {:.1}s, real {:.1}s",
            self.num_events_processed, self.num_files, self.cpu_time, self.real_time
        )?;
        if let Some(speed) = self.speed() {
            write!(f, ", {speed:.1} events/s")?;
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to access report {0:?}: {1}")]
    Io(PathBuf, std::io::Error),
    #[error("Failed to (de)serialise report {0:?}: {1}")]
    Json(PathBuf, serde_json::Error),
}

/// Read a list of file reports as written by the looper
pub fn read_reports<P: AsRef<Path>>(path: P) -> Result<Vec<FileReport>, ReportError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|err| ReportError::Io(path.to_owned(), err))?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|err| ReportError::Json(path.to_owned(), err))
}

/// Write a list of file reports as pretty-printed JSON
pub fn write_reports<P: AsRef<Path>>(
    path: P,
    reports: &[FileReport],
) -> Result<(), ReportError> {
    let path = path.as_ref();
    let io_err = |err| ReportError::Io(path.to_owned(), err);
    let mut out = BufWriter::new(File::create(path).map_err(io_err)?);
    serde_json::to_writer_pretty(&mut out, reports)
        .map_err(|err| ReportError::Json(path.to_owned(), err))?;
    out.flush().map_err(io_err)
}

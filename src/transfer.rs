use std::{
    ffi::OsStr,
    fs,
    path::{Path, PathBuf},
    process::Command,
};

use log::{debug, error, info};
use thiserror::Error;

use crate::progress_bar::{Progress, ProgressBar};
use crate::traits::Transfer;

/// Default name of the grid copy tool
pub const GFAL_COPY: &str = "gfal-copy";

const FILE_URL_SCHEME: &str = "file://";
const NUM_STREAMS: u32 = 5;
const CHECKSUM_ALGORITHM: &str = "ADLER32";

/// Settings for a file transfer
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct CopyOptions {
    /// Replace existing destination files
    pub overwrite: bool,
    /// Compare checksums of source and destination
    pub validate: bool,
}

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("Copy tool `{0}` not found: {1}")]
    NotFound(String, which::Error),
    #[error("Failed to run {0:?}: {1}")]
    Spawn(PathBuf, std::io::Error),
    #[error("{status}: {stderr}")]
    Failed {
        status: std::process::ExitStatus,
        stderr: String,
    },
    #[error("Failed to create directory {0:?}: {1}")]
    CreateDir(PathBuf, std::io::Error),
    #[error("Destination {0:?} exists")]
    Exists(PathBuf),
    #[error("Failed to copy {0:?} to {1:?}: {2}")]
    Copy(PathBuf, PathBuf, std::io::Error),
    #[error("Size mismatch between {0:?} and {1:?}")]
    SizeMismatch(PathBuf, PathBuf),
}

/// Transfers through the `gfal-copy` command-line tool
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GfalCopy {
    program: PathBuf,
}

impl GfalCopy {
    /// Look up `gfal-copy` in `PATH`
    pub fn new() -> Result<Self, TransferError> {
        Self::from_program(GFAL_COPY)
    }

    pub fn from_program<S: AsRef<OsStr>>(program: S) -> Result<Self, TransferError> {
        let program = program.as_ref();
        let program = which::which(program).map_err(|err| {
            TransferError::NotFound(program.to_string_lossy().into_owned(), err)
        })?;
        debug!("Using copy tool {program:?}");
        Ok(Self { program })
    }

    fn args(
        &self,
        source: &str,
        destination: &str,
        options: &CopyOptions,
    ) -> Vec<String> {
        let mut args = vec![
            "-p".to_owned(),
            "--nbstreams".to_owned(),
            NUM_STREAMS.to_string(),
        ];
        if options.overwrite {
            args.push("-f".to_owned());
        }
        if options.validate {
            args.push("-K".to_owned());
            args.push(CHECKSUM_ALGORITHM.to_owned());
        }
        args.push(source.to_owned());
        args.push(destination.to_owned());
        args
    }
}

impl Transfer for GfalCopy {
    type Error = TransferError;

    fn copy(
        &self,
        source: &str,
        destination: &str,
        options: &CopyOptions,
    ) -> Result<(), Self::Error> {
        ensure_target_dir(destination)?;
        let args = self.args(source, destination, options);
        debug!("Running {:?} {}", self.program, args.join(" "));
        let output = Command::new(&self.program)
            .args(&args)
            .output()
            .map_err(|err| TransferError::Spawn(self.program.clone(), err))?;
        if output.status.success() {
            Ok(())
        } else {
            Err(TransferError::Failed {
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            })
        }
    }
}

/// Transfers between local files
///
/// Both plain paths and `file://` URLs are accepted. Validation only
/// compares file sizes.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct LocalCopy {}

impl Transfer for LocalCopy {
    type Error = TransferError;

    fn copy(
        &self,
        source: &str,
        destination: &str,
        options: &CopyOptions,
    ) -> Result<(), Self::Error> {
        let src = local_path(source);
        let dst = local_path(destination);
        if dst.exists() && !options.overwrite {
            return Err(TransferError::Exists(dst.to_owned()));
        }
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent)
                .map_err(|err| TransferError::CreateDir(parent.to_owned(), err))?;
        }
        fs::copy(src, dst)
            .map_err(|err| TransferError::Copy(src.to_owned(), dst.to_owned(), err))?;
        if options.validate {
            check_size(src, dst)?;
        }
        Ok(())
    }
}

fn check_size(src: &Path, dst: &Path) -> Result<(), TransferError> {
    let size = |path: &Path| {
        fs::metadata(path)
            .map(|m| m.len())
            .map_err(|err| TransferError::Copy(src.to_owned(), dst.to_owned(), err))
    };
    if size(src)? == size(dst)? {
        Ok(())
    } else {
        Err(TransferError::SizeMismatch(src.to_owned(), dst.to_owned()))
    }
}

fn local_path(location: &str) -> &Path {
    Path::new(location.strip_prefix(FILE_URL_SCHEME).unwrap_or(location))
}

/// Create the parent directory of a local destination
///
/// Remote destinations are left to the transfer tool.
pub fn ensure_target_dir(destination: &str) -> Result<(), TransferError> {
    let Some(path) = destination.strip_prefix(FILE_URL_SCHEME) else {
        return Ok(());
    };
    match Path::new(path).parent() {
        Some(dir) if !dir.as_os_str().is_empty() => fs::create_dir_all(dir)
            .map_err(|err| TransferError::CreateDir(dir.to_owned(), err)),
        _ => Ok(()),
    }
}

/// Outcome of a batch of transfers
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CopySummary {
    pub succeeded: usize,
    /// Source, destination, and error message for each failed transfer
    pub failed: Vec<(String, String, String)>,
}

impl CopySummary {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Copy each source to the corresponding destination
///
/// A failed transfer doesn't stop the remaining ones. The outcome of
/// each transfer is logged once the progress bar is finished.
pub fn copy_files<T, I>(transfer: &T, pairs: I, options: &CopyOptions) -> CopySummary
where
    T: Transfer,
    T::Error: std::fmt::Display,
    I: IntoIterator<Item = (String, String)>,
    I::IntoIter: ExactSizeIterator,
{
    let pairs = pairs.into_iter();
    let progress = ProgressBar::new(pairs.len() as u64, "files copied:");
    let mut results = Vec::with_capacity(pairs.len());
    for (source, destination) in pairs {
        let res = transfer
            .copy(&source, &destination, options)
            .map_err(|err| err.to_string());
        results.push((source, destination, res));
        progress.inc(1);
    }
    progress.finish();

    let mut summary = CopySummary::default();
    for (source, destination, res) in results {
        match res {
            Ok(()) => {
                debug!("{source} => {destination} succeeded");
                summary.succeeded += 1;
            }
            Err(err) => {
                error!("{source} => {destination} failed: {err}");
                summary.failed.push((source, destination, err));
            }
        }
    }
    info!(
        "Copied {} files, {} failures",
        summary.succeeded,
        summary.failed.len()
    );
    summary
}

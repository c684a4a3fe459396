use std::{
    ffi::OsStr,
    path::PathBuf,
    process::Command,
};

use log::{debug, trace};
use thiserror::Error;

use crate::traits::Catalog;

/// Default name of the DAS command-line client
pub const DASGOCLIENT: &str = "dasgoclient";

const ROOT_FILE_SUFFIX: &str = ".root";

/// Catalog lookups through the `dasgoclient` executable
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DasClient {
    program: PathBuf,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Catalog client `{0}` not found: {1}")]
    NotFound(String, which::Error),
    #[error("Failed to run {0:?}: {1}")]
    Spawn(PathBuf, std::io::Error),
    #[error("Catalog query for {dataset} failed ({status}): {stderr}")]
    Query {
        dataset: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
}

impl DasClient {
    /// Look up `dasgoclient` in `PATH`
    pub fn new() -> Result<Self, CatalogError> {
        Self::from_program(DASGOCLIENT)
    }

    /// Use the given client executable
    ///
    /// Bare names are looked up in `PATH`, anything with a path
    /// component has to exist.
    pub fn from_program<S: AsRef<OsStr>>(program: S) -> Result<Self, CatalogError> {
        let program = program.as_ref();
        let program = which::which(program).map_err(|err| {
            CatalogError::NotFound(program.to_string_lossy().into_owned(), err)
        })?;
        debug!("Using catalog client {program:?}");
        Ok(Self { program })
    }
}

impl Catalog for DasClient {
    type Error = CatalogError;

    fn query_files(&self, dataset: &str) -> Result<Vec<String>, Self::Error> {
        let query = format!("--query=file dataset={dataset}");
        debug!("Running {:?} {query} --limit=0", self.program);
        let output = Command::new(&self.program)
            .arg(&query)
            .arg("--limit=0")
            .output()
            .map_err(|err| CatalogError::Spawn(self.program.clone(), err))?;
        if !output.status.success() {
            return Err(CatalogError::Query {
                dataset: dataset.to_owned(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(root_files(&stdout))
    }
}

/// Whether a catalog entry names a ROOT file
pub fn is_root_file(name: &str) -> bool {
    name.ends_with(ROOT_FILE_SUFFIX)
}

/// Extract the ROOT file names from catalog output
///
/// Anything that doesn't end in `.root` (notices, empty lines) is dropped.
pub fn root_files(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| {
            let keep = is_root_file(line);
            if !keep && !line.is_empty() {
                trace!("Ignoring catalog output line {line:?}");
            }
            keep
        })
        .map(ToOwned::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_output() {
        let output = "\
/store/data/Run2017B/SingleMuon/NANOAOD/1.root
WARNING: proxy expires soon

/store/data/Run2017B/SingleMuon/NANOAOD/2.root
/store/data/Run2017B/SingleMuon/NANOAOD/2.root.bak
";
        assert_eq!(
            root_files(output),
            [
                "/store/data/Run2017B/SingleMuon/NANOAOD/1.root",
                "/store/data/Run2017B/SingleMuon/NANOAOD/2.root",
            ]
        );
        assert!(root_files("").is_empty());
    }

    #[test]
    fn missing_client() {
        let res = DasClient::from_program("/nonexistent/dasgoclient");
        assert!(matches!(res, Err(CatalogError::NotFound(..))));
    }

    #[cfg(unix)]
    mod unix {
        use super::super::*;
        use crate::test_util::write_script;
        use std::path::Path;

        fn script(dir: &Path, body: &str) -> PathBuf {
            write_script(dir, DASGOCLIENT, body)
        }

        #[test]
        fn query() {
            let dir = tempfile::tempdir().unwrap();
            let program = script(
                dir.path(),
                r#"[ "$1" = "--query=file dataset=/A/B/NANOAOD" ] || exit 1
[ "$2" = "--limit=0" ] || exit 2
echo /store/a.root
echo "Showing 2 results"
echo /store/b.root"#,
            );
            let client = DasClient::from_program(&program).unwrap();
            let files = client.query_files("/A/B/NANOAOD").unwrap();
            assert_eq!(files, ["/store/a.root", "/store/b.root"]);
        }

        #[test]
        fn failed_query() {
            let dir = tempfile::tempdir().unwrap();
            let program = script(dir.path(), "echo 'no proxy' >&2; exit 3");
            let client = DasClient::from_program(&program).unwrap();
            match client.query_files("/A/B/NANOAOD") {
                Err(CatalogError::Query { dataset, stderr, .. }) => {
                    assert_eq!(dataset, "/A/B/NANOAOD");
                    assert_eq!(stderr, "no proxy");
                }
                res => panic!("unexpected result {res:?}"),
            }
        }
    }
}

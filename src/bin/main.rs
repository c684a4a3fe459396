mod opt;

use crate::opt::{CopyTool, Opt};

use std::{
    io::{stdout, Write},
    path::Path,
};

use anyhow::{bail, Context, Result};
use clap::Parser;
use env_logger::Env;
use log::{debug, info};
use nanoflow::{
    prelude::*,
    report::write_reports,
    transfer::CopySummary,
    GIT_BRANCH, GIT_REV, VERSION,
};

fn main() -> Result<()> {
    let args = argfile::expand_args_from(
        std::env::args_os(),
        argfile::parse_fromfile,
        argfile::PREFIX,
    )
    .with_context(|| "Failed to read argument file")?;
    let opt = Opt::parse_from(args);

    let env = Env::default().filter_or("NANOFLOW_LOG", &opt.loglevel);
    env_logger::init_from_env(env);

    if let (Some(rev), Some(branch)) = (GIT_REV, GIT_BRANCH) {
        info!("nanoflow {VERSION} rev {rev} ({branch})");
    } else {
        info!("nanoflow {VERSION}");
    }

    debug!("settings: {:#?}", opt);

    let cwd = std::env::current_dir()
        .context("Failed to determine current directory")?;
    run(&opt, &cwd, &mut stdout().lock())?;
    info!("done");
    Ok(())
}

/// Whether any workflow step was requested
fn has_action(opt: &Opt) -> bool {
    opt.cache_das
        || opt.copy_files
        || opt.remove_jobfiles
        || opt.create_jobfiles
        || opt.run_jobs
}

/// Run the requested workflow steps
///
/// Steps run in the order cache, copy, remove, create, run. Without
/// any step, the selected datasets are listed to `out`.
fn run<W: Write>(opt: &Opt, cwd: &Path, out: &mut W) -> Result<()> {
    let analysis = Analysis::from_yaml(&opt.analysis, cwd)?;
    info!("{analysis}");
    let datasets = analysis.select(&opt.datasets)?;

    if !has_action(opt) {
        for ds in &datasets {
            writeln!(out, "{}\t{}", ds.process(), ds.name())?;
        }
        return Ok(());
    }

    if opt.cache_das {
        let client = DasClient::from_program(&opt.das_client)?;
        let nfiles = analysis.cache_catalog(&datasets, &client)?;
        info!("Cached {nfiles} file names for {} datasets", datasets.len());
    }

    if opt.copy_files {
        let options: CopyOptions = opt.copy.into();
        let summary = match opt.copy.copy_tool {
            CopyTool::Gfal => {
                let gfal = GfalCopy::from_program(&opt.gfal_copy)?;
                analysis.stage_files(&datasets, &gfal, &options)?
            }
            CopyTool::Local => {
                analysis.stage_files(&datasets, &LocalCopy {}, &options)?
            }
        };
        check_copies(&summary)?;
    }

    if opt.remove_jobfiles {
        analysis.remove_jobfiles(&datasets)?;
    }

    if opt.create_jobfiles {
        let options: JobOptions = opt.job.clone().into();
        let njobs = analysis.create_jobfiles(&datasets, &options)?;
        info!("Created {njobs} jobs");
    }

    if opt.run_jobs {
        let looper = ExecutableBuilder::default()
            .program(opt.looper.clone())
            .build()?;
        let summary = analysis.run_jobs(&datasets, &looper, opt.num_procs)?;
        let reports = summary.file_reports();
        info!("{}", ReportSummary::from_reports(&reports));
        if let Some(outfile) = &opt.report {
            info!("Writing {} file reports to {outfile:?}", reports.len());
            write_reports(outfile, &reports)?;
        }
        if !summary.is_success() {
            bail!(
                "{} of {} jobs failed",
                summary.failed.len(),
                summary.failed.len() + summary.completed.len()
            );
        }
    }
    Ok(())
}

fn check_copies(summary: &CopySummary) -> Result<()> {
    if summary.is_success() {
        return Ok(());
    }
    bail!(
        "{} of {} file transfers failed",
        summary.failed.len(),
        summary.failed.len() + summary.succeeded
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opt::parse_perjob;
    use nanoflow::{
        job::{ALL_EVENTS, DEFAULT_REPORT_PERIOD},
        looper::DEFAULT_LOOPER,
    };
    use std::path::PathBuf;

    #[test]
    fn perjob() {
        assert_eq!(parse_perjob("3"), Ok(3));
        assert!(parse_perjob("0").is_err());
        assert!(parse_perjob("-1").is_err());
        assert!(parse_perjob("many").is_err());
    }

    #[test]
    fn parse_args() {
        let opt = Opt::parse_from([
            "nanoflow",
            "-d",
            "dy",
            "-d",
            "/SingleMuon/Run2017B/NANOAOD",
            "--create-jobfiles",
            "--perjob",
            "5",
            "--max-events",
            "-1",
            "-j",
            "4",
        ]);
        assert_eq!(opt.analysis, PathBuf::from("./data/analysis.yaml"));
        assert_eq!(opt.datasets, ["dy", "/SingleMuon/Run2017B/NANOAOD"]);
        assert!(has_action(&opt));
        assert!(opt.create_jobfiles && !opt.run_jobs);
        assert_eq!(opt.num_procs, 4);
        assert_eq!(opt.copy.copy_tool, CopyTool::Gfal);

        let options = JobOptions::from(opt.job);
        assert_eq!(options.files_per_job, 5);
        assert_eq!(options.max_events, ALL_EVENTS);
        assert_eq!(options.report_period, DEFAULT_REPORT_PERIOD);
    }

    #[test]
    fn no_action() {
        let opt = Opt::parse_from(["nanoflow", "-a", "my_analysis.yaml"]);
        assert!(!has_action(&opt));
        assert_eq!(opt.looper, PathBuf::from(DEFAULT_LOOPER));
    }

    #[cfg(unix)]
    mod workflow {
        use super::super::*;
        use std::{
            fs,
            os::unix::fs::PermissionsExt,
            path::{Path, PathBuf},
            process::Command,
        };

        use nanoflow::report::read_reports;

        const DY: &str = "/DYJetsToLL/RunIIFall17/NANOAODSIM";
        const SINGLE_MUON: &str = "/SingleMuon/Run2017B/NANOAOD";

        const LOOPER: &str = r#"[ -f "$1" ] || exit 2
if [ -f "$1.fail" ]; then echo "cannot open input" >&2; exit 1; fi
cat > "$2" <<EOF
[{"filename": "$1", "num_events_processed": 10, "cpu_time": 1.0,
  "real_time": 2.0, "speed": 5.0, "event_duration": 1,
  "analyzer_durations": [1], "analyzer_names": ["SumPtAnalyzer"]}]
EOF"#;

        // copied into place by a child process to avoid `ETXTBSY`
        fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
            let staged = dir.join(format!(".{name}.in"));
            fs::write(&staged, format!("#!/bin/sh\n{body}\n")).unwrap();
            let path = dir.join(name);
            let status = Command::new("cp").arg(&staged).arg(&path).status().unwrap();
            assert!(status.success());
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        struct Setup {
            dir: tempfile::TempDir,
            analysis: PathBuf,
        }

        impl Setup {
            fn new() -> Self {
                let dir = tempfile::tempdir().unwrap();
                let root = dir.path();
                let remote = root.join("remote/store/mc/dy");
                fs::create_dir_all(&remote).unwrap();
                for n in 1..=2 {
                    fs::write(remote.join(format!("{n}.root")), "events").unwrap();
                }
                write_script(
                    root,
                    "dasgoclient",
                    "echo /store/mc/dy/1.root\necho /store/mc/dy/2.root",
                );
                write_script(root, "looper", LOOPER);

                let analysis = root.join("analysis.yaml");
                let description = format!(
                    "datasets:
  global_file_prefix: file://{root}/remote
  cache_location: file://{root}/cache
  use_cache: true
  workdirectory: {root}/work
  simulation:
    dy:
      - name: {DY}
  data:
    SingleMuon:
      - name: {SINGLE_MUON}
        files: [/store/data/1.root]
",
                    root = root.display()
                );
                fs::write(&analysis, description).unwrap();
                Self { dir, analysis }
            }

            fn path(&self, name: &str) -> PathBuf {
                self.dir.path().join(name)
            }

            fn opt(&self, args: &[&str]) -> Opt {
                let analysis = self.analysis.to_string_lossy().into_owned();
                let das_client = self.path("dasgoclient").to_string_lossy().into_owned();
                let looper = self.path("looper").to_string_lossy().into_owned();
                let mut all_args = vec![
                    "nanoflow".to_owned(),
                    "-a".to_owned(),
                    analysis,
                    "--das-client".to_owned(),
                    das_client,
                    "--looper".to_owned(),
                    looper,
                    "--copy-tool".to_owned(),
                    "local".to_owned(),
                ];
                all_args.extend(args.iter().map(|arg| arg.to_string()));
                Opt::parse_from(all_args)
            }

            fn run(&self, args: &[&str]) -> Result<String> {
                let mut out = Vec::new();
                run(&self.opt(args), self.dir.path(), &mut out)?;
                Ok(String::from_utf8(out).unwrap())
            }
        }

        #[test]
        fn list_datasets() {
            let setup = Setup::new();
            let listing = setup.run(&[]).unwrap();
            assert_eq!(listing, format!("dy\t{DY}\nSingleMuon\t{SINGLE_MUON}\n"));

            let listing = setup.run(&["-d", "SingleMuon"]).unwrap();
            assert_eq!(listing, format!("SingleMuon\t{SINGLE_MUON}\n"));
            assert!(!setup.path("work").exists());

            assert!(setup.run(&["-d", "ttbar"]).is_err());
        }

        #[test]
        fn all_steps() {
            let setup = Setup::new();
            let report = setup.path("report.json");
            let out = setup
                .run(&[
                    "-d",
                    "dy",
                    "--cache-das",
                    "--copy-files",
                    "--remove-jobfiles",
                    "--create-jobfiles",
                    "--run-jobs",
                    "-j",
                    "2",
                    "-o",
                    report.to_str().unwrap(),
                ])
                .unwrap();
            assert!(out.is_empty());

            for n in 1..=2 {
                let cached = setup.path(&format!("cache/store/mc/dy/{n}.root"));
                assert_eq!(fs::read_to_string(cached).unwrap(), "events");
            }
            let reports = read_reports(&report).unwrap();
            assert_eq!(reports.len(), 2);
            assert!(reports[0].filename.ends_with("job_0.json"));
            assert!(reports[1].filename.ends_with("job_1.json"));

            // job files of the first run are replaced
            setup
                .run(&["-d", "dy", "--remove-jobfiles", "--create-jobfiles", "--perjob", "2"])
                .unwrap();
            setup.run(&["-d", "dy", "--run-jobs", "-o", report.to_str().unwrap()]).unwrap();
            assert_eq!(read_reports(&report).unwrap().len(), 1);
        }

        #[test]
        fn failed_job() {
            let setup = Setup::new();
            setup
                .run(&["-d", "dy", "--cache-das", "--copy-files", "--create-jobfiles"])
                .unwrap();
            let jobs = setup.path("work/jobs/dy/DYJetsToLL__RunIIFall17__NANOAODSIM");
            fs::write(jobs.join("job_1.json.fail"), "").unwrap();

            let report = setup.path("report.json");
            let err = setup
                .run(&["-d", "dy", "--run-jobs", "-o", report.to_str().unwrap()])
                .unwrap_err();
            assert_eq!(err.to_string(), "1 of 2 jobs failed");
            let reports = read_reports(&report).unwrap();
            assert_eq!(reports.len(), 1);
            assert!(reports[0].filename.ends_with("job_0.json"));
        }

        #[test]
        fn run_without_jobs() {
            let setup = Setup::new();
            assert!(setup.run(&["-d", "dy", "--run-jobs"]).is_err());
        }

        #[test]
        fn failed_copy() {
            let setup = Setup::new();
            fs::remove_file(setup.path("remote/store/mc/dy/2.root")).unwrap();
            let res = setup.run(&["-d", "dy", "--cache-das", "--copy-files", "--create-jobfiles"]);
            assert!(res.is_err());
            assert!(setup.path("cache/store/mc/dy/1.root").exists());
            assert!(!setup.path("work/jobs").exists());
        }
    }
}

mod opt_report;

use crate::opt_report::Opt;

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use itertools::Itertools;
use log::{debug, info};
use nanoflow::{
    report::{read_reports, write_reports, ReportSummary},
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
        info!("nanoflow-report {VERSION} rev {rev} ({branch})");
    } else {
        info!("nanoflow-report {VERSION}");
    }

    debug!("settings: {:#?}", opt);

    let mut reports = Vec::new();
    for infile in &opt.infiles {
        let file_reports = read_reports(infile)?;
        debug!("{} file reports in {infile:?}", file_reports.len());
        reports.extend(file_reports);
    }

    if opt.per_file {
        for report in &reports {
            info!("{}: {report}", report.filename);
        }
    }

    let summary = ReportSummary::from_reports(&reports);
    info!("{summary}");
    let fractions = summary
        .runtime_fractions()
        .into_iter()
        .map(|(name, frac)| format!("{name}={frac:.3}"))
        .join(", ");
    info!("Runtime fractions: {fractions}");

    if let Some(outfile) = &opt.outfile {
        info!("Writing {} file reports to {outfile:?}", reports.len());
        write_reports(outfile, &reports)?;
    }
    Ok(())
}

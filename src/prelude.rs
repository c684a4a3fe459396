pub use crate::{
    analysis::Analysis,
    catalog::DasClient,
    dataset::Dataset,
    dispatch::{run_jobs, RunSummary},
    job::{Job, JobOptions},
    looper::{Executable, ExecutableBuilder},
    report::{FileReport, ReportSummary},
    traits::{Catalog, Looper, Transfer},
    transfer::{CopyOptions, GfalCopy, LocalCopy},
};

use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[clap(about, author, version)]
pub(crate) struct Opt {
    /// Merged output file for all reports.
    #[clap(short, long, value_parser)]
    pub(crate) outfile: Option<PathBuf>,

    /// Show the reports of the individual files.
    #[clap(long)]
    pub(crate) per_file: bool,

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

    /// Looper report files.
    #[clap(name = "INFILES", value_parser, required = true)]
    pub(crate) infiles: Vec<PathBuf>,
}

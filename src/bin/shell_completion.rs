#[allow(dead_code)]
mod opt;
mod opt_report;

use std::{
    env::var_os,
    fs::{create_dir_all, File},
    io::{stdout, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, ValueEnum};
use clap_complete::{generate, shells::*, Generator};
use dirs::home_dir;
use strum::{Display, EnumString};

#[derive(
    Copy,
    Clone,
    Debug,
    Display,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    EnumString,
    ValueEnum,
)]
#[strum(ascii_case_insensitive)]
#[strum(serialize_all = "lowercase")]
enum Shell {
    Bash,
    Elvish,
    Fish,
    #[allow(clippy::enum_variant_names)]
    PowerShell,
    Zsh,
}

#[derive(Debug, Parser)]
struct ShellSelect {
    /// Shell for which to generate completions
    ///
    /// Bash and fish completions are installed into the user's
    /// completion directory, all others are written to standard output.
    #[clap(value_enum)]
    shell: Shell,
}

fn gen_completion<S: Copy + Generator, W: Write>(shell: S, mut to: W) {
    generate(shell, &mut opt::Opt::command(), "nanoflow", &mut to);
    generate(
        shell,
        &mut opt_report::Opt::command(),
        "nanoflow-report",
        &mut to,
    )
}

fn main() -> Result<()> {
    let shell = ShellSelect::parse().shell;
    eprintln!("Generating {shell} completions");
    match shell {
        Shell::Bash => gen_completion(Bash, bash_outfile()?),
        Shell::Elvish => gen_completion(Elvish, &mut stdout()),
        Shell::Fish => gen_completion(Fish, fish_outfile()?),
        Shell::PowerShell => gen_completion(PowerShell, &mut stdout()),
        Shell::Zsh => gen_completion(Zsh, &mut stdout()),
    }
    Ok(())
}

fn local_share() -> Result<PathBuf> {
    let mut dir = home_dir().context("No home directory found")?;
    dir.push(".local");
    dir.push("share");
    Ok(dir)
}

fn bash_outfile() -> Result<File> {
    let mut outfile = match var_os("BASH_COMPLETION_USER_DIR") {
        Some(dir) => PathBuf::from(dir),
        None => {
            let mut dir = match var_os("XDG_DATA_HOME") {
                Some(dir) => PathBuf::from(dir),
                None => local_share()?,
            };
            dir.push("bash-completion");
            dir
        }
    };
    outfile.push("completions");
    outfile.push("nanoflow.bash");
    create_file(outfile)
}

fn fish_outfile() -> Result<File> {
    let mut outfile = match var_os("XDG_DATA_HOME") {
        Some(dir) => PathBuf::from(dir),
        None => local_share()?,
    };
    for part in ["fish", "vendor_completions.d", "nanoflow.fish"] {
        outfile.push(part);
    }
    create_file(outfile)
}

fn create_file<P: AsRef<Path>>(name: P) -> Result<File> {
    let name = name.as_ref();
    if let Some(dir) = name.parent() {
        create_dir_all(dir)
            .with_context(|| format!("Failed to create {dir:?}"))?;
    }
    eprintln!("Writing to {name:?}");
    File::create(name).with_context(|| format!("Failed to create {name:?}"))
}

//! Build script rendering the `vmsnap` man pages.
//!
//! `vmsnap.1` covers the top-level command; every subcommand also gets its
//! own `vmsnap-<name>.1` page in the build output directory.

use std::env;
use std::error::Error;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::{Command, CommandFactory};
use clap_mangen::Man;

#[path = "src/cli/mod.rs"]
mod cli;

use cli::Cli;

fn render(command: Command, out_dir: &Path, file_name: &str) -> Result<(), Box<dyn Error>> {
    let mut page = Vec::new();
    Man::new(command).render(&mut page)?;
    fs::write(out_dir.join(file_name), page)?;
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let mut stdout = io::stdout();
    writeln!(stdout, "cargo:rerun-if-changed=build.rs")?;
    writeln!(stdout, "cargo:rerun-if-changed=src/cli/mod.rs")?;

    let out_dir = env::var_os("OUT_DIR")
        .map(PathBuf::from)
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "OUT_DIR was not set"))?;

    let command = Cli::command();
    for subcommand in command.get_subcommands() {
        let file_name = format!("vmsnap-{}.1", subcommand.get_name());
        render(subcommand.clone(), &out_dir, &file_name)?;
    }
    render(command, &out_dir, "vmsnap.1")
}

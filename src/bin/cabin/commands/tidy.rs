//! `cabin tidy` command

use std::path::Path;
use std::time::Instant;

use anyhow::{bail, Result};

use cabin::builder::build_config::{default_parallelism, emit_makefile, get_make_command};
use cabin::builder::project::BuildProfile;
use cabin::util::process::{command_exists, exec_cmd, Command};
use cabin::{Manifest, Shell};

use crate::cli::TidyArgs;

fn tidy_impl(make_cmd: &Command, shell: &Shell) -> Result<()> {
    let start = Instant::now();
    let status = exec_cmd(make_cmd)?;
    if !status.success() {
        bail!("clang-tidy {status}");
    }
    shell.status(
        "Finished",
        format!("clang-tidy in {:.2}s", start.elapsed().as_secs_f64()),
    );
    Ok(())
}

pub fn execute(args: TidyArgs, shell: &Shell) -> Result<()> {
    if !command_exists("clang-tidy") {
        bail!("tidy command requires clang-tidy");
    }

    let mut jobs = args.jobs.unwrap_or_else(default_parallelism);
    if args.fix && jobs > 1 {
        shell.warn("`--fix` implies `--jobs 1` to avoid race conditions");
        jobs = 1;
    }

    let manifest = Manifest::from_cwd()?;
    let config = emit_makefile(manifest, BuildProfile::Dev, false, jobs, shell)?;

    let mut tidy_flags = "CABIN_TIDY_FLAGS=".to_string();
    if !shell.is_verbose() {
        tidy_flags.push_str("-quiet");
    }
    if Path::new(".clang-tidy").exists() {
        // clang-tidy runs from inside cabin-out/<profile>.
        tidy_flags.push_str(" --config-file=../../.clang-tidy");
    }
    if args.fix {
        tidy_flags.push_str(" -fix");
    }

    let mut make_cmd = get_make_command(jobs, shell)
        .arg("-C")
        .arg(config.out_base_path().display().to_string())
        .arg(tidy_flags)
        .arg("tidy");
    if args.fix {
        // Keep going to apply fixes to as many files as possible.
        make_cmd = make_cmd.arg("--keep-going");
    }

    shell.status("Running", "clang-tidy");
    tidy_impl(&make_cmd, shell)
}

//! `cabin run` command

use anyhow::{bail, Result};

use cabin::builder::build_config::default_parallelism;
use cabin::builder::project::BuildProfile;
use cabin::util::process::{exec_cmd, Command};
use cabin::{Manifest, Shell};

use crate::cli::RunArgs;
use crate::commands::build::build_impl;

pub fn execute(args: RunArgs, shell: &Shell) -> Result<()> {
    let jobs = args.jobs.unwrap_or_else(default_parallelism);
    let profile = BuildProfile::from_release_flag(args.release);
    let manifest = Manifest::from_cwd()?;

    let name = manifest.package.name.clone();
    let root = manifest.project_root().to_path_buf();
    let (_config, out_dir) = build_impl(manifest, profile, jobs, shell)?;

    let rel_out = out_dir.strip_prefix(&root).unwrap_or(&out_dir);
    shell.status("Running", format!("`{}/{name}`", rel_out.display()));

    let command = Command::new(out_dir.join(&name).display().to_string()).args(args.args);
    let status = exec_cmd(&command)?;
    if !status.success() {
        bail!("`{name}` {status}");
    }
    Ok(())
}

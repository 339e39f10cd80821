//! `cabin build` command

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Result};

use cabin::builder::build_config::{
    default_parallelism, emit_compdb, emit_makefile, get_make_command, BuildConfig,
};
use cabin::builder::project::BuildProfile;
use cabin::util::process::{exec_cmd, ExitStatus};
use cabin::{Manifest, Shell};

use crate::cli::BuildArgs;

/// Ask make whether `target_name` is stale; compile it when it is,
/// printing the `Compiling` heading first.
pub fn run_build_command(
    config: &BuildConfig,
    jobs: usize,
    target_name: &str,
    shell: &Shell,
) -> Result<ExitStatus> {
    let out_dir = config.out_base_path().display().to_string();
    let make_cmd = get_make_command(jobs, shell)
        .arg("-C")
        .arg(&out_dir)
        .arg(config.out_base_path().join(target_name).display().to_string());

    let check_cmd = make_cmd.clone().arg("--question");
    let mut status = exec_cmd(&check_cmd)?;
    if !status.success() {
        let manifest = config.manifest();
        shell.status(
            "Compiling",
            format!(
                "{} v{} ({})",
                target_name,
                manifest.package.version,
                manifest.project_root().display()
            ),
        );
        status = exec_cmd(&make_cmd)?;
    }
    Ok(status)
}

/// Emit the build files and drive make over the binary and library
/// targets. Returns the output directory.
pub fn build_impl(
    manifest: Manifest,
    profile: BuildProfile,
    jobs: usize,
    shell: &Shell,
) -> Result<(BuildConfig, PathBuf)> {
    let start = Instant::now();

    let config = emit_makefile(manifest, profile, false, jobs, shell)?;
    let out_dir = config.out_base_path().to_path_buf();

    let mut status = ExitStatus::default();
    if config.has_bin_target() {
        let name = config.manifest().package.name.clone();
        status = run_build_command(&config, jobs, &name, shell)?;
    }
    if config.has_lib_target() && status.success() {
        let lib_name = config.lib_name().to_string();
        status = run_build_command(&config, jobs, &lib_name, shell)?;
    }

    if !status.success() {
        bail!("compilation failed");
    }

    shell.status(
        "Finished",
        format!(
            "`{profile}` profile [{}] target(s) in {:.2}s",
            config.selected_profile(),
            start.elapsed().as_secs_f64()
        ),
    );
    Ok((config, out_dir))
}

pub fn execute(args: BuildArgs, shell: &Shell) -> Result<()> {
    let jobs = args.jobs.unwrap_or_else(default_parallelism);
    let profile = BuildProfile::from_release_flag(args.release && !args.debug);
    let manifest = Manifest::from_cwd()?;

    if args.compdb {
        let out_dir = emit_compdb(manifest, profile, false, jobs, shell)?;
        shell.status(
            "Generated",
            format!("{}/compile_commands.json", out_dir.display()),
        );
        return Ok(());
    }

    build_impl(manifest, profile, jobs, shell)?;
    Ok(())
}

//! `cabin lint` command

use std::path::Path;

use anyhow::{bail, Result};

use cabin::core::manifest::Edition;
use cabin::util::process::{command_exists, exec_cmd, Command};
use cabin::{Manifest, Shell};

use crate::cli::LintArgs;

fn lint(name: &str, cpplint_args: Vec<String>, shell: &Shell) -> Result<()> {
    shell.status("Linting", name);

    let mut cmd = Command::new("cpplint").args(cpplint_args);
    if !shell.is_verbose() {
        cmd = cmd.arg("--quiet");
    }

    // Ignored files stay out of the lint run.
    if Path::new(".gitignore").exists() {
        let gitignore = std::fs::read_to_string(".gitignore")?;
        for line in gitignore.lines() {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            cmd = cmd.arg(format!("--exclude={line}"));
        }
    }
    // This must come after the `--exclude` options.
    cmd = cmd.arg("--recursive").arg(".");

    let status = exec_cmd(&cmd)?;
    if !status.success() {
        bail!("cpplint {status}");
    }
    Ok(())
}

pub fn execute(args: LintArgs, shell: &Shell) -> Result<()> {
    if !command_exists("cpplint") {
        bail!(
            "lint command requires cpplint; try installing it by:\n  \
             pip install cpplint"
        );
    }

    let manifest = Manifest::from_cwd()?;
    let mut cpplint_args: Vec<String> = args
        .exclude
        .iter()
        .map(|file| format!("--exclude={file}"))
        .collect();

    if Path::new("CPPLINT.cfg").exists() {
        tracing::debug!("Using CPPLINT.cfg for lint ...");
        return lint(&manifest.package.name, cpplint_args, shell);
    }

    if Path::new("include").exists() {
        cpplint_args.push("--root=include".into());
    } else if Path::new("src").exists() {
        cpplint_args.push("--root=src".into());
    }

    let filters = &manifest.lint.cpplint.filters;
    if !filters.is_empty() {
        tracing::debug!("Using cabin manifest file for lint ...");
        cpplint_args.push(format!("--filter={}", filters.join(",")));
    } else {
        tracing::debug!("Using default arguments for lint ...");
        let cpp11 = Edition::try_from_str("11")?;
        if cpp11 < manifest.package.edition {
            // The C++11-era checks only make noise on newer editions.
            cpplint_args.push("--filter=-build/c++11".into());
        }
    }
    lint(&manifest.package.name, cpplint_args, shell)
}

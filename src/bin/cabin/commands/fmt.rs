//! `cabin fmt` command

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};

use cabin::builder::build_config::{HEADER_FILE_EXTS, SOURCE_FILE_EXTS};
use cabin::util::process::{command_exists, exec_cmd, Command};
use cabin::{Manifest, Shell};

use crate::cli::FmtArgs;

/// Collect the formattable sources under the project, skipping
/// git-ignored and explicitly excluded paths.
fn collect_format_targets(root: &Path, excludes: &[String]) -> Vec<String> {
    let repo = git2::Repository::open(root).ok();
    if repo.is_none() {
        tracing::debug!("No git repository found");
    }

    let is_ignored = |rel: &Path| -> bool {
        if excludes.iter().any(|ex| Path::new(ex) == rel) {
            return true;
        }
        repo.as_ref()
            .map(|r| r.is_path_ignored(rel).unwrap_or(false))
            .unwrap_or(false)
    };

    let mut sources = Vec::new();
    let mut walker = walkdir::WalkDir::new(root).sort_by_file_name().into_iter();
    loop {
        let entry = match walker.next() {
            None => break,
            Some(Err(_)) => continue,
            Some(Ok(entry)) => entry,
        };
        let rel: PathBuf = match entry.path().strip_prefix(root) {
            Ok(rel) if !rel.as_os_str().is_empty() => rel.to_path_buf(),
            _ => continue,
        };

        if entry.file_type().is_dir() {
            if is_ignored(&rel) || rel.starts_with(".git") {
                tracing::debug!("Ignore: {}", rel.display());
                walker.skip_current_dir();
            }
            continue;
        }
        if is_ignored(&rel) {
            tracing::debug!("Ignore: {}", rel.display());
            continue;
        }

        let ext = rel.extension().and_then(|e| e.to_str()).unwrap_or_default();
        if SOURCE_FILE_EXTS.contains(&ext) || HEADER_FILE_EXTS.contains(&ext) {
            sources.push(rel.display().to_string());
        }
    }
    sources
}

pub fn execute(args: FmtArgs, shell: &Shell) -> Result<()> {
    if !command_exists("clang-format") {
        bail!(
            "fmt command requires clang-format; try installing it by:\n  \
             apt/brew install clang-format"
        );
    }

    let manifest = Manifest::from_cwd()?;
    let root = manifest.project_root().to_path_buf();

    let sources = collect_format_targets(&root, &args.exclude);
    if sources.is_empty() {
        shell.warn("no files to format");
        return Ok(());
    }

    let mut fmt_args = vec![
        "--style=file".to_string(),
        "--fallback-style=LLVM".to_string(),
        "-Werror".to_string(),
    ];
    if shell.is_verbose() {
        fmt_args.push("--verbose".into());
    }
    if args.check {
        fmt_args.push("--dry-run".into());
    } else {
        fmt_args.push("-i".into());
        shell.status("Formatting", &manifest.package.name);
    }
    fmt_args.extend(sources);

    let fmt_bin = std::env::var("CABIN_FMT").unwrap_or_else(|_| "clang-format".into());
    let cmd = Command::new(fmt_bin).args(fmt_args).cwd(&root);

    let status = exec_cmd(&cmd)?;
    if !status.success() {
        bail!("clang-format {status}");
    }
    Ok(())
}

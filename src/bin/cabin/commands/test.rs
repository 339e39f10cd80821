//! `cabin test` command

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Result};

use cabin::builder::build_config::{default_parallelism, emit_makefile, get_make_command};
use cabin::builder::project::BuildProfile;
use cabin::util::process::{exec_cmd, Command, ExitStatus};
use cabin::{Manifest, Shell};

use crate::cli::TestArgs;

/// Scrape `<out>/unittests/**.test` target names out of the generated
/// Makefile.
fn collect_test_targets(makefile: &str, prefix: &str) -> Vec<String> {
    makefile
        .lines()
        .filter(|line| line.starts_with(prefix))
        .filter_map(|line| line.split(':').next())
        .filter(|target| target.ends_with(".test"))
        .map(ToString::to_string)
        .collect()
}

pub fn execute(args: TestArgs, shell: &Shell) -> Result<()> {
    if args.release {
        shell.warn("Tests in release mode possibly disables assert macros.");
    }
    let jobs = args.jobs.unwrap_or_else(default_parallelism);
    let profile = BuildProfile::from_release_flag(args.release && !args.debug);
    let manifest = Manifest::from_cwd()?;
    let root = manifest.project_root().to_path_buf();

    let start = Instant::now();
    let config = emit_makefile(manifest, profile, true, jobs, shell)?;
    let out_base = config.out_base_path().to_path_buf();

    let prefix = format!("{}/", out_base.join("unittests").display());
    let makefile = std::fs::read_to_string(out_base.join("Makefile"))?;
    let test_targets = collect_test_targets(&makefile, &prefix);

    if test_targets.is_empty() {
        shell.warn("No test targets found");
        return Ok(());
    }

    let base_make_cmd = get_make_command(jobs, shell)
        .arg("-C")
        .arg(out_base.display().to_string());

    // Compile the stale test targets, printing the heading only once.
    let mut status = ExitStatus::default();
    let mut heading_emitted = false;
    for target in &test_targets {
        let check_cmd = base_make_cmd.clone().arg("--question").arg(target);
        if exec_cmd(&check_cmd)?.success() {
            continue;
        }
        if !heading_emitted {
            let manifest = config.manifest();
            shell.status(
                "Compiling",
                format!(
                    "{} v{} ({})",
                    manifest.package.name,
                    manifest.package.version,
                    root.display()
                ),
            );
            heading_emitted = true;
        }

        let build_status = exec_cmd(&base_make_cmd.clone().arg(target))?;
        if !build_status.success() {
            status = build_status;
        }
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

    run_test_targets(&test_targets, &prefix, &root, shell)
}

fn run_test_targets(
    test_targets: &[String],
    prefix: &str,
    root: &PathBuf,
    shell: &Shell,
) -> Result<()> {
    let start = Instant::now();

    let mut passed = 0usize;
    let mut failed = 0usize;
    for target in test_targets {
        // `<out>/unittests/foo.cc.test` ran for `src/foo.cc`.
        let source = format!(
            "src/{}",
            target
                .strip_prefix(prefix)
                .unwrap_or(target)
                .strip_suffix(".test")
                .unwrap_or(target)
        );
        let bin_path = PathBuf::from(target);
        let rel_bin = bin_path.strip_prefix(root).unwrap_or(&bin_path);
        shell.status("Running", format!("unittests {source} ({})", rel_bin.display()));

        if exec_cmd(&Command::new(target.clone()))?.success() {
            passed += 1;
        } else {
            failed += 1;
        }
    }

    let summary = format!(
        "{passed} passed; {failed} failed; finished in {:.2}s",
        start.elapsed().as_secs_f64()
    );
    if failed > 0 {
        bail!(summary);
    }
    shell.status("Ok", summary);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_test_targets() {
        let makefile = "\
CXX := c++

/p/cabin-out/debug/unittests/algo.cc.test: /p/cabin-out/debug/unittests/algo.o
\t$(Q)$(CXX) $(LDFLAGS) $^ $(LIBS) -o $@

/p/cabin-out/debug/unittests/algo.o: /p/src/algo.cc
\t@mkdir -p $(@D)

/p/cabin-out/debug/pkg: /p/cabin-out/debug/pkg.d/main.o
";
        let targets = collect_test_targets(makefile, "/p/cabin-out/debug/unittests/");
        assert_eq!(targets, vec!["/p/cabin-out/debug/unittests/algo.cc.test"]);
    }

    #[test]
    fn test_collect_test_targets_empty() {
        let targets = collect_test_targets("all: pkg\n", "/p/cabin-out/debug/unittests/");
        assert!(targets.is_empty());
    }
}

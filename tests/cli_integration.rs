//! CLI integration tests for cabin.
//!
//! These drive the binary end to end: project creation, manifest
//! editing, and (when a C++ toolchain is present) full builds through
//! the generated Makefile.

use std::fs;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get the cabin binary command.
fn cabin() -> Command {
    Command::cargo_bin("cabin").unwrap()
}

fn temp_dir() -> TempDir {
    TempDir::new().unwrap()
}

/// Whether `make` and a C++ compiler are available for build tests.
fn has_build_tools() -> bool {
    let have = |tool: &str| {
        Command::new(tool)
            .arg("--version")
            .output()
            .map(|out| out.status.success())
            .unwrap_or(false)
    };
    have("make") && (have("c++") || have("g++") || have("clang++"))
}

// ============================================================================
// cabin new
// ============================================================================

#[test]
fn test_new_creates_binary_package() {
    let tmp = temp_dir();

    cabin()
        .args(["new", "hello_world"])
        .current_dir(tmp.path())
        .assert()
        .success()
        .stderr(predicate::str::contains(
            "     Created binary (application) `hello_world` package",
        ));

    let root = tmp.path().join("hello_world");
    assert!(root.join(".git").is_dir());
    assert!(root.join(".gitignore").is_file());
    assert!(root.join("cabin.toml").is_file());
    assert!(root.join("src/main.cc").is_file());

    let manifest = fs::read_to_string(root.join("cabin.toml")).unwrap();
    assert!(manifest.contains("name = \"hello_world\""));
    assert!(manifest.contains("version = \"0.1.0\""));
    assert!(manifest.contains("edition = \"20\""));
}

#[test]
fn test_new_creates_library_package() {
    let tmp = temp_dir();

    cabin()
        .args(["new", "--lib", "hello_world"])
        .current_dir(tmp.path())
        .assert()
        .success()
        .stderr(predicate::str::contains(
            "     Created library `hello_world` package",
        ));

    let root = tmp.path().join("hello_world");
    assert!(root.join("include").is_dir());
    assert!(root.join("include/hello_world/hello_world.hpp").is_file());
    assert!(!root.join("src").exists());
}

#[test]
fn test_new_without_name_fails() {
    let tmp = temp_dir();

    cabin()
        .arg("new")
        .current_dir(tmp.path())
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains(
            "Error: package name must not be empty",
        ));
}

#[test]
fn test_new_rejects_keyword_name() {
    let tmp = temp_dir();

    cabin()
        .args(["new", "class"])
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("must not be a C++ keyword"));
}

#[test]
fn test_new_rejects_existing_directory() {
    let tmp = temp_dir();
    fs::create_dir(tmp.path().join("taken")).unwrap();

    cabin()
        .args(["new", "taken"])
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

// ============================================================================
// cabin init
// ============================================================================

#[test]
fn test_init_uses_directory_name() {
    let tmp = temp_dir();
    let project = tmp.path().join("initpkg");
    fs::create_dir(&project).unwrap();

    cabin()
        .arg("init")
        .current_dir(&project)
        .assert()
        .success()
        .stderr(predicate::str::contains("Created"));

    let manifest = fs::read_to_string(project.join("cabin.toml")).unwrap();
    assert!(manifest.contains("name = \"initpkg\""));
}

#[test]
fn test_init_fails_on_existing_manifest() {
    let tmp = temp_dir();
    fs::write(tmp.path().join("cabin.toml"), "[package]\n").unwrap();

    cabin()
        .arg("init")
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "cannot initialize an existing cabin package",
        ));
}

// ============================================================================
// cabin add / remove
// ============================================================================

fn new_package(tmp: &TempDir, name: &str) -> std::path::PathBuf {
    cabin()
        .args(["new", name])
        .current_dir(tmp.path())
        .assert()
        .success();
    tmp.path().join(name)
}

#[test]
fn test_add_git_dependency_shorthand() {
    let tmp = temp_dir();
    let root = new_package(&tmp, "addtest");

    cabin()
        .args(["add", "ToruNiina/toml11", "--tag", "v4.2.0"])
        .current_dir(&root)
        .assert()
        .success()
        .stderr(predicate::str::contains("Added"));

    let manifest = fs::read_to_string(root.join("cabin.toml")).unwrap();
    assert!(manifest.contains(
        "toml11 = { git = \"https://github.com/ToruNiina/toml11.git\", tag = \"v4.2.0\" }"
    ));
}

#[test]
fn test_add_system_dependency_requires_version() {
    let tmp = temp_dir();
    let root = new_package(&tmp, "systest");

    cabin()
        .args(["add", "zlib", "--sys"])
        .current_dir(&root)
        .assert()
        .failure()
        .stderr(predicate::str::contains("--version"));

    cabin()
        .args(["add", "zlib", "--sys", "--version", ">=1.2"])
        .current_dir(&root)
        .assert()
        .success();

    let manifest = fs::read_to_string(root.join("cabin.toml")).unwrap();
    assert!(manifest.contains("zlib = { version = \">=1.2\", system = true }"));
}

#[test]
fn test_remove_reports_missing_and_removes_present() {
    let tmp = temp_dir();
    let root = new_package(&tmp, "rmtest");
    let manifest_path = root.join("cabin.toml");

    let manifest = fs::read_to_string(&manifest_path).unwrap();
    fs::write(
        &manifest_path,
        format!(
            "{manifest}\n[dependencies]\n\
             tbb = {{ version = \"^2021\", system = true }}\n\
             toml11 = {{ git = \"https://github.com/ToruNiina/toml11.git\" }}\n"
        ),
    )
    .unwrap();

    cabin()
        .args(["remove", "tbb", "mydep", "toml11"])
        .current_dir(&root)
        .assert()
        .success()
        .stderr(
            predicate::str::contains("Warning: Dependency `mydep` not found in")
                .and(predicate::str::contains("     Removed tbb, toml11 from")),
        );

    let manifest = fs::read_to_string(&manifest_path).unwrap();
    assert!(!manifest.contains("tbb"));
    assert!(!manifest.contains("toml11"));
}

// ============================================================================
// cabin version
// ============================================================================

#[test]
fn test_version_output() {
    cabin()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::starts_with(format!(
            "cabin {}",
            env!("CARGO_PKG_VERSION")
        )));
}

#[test]
fn test_verbose_version_flag_order_is_irrelevant() {
    let a = cabin().arg("-vV").output().unwrap();
    let b = cabin().arg("-Vv").output().unwrap();

    assert!(a.status.success());
    assert!(b.status.success());
    assert_eq!(a.stdout, b.stdout);

    let rendered = String::from_utf8_lossy(&a.stdout);
    assert!(rendered.contains("compiler:"));
    assert!(rendered.contains("commit-hash:"));
}

// ============================================================================
// error surface
// ============================================================================

#[test]
fn test_build_outside_project_fails() {
    let tmp = temp_dir();

    cabin()
        .arg("build")
        .current_dir(tmp.path())
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains(
            "could not find `cabin.toml` here and in its parents",
        ));
}

#[test]
fn test_unknown_subcommand_suggests() {
    cabin()
        .arg("biuld")
        .assert()
        .failure()
        .stderr(predicate::str::contains("build"));
}

#[test]
fn test_list_prints_subcommands() {
    cabin()
        .arg("--list")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("build")
                .and(predicate::str::contains("search"))
                .and(predicate::str::contains("version")),
        );
}

// ============================================================================
// build / run / test / clean (require a toolchain)
// ============================================================================

#[test]
fn test_build_and_run_hello_world() {
    if !has_build_tools() {
        eprintln!("skipping: make or a C++ compiler is unavailable");
        return;
    }

    let tmp = temp_dir();
    let root = new_package(&tmp, "hello_world");

    cabin()
        .arg("run")
        .current_dir(&root)
        .assert()
        .success()
        .stdout(predicate::str::diff("Hello, world!\n"))
        .stderr(
            predicate::str::contains("Compiling hello_world v0.1.0")
                .and(predicate::str::is_match(
                    r"Finished `dev` profile \[unoptimized \+ debuginfo\] target\(s\) in \d+\.\d\ds",
                )
                .unwrap()),
        );

    assert!(root.join("cabin-out/debug/hello_world").is_file());
    assert!(root.join("cabin-out/debug/Makefile").is_file());
}

#[test]
fn test_second_build_is_incremental() {
    if !has_build_tools() {
        eprintln!("skipping: make or a C++ compiler is unavailable");
        return;
    }

    let tmp = temp_dir();
    let root = new_package(&tmp, "increment");

    cabin().arg("build").current_dir(&root).assert().success();

    // Nothing changed, so the second build must not recompile.
    cabin()
        .arg("build")
        .current_dir(&root)
        .assert()
        .success()
        .stderr(predicate::str::contains("Compiling").not());
}

#[test]
fn test_release_build_uses_release_dir() {
    if !has_build_tools() {
        eprintln!("skipping: make or a C++ compiler is unavailable");
        return;
    }

    let tmp = temp_dir();
    let root = new_package(&tmp, "relpkg");

    cabin()
        .args(["build", "--release"])
        .current_dir(&root)
        .assert()
        .success()
        .stderr(predicate::str::contains("`release` profile [optimized]"));

    assert!(root.join("cabin-out/release/relpkg").is_file());
}

#[test]
fn test_unittest_discovery_and_run() {
    if !has_build_tools() {
        eprintln!("skipping: make or a C++ compiler is unavailable");
        return;
    }

    let tmp = temp_dir();
    let root = new_package(&tmp, "testable");

    fs::write(
        root.join("src/algo.cc"),
        "int add(int a, int b) { return a + b; }\n\n\
         #ifdef CABIN_TEST\n\
         int main() { return add(1, 2) == 3 ? 0 : 1; }\n\
         #endif\n",
    )
    .unwrap();

    cabin()
        .arg("test")
        .current_dir(&root)
        .assert()
        .success()
        .stderr(
            predicate::str::contains("Running")
                .and(predicate::str::contains("unittests src/algo.cc"))
                .and(predicate::str::contains("1 passed; 0 failed")),
        );

    assert!(root.join("cabin-out/debug/unittests/algo.cc.test").is_file());
}

#[test]
fn test_source_without_test_code_produces_no_test_target() {
    if !has_build_tools() {
        eprintln!("skipping: make or a C++ compiler is unavailable");
        return;
    }

    let tmp = temp_dir();
    let root = new_package(&tmp, "notests");

    // The token only appears inside a comment, so preprocessing with
    // and without the macro agree and no test target is created.
    fs::write(
        root.join("src/algo.cc"),
        "// CABIN_TEST is mentioned here only in prose.\n\
         int add(int a, int b) { return a + b; }\n",
    )
    .unwrap();

    cabin()
        .arg("test")
        .current_dir(&root)
        .assert()
        .success()
        .stderr(predicate::str::contains("No test targets found"));
}

#[test]
fn test_compdb_generation() {
    if !has_build_tools() {
        eprintln!("skipping: make or a C++ compiler is unavailable");
        return;
    }

    let tmp = temp_dir();
    let root = new_package(&tmp, "compdbpkg");

    cabin()
        .args(["build", "--compdb"])
        .current_dir(&root)
        .assert()
        .success()
        .stderr(predicate::str::contains("compile_commands.json"));

    let compdb = root.join("cabin-out/debug/compile_commands.json");
    let rendered = fs::read_to_string(&compdb).unwrap();
    let entries: serde_json::Value = serde_json::from_str(&rendered).unwrap();
    let entries = entries.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["file"], "src/main.cc");
}

#[test]
fn test_makefile_is_deterministic() {
    if !has_build_tools() {
        eprintln!("skipping: make or a C++ compiler is unavailable");
        return;
    }

    let tmp = temp_dir();
    let root = new_package(&tmp, "deterministic");
    fs::write(root.join("src/util.cc"), "int helper() { return 42; }\n").unwrap();

    cabin().arg("build").current_dir(&root).assert().success();
    let first = fs::read_to_string(root.join("cabin-out/debug/Makefile")).unwrap();

    // Touch a source to force regeneration, then compare byte-for-byte.
    cabin()
        .args(["clean"])
        .current_dir(&root)
        .assert()
        .success();
    cabin().arg("build").current_dir(&root).assert().success();
    let second = fs::read_to_string(root.join("cabin-out/debug/Makefile")).unwrap();

    assert_eq!(first, second);
}

#[test]
fn test_clean_removes_out_dir() {
    if !has_build_tools() {
        eprintln!("skipping: make or a C++ compiler is unavailable");
        return;
    }

    let tmp = temp_dir();
    let root = new_package(&tmp, "cleanpkg");

    cabin().arg("build").current_dir(&root).assert().success();
    assert!(root.join("cabin-out").is_dir());

    cabin()
        .arg("clean")
        .current_dir(&root)
        .assert()
        .success()
        .stderr(predicate::str::contains("Removing"));
    assert!(!root.join("cabin-out").exists());
}

#[test]
fn test_clean_rejects_unknown_profile() {
    let tmp = temp_dir();
    let root = new_package(&tmp, "cleanbad");

    cabin()
        .args(["clean", "-p", "fastest"])
        .current_dir(&root)
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid argument for --profile"));
}

#[test]
fn test_multiple_main_sources_rejected() {
    if !has_build_tools() {
        eprintln!("skipping: make or a C++ compiler is unavailable");
        return;
    }

    let tmp = temp_dir();
    let root = new_package(&tmp, "twomains");
    fs::write(root.join("src/main.cpp"), "int main() { return 0; }\n").unwrap();

    cabin()
        .arg("build")
        .current_dir(&root)
        .assert()
        .failure()
        .stderr(predicate::str::contains("multiple main sources were found"));
}

#[test]
fn test_nested_main_warns_but_builds() {
    if !has_build_tools() {
        eprintln!("skipping: make or a C++ compiler is unavailable");
        return;
    }

    let tmp = temp_dir();
    let root = new_package(&tmp, "nestedmain");
    fs::create_dir_all(root.join("src/tools")).unwrap();
    fs::write(
        root.join("src/tools/main.cc"),
        "int tool_entry() { return 0; }\n",
    )
    .unwrap();

    cabin()
        .arg("build")
        .current_dir(&root)
        .assert()
        .success()
        .stderr(predicate::str::contains("is named `main` but is not located"));
}

//! Captures git and toolchain metadata for `cabin version`.

use std::process::Command;

fn git(args: &[&str]) -> Option<String> {
    let out = Command::new("git").args(args).output().ok()?;
    if !out.status.success() {
        return None;
    }
    let s = String::from_utf8(out.stdout).ok()?;
    let s = s.trim().to_string();
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

fn rustc_version() -> Option<String> {
    let rustc = std::env::var("RUSTC").unwrap_or_else(|_| "rustc".into());
    let out = Command::new(rustc).arg("-V").output().ok()?;
    String::from_utf8(out.stdout)
        .ok()
        .map(|s| s.trim().to_string())
}

fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");

    if let Some(hash) = git(&["rev-parse", "HEAD"]) {
        println!("cargo:rustc-env=CABIN_COMMIT_HASH={hash}");
        println!(
            "cargo:rustc-env=CABIN_COMMIT_SHORT_HASH={}",
            &hash[..hash.len().min(8)]
        );
    }
    if let Some(date) = git(&["log", "-1", "--format=%cd", "--date=short"]) {
        println!("cargo:rustc-env=CABIN_COMMIT_DATE={date}");
    }
    if let Some(rustc) = rustc_version() {
        println!("cargo:rustc-env=CABIN_RUSTC_VERSION={rustc}");
    }

    let date = Command::new("date")
        .arg("+%Y-%m-%d")
        .output()
        .ok()
        .and_then(|out| String::from_utf8(out.stdout).ok())
        .map(|s| s.trim().to_string())
        .unwrap_or_default();
    if !date.is_empty() {
        println!("cargo:rustc-env=CABIN_COMPILE_DATE={date}");
    }
}

//! `cabin version` command

use anyhow::Result;

use cabin::Shell;

const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");
const COMMIT_HASH: &str = match option_env!("CABIN_COMMIT_HASH") {
    Some(hash) => hash,
    None => "",
};
const COMMIT_SHORT_HASH: &str = match option_env!("CABIN_COMMIT_SHORT_HASH") {
    Some(hash) => hash,
    None => "",
};
const COMMIT_DATE: &str = match option_env!("CABIN_COMMIT_DATE") {
    Some(date) => date,
    None => "",
};
const COMPILE_DATE: &str = match option_env!("CABIN_COMPILE_DATE") {
    Some(date) => date,
    None => "",
};
const COMPILER: &str = match option_env!("CABIN_RUSTC_VERSION") {
    Some(rustc) => rustc,
    None => "unknown",
};

/// ` (<short-hash> <date>)`, degrading gracefully when either half is
/// missing from the build environment.
fn commit_info() -> String {
    match (COMMIT_SHORT_HASH.is_empty(), COMMIT_DATE.is_empty()) {
        (true, true) => String::new(),
        (true, false) => format!(" ({COMMIT_DATE})"),
        (false, true) => format!(" ({COMMIT_SHORT_HASH})"),
        (false, false) => format!(" ({COMMIT_SHORT_HASH} {COMMIT_DATE})"),
    }
}

pub fn execute(shell: &Shell) -> Result<()> {
    println!("cabin {PKG_VERSION}{}", commit_info());
    if shell.is_verbose() {
        println!(
            "release: {PKG_VERSION}\n\
             commit-hash: {COMMIT_HASH}\n\
             commit-date: {COMMIT_DATE}\n\
             compiler: {COMPILER}\n\
             compile-date: {COMPILE_DATE}"
        );
    }
    Ok(())
}

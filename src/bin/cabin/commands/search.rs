//! `cabin search` command
//!
//! System packages are the only registry cabin knows about, so search
//! walks pkg-config's module list.

use anyhow::{bail, Result};

use cabin::util::process::{command_exists, get_cmd_output, Command};

use crate::cli::SearchArgs;

/// Filter `pkg-config --list-all` lines by a case-insensitive
/// substring match on the name or description.
fn matching_packages(list_output: &str, query: &str) -> Vec<String> {
    let query = query.to_lowercase();
    list_output
        .lines()
        .filter(|line| line.to_lowercase().contains(&query))
        .map(ToString::to_string)
        .collect()
}

pub fn execute(args: SearchArgs) -> Result<()> {
    if !command_exists("pkg-config") {
        bail!("search command requires pkg-config");
    }

    let output = get_cmd_output(&Command::new("pkg-config").arg("--list-all"))?;
    let matches = matching_packages(&output, &args.query);
    if matches.is_empty() {
        bail!("no packages found for `{}`", args.query);
    }
    for line in matches {
        println!("{line}");
    }
    Ok(())
}

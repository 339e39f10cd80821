//! `cabin add` command

use anyhow::Result;

use cabin::core::manifest::find_manifest;
use cabin::ops::edit_manifest::{add_dependencies, AddOptions};
use cabin::Shell;

use crate::cli::AddArgs;

pub fn execute(args: AddArgs, shell: &Shell) -> Result<()> {
    let cwd = std::env::current_dir()?;
    let manifest_path = find_manifest(cwd)?;

    let opts = AddOptions {
        deps: args.deps,
        sys: args.sys,
        version: args.version,
        tag: args.tag,
        rev: args.rev,
        branch: args.branch,
    };
    add_dependencies(&manifest_path, &opts, shell)
}

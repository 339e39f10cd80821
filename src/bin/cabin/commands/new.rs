//! `cabin new` command

use anyhow::Result;

use cabin::ops::new_package::{new_package, NewOptions};
use cabin::Shell;

use crate::cli::NewArgs;

pub fn execute(args: NewArgs, shell: &Shell) -> Result<()> {
    let opts = NewOptions {
        name: args.name.unwrap_or_default(),
        lib: args.lib,
    };
    new_package(&opts, shell)
}

//! `cabin init` command

use anyhow::Result;

use cabin::ops::new_package::init_package;
use cabin::Shell;

use crate::cli::InitArgs;

pub fn execute(args: InitArgs, shell: &Shell) -> Result<()> {
    init_package(args.lib, shell)
}

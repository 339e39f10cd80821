//! High-level operations shared by the CLI commands.

pub mod edit_manifest;
pub mod new_package;

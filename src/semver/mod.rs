//! SemVer 2.0.0 versions and Cargo-style version requirements.
//!
//! The parser reports errors in a two-line format: the offending input,
//! then a caret underline pointing at the problem.

mod lexer;
mod req;
mod version;

pub use req::{Comparator, Op, VersionReq};
pub use version::{BuildMetadata, Identifier, Prerelease, Version};

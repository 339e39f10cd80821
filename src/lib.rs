//! Cabin - A Cargo-like package manager and build system for C++
//!
//! This crate provides the core library functionality for Cabin,
//! including manifest parsing, dependency installation, and the
//! Makefile-based incremental build pipeline.

pub mod builder;
pub mod core;
pub mod ops;
pub mod semver;
pub mod util;

pub use crate::core::dependency::Dependency;
pub use crate::core::manifest::{Edition, Manifest, Package, Profile};

pub use crate::builder::build_config::BuildConfig;
pub use crate::builder::options::CompilerOptions;
pub use crate::builder::project::{BuildProfile, Project};
pub use crate::semver::{Version, VersionReq};
pub use crate::util::shell::Shell;

//! Dependencies: git checkouts, local paths, and pkg-config packages.
//!
//! Installing a dependency is side-effecting (git clones land in the
//! shared cache) and yields the [`CompilerOptions`] the dependency
//! contributes to the build.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use directories::BaseDirs;

use crate::builder::options::{CompilerOptions, IncludeDir};
use crate::semver::VersionReq;
use crate::util::Shell;

/// Where git dependencies are checked out:
/// `<XDG_CACHE_HOME or ~/.cache>/cabin/git/src`.
pub fn git_src_dir() -> Result<PathBuf> {
    let dirs = BaseDirs::new().context("failed to locate the user cache directory")?;
    Ok(dirs.cache_dir().join("cabin").join("git").join("src"))
}

/// A dependency declared in `[dependencies]` or `[dev-dependencies]`.
#[derive(Debug, Clone)]
pub enum Dependency {
    Git(GitDependency),
    Path(PathDependency),
    System(SystemDependency),
}

#[derive(Debug, Clone)]
pub struct GitDependency {
    pub name: String,
    pub url: String,
    /// rev, tag, or branch to check out.
    pub target: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PathDependency {
    pub name: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct SystemDependency {
    pub name: String,
    pub version_req: VersionReq,
}

/// Returns an error if the dependency name is invalid.
pub fn validate_dep_name(name: &str) -> Result<()> {
    if name.is_empty() {
        bail!("dependency name is empty");
    }

    let bytes = name.as_bytes();
    let is_allowed = |b: u8| b"-_/.+".contains(&b);

    if !bytes[0].is_ascii_alphanumeric() {
        bail!("dependency name must start with an alphanumeric character");
    }
    let last = bytes[bytes.len() - 1];
    if !last.is_ascii_alphanumeric() && last != b'+' {
        bail!("dependency name must end with an alphanumeric character or `+`");
    }

    for &b in bytes {
        if !b.is_ascii_alphanumeric() && !is_allowed(b) {
            bail!("dependency name must be alphanumeric, `-`, `_`, `/`, `.`, or `+`");
        }
    }

    for i in 1..bytes.len() {
        if bytes[i] == b'+' {
            // The `+` pair is validated as a unit below.
            continue;
        }
        if !bytes[i].is_ascii_alphanumeric() && bytes[i] == bytes[i - 1] {
            bail!("dependency name must not contain consecutive non-alphanumeric characters");
        }
    }
    for i in 1..bytes.len().saturating_sub(1) {
        if bytes[i] != b'.' {
            continue;
        }
        if !bytes[i - 1].is_ascii_digit() || !bytes[i + 1].is_ascii_digit() {
            bail!("dependency name must contain `.` wrapped by digits");
        }
    }

    let slashes = bytes.iter().filter(|&&b| b == b'/').count();
    if slashes > 1 {
        bail!("dependency name must not contain more than one `/`");
    }
    let pluses = bytes.iter().filter(|&&b| b == b'+').count();
    if pluses != 0 && pluses != 2 {
        bail!("dependency name must contain zero or two `+`");
    }
    if pluses == 2 {
        let first = name.find('+').unwrap_or(0);
        let last = name.rfind('+').unwrap_or(0);
        if first + 1 != last {
            bail!("`+` in the dependency name must be consecutive");
        }
    }
    Ok(())
}

impl Dependency {
    pub fn name(&self) -> &str {
        match self {
            Dependency::Git(dep) => &dep.name,
            Dependency::Path(dep) => &dep.name,
            Dependency::System(dep) => &dep.name,
        }
    }

    /// Parse one `[dependencies]` entry. The entry must be a table with
    /// a `git`, `system`, or `path` key.
    pub fn from_toml(name: &str, value: &toml::Value) -> Result<Dependency> {
        validate_dep_name(name).with_context(|| format!("invalid dependency name: `{name}`"))?;

        if let Some(info) = value.as_table() {
            if let Some(git) = info.get("git") {
                let Some(url) = git.as_str() else {
                    bail!("git dependency `{name}` must have a string `git` URL");
                };
                // rev > tag > branch
                let mut target = None;
                for key in ["rev", "tag", "branch"] {
                    if let Some(val) = info.get(key).and_then(|v| v.as_str()) {
                        target = Some(val.to_string());
                        break;
                    }
                }
                return Ok(Dependency::Git(GitDependency {
                    name: name.to_string(),
                    url: url.to_string(),
                    target,
                }));
            }
            if info.get("system").and_then(|v| v.as_bool()) == Some(true) {
                let Some(version) = info.get("version").and_then(|v| v.as_str()) else {
                    bail!("system dependency `{name}` must have a string `version`");
                };
                let version_req = VersionReq::parse(version).with_context(|| {
                    format!("invalid version requirement for system dependency `{name}`")
                })?;
                return Ok(Dependency::System(SystemDependency {
                    name: name.to_string(),
                    version_req,
                }));
            }
            if let Some(path) = info.get("path") {
                let Some(path) = path.as_str() else {
                    bail!("path dependency `{name}` must have a string `path`");
                };
                return Ok(Dependency::Path(PathDependency {
                    name: name.to_string(),
                    path: PathBuf::from(path),
                }));
            }
        }

        bail!(
            "Only Git dependency, path dependency, and system dependency are \
             supported for now: {name}"
        )
    }

    /// Install the dependency and return the compiler options it
    /// contributes.
    pub fn install(&self, shell: &Shell) -> Result<CompilerOptions> {
        match self {
            Dependency::Git(dep) => dep.install(shell),
            Dependency::Path(dep) => dep.install(),
            Dependency::System(dep) => dep.install(),
        }
    }
}

/// The include directory a checkout contributes: `<dir>/include` when it
/// exists and is non-empty, otherwise the checkout root. Dependency
/// headers are system includes so they stay warning-free.
fn include_options(install_dir: &std::path::Path) -> CompilerOptions {
    let include_dir = install_dir.join("include");
    let dir = if include_dir.is_dir() && std::fs::read_dir(&include_dir).map_or(false, |mut entries| entries.next().is_some()) {
        include_dir
    } else {
        install_dir.to_path_buf()
    };

    let mut opts = CompilerOptions::default();
    opts.cflags.include_dirs.push(IncludeDir::system(dir));
    opts
}

fn dir_exists_non_empty(dir: &std::path::Path) -> bool {
    std::fs::read_dir(dir).map_or(false, |mut entries| entries.next().is_some())
}

impl GitDependency {
    pub fn install(&self, shell: &Shell) -> Result<CompilerOptions> {
        let mut install_dir = git_src_dir()?.join(&self.name);
        if let Some(ref target) = self.target {
            install_dir = PathBuf::from(format!("{}-{target}", install_dir.display()));
        }

        if dir_exists_non_empty(&install_dir) {
            tracing::debug!("{} is already installed", self.name);
        } else {
            let repo = git2::Repository::clone(&self.url, &install_dir)
                .with_context(|| format!("failed to clone `{}`", self.url))?;

            if let Some(ref target) = self.target {
                let obj = repo
                    .revparse_single(target)
                    .with_context(|| format!("failed to resolve `{target}` in `{}`", self.url))?;
                repo.set_head_detached(obj.id())?;
                let mut checkout = git2::build::CheckoutBuilder::new();
                checkout.force();
                repo.checkout_head(Some(&mut checkout))?;
            }

            shell.status(
                "Downloaded",
                format!(
                    "{} {}",
                    self.name,
                    self.target.as_deref().unwrap_or(&self.url)
                ),
            );
        }

        Ok(include_options(&install_dir))
    }
}

impl PathDependency {
    pub fn install(&self) -> Result<CompilerOptions> {
        let install_dir = std::fs::canonicalize(&self.path)
            .with_context(|| format!("{} can't be accessible as directory", self.path.display()))?;
        if !dir_exists_non_empty(&install_dir) {
            bail!("{} can't be accessible as directory", install_dir.display());
        }
        tracing::debug!("{} is already installed", self.name);

        Ok(include_options(&install_dir))
    }
}

impl SystemDependency {
    pub fn install(&self) -> Result<CompilerOptions> {
        CompilerOptions::from_pkg_config(&self.version_req, &self.name)
            .with_context(|| format!("failed to install system dependency `{}`", self.name))
    }
}

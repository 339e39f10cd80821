//! cabin.toml manifest parsing and validation.
//!
//! The manifest is immutable after load: `[package]` metadata, normal and
//! dev dependencies, the `dev`/`release` profiles (seeded from a shared
//! `[profile]` base section), and lint settings.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::core::dependency::Dependency;
use crate::semver::Version;
use crate::util::Shell;

pub const MANIFEST_FILE_NAME: &str = "cabin.toml";

/// Every C++ keyword, rejected as a package name.
const CPP_KEYWORDS: &[&str] = &[
    "alignas",
    "alignof",
    "and",
    "and_eq",
    "asm",
    "atomic_cancel",
    "atomic_commit",
    "atomic_noexcept",
    "auto",
    "bitand",
    "bitor",
    "bool",
    "break",
    "case",
    "catch",
    "char",
    "char16_t",
    "char32_t",
    "char8_t",
    "class",
    "co_await",
    "co_return",
    "co_yield",
    "compl",
    "concept",
    "const",
    "const_cast",
    "consteval",
    "constexpr",
    "constinit",
    "continue",
    "decltype",
    "default",
    "delete",
    "do",
    "double",
    "dynamic_cast",
    "else",
    "enum",
    "explicit",
    "export",
    "extern",
    "false",
    "float",
    "for",
    "friend",
    "goto",
    "if",
    "inline",
    "int",
    "long",
    "mutable",
    "namespace",
    "new",
    "noexcept",
    "not",
    "not_eq",
    "nullptr",
    "operator",
    "or",
    "or_eq",
    "private",
    "protected",
    "public",
    "reflexpr",
    "register",
    "reinterpret_cast",
    "requires",
    "return",
    "short",
    "signed",
    "sizeof",
    "static",
    "static_assert",
    "static_cast",
    "struct",
    "switch",
    "synchronized",
    "template",
    "this",
    "thread_local",
    "throw",
    "true",
    "try",
    "typedef",
    "typeid",
    "typename",
    "union",
    "unsigned",
    "using",
    "virtual",
    "void",
    "volatile",
    "wchar_t",
    "while",
];

/// A C++ language edition. The code string the user wrote is retained
/// for `-std=c++<code>` formatting; the year is used for comparisons.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edition {
    year: u16,
    code: String,
}

impl Edition {
    pub fn try_from_str(code: &str) -> Result<Edition> {
        let year = match code {
            "98" => 1998,
            "03" => 2003,
            "0x" | "11" => 2011,
            "1y" | "14" => 2014,
            "1z" | "17" => 2017,
            "2a" | "20" => 2020,
            "2b" | "23" => 2023,
            "2c" => 2026,
            _ => bail!("invalid edition: `{code}`"),
        };
        Ok(Edition {
            year,
            code: code.to_string(),
        })
    }

    /// The code string as written in the manifest (e.g. `20` or `2a`).
    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn year(&self) -> u16 {
        self.year
    }
}

impl fmt::Display for Edition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code)
    }
}

impl PartialOrd for Edition {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.year.cmp(&other.year))
    }
}

/// `[package]` metadata.
#[derive(Debug, Clone)]
pub struct Package {
    pub name: String,
    pub edition: Edition,
    pub version: Version,
}

/// A named bundle of compiler and linker settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub cxxflags: Vec<String>,
    pub ldflags: Vec<String>,
    pub lto: bool,
    pub debug: bool,
    pub comp_db: bool,
    pub opt_level: u8,
}

impl Profile {
    /// The bracketed description used in `Finished` lines, e.g.
    /// `unoptimized + debuginfo`.
    pub fn description(&self) -> String {
        let mut desc = if self.opt_level == 0 {
            "unoptimized".to_string()
        } else {
            "optimized".to_string()
        };
        if self.debug {
            desc.push_str(" + debuginfo");
        }
        desc
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// The `dev` and `release` profiles; both always exist.
#[derive(Debug, Clone)]
pub struct Profiles {
    pub dev: Profile,
    pub release: Profile,
}

/// `[lint.cpplint]` settings.
#[derive(Debug, Clone, Default)]
pub struct Lint {
    pub cpplint: Cpplint,
}

#[derive(Debug, Clone, Default)]
pub struct Cpplint {
    pub filters: Vec<String>,
}

/// The parsed cabin.toml manifest.
#[derive(Debug, Clone)]
pub struct Manifest {
    /// Absolute path to the manifest file.
    pub path: PathBuf,
    pub package: Package,
    pub dependencies: Vec<Dependency>,
    pub dev_dependencies: Vec<Dependency>,
    pub profiles: Profiles,
    pub lint: Lint,
}

#[derive(Debug, Deserialize)]
struct RawManifest {
    package: RawPackage,

    #[serde(default)]
    dependencies: Option<toml::Table>,

    #[serde(default, rename = "dev-dependencies")]
    dev_dependencies: Option<toml::Table>,

    #[serde(default)]
    profile: RawProfiles,

    #[serde(default)]
    lint: Option<RawLint>,
}

#[derive(Debug, Deserialize)]
struct RawPackage {
    name: String,
    edition: String,
    version: String,
}

#[derive(Debug, Default, Deserialize)]
struct RawProfiles {
    #[serde(flatten)]
    base: RawProfile,

    #[serde(default)]
    dev: RawProfile,

    #[serde(default)]
    release: RawProfile,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RawProfile {
    #[serde(default)]
    cxxflags: Option<Vec<String>>,

    #[serde(default)]
    ldflags: Option<Vec<String>>,

    #[serde(default)]
    lto: Option<bool>,

    #[serde(default)]
    debug: Option<bool>,

    #[serde(default)]
    comp_db: Option<bool>,

    #[serde(default)]
    opt_level: Option<u8>,
}

#[derive(Debug, Default, Deserialize)]
struct RawLint {
    #[serde(default)]
    cpplint: Option<RawCpplint>,
}

#[derive(Debug, Default, Deserialize)]
struct RawCpplint {
    #[serde(default)]
    filters: Vec<String>,
}

/// Returns an error if the package name is invalid.
pub fn validate_package_name(name: &str) -> Result<()> {
    if name.is_empty() {
        bail!("package name must not be empty");
    }
    if name.len() == 1 {
        bail!("package name must be more than one character");
    }
    for c in name.chars() {
        if !c.is_ascii_lowercase() && !c.is_ascii_digit() && c != '-' && c != '_' {
            bail!(
                "package name must only contain lowercase letters, numbers, \
                 dashes, and underscores"
            );
        }
    }
    if !name.chars().next().is_some_and(|c| c.is_ascii_alphabetic()) {
        bail!("package name must start with a letter");
    }
    if !name.chars().last().is_some_and(|c| c.is_ascii_alphanumeric()) {
        bail!("package name must end with a letter or digit");
    }
    if CPP_KEYWORDS.contains(&name) {
        bail!("package name must not be a C++ keyword");
    }
    Ok(())
}

fn validate_flag(kind: &str, flag: &str) -> Result<()> {
    if !flag.starts_with('-') {
        bail!("{kind} must start with `-`");
    }
    for c in flag.chars() {
        if !c.is_ascii_alphanumeric() && !"-_=+:.".contains(c) {
            bail!(
                "{kind} must only contain alphanumeric characters, `-`, `_`, \
                 `=`, `+`, `:`, or `.`"
            );
        }
    }
    Ok(())
}

fn validate_flags(kind: &str, flags: &[String]) -> Result<()> {
    for flag in flags {
        validate_flag(kind, flag)?;
    }
    Ok(())
}

fn validate_opt_level(opt_level: u8) -> Result<u8> {
    if opt_level > 3 {
        bail!("opt-level must be between 0 and 3");
    }
    Ok(opt_level)
}

/// Merge the base `[profile]` section with a per-profile override and
/// the profile's built-in defaults.
fn build_profile(
    base: &RawProfile,
    over: &RawProfile,
    default_debug: bool,
    default_opt_level: u8,
) -> Result<Profile> {
    let cxxflags = over
        .cxxflags
        .clone()
        .or_else(|| base.cxxflags.clone())
        .unwrap_or_default();
    validate_flags("cxxflag", &cxxflags)?;

    let ldflags = over
        .ldflags
        .clone()
        .or_else(|| base.ldflags.clone())
        .unwrap_or_default();
    validate_flags("ldflag", &ldflags)?;

    Ok(Profile {
        cxxflags,
        ldflags,
        lto: over.lto.or(base.lto).unwrap_or(false),
        debug: over.debug.or(base.debug).unwrap_or(default_debug),
        comp_db: over.comp_db.or(base.comp_db).unwrap_or(false),
        opt_level: validate_opt_level(
            over.opt_level.or(base.opt_level).unwrap_or(default_opt_level),
        )?,
    })
}

fn parse_dependencies(table: Option<&toml::Table>) -> Result<Vec<Dependency>> {
    let Some(table) = table else {
        return Ok(Vec::new());
    };
    table
        .iter()
        .map(|(name, value)| Dependency::from_toml(name, value))
        .collect()
}

/// Ascend from `candidate` toward the filesystem root, returning the
/// nearest directory's cabin.toml.
pub fn find_manifest(mut candidate: PathBuf) -> Result<PathBuf> {
    loop {
        let config = candidate.join(MANIFEST_FILE_NAME);
        tracing::trace!("Finding manifest: {}", config.display());
        if config.exists() {
            return Ok(config);
        }
        if !candidate.pop() {
            bail!("could not find `cabin.toml` here and in its parents");
        }
    }
}

impl Manifest {
    /// Parse the manifest at `path`. With `find_parents`, ascend from
    /// the path's directory until a cabin.toml is found.
    pub fn try_parse(path: PathBuf, find_parents: bool) -> Result<Manifest> {
        let path = if find_parents {
            let start = path.parent().unwrap_or(Path::new(".")).to_path_buf();
            find_manifest(start)?
        } else {
            path
        };
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read manifest: {}", path.display()))?;
        Self::parse(&content, path)
    }

    /// Locate and parse the manifest governing the current directory.
    pub fn from_cwd() -> Result<Manifest> {
        let cwd = std::env::current_dir().context("failed to get current directory")?;
        Self::try_parse(cwd.join(MANIFEST_FILE_NAME), true)
    }

    /// Parse manifest content; `path` is recorded for diagnostics and
    /// project-root derivation.
    pub fn parse(content: &str, path: PathBuf) -> Result<Manifest> {
        let raw: RawManifest =
            toml::from_str(content).with_context(|| "failed to parse cabin.toml")?;

        validate_package_name(&raw.package.name)
            .with_context(|| format!("invalid package name: `{}`", raw.package.name))?;
        let edition = Edition::try_from_str(&raw.package.edition)?;
        let version = Version::parse(&raw.package.version)
            .with_context(|| "invalid package version")?;

        let dependencies = parse_dependencies(raw.dependencies.as_ref())?;
        let dev_dependencies = parse_dependencies(raw.dev_dependencies.as_ref())?;

        let profiles = Profiles {
            dev: build_profile(&raw.profile.base, &raw.profile.dev, true, 0)
                .with_context(|| "invalid [profile.dev]")?,
            release: build_profile(&raw.profile.base, &raw.profile.release, false, 3)
                .with_context(|| "invalid [profile.release]")?,
        };

        let lint = Lint {
            cpplint: Cpplint {
                filters: raw
                    .lint
                    .and_then(|l| l.cpplint)
                    .map(|c| c.filters)
                    .unwrap_or_default(),
            },
        };

        Ok(Manifest {
            path,
            package: Package {
                name: raw.package.name,
                edition,
                version,
            },
            dependencies,
            dev_dependencies,
            profiles,
            lint,
        })
    }

    /// The directory containing the manifest.
    pub fn project_root(&self) -> &Path {
        self.path.parent().unwrap_or(Path::new("."))
    }

    /// Install every dependency (and dev dependency when requested),
    /// returning the compiler options each contributes, in manifest
    /// order.
    pub fn install_deps(
        &self,
        include_dev_deps: bool,
        shell: &Shell,
    ) -> Result<Vec<crate::builder::options::CompilerOptions>> {
        let mut installed = Vec::new();
        for dep in &self.dependencies {
            installed.push(dep.install(shell)?);
        }
        if include_dev_deps {
            for dep in &self.dev_dependencies {
                installed.push(dep.install(shell)?);
            }
        }
        Ok(installed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str) -> Result<Manifest> {
        Manifest::parse(content, PathBuf::from("/tmp/test/cabin.toml"))
    }

    const BASIC: &str = r#"
[package]
name = "mypkg"
edition = "20"
version = "1.2.3"
"#;

    #[test]
    fn test_parse_basic_manifest() {
        let manifest = parse(BASIC).unwrap();
        assert_eq!(manifest.package.name, "mypkg");
        assert_eq!(manifest.package.edition.code(), "20");
        assert_eq!(manifest.package.version, Version::new(1, 2, 3));
        assert!(manifest.dependencies.is_empty());
        assert_eq!(manifest.project_root(), Path::new("/tmp/test"));
    }

    #[test]
    fn test_profile_defaults() {
        let manifest = parse(BASIC).unwrap();
        let dev = &manifest.profiles.dev;
        assert!(dev.debug);
        assert_eq!(dev.opt_level, 0);
        assert!(!dev.lto);

        let release = &manifest.profiles.release;
        assert!(!release.debug);
        assert_eq!(release.opt_level, 3);
        assert!(!release.lto);
    }

    #[test]
    fn test_profile_base_inheritance() {
        let manifest = parse(
            r#"
[package]
name = "mypkg"
edition = "20"
version = "0.1.0"

[profile]
cxxflags = ["-Wall"]
lto = true

[profile.release]
cxxflags = ["-Wextra"]
"#,
        )
        .unwrap();
        // dev inherits the base flags; release overrides them.
        assert_eq!(manifest.profiles.dev.cxxflags, vec!["-Wall"]);
        assert!(manifest.profiles.dev.lto);
        assert_eq!(manifest.profiles.release.cxxflags, vec!["-Wextra"]);
        assert!(manifest.profiles.release.lto);
        // Built-in defaults still apply where the base is silent.
        assert!(manifest.profiles.dev.debug);
        assert!(!manifest.profiles.release.debug);
    }

    #[test]
    fn test_profile_opt_level_validation() {
        let err = parse(
            r#"
[package]
name = "mypkg"
edition = "20"
version = "0.1.0"

[profile.dev]
opt-level = 4
"#,
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("opt-level must be between 0 and 3"));
    }

    #[test]
    fn test_profile_flag_validation() {
        let err = parse(
            r#"
[package]
name = "mypkg"
edition = "20"
version = "0.1.0"

[profile]
cxxflags = ["Wall"]
"#,
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("cxxflag must start with `-`"));

        let err = parse(
            r#"
[package]
name = "mypkg"
edition = "20"
version = "0.1.0"

[profile]
ldflags = ["-Wl,--gc-sections"]
"#,
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("ldflag must only contain"));
    }

    #[test]
    fn test_edition_codes() {
        for (code, year) in [
            ("98", 1998),
            ("03", 2003),
            ("0x", 2011),
            ("11", 2011),
            ("1y", 2014),
            ("14", 2014),
            ("1z", 2017),
            ("17", 2017),
            ("2a", 2020),
            ("20", 2020),
            ("2b", 2023),
            ("23", 2023),
            ("2c", 2026),
        ] {
            let edition = Edition::try_from_str(code).unwrap();
            assert_eq!(edition.year(), year);
            assert_eq!(edition.code(), code);
        }
        assert!(Edition::try_from_str("24").is_err());
        assert!(Edition::try_from_str("").is_err());
    }

    #[test]
    fn test_edition_ordering() {
        let cpp11 = Edition::try_from_str("11").unwrap();
        let cpp98 = Edition::try_from_str("98").unwrap();
        let cpp20 = Edition::try_from_str("20").unwrap();
        assert!(cpp98 < cpp11);
        assert!(cpp11 < cpp20);
        // Aliases compare equal to their canonical code.
        assert_eq!(
            Edition::try_from_str("0x").unwrap().year(),
            cpp11.year()
        );
    }

    #[test]
    fn test_validate_package_name() {
        for name in ["hello", "hello_world", "my-pkg2", "a2"] {
            assert!(validate_package_name(name).is_ok(), "{name}");
        }

        let cases = [
            ("", "must not be empty"),
            ("a", "more than one character"),
            ("Hello", "lowercase"),
            ("1abc", "start with a letter"),
            ("abc-", "end with a letter or digit"),
            ("class", "C++ keyword"),
            ("my pkg", "lowercase"),
        ];
        for (name, msg) in cases {
            let err = validate_package_name(name).unwrap_err();
            assert!(
                err.to_string().contains(msg),
                "{name}: {err}"
            );
        }
    }

    #[test]
    fn test_parse_dependencies() {
        let manifest = parse(
            r#"
[package]
name = "mypkg"
edition = "20"
version = "0.1.0"

[dependencies]
toml11 = { git = "https://github.com/ToruNiina/toml11.git", rev = "v3.7.1" }
local = { path = "../local" }
fmt = { version = ">=9, <12", system = true }

[dev-dependencies]
doctest = { git = "https://github.com/doctest/doctest.git" }
"#,
        )
        .unwrap();
        assert_eq!(manifest.dependencies.len(), 3);
        assert_eq!(manifest.dev_dependencies.len(), 1);
    }

    #[test]
    fn test_unknown_dependency_shape() {
        let err = parse(
            r#"
[package]
name = "mypkg"
edition = "20"
version = "0.1.0"

[dependencies]
mystery = { registry = "crates.io" }
"#,
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("Only Git dependency, path dependency"));
    }

    #[test]
    fn test_lint_filters() {
        let manifest = parse(
            r#"
[package]
name = "mypkg"
edition = "20"
version = "0.1.0"

[lint.cpplint]
filters = ["+build/include_order", "-legal/copyright"]
"#,
        )
        .unwrap();
        assert_eq!(
            manifest.lint.cpplint.filters,
            vec!["+build/include_order", "-legal/copyright"]
        );
    }

    #[test]
    fn test_find_manifest_walks_parents() {
        let tmp = tempfile::TempDir::new().unwrap();
        let nested = tmp.path().join("a/b/c");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(tmp.path().join("cabin.toml"), BASIC).unwrap();

        let found = find_manifest(nested).unwrap();
        assert_eq!(found, tmp.path().join("cabin.toml"));
    }

    #[test]
    fn test_find_manifest_missing() {
        let tmp = tempfile::TempDir::new().unwrap();
        let err = find_manifest(tmp.path().to_path_buf()).unwrap_err();
        assert!(err
            .to_string()
            .contains("could not find `cabin.toml` here and in its parents"));
    }

    #[test]
    fn test_profile_description() {
        let manifest = parse(BASIC).unwrap();
        assert_eq!(
            manifest.profiles.dev.description(),
            "unoptimized + debuginfo"
        );
        assert_eq!(manifest.profiles.release.description(), "optimized");
    }
}

//! A project ready to build: manifest, profile, and the fully composed
//! compiler invocation.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::builder::compiler::Compiler;
use crate::builder::options::{IncludeDir, Macro};
use crate::core::manifest::{Manifest, Profile};
use crate::util::{to_macro_name, Shell};

/// Length of the abbreviated commit hash in generated macros.
const SHORT_HASH_LEN: usize = 8;

/// Which profile a build runs under. The profile name (`dev`) and its
/// output directory (`debug`) differ, as they do in Cargo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildProfile {
    #[default]
    Dev,
    Release,
}

impl BuildProfile {
    pub fn name(self) -> &'static str {
        match self {
            BuildProfile::Dev => "dev",
            BuildProfile::Release => "release",
        }
    }

    /// Directory name under `cabin-out/`.
    pub fn dir_name(self) -> &'static str {
        match self {
            BuildProfile::Dev => "debug",
            BuildProfile::Release => "release",
        }
    }

    pub fn from_release_flag(release: bool) -> Self {
        if release {
            BuildProfile::Release
        } else {
            BuildProfile::Dev
        }
    }
}

impl fmt::Display for BuildProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Manifest + profile + environment, composed into one compiler setup
/// and the output directory layout.
#[derive(Debug, Clone)]
pub struct Project {
    pub manifest: Manifest,
    pub compiler: Compiler,
    pub profile: BuildProfile,
    /// `<root>/cabin-out/<debug|release>`
    pub out_base_path: PathBuf,
    /// `<out_base>/<pkgname>.d`, production object files
    pub build_out_path: PathBuf,
    /// `<out_base>/unittests`
    pub unittest_out_path: PathBuf,
}

impl Project {
    pub fn init(manifest: Manifest, profile: BuildProfile, shell: &Shell) -> Result<Project> {
        let mut compiler = Compiler::detect()?;
        let root = manifest.project_root().to_path_buf();

        // Base flags before any profile is applied.
        let include_path = root.join("include");
        if include_path.exists() {
            compiler
                .opts
                .cflags
                .include_dirs
                .push(IncludeDir::local(include_path));
        }
        compiler
            .opts
            .cflags
            .others
            .push(format!("-std=c++{}", manifest.package.edition.code()));
        if shell.use_color() {
            compiler.opts.cflags.others.push("-fdiagnostics-color".into());
        }

        let out_base_path = root.join("cabin-out").join(profile.dir_name());
        let build_out_path = out_base_path.join(format!("{}.d", manifest.package.name));
        let unittest_out_path = out_base_path.join("unittests");

        let mut project = Project {
            manifest,
            compiler,
            profile,
            out_base_path,
            build_out_path,
            unittest_out_path,
        };
        project.apply_profile();
        Ok(project)
    }

    /// The profile selected for this build.
    pub fn selected_profile(&self) -> &Profile {
        match self.profile {
            BuildProfile::Dev => &self.manifest.profiles.dev,
            BuildProfile::Release => &self.manifest.profiles.release,
        }
    }

    fn apply_profile(&mut self) {
        let profile = self.selected_profile().clone();
        let opts = &mut self.compiler.opts;

        if profile.debug {
            opts.cflags.others.push("-g".into());
            opts.cflags.macros.push(Macro::new("DEBUG", ""));
        } else {
            opts.cflags.macros.push(Macro::new("NDEBUG", ""));
        }
        opts.cflags.others.push(format!("-O{}", profile.opt_level));
        if profile.lto {
            opts.cflags.others.push("-flto".into());
        }
        for flag in &profile.cxxflags {
            opts.cflags.others.push(flag.clone());
        }
        // Environment variables take the highest precedence; appended
        // last so they win on conflict.
        for flag in env_flags("CXXFLAGS") {
            opts.cflags.others.push(flag);
        }

        self.define_package_macros();

        let opts = &mut self.compiler.opts;
        for flag in &profile.ldflags {
            opts.ldflags.others.push(flag.clone());
        }
        for flag in env_flags("LDFLAGS") {
            opts.ldflags.others.push(flag);
        }
    }

    /// Built-in `CABIN_<PKGNAME>_*` macros describing the package and
    /// the git state it is built from.
    fn define_package_macros(&mut self) {
        let pkg = &self.manifest.package;
        let pkg_macro = to_macro_name(&pkg.name);
        let version = &pkg.version;

        let (commit_hash, commit_short_hash, commit_date) =
            git_commit_info(self.manifest.project_root());

        // String values are single-quoted then double-quoted so they
        // survive both make and the shell and reach the preprocessor as
        // string literals.
        let quote = |s: &str| format!("'\"{s}\"'");

        let defines: Vec<(&str, String)> = vec![
            ("PKG_NAME", quote(&pkg.name)),
            ("PKG_VERSION", quote(&version.to_string())),
            ("PKG_VERSION_MAJOR", version.major.to_string()),
            ("PKG_VERSION_MINOR", version.minor.to_string()),
            ("PKG_VERSION_PATCH", version.patch.to_string()),
            ("PKG_VERSION_PRE", quote(&version.pre.to_string())),
            ("PKG_VERSION_NUM", version.to_num().to_string()),
            ("COMMIT_HASH", quote(&commit_hash)),
            ("COMMIT_SHORT_HASH", quote(&commit_short_hash)),
            ("COMMIT_DATE", quote(&commit_date)),
            ("PROFILE", quote(self.profile.name())),
        ];
        for (key, value) in defines {
            self.compiler
                .opts
                .cflags
                .macros
                .push(Macro::new(format!("CABIN_{pkg_macro}_{key}"), value));
        }
    }
}

/// Split a flags environment variable, honoring quotes and backslash
/// escapes.
fn env_flags(name: &str) -> Vec<String> {
    match std::env::var(name) {
        Ok(value) => shlex::split(&value).unwrap_or_default(),
        Err(_) => Vec::new(),
    }
}

/// HEAD commit hash, short hash, and date, or empty strings when the
/// project is not inside a git repository.
fn git_commit_info(root: &Path) -> (String, String, String) {
    let info = (|| -> Result<_, git2::Error> {
        let repo = git2::Repository::discover(root)?;
        let oid = repo.head()?.peel_to_commit()?.id();
        let commit = repo.find_commit(oid)?;
        let date = format_epoch_date(commit.time().seconds());
        Ok((oid.to_string(), date))
    })();

    match info {
        Ok((hash, date)) => {
            let short = hash[..hash.len().min(SHORT_HASH_LEN)].to_string();
            (hash, short, date)
        }
        Err(err) => {
            tracing::trace!("No git repository found: {err}");
            (String::new(), String::new(), String::new())
        }
    }
}

/// Render seconds since the Unix epoch as `YYYY-MM-DD` (UTC).
fn format_epoch_date(secs: i64) -> String {
    let days = secs.div_euclid(86_400);
    // Civil-from-days conversion (Howard Hinnant's algorithm).
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = if m <= 2 { y + 1 } else { y };
    format!("{y:04}-{m:02}-{d:02}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_profile_names() {
        assert_eq!(BuildProfile::Dev.name(), "dev");
        assert_eq!(BuildProfile::Dev.dir_name(), "debug");
        assert_eq!(BuildProfile::Release.name(), "release");
        assert_eq!(BuildProfile::Release.dir_name(), "release");
        assert_eq!(BuildProfile::from_release_flag(true), BuildProfile::Release);
        assert_eq!(BuildProfile::from_release_flag(false), BuildProfile::Dev);
    }

    #[test]
    fn test_format_epoch_date() {
        assert_eq!(format_epoch_date(0), "1970-01-01");
        assert_eq!(format_epoch_date(86_400), "1970-01-02");
        // 2000-02-29 (leap day) starts at 951782400.
        assert_eq!(format_epoch_date(951_782_400), "2000-02-29");
        assert_eq!(format_epoch_date(1_704_067_200), "2024-01-01");
    }

    fn test_manifest(content: &str, dir: &Path) -> Manifest {
        Manifest::parse(content, dir.join("cabin.toml")).unwrap()
    }

    #[test]
    fn test_project_flags_for_dev() {
        let _guard = crate::util::TEST_ENV_LOCK
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        let tmp = tempfile::TempDir::new().unwrap();
        let manifest = test_manifest(
            r#"
[package]
name = "mypkg"
edition = "20"
version = "1.2.3"

[profile.dev]
cxxflags = ["-Wall"]
"#,
            tmp.path(),
        );
        std::env::set_var("CXX", "c++");
        let shell = Shell::default();
        let project = Project::init(manifest, BuildProfile::Dev, &shell).unwrap();
        std::env::remove_var("CXX");

        let others = &project.compiler.opts.cflags.others;
        assert!(others.contains(&"-std=c++20".to_string()));
        assert!(others.contains(&"-g".to_string()));
        assert!(others.contains(&"-O0".to_string()));
        assert!(others.contains(&"-Wall".to_string()));

        let macros: Vec<String> = project
            .compiler
            .opts
            .cflags
            .macros
            .iter()
            .map(ToString::to_string)
            .collect();
        assert!(macros.contains(&"-DDEBUG".to_string()));
        assert!(macros.contains(&"-DCABIN_MYPKG_PKG_VERSION_MAJOR=1".to_string()));
        assert!(macros.contains(&"-DCABIN_MYPKG_PKG_NAME='\"mypkg\"'".to_string()));
        assert!(macros.contains(&"-DCABIN_MYPKG_PROFILE='\"dev\"'".to_string()));

        assert!(project.out_base_path.ends_with("cabin-out/debug"));
        assert!(project.build_out_path.ends_with("cabin-out/debug/mypkg.d"));
        assert!(project.unittest_out_path.ends_with("cabin-out/debug/unittests"));
    }

    #[test]
    fn test_project_flags_for_release() {
        let _guard = crate::util::TEST_ENV_LOCK
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        let tmp = tempfile::TempDir::new().unwrap();
        let manifest = test_manifest(
            r#"
[package]
name = "mypkg"
edition = "17"
version = "0.1.0"

[profile.release]
lto = true
"#,
            tmp.path(),
        );
        std::env::set_var("CXX", "c++");
        let shell = Shell::default();
        let project = Project::init(manifest, BuildProfile::Release, &shell).unwrap();
        std::env::remove_var("CXX");

        let others = &project.compiler.opts.cflags.others;
        assert!(others.contains(&"-O3".to_string()));
        assert!(others.contains(&"-flto".to_string()));
        assert!(!others.contains(&"-g".to_string()));

        let macros: Vec<String> = project
            .compiler
            .opts
            .cflags
            .macros
            .iter()
            .map(ToString::to_string)
            .collect();
        assert!(macros.contains(&"-DNDEBUG".to_string()));
        assert!(project.out_base_path.ends_with("cabin-out/release"));
    }

    #[test]
    fn test_env_flags_split() {
        let _guard = crate::util::TEST_ENV_LOCK
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        std::env::set_var("CABIN_TEST_FLAGS", r#"-Wall "-I/path with space" -O2"#);
        let flags = env_flags("CABIN_TEST_FLAGS");
        std::env::remove_var("CABIN_TEST_FLAGS");
        assert_eq!(flags, vec!["-Wall", "-I/path with space", "-O2"]);
    }

    #[test]
    fn test_project_include_dir_detected() {
        let _guard = crate::util::TEST_ENV_LOCK
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("include")).unwrap();
        let manifest = test_manifest(
            r#"
[package]
name = "mypkg"
edition = "20"
version = "0.1.0"
"#,
            tmp.path(),
        );
        std::env::set_var("CXX", "c++");
        let project = Project::init(manifest, BuildProfile::Dev, &Shell::default()).unwrap();
        std::env::remove_var("CXX");

        let dirs = &project.compiler.opts.cflags.include_dirs;
        assert_eq!(dirs.len(), 1);
        assert!(!dirs[0].is_system);
        assert!(dirs[0].dir.ends_with("include"));
    }
}

//! Typed compiler and linker flag bundles.
//!
//! Flags keep their category (macros, include dirs, library dirs,
//! libraries, everything else) so the build graph can emit them into the
//! right Makefile variables. `merge` concatenates in order; later bundles
//! win on conflicting flags because compilers read left to right.

use std::fmt;
use std::path::PathBuf;

use anyhow::Result;

use crate::semver::VersionReq;
use crate::util::process::{get_cmd_output, Command};

/// A `-D` preprocessor definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Macro {
    pub name: String,
    pub value: String,
}

impl Macro {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Macro {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for Macro {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.value.is_empty() {
            write!(f, "-D{}", self.name)
        } else {
            write!(f, "-D{}={}", self.name, self.value)
        }
    }
}

/// An include directory; system directories render as `-isystem` so
/// dependency headers do not produce warnings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeDir {
    pub dir: PathBuf,
    pub is_system: bool,
}

impl IncludeDir {
    pub fn system(dir: impl Into<PathBuf>) -> Self {
        IncludeDir {
            dir: dir.into(),
            is_system: true,
        }
    }

    pub fn local(dir: impl Into<PathBuf>) -> Self {
        IncludeDir {
            dir: dir.into(),
            is_system: false,
        }
    }
}

impl fmt::Display for IncludeDir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_system {
            write!(f, "-isystem{}", self.dir.display())
        } else {
            write!(f, "-I{}", self.dir.display())
        }
    }
}

/// A `-L` library search directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibDir {
    pub dir: PathBuf,
}

impl fmt::Display for LibDir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "-L{}", self.dir.display())
    }
}

/// A `-l` library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lib {
    pub name: String,
}

impl fmt::Display for Lib {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "-l{}", self.name)
    }
}

/// Compile-time flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CFlags {
    pub macros: Vec<Macro>,
    pub include_dirs: Vec<IncludeDir>,
    pub others: Vec<String>,
}

impl CFlags {
    pub fn merge(&mut self, other: CFlags) {
        self.macros.extend(other.macros);
        self.include_dirs.extend(other.include_dirs);
        self.others.extend(other.others);
    }

    /// Parse whitespace-separated `pkg-config --cflags` output.
    pub fn parse_pkg_config_output(output: &str) -> CFlags {
        let mut cflags = CFlags::default();
        for flag in output.split_whitespace() {
            if let Some(mac) = flag.strip_prefix("-D") {
                match mac.split_once('=') {
                    Some((name, value)) => cflags.macros.push(Macro::new(name, value)),
                    None => cflags.macros.push(Macro::new(mac, "")),
                }
            } else if let Some(dir) = flag.strip_prefix("-I") {
                cflags.include_dirs.push(IncludeDir::system(dir));
            } else {
                cflags.others.push(flag.to_string());
            }
        }
        cflags
    }
}

/// Link-time flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LdFlags {
    pub lib_dirs: Vec<LibDir>,
    pub libs: Vec<Lib>,
    pub others: Vec<String>,
}

impl LdFlags {
    pub fn merge(&mut self, other: LdFlags) {
        self.lib_dirs.extend(other.lib_dirs);
        self.libs.extend(other.libs);
        self.others.extend(other.others);
    }

    /// Parse whitespace-separated `pkg-config --libs` output.
    pub fn parse_pkg_config_output(output: &str) -> LdFlags {
        let mut ldflags = LdFlags::default();
        for flag in output.split_whitespace() {
            if let Some(dir) = flag.strip_prefix("-L") {
                ldflags.lib_dirs.push(LibDir { dir: dir.into() });
            } else if let Some(name) = flag.strip_prefix("-l") {
                ldflags.libs.push(Lib { name: name.into() });
            } else {
                ldflags.others.push(flag.to_string());
            }
        }
        ldflags
    }
}

/// The full flag set a dependency (or the project itself) contributes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompilerOptions {
    pub cflags: CFlags,
    pub ldflags: LdFlags,
}

impl CompilerOptions {
    pub fn merge(&mut self, other: CompilerOptions) {
        self.cflags.merge(other.cflags);
        self.ldflags.merge(other.ldflags);
    }

    /// Query pkg-config for a system dependency's flags.
    ///
    /// NOTE: the output is split on whitespace, so flags containing
    /// quoted spaces are not preserved as single tokens.
    pub fn from_pkg_config(req: &VersionReq, name: &str) -> Result<CompilerOptions> {
        let module = req.to_pkg_config_string(name);

        let cflags_cmd = Command::new("pkg-config").arg("--cflags").arg(&module);
        let cflags_out = get_cmd_output(&cflags_cmd)?;

        let libs_cmd = Command::new("pkg-config").arg("--libs").arg(&module);
        let libs_out = get_cmd_output(&libs_cmd)?;

        Ok(CompilerOptions {
            cflags: CFlags::parse_pkg_config_output(cflags_out.trim_end_matches('\n')),
            ldflags: LdFlags::parse_pkg_config_output(libs_out.trim_end_matches('\n')),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_macro_display() {
        assert_eq!(Macro::new("NDEBUG", "").to_string(), "-DNDEBUG");
        assert_eq!(Macro::new("FOO", "1").to_string(), "-DFOO=1");
    }

    #[test]
    fn test_include_dir_display() {
        assert_eq!(
            IncludeDir::system("/usr/include/fmt").to_string(),
            "-isystem/usr/include/fmt"
        );
        assert_eq!(IncludeDir::local("include").to_string(), "-Iinclude");
    }

    #[test]
    fn test_parse_pkg_config_cflags() {
        let cflags =
            CFlags::parse_pkg_config_output("-DFMT_SHARED -DDEPTH=2 -I/usr/include/fmt -pthread");
        assert_eq!(cflags.macros.len(), 2);
        assert_eq!(cflags.macros[0], Macro::new("FMT_SHARED", ""));
        assert_eq!(cflags.macros[1], Macro::new("DEPTH", "2"));
        assert_eq!(cflags.include_dirs.len(), 1);
        assert!(cflags.include_dirs[0].is_system);
        assert_eq!(cflags.others, vec!["-pthread".to_string()]);
    }

    #[test]
    fn test_parse_pkg_config_libs() {
        let ldflags = LdFlags::parse_pkg_config_output("-L/usr/lib -lfmt -Wl,--as-needed");
        assert_eq!(ldflags.lib_dirs.len(), 1);
        assert_eq!(ldflags.libs.len(), 1);
        assert_eq!(ldflags.libs[0].name, "fmt");
        assert_eq!(ldflags.others, vec!["-Wl,--as-needed".to_string()]);
    }

    #[test]
    fn test_merge_preserves_order() {
        let mut opts = CompilerOptions::default();
        opts.cflags.others.push("-Wall".into());

        let mut dep = CompilerOptions::default();
        dep.cflags.others.push("-Wextra".into());
        dep.ldflags.libs.push(Lib { name: "z".into() });

        opts.merge(dep);
        assert_eq!(opts.cflags.others, vec!["-Wall", "-Wextra"]);
        assert_eq!(opts.ldflags.libs.len(), 1);
    }

    #[test]
    fn test_parse_empty_output() {
        assert_eq!(CFlags::parse_pkg_config_output(""), CFlags::default());
        assert_eq!(LdFlags::parse_pkg_config_output("  "), LdFlags::default());
    }
}

//! C++ compiler detection and invocation assembly.

use anyhow::{bail, Context, Result};
use regex::Regex;

use crate::builder::options::CompilerOptions;
use crate::util::process::{Command, Io};

/// The detected C++ compiler plus the accumulated flag set.
#[derive(Debug, Clone)]
pub struct Compiler {
    pub cxx: String,
    pub opts: CompilerOptions,
}

impl Compiler {
    /// Detect the C++ compiler: `CXX` from the environment wins,
    /// otherwise ask `make` for its default `CXX` value.
    pub fn detect() -> Result<Compiler> {
        let cxx = match std::env::var("CXX") {
            Ok(cxx) if !cxx.is_empty() => cxx,
            _ => Self::probe_make()?,
        };
        Ok(Compiler {
            cxx,
            opts: CompilerOptions::default(),
        })
    }

    /// Scan `make --print-data-base` output for `CXX = <value>`.
    fn probe_make() -> Result<String> {
        let out = Command::new("make")
            .args(["--print-data-base", "--question", "-f", "/dev/null"])
            .stderr(Io::Null)
            .output()
            .context("failed to run `make` to detect the C++ compiler")?;

        // make exits non-zero here (no targets); only the database matters.
        let re = Regex::new(r"(?m)^CXX = (.+)$").expect("valid regex");
        if let Some(caps) = re.captures(&out.stdout) {
            let cxx = caps[1].trim().to_string();
            if !cxx.is_empty() {
                return Ok(cxx);
            }
        }
        bail!("failed to detect a C++ compiler; set the CXX environment variable")
    }

    /// Flags in the order the generated Makefile uses them:
    /// `$(CXXFLAGS) $(DEFINES) $(INCLUDES)`.
    fn cflag_args(&self) -> Vec<String> {
        let cflags = &self.opts.cflags;
        let mut args = cflags.others.clone();
        args.extend(cflags.macros.iter().map(ToString::to_string));
        args.extend(cflags.include_dirs.iter().map(ToString::to_string));
        args
    }

    /// The compile invocation recorded in `compile_commands.json`.
    pub fn compile_cmd(&self, source: &str, obj: &str) -> Command {
        Command::new(&self.cxx)
            .args(self.cflag_args())
            .args(["-c", source, "-o", obj])
    }

    /// Header-dependency extraction via the preprocessor.
    pub fn mm_cmd(&self, source: &str) -> Command {
        Command::new(&self.cxx).args(self.cflag_args()).args(["-MM", source])
    }

    /// Full preprocessor run, used by unit-test discovery.
    pub fn preprocess_cmd(&self, source: &str) -> Command {
        Command::new(&self.cxx).args(self.cflag_args()).args(["-E", source])
    }
}

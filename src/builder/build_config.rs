//! The build graph: Makefile variables and targets derived from the
//! source tree, emitted in topological order, plus the compilation
//! database and unit-test discovery.
//!
//! Construction may fan out across sources (the `-MM` runs dominate);
//! results are merged after the join so emission stays deterministic.

use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use rayon::prelude::*;
use serde::Serialize;

use crate::builder::project::{BuildProfile, Project};
use crate::core::manifest::Manifest;
use crate::util::process::{get_cmd_output, Command};
use crate::util::Shell;

pub const SOURCE_FILE_EXTS: &[&str] = &["c", "c++", "cc", "cpp", "cxx"];
pub const HEADER_FILE_EXTS: &[&str] = &["h", "h++", "hh", "hpp", "hxx"];

const LINK_BIN_COMMAND: &str = "$(CXX) $(LDFLAGS) $^ $(LIBS) -o $@";
const ARCHIVE_LIB_COMMAND: &str = "ar rcs $@ $^";

/// Maximum line length before prerequisite lists and variable values
/// wrap with a backslash continuation.
const MAX_LINE_LEN: usize = 80;

fn has_source_ext(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| SOURCE_FILE_EXTS.contains(&e))
}

fn has_header_ext(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| HEADER_FILE_EXTS.contains(&e))
}

fn is_main_source(path: &Path) -> bool {
    path.file_stem().and_then(|s| s.to_str()) == Some("main")
}

fn is_lib_source(path: &Path) -> bool {
    path.file_stem().and_then(|s| s.to_str()) == Some("lib")
}

/// Makefile assignment operator, emitted verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VarType {
    /// `=`
    Recursive,
    /// `:=`
    #[default]
    Simple,
    /// `?=`
    Cond,
    /// `+=`
    Append,
    /// `!=`
    Shell,
}

impl VarType {
    fn as_str(self) -> &'static str {
        match self {
            VarType::Recursive => "=",
            VarType::Simple => ":=",
            VarType::Cond => "?=",
            VarType::Append => "+=",
            VarType::Shell => "!=",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Variable {
    pub value: String,
    pub ty: VarType,
}

#[derive(Debug, Clone, Default)]
pub struct Target {
    pub commands: Vec<String>,
    pub source_file: Option<String>,
    pub rem_deps: BTreeSet<String>,
}

/// Per-source scan result, computed in the (possibly parallel) `-MM`
/// pass and folded into the graph afterwards.
struct SourceScan {
    source: PathBuf,
    build_obj_target: String,
    header_deps: BTreeSet<String>,
}

/// Unit-test scan result for a source confirmed to contain test code.
struct TestScan {
    source: PathBuf,
    test_obj_target: String,
    test_target: String,
    header_deps: BTreeSet<String>,
}

pub struct BuildConfig {
    project: Project,
    lib_name: String,
    jobs: usize,

    has_binary_target: bool,
    has_library_target: bool,

    variables: BTreeMap<String, Variable>,
    /// Reverse edges: variable -> variables whose value references it.
    var_deps: BTreeMap<String, Vec<String>>,
    targets: BTreeMap<String, Target>,
    /// Reverse edges: prerequisite -> targets that list it.
    target_deps: BTreeMap<String, Vec<String>>,
    phony: Option<BTreeSet<String>>,
    all: Option<BTreeSet<String>>,
}

/// Kahn's algorithm over reverse-dependency edges, popping smallest
/// name first so emission is stable for identical inputs. Nodes absent
/// from `list` contribute no edges.
fn topo_sort<T>(
    list: &BTreeMap<String, T>,
    adj: &BTreeMap<String, Vec<String>>,
) -> Result<Vec<String>> {
    let mut in_degree: BTreeMap<&str, u32> = list.keys().map(|k| (k.as_str(), 0)).collect();
    for (node, dependents) in adj {
        if !list.contains_key(node) {
            continue;
        }
        for dependent in dependents {
            if let Some(deg) = in_degree.get_mut(dependent.as_str()) {
                *deg += 1;
            }
        }
    }

    let mut ready: BTreeSet<&str> = in_degree
        .iter()
        .filter(|(_, &deg)| deg == 0)
        .map(|(&node, _)| node)
        .collect();

    let mut sorted = Vec::with_capacity(list.len());
    while let Some(&node) = ready.iter().next() {
        ready.remove(node);
        sorted.push(node.to_string());

        let Some(dependents) = adj.get(node) else {
            continue;
        };
        for dependent in dependents {
            if let Some(deg) = in_degree.get_mut(dependent.as_str()) {
                *deg -= 1;
                if *deg == 0 {
                    ready.insert(dependent.as_str());
                }
            }
        }
    }

    if sorted.len() != list.len() {
        bail!("too complex build graph");
    }
    Ok(sorted)
}

/// Append one prerequisite, wrapping at the line-length limit with a
/// backslash continuation and a two-space hanging indent.
fn emit_dep(out: &mut String, offset: &mut usize, dep: &str) {
    if *offset + dep.len() + 2 > MAX_LINE_LEN {
        let width = (MAX_LINE_LEN + 3).saturating_sub(*offset);
        out.push_str(&format!("{:>width$}", " \\\n "));
        *offset = 2;
    }
    out.push(' ');
    out.push_str(dep);
    *offset += dep.len() + 1;
}

fn emit_target(
    out: &mut String,
    name: &str,
    deps: &BTreeSet<String>,
    source_file: Option<&str>,
    commands: &[String],
) {
    let mut offset = name.len() + 2;
    out.push_str(name);
    out.push(':');

    if let Some(source) = source_file {
        emit_dep(out, &mut offset, source);
    }
    for dep in deps {
        emit_dep(out, &mut offset, dep);
    }
    out.push('\n');

    for cmd in commands {
        out.push('\t');
        if !cmd.starts_with('@') {
            out.push_str("$(Q)");
        }
        out.push_str(cmd);
        out.push('\n');
    }
    out.push('\n');
}

/// One clangd-compatible compilation database record.
#[derive(Debug, Serialize)]
struct CompdbEntry {
    directory: String,
    file: String,
    output: String,
    command: String,
}

impl BuildConfig {
    pub fn init(
        manifest: Manifest,
        profile: BuildProfile,
        jobs: usize,
        shell: &Shell,
    ) -> Result<BuildConfig> {
        let lib_name = if manifest.package.name.starts_with("lib") {
            format!("{}.a", manifest.package.name)
        } else {
            format!("lib{}.a", manifest.package.name)
        };

        let project = Project::init(manifest, profile, shell)?;
        Ok(BuildConfig {
            project,
            lib_name,
            jobs: jobs.max(1),
            has_binary_target: false,
            has_library_target: false,
            variables: BTreeMap::new(),
            var_deps: BTreeMap::new(),
            targets: BTreeMap::new(),
            target_deps: BTreeMap::new(),
            phony: None,
            all: None,
        })
    }

    pub fn out_base_path(&self) -> &Path {
        &self.project.out_base_path
    }

    pub fn manifest(&self) -> &Manifest {
        &self.project.manifest
    }

    pub fn has_bin_target(&self) -> bool {
        self.has_binary_target
    }

    pub fn has_lib_target(&self) -> bool {
        self.has_library_target
    }

    pub fn lib_name(&self) -> &str {
        &self.lib_name
    }

    pub fn selected_profile(&self) -> &crate::core::manifest::Profile {
        self.project.selected_profile()
    }

    fn project_root(&self) -> &Path {
        self.project.manifest.project_root()
    }

    fn src_dir(&self) -> PathBuf {
        self.project_root().join("src")
    }

    pub fn define_var(&mut self, name: &str, var: Variable, depends_on: &[&str]) {
        self.variables.insert(name.to_string(), var);
        for dep in depends_on {
            // Reverse edge: dep must be emitted before name.
            self.var_deps
                .entry(dep.to_string())
                .or_default()
                .push(name.to_string());
        }
    }

    pub fn define_simple_var(&mut self, name: &str, value: impl Into<String>, deps: &[&str]) {
        self.define_var(
            name,
            Variable {
                value: value.into(),
                ty: VarType::Simple,
            },
            deps,
        );
    }

    pub fn define_cond_var(&mut self, name: &str, value: impl Into<String>) {
        self.define_var(
            name,
            Variable {
                value: value.into(),
                ty: VarType::Cond,
            },
            &[],
        );
    }

    pub fn define_target(
        &mut self,
        name: &str,
        commands: Vec<String>,
        rem_deps: BTreeSet<String>,
        source_file: Option<String>,
    ) {
        if let Some(ref source) = source_file {
            self.target_deps
                .entry(source.clone())
                .or_default()
                .push(name.to_string());
        }
        for dep in &rem_deps {
            self.target_deps
                .entry(dep.clone())
                .or_default()
                .push(name.to_string());
        }
        self.targets.insert(
            name.to_string(),
            Target {
                commands,
                source_file,
                rem_deps,
            },
        );
    }

    pub fn add_phony(&mut self, target: &str) {
        self.phony
            .get_or_insert_with(BTreeSet::new)
            .insert(target.to_string());
    }

    pub fn set_all(&mut self, depends_on: BTreeSet<String>) {
        self.all = Some(depends_on);
    }

    fn emit_variable(&self, out: &mut String, name: &str) {
        let var = &self.variables[name];
        let left = format!("{name} {}", var.ty.as_str());
        out.push_str(&left);
        out.push(' ');

        let mut offset = left.len() + 1;
        for word in var.value.split(' ').filter(|w| !w.is_empty()) {
            if offset + word.len() + 2 > MAX_LINE_LEN {
                let width = (MAX_LINE_LEN + 3).saturating_sub(offset);
                out.push_str(&format!("{:>width$}", "\\\n  "));
                offset = 2;
            }
            out.push_str(word);
            out.push(' ');
            offset += word.len() + 1;
        }
        // Drop the trailing separator the word loop leaves behind.
        if out.ends_with(' ') {
            out.pop();
        }
        out.push('\n');
    }

    /// Emit the Makefile: variables in dependency order, then `.PHONY`
    /// and `all`, then targets in reverse topological order.
    pub fn emit_makefile(&self, writer: &mut impl Write) -> Result<()> {
        let mut out = String::new();

        let sorted_vars = topo_sort(&self.variables, &self.var_deps)?;
        for name in &sorted_vars {
            self.emit_variable(&mut out, name);
        }
        if !sorted_vars.is_empty() && !self.targets.is_empty() {
            out.push('\n');
        }

        if let Some(ref phony) = self.phony {
            emit_target(&mut out, ".PHONY", phony, None, &[]);
        }
        if let Some(ref all) = self.all {
            emit_target(&mut out, "all", all, None, &[]);
        }

        let sorted_targets = topo_sort(&self.targets, &self.target_deps)?;
        for name in sorted_targets.iter().rev() {
            let target = &self.targets[name];
            emit_target(
                &mut out,
                name,
                &target.rem_deps,
                target.source_file.as_deref(),
                &target.commands,
            );
        }

        writer.write_all(out.as_bytes())?;
        Ok(())
    }

    /// Emit `compile_commands.json` records for every compile target.
    pub fn emit_compdb(&self, writer: &mut impl Write) -> Result<()> {
        let directory = self.project_root();
        let empty = BTreeSet::new();
        let phony = self.phony.as_ref().unwrap_or(&empty);

        let mut entries = Vec::new();
        for (name, target) in &self.targets {
            if phony.contains(name) {
                continue;
            }
            let is_compile_target = target
                .commands
                .iter()
                .any(|cmd| {
                    (cmd.starts_with("$(CXX)") || cmd.starts_with("@$(CXX)"))
                        && cmd.contains("-c")
                });
            if !is_compile_target {
                continue;
            }

            // Compile targets always record their source as the first
            // prerequisite.
            let Some(ref source) = target.source_file else {
                continue;
            };
            let file = relative_to(Path::new(source), directory);
            let output = relative_to(Path::new(name), directory);
            let command = self
                .project
                .compiler
                .compile_cmd(&file, &output)
                .arg("-DCABIN_TEST")
                .to_string();

            entries.push(CompdbEntry {
                directory: directory.display().to_string(),
                file,
                output,
                command,
            });
        }

        serde_json::to_writer_pretty(&mut *writer, &entries)?;
        writer.write_all(b"\n")?;
        Ok(())
    }

    /// Run the compiler's `-MM` mode for a source file.
    fn run_mm(&self, source: &Path, is_test: bool) -> Result<String> {
        let mut cmd = self
            .project
            .compiler
            .mm_cmd(&source.display().to_string());
        if is_test {
            cmd = cmd.arg("-DCABIN_TEST");
        }
        let cmd = cmd.cwd(&self.project.out_base_path);
        get_cmd_output(&cmd)
    }

    /// Textual scan, confirmed semantically: a source contains test code
    /// iff preprocessing with `-DCABIN_TEST` changes the output.
    fn contains_test_code(&self, source: &Path) -> Result<bool> {
        let content = std::fs::read_to_string(source)
            .with_context(|| format!("failed to read {}", source.display()))?;
        if !content.contains("CABIN_TEST") {
            return Ok(false);
        }

        let source_str = source.display().to_string();
        let plain = get_cmd_output(&self.project.compiler.preprocess_cmd(&source_str))?;
        let with_test = get_cmd_output(
            &self
                .project
                .compiler
                .preprocess_cmd(&source_str)
                .arg("-DCABIN_TEST"),
        )?;

        let contains_test = plain != with_test;
        if contains_test {
            tracing::trace!("Found test code: {}", source.display());
        }
        Ok(contains_test)
    }

    fn define_compile_target(
        &mut self,
        obj_target: &str,
        source: &Path,
        rem_deps: BTreeSet<String>,
        is_test: bool,
    ) {
        let mut compile = "$(CXX) $(CXXFLAGS) $(DEFINES) $(INCLUDES)".to_string();
        if is_test {
            compile.push_str(" -DCABIN_TEST");
        }
        compile.push_str(" -c $< -o $@");

        self.define_target(
            obj_target,
            vec!["@mkdir -p $(@D)".to_string(), compile],
            rem_deps,
            Some(source.display().to_string()),
        );
    }

    /// Map a header under `src/` to its paired object file, e.g.
    /// `src/path/to/foo.hpp` -> `<build_out>/path/to/foo.o`.
    fn map_header_to_obj(&self, header: &Path) -> Option<String> {
        let rel_dir = header.parent()?.strip_prefix(self.src_dir()).ok()?;
        let stem = header.file_stem()?.to_str()?;
        Some(
            self.project
                .build_out_path
                .join(rel_dir)
                .join(format!("{stem}.o"))
                .display()
                .to_string(),
        )
    }

    /// Recursively collect the object files an output target must link:
    /// each header with a known paired object pulls that object in,
    /// along with the objects its own headers imply.
    fn collect_bin_dep_objs(
        &self,
        deps: &mut BTreeSet<String>,
        source_stem: &str,
        header_deps: &BTreeSet<String>,
        build_obj_targets: &BTreeSet<String>,
    ) {
        for header in header_deps {
            let header = Path::new(header);
            if header
                .file_stem()
                .and_then(|s| s.to_str())
                .is_some_and(|stem| stem == source_stem)
            {
                // A test binary must not link the object paired with its
                // own source; the test object replaces it.
                continue;
            }
            if !has_header_ext(header) {
                continue;
            }
            let Some(obj_target) = self.map_header_to_obj(header) else {
                continue;
            };
            if deps.contains(&obj_target) || !build_obj_targets.contains(&obj_target) {
                continue;
            }

            deps.insert(obj_target.clone());
            self.collect_bin_dep_objs(
                deps,
                source_stem,
                &self.targets[&obj_target].rem_deps,
                build_obj_targets,
            );
        }
    }

    /// Install dependencies and merge their flags into the compiler.
    pub fn install_deps(&mut self, include_dev_deps: bool, shell: &Shell) -> Result<()> {
        let deps_opts = self
            .project
            .manifest
            .install_deps(include_dev_deps, shell)?;
        for opts in deps_opts {
            self.project.compiler.opts.merge(opts);
        }
        Ok(())
    }

    fn set_variables(&mut self) {
        let opts = self.project.compiler.opts.clone();
        self.define_simple_var("CXX", self.project.compiler.cxx.clone(), &[]);
        self.define_simple_var("CXXFLAGS", opts.cflags.others.join(" "), &[]);
        self.define_simple_var(
            "DEFINES",
            opts.cflags
                .macros
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" "),
            &[],
        );
        self.define_simple_var(
            "INCLUDES",
            opts.cflags
                .include_dirs
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" "),
            &[],
        );
        self.define_simple_var(
            "LDFLAGS",
            format!(
                "{} {}",
                opts.ldflags.others.join(" "),
                opts.ldflags
                    .lib_dirs
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(" ")
            )
            .trim()
            .to_string(),
            &[],
        );
        self.define_simple_var(
            "LIBS",
            opts.ldflags
                .libs
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" "),
            &[],
        );
    }

    /// The object path and header set for one source, via `-MM`.
    fn scan_src(&self, source: &Path) -> Result<SourceScan> {
        let mm_output = self.run_mm(source, false)?;
        let (obj_name, header_deps) = parse_mm_output(&mm_output);

        Ok(SourceScan {
            build_obj_target: self.obj_target_path(source, &self.project.build_out_path, &obj_name),
            source: source.to_path_buf(),
            header_deps,
        })
    }

    /// Compute `<base>/<relative-dir>/<obj_name>` for a source file.
    fn obj_target_path(&self, source: &Path, base: &Path, obj_name: &str) -> String {
        let rel_dir = source
            .parent()
            .and_then(|p| p.strip_prefix(self.src_dir()).ok())
            .unwrap_or(Path::new(""));
        base.join(rel_dir).join(obj_name).display().to_string()
    }

    /// Fan `scan` out over the sources on a bounded pool; the results
    /// come back in input order, errors aggregated.
    fn scan_all<T: Send>(
        &self,
        sources: &[PathBuf],
        scan: impl Fn(&Path) -> Result<T> + Sync,
    ) -> Result<Vec<T>> {
        let results: Vec<Result<T>> = if self.jobs > 1 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.jobs)
                .build()
                .context("failed to build thread pool")?;
            pool.install(|| sources.par_iter().map(|src| scan(src)).collect())
        } else {
            sources.iter().map(|src| scan(src)).collect()
        };

        let mut scans = Vec::with_capacity(results.len());
        let mut errors = Vec::new();
        for result in results {
            match result {
                Ok(scan) => scans.push(scan),
                Err(err) => errors.push(format!("{err:#}")),
            }
        }
        if !errors.is_empty() {
            bail!("{}", errors.join("\n"));
        }
        Ok(scans)
    }

    /// Scan one source for unit tests; `None` when it has none.
    fn scan_unittest_src(&self, source: &Path) -> Result<Option<TestScan>> {
        if !self.contains_test_code(source)? {
            return Ok(None);
        }

        let mm_output = self.run_mm(source, true)?;
        let (obj_name, header_deps) = parse_mm_output(&mm_output);

        let test_obj_target =
            self.obj_target_path(source, &self.project.unittest_out_path, &obj_name);
        let file_name = source
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or_default();
        let test_target = format!(
            "{}.test",
            self.project
                .unittest_out_path
                .join(
                    source
                        .parent()
                        .and_then(|p| p.strip_prefix(self.src_dir()).ok())
                        .unwrap_or(Path::new(""))
                )
                .join(file_name)
                .display()
        );

        Ok(Some(TestScan {
            source: source.to_path_buf(),
            test_obj_target,
            test_target,
            header_deps,
        }))
    }

    /// Locate the `main`/`lib` entry points directly under `src/` and
    /// record which output targets exist. Cheap and idempotent, so the
    /// up-to-date fast path can use it without a full graph build.
    pub fn discover_entry_points(&mut self) -> Result<(Option<PathBuf>, Option<PathBuf>)> {
        let src_dir = self.src_dir();
        if !src_dir.exists() {
            bail!("{} is required but not found", src_dir.display());
        }

        let mut main_source: Option<PathBuf> = None;
        let mut lib_source: Option<PathBuf> = None;
        let mut top_level: Vec<PathBuf> = std::fs::read_dir(&src_dir)
            .with_context(|| format!("failed to read {}", src_dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| has_source_ext(path))
            .collect();
        top_level.sort();

        for path in &top_level {
            if is_main_source(path) {
                if main_source.is_some() {
                    bail!("multiple main sources were found");
                }
                main_source = Some(path.clone());
                self.has_binary_target = true;
            } else if is_lib_source(path) {
                if lib_source.is_some() {
                    bail!("multiple lib sources were found");
                }
                lib_source = Some(path.clone());
                self.has_library_target = true;
            }
        }

        if !self.has_binary_target && !self.has_library_target {
            bail!("src/(main|lib).(c|c++|cc|cpp|cxx) was not found");
        }
        Ok((main_source, lib_source))
    }

    /// Discover entry points, scan every source, and define the full
    /// target graph.
    pub fn configure_build(&mut self, shell: &Shell) -> Result<()> {
        let src_dir = self.src_dir();
        let (main_source, lib_source) = self.discover_entry_points()?;

        std::fs::create_dir_all(&self.project.out_base_path)?;

        self.set_variables();

        let mut all = BTreeSet::new();
        if self.has_binary_target {
            all.insert(self.project.manifest.package.name.clone());
        }
        if self.has_library_target {
            all.insert(self.lib_name.clone());
        }
        self.set_all(all);
        self.add_phony("all");

        let source_files = list_source_files(&src_dir);
        let mut srcs = String::new();
        for source in &source_files {
            if Some(source) != main_source.as_ref() && is_main_source(source) {
                shell.warn(format!(
                    "source file `{}` is named `main` but is not located directly in the \
                     `src/` directory. This file will not be treated as the program's \
                     entry point. Move it directly to 'src/' if intended as such.",
                    source.display()
                ));
            } else if Some(source) != lib_source.as_ref() && is_lib_source(source) {
                shell.warn(format!(
                    "source file `{}` is named `lib` but is not located directly in the \
                     `src/` directory. This file will not be treated as a library target. \
                     Move it directly to 'src/' if intended as such.",
                    source.display()
                ));
            }
            srcs.push(' ');
            srcs.push_str(&source.display().to_string());
        }
        self.define_simple_var("SRCS", srcs.trim_start(), &[]);

        // Source pass: header extraction, then compile targets.
        let scans = self.scan_all(&source_files, |src| self.scan_src(src))?;
        let mut build_obj_targets = BTreeSet::new();
        for scan in scans {
            build_obj_targets.insert(scan.build_obj_target.clone());
            self.define_compile_target(
                &scan.build_obj_target,
                &scan.source,
                scan.header_deps,
                false,
            );
        }

        if self.has_binary_target {
            self.define_output_target(
                &build_obj_targets,
                &self.project.build_out_path.join("main.o"),
                vec![LINK_BIN_COMMAND.to_string()],
                &self
                    .project
                    .out_base_path
                    .join(&self.project.manifest.package.name),
            );
        }
        if self.has_library_target {
            self.define_output_target(
                &build_obj_targets,
                &self.project.build_out_path.join("lib.o"),
                vec![ARCHIVE_LIB_COMMAND.to_string()],
                &self.project.out_base_path.join(&self.lib_name),
            );
        }

        // Test pass: preprocess-based discovery, then test binaries.
        let test_scans = self.scan_all(&source_files, |src| self.scan_unittest_src(src))?;
        for scan in test_scans.into_iter().flatten() {
            let source_stem = scan
                .source
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .to_string();

            let mut test_target_deps = BTreeSet::from([scan.test_obj_target.clone()]);
            self.collect_bin_dep_objs(
                &mut test_target_deps,
                &source_stem,
                &scan.header_deps,
                &build_obj_targets,
            );

            self.define_compile_target(
                &scan.test_obj_target,
                &scan.source,
                scan.header_deps,
                true,
            );
            self.define_target(
                &scan.test_target,
                vec![LINK_BIN_COMMAND.to_string()],
                test_target_deps,
                None,
            );
        }

        // Tidy pass.
        self.define_cond_var("CABIN_TIDY", "clang-tidy");
        self.define_simple_var("TIDY_TARGETS", "$(patsubst %,tidy_%,$(SRCS))", &["SRCS"]);
        self.define_target("tidy", Vec::new(), BTreeSet::from(["$(TIDY_TARGETS)".to_string()]), None);
        self.define_target(
            "$(TIDY_TARGETS)",
            vec![
                "$(CABIN_TIDY) $(CABIN_TIDY_FLAGS) $< -- $(CXXFLAGS) $(DEFINES) \
                 -DCABIN_TEST $(INCLUDES)"
                    .to_string(),
            ],
            BTreeSet::from(["tidy_%: %".to_string()]),
            None,
        );
        self.add_phony("tidy");
        self.add_phony("$(TIDY_TARGETS)");
        Ok(())
    }

    fn define_output_target(
        &mut self,
        build_obj_targets: &BTreeSet<String>,
        target_input: &Path,
        commands: Vec<String>,
        target_output: &Path,
    ) {
        let input = target_input.display().to_string();
        let mut deps = BTreeSet::from([input.clone()]);
        self.collect_bin_dep_objs(
            &mut deps,
            "",
            &self.targets[&input].rem_deps,
            build_obj_targets,
        );
        self.define_target(&target_output.display().to_string(), commands, deps, None);
    }

    /// An artifact is fresh iff it exists and nothing under `src/` or
    /// `cabin.toml` is newer.
    fn is_up_to_date(&self, file_name: &str) -> bool {
        let artifact = self.project.out_base_path.join(file_name);
        let Ok(metadata) = std::fs::metadata(&artifact) else {
            return false;
        };
        let Ok(artifact_time) = metadata.modified() else {
            return false;
        };

        for entry in walkdir::WalkDir::new(self.src_dir())
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if let Ok(m) = entry.metadata() {
                if let Ok(mtime) = m.modified() {
                    if mtime > artifact_time {
                        return false;
                    }
                }
            }
        }
        match std::fs::metadata(self.project_root().join("cabin.toml"))
            .and_then(|m| m.modified())
        {
            Ok(mtime) => mtime <= artifact_time,
            Err(_) => false,
        }
    }

    pub fn makefile_is_up_to_date(&self) -> bool {
        self.is_up_to_date("Makefile")
    }

    pub fn compdb_is_up_to_date(&self) -> bool {
        self.is_up_to_date("compile_commands.json")
    }
}

/// Parse `-MM` output (`obj.o: src hdr1 hdr2 \`) into the object name
/// and the header set, dropping the source itself.
fn parse_mm_output(output: &str) -> (String, BTreeSet<String>) {
    let Some((target, rest)) = output.split_once(':') else {
        return (output.trim().to_string(), BTreeSet::new());
    };

    let deps = rest
        .split_whitespace()
        .filter(|tok| *tok != "\\")
        .skip(1) // the source file itself
        .map(ToString::to_string)
        .collect();
    (target.trim().to_string(), deps)
}

/// Every C++ source under `dir`, sorted for deterministic processing.
fn list_source_files(dir: &Path) -> Vec<PathBuf> {
    let mut sources: Vec<PathBuf> = walkdir::WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .filter(|path| has_source_ext(path))
        .collect();
    sources.sort();
    sources
}

fn relative_to(path: &Path, base: &Path) -> String {
    path.strip_prefix(base)
        .unwrap_or(path)
        .display()
        .to_string()
}

/// Install deps, regenerate the Makefile (and compdb when the profile
/// asks for one) unless fresh, and return the configuration.
pub fn emit_makefile(
    manifest: Manifest,
    profile: BuildProfile,
    include_dev_deps: bool,
    jobs: usize,
    shell: &Shell,
) -> Result<BuildConfig> {
    let comp_db = match profile {
        BuildProfile::Dev => manifest.profiles.dev.comp_db,
        BuildProfile::Release => manifest.profiles.release.comp_db,
    };
    let mut config = BuildConfig::init(manifest, profile, jobs, shell)?;

    // Emitting the Makefile implies building, so dependencies must be
    // present first.
    config.install_deps(include_dev_deps, shell)?;

    // Building is always delegated to make, so the caller needs the
    // output targets even when nothing is regenerated.
    config.discover_entry_points()?;

    let build_proj = if config.makefile_is_up_to_date() {
        tracing::debug!("Makefile is up to date");
        false
    } else {
        tracing::debug!("Makefile is NOT up to date");
        true
    };
    let build_comp_db = if comp_db {
        if config.compdb_is_up_to_date() {
            tracing::debug!("compile_commands.json is up to date");
            false
        } else {
            tracing::debug!("compile_commands.json is NOT up to date");
            true
        }
    } else {
        false
    };
    if !build_proj && !build_comp_db {
        return Ok(config);
    }

    config.configure_build(shell)?;

    // Emission can still fail on a cyclic graph; nothing is written
    // until the full rendering succeeds.
    if build_proj {
        let mut buf = Vec::new();
        config.emit_makefile(&mut buf)?;
        let path = config.project.out_base_path.join("Makefile");
        std::fs::write(&path, buf)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }
    if build_comp_db {
        let mut buf = Vec::new();
        config.emit_compdb(&mut buf)?;
        let path = config.project.out_base_path.join("compile_commands.json");
        std::fs::write(&path, buf)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }

    Ok(config)
}

/// Generate only the compilation database; returns the directory it
/// was written to.
pub fn emit_compdb(
    manifest: Manifest,
    profile: BuildProfile,
    include_dev_deps: bool,
    jobs: usize,
    shell: &Shell,
) -> Result<PathBuf> {
    let mut config = BuildConfig::init(manifest, profile, jobs, shell)?;

    // The database needs include paths but not libraries.
    config.install_deps(include_dev_deps, shell)?;

    if config.compdb_is_up_to_date() {
        tracing::debug!("compile_commands.json is up to date");
        return Ok(config.project.out_base_path.clone());
    }
    tracing::debug!("compile_commands.json is NOT up to date");

    config.configure_build(shell)?;
    let mut buf = Vec::new();
    config.emit_compdb(&mut buf)?;
    let path = config.project.out_base_path.join("compile_commands.json");
    std::fs::write(&path, buf)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(config.project.out_base_path.clone())
}

/// The `make` invocation every build- and test-style command delegates
/// to.
pub fn get_make_command(jobs: usize, shell: &Shell) -> Command {
    let mut cmd = Command::new("make");
    if !shell.is_verbose() {
        cmd = cmd.args(["-s", "--no-print-directory", "Q=@"]);
    }
    if shell.is_quiet() {
        cmd = cmd.arg("QUIET=1");
    }
    if jobs > 1 {
        cmd = cmd.arg(format!("-j{jobs}"));
    }
    cmd
}

/// Default `-j` level: the hardware thread count.
pub fn default_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

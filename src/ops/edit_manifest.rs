//! Implementation of `cabin add` and `cabin remove`: structure-
//! preserving edits of the `[dependencies]` table.

use std::path::Path;

use anyhow::{bail, Context, Result};
use toml_edit::{DocumentMut, InlineTable, Item, Table, Value};

use crate::util::Shell;

/// Options for adding dependencies.
#[derive(Debug, Clone, Default)]
pub struct AddOptions {
    /// Dependencies to add: git URLs, `user/repo` shorthands, or (with
    /// `sys`) pkg-config package names.
    pub deps: Vec<String>,

    /// Add as system dependencies resolved through pkg-config.
    pub sys: bool,

    /// Version requirement (system dependencies only).
    pub version: Option<String>,

    /// Git tag to pin.
    pub tag: Option<String>,

    /// Git revision to pin.
    pub rev: Option<String>,

    /// Git branch to follow.
    pub branch: Option<String>,
}

/// Expand a dependency argument into a clone URL. `user/repo`
/// shorthands point at GitHub.
fn dependency_git_url(dep: &str) -> Result<String> {
    if dep.contains("://") {
        // Validate full URLs up front so the manifest never carries a
        // URL git2 cannot parse.
        url::Url::parse(dep).with_context(|| format!("invalid dependency URL: {dep}"))?;
        return Ok(dep.to_string());
    }
    if !dep.contains('/') {
        bail!("invalid dependency: {dep}");
    }
    Ok(format!("https://github.com/{dep}.git"))
}

/// The dependency name implied by a URL or shorthand: the last path
/// segment without any `.git` suffix.
fn dependency_name(dep: &str) -> String {
    let tail = dep.rsplit('/').next().unwrap_or(dep);
    tail.strip_suffix(".git").unwrap_or(tail).to_string()
}

fn load_document(manifest_path: &Path) -> Result<DocumentMut> {
    let content = std::fs::read_to_string(manifest_path)
        .with_context(|| format!("failed to read {}", manifest_path.display()))?;
    content
        .parse()
        .with_context(|| "failed to parse cabin.toml")
}

fn write_document(manifest_path: &Path, doc: &DocumentMut) -> Result<()> {
    std::fs::write(manifest_path, doc.to_string())
        .with_context(|| format!("failed to write {}", manifest_path.display()))
}

/// Add each dependency to `[dependencies]`, creating the table when
/// missing. Entries are written as single-line inline tables.
pub fn add_dependencies(manifest_path: &Path, opts: &AddOptions, shell: &Shell) -> Result<()> {
    if opts.deps.is_empty() {
        bail!("no dependencies to add");
    }
    if opts.sys && opts.version.is_none() {
        bail!("the `--version` option is required for system dependencies");
    }

    let mut doc = load_document(manifest_path)?;
    if !doc.contains_key("dependencies") {
        doc["dependencies"] = Item::Table(Table::new());
    }
    let deps = doc["dependencies"]
        .as_table_mut()
        .context("`dependencies` must be a table")?;

    let mut seen = Vec::new();
    for dep in &opts.deps {
        if seen.contains(dep) {
            shell.warn(format!("the dependency `{dep}` is already in the cabin.toml"));
            continue;
        }
        seen.push(dep.clone());

        let mut entry = InlineTable::new();
        let name = if opts.sys {
            entry.insert("version", opts.version.clone().unwrap_or_default().into());
            entry.insert("system", true.into());
            dep.clone()
        } else {
            entry.insert("git", dependency_git_url(dep)?.into());
            if let Some(ref rev) = opts.rev {
                entry.insert("rev", rev.clone().into());
            } else if let Some(ref tag) = opts.tag {
                entry.insert("tag", tag.clone().into());
            } else if let Some(ref branch) = opts.branch {
                entry.insert("branch", branch.clone().into());
            }
            dependency_name(dep)
        };

        if deps.contains_key(&name) {
            shell.warn(format!("the dependency `{name}` is already in the cabin.toml"));
            continue;
        }
        deps.insert(&name, Item::Value(Value::InlineTable(entry)));
    }

    write_document(manifest_path, &doc)?;
    shell.status("Added", "to the cabin.toml");
    Ok(())
}

/// Remove each named dependency; unknown names warn and the rest
/// proceed.
pub fn remove_dependencies(manifest_path: &Path, deps: &[String], shell: &Shell) -> Result<()> {
    if deps.is_empty() {
        bail!("`cabin remove` requires at least one argument");
    }

    let mut doc = load_document(manifest_path)?;
    let table = doc
        .get_mut("dependencies")
        .and_then(|item| item.as_table_mut());
    let Some(table) = table else {
        bail!("no dependencies to remove");
    };

    let mut removed = Vec::new();
    for dep in deps {
        if table.remove(dep).is_some() {
            removed.push(dep.clone());
        } else {
            shell.warn(format!(
                "Dependency `{dep}` not found in {}",
                manifest_path.display()
            ));
        }
    }

    if !removed.is_empty() {
        write_document(manifest_path, &doc)?;
        shell.status(
            "Removed",
            format!("{} from {}", removed.join(", "), manifest_path.display()),
        );
    }
    Ok(())
}

//! Implementation of `cabin new` and `cabin init`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::core::manifest::validate_package_name;
use crate::util::{to_macro_name, Shell};

const MAIN_CC: &str = "#include <iostream>

int main() {
  std::cout << \"Hello, world!\" << std::endl;
  return 0;
}
";

/// Options for creating a new package.
#[derive(Debug, Clone)]
pub struct NewOptions {
    /// Package name
    pub name: String,

    /// Create a library instead of a binary
    pub lib: bool,
}

/// `authors` entry from the default git config, when available.
fn git_author() -> Option<String> {
    let config = git2::Config::open_default().ok()?;
    let name = config.get_string("user.name").ok()?;
    let email = config.get_string("user.email").ok()?;
    Some(format!("{name} <{email}>"))
}

/// The default cabin.toml for a fresh package.
pub fn create_cabin_toml(name: &str) -> String {
    let authors = match git_author() {
        Some(author) => format!("authors = [\"{author}\"]\n"),
        None => String::new(),
    };
    format!(
        "[package]\n\
         name = \"{name}\"\n\
         version = \"0.1.0\"\n\
         {authors}\
         edition = \"20\"\n"
    )
}

/// The starter header for library packages, guarded by the package's
/// macro name.
fn create_header(name: &str) -> String {
    let guard = format!("{}_HPP", to_macro_name(name));
    format!(
        "#ifndef {guard}\n\
         #define {guard}\n\n\
         namespace {name} {{\n}}\n\n\
         #endif  // !{guard}\n"
    )
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content).with_context(|| format!("writing `{}` failed", path.display()))
}

/// Write the template files for a new package rooted at `path`.
fn create_template_files(path: &Path, opts: &NewOptions, shell: &Shell) -> Result<()> {
    if opts.lib {
        fs::create_dir_all(path.join("include").join(&opts.name))?;
        write_file(&path.join("cabin.toml"), &create_cabin_toml(&opts.name))?;
        write_file(&path.join(".gitignore"), "/cabin-out\ncabin.lock")?;
        write_file(
            &path
                .join("include")
                .join(&opts.name)
                .join(format!("{}.hpp", opts.name)),
            &create_header(&opts.name),
        )?;

        shell.status("Created", format!("library `{}` package", opts.name));
    } else {
        fs::create_dir_all(path.join("src"))?;
        write_file(&path.join("cabin.toml"), &create_cabin_toml(&opts.name))?;
        write_file(&path.join(".gitignore"), "/cabin-out")?;
        write_file(&path.join("src").join("main.cc"), MAIN_CC)?;

        shell.status(
            "Created",
            format!("binary (application) `{}` package", opts.name),
        );
    }
    Ok(())
}

/// Create a new package directory, including a fresh git repository.
pub fn new_package(opts: &NewOptions, shell: &Shell) -> Result<()> {
    validate_package_name(&opts.name)?;

    let path = Path::new(&opts.name);
    if path.exists() {
        anyhow::bail!("directory `{}` already exists", opts.name);
    }

    create_template_files(path, opts, shell)?;
    git2::Repository::init(path)
        .with_context(|| format!("failed to initialize git repository in `{}`", opts.name))?;
    Ok(())
}

/// Initialize a package in the current directory, named after it.
pub fn init_package(lib: bool, shell: &Shell) -> Result<()> {
    if Path::new("cabin.toml").exists() {
        anyhow::bail!("cannot initialize an existing cabin package");
    }

    let cwd = std::env::current_dir().context("failed to get current directory")?;
    let name = cwd
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string();
    validate_package_name(&name)?;

    write_file(Path::new("cabin.toml"), &create_cabin_toml(&name))?;

    shell.status(
        "Created",
        format!(
            "{} `{name}` package",
            if lib { "library" } else { "binary (application)" }
        ),
    );
    Ok(())
}

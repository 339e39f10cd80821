//! CLI definitions using clap.

use clap::{Args, Parser, Subcommand};

/// A package manager and build system for C++
#[derive(Parser)]
#[command(name = "cabin")]
#[command(about, disable_version_flag = true)]
pub struct Cli {
    /// Use verbose output (-vv very verbose output)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Do not print cabin log messages
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Coloring: auto, always, never
    #[arg(long, global = true, value_name = "WHEN")]
    pub color: Option<String>,

    /// Print version info and exit
    #[arg(short = 'V', long = "version")]
    pub version: bool,

    /// List all subcommands
    #[arg(long, hide = true)]
    pub list: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a new cabin project
    New(NewArgs),

    /// Create a new cabin package in an existing directory
    Init(InitArgs),

    /// Compile a local package and all of its dependencies
    #[command(visible_alias = "b")]
    Build(BuildArgs),

    /// Build and execute src/main.cc
    #[command(visible_alias = "r")]
    Run(RunArgs),

    /// Run the tests of a local package
    #[command(visible_alias = "t")]
    Test(TestArgs),

    /// Remove the built directory
    Clean(CleanArgs),

    /// Add dependencies to cabin.toml
    Add(AddArgs),

    /// Remove dependencies from cabin.toml
    Remove(RemoveArgs),

    /// Format codes using clang-format
    Fmt(FmtArgs),

    /// Lint codes using cpplint
    Lint(LintArgs),

    /// Run clang-tidy
    Tidy(TidyArgs),

    /// Search for packages known to pkg-config
    Search(SearchArgs),

    /// Show version information
    Version,
}

#[derive(Args)]
pub struct NewArgs {
    /// Package name
    pub name: Option<String>,

    /// Use a binary (application) template
    #[arg(short, long, conflicts_with = "lib")]
    pub bin: bool,

    /// Use a library template
    #[arg(short, long)]
    pub lib: bool,
}

#[derive(Args)]
pub struct InitArgs {
    /// Use a binary (application) template
    #[arg(short, long, conflicts_with = "lib")]
    pub bin: bool,

    /// Use a library template
    #[arg(short, long)]
    pub lib: bool,
}

#[derive(Args)]
pub struct BuildArgs {
    /// Build with the dev profile
    #[arg(short = 'd', long, conflicts_with = "release")]
    pub debug: bool,

    /// Build with the release profile
    #[arg(short, long)]
    pub release: bool,

    /// Generate compilation database instead of building
    #[arg(long)]
    pub compdb: bool,

    /// Number of parallel jobs
    #[arg(short, long, value_name = "N")]
    pub jobs: Option<usize>,
}

#[derive(Args)]
pub struct RunArgs {
    /// Build with the release profile
    #[arg(short, long)]
    pub release: bool,

    /// Number of parallel jobs
    #[arg(short, long, value_name = "N")]
    pub jobs: Option<usize>,

    /// Arguments passed to the program
    #[arg(trailing_var_arg = true)]
    pub args: Vec<String>,
}

#[derive(Args)]
pub struct TestArgs {
    /// Test with the dev profile
    #[arg(short = 'd', long, conflicts_with = "release")]
    pub debug: bool,

    /// Test with the release profile
    #[arg(short, long)]
    pub release: bool,

    /// Number of parallel jobs
    #[arg(short, long, value_name = "N")]
    pub jobs: Option<usize>,
}

#[derive(Args)]
pub struct CleanArgs {
    /// Clean only the given profile's artifacts
    #[arg(short, long, value_name = "PROFILE")]
    pub profile: Option<String>,
}

#[derive(Args)]
pub struct AddArgs {
    /// Dependencies to add
    #[arg(required = true)]
    pub deps: Vec<String>,

    /// Use system dependency
    #[arg(long)]
    pub sys: bool,

    /// Dependency version (only used with system dependencies)
    #[arg(long, value_name = "VERSION")]
    pub version: Option<String>,

    /// Specify a git tag
    #[arg(long, value_name = "TAG", conflicts_with_all = ["rev", "branch"])]
    pub tag: Option<String>,

    /// Specify a git revision
    #[arg(long, value_name = "REVISION", conflicts_with = "branch")]
    pub rev: Option<String>,

    /// Specify a branch of the git repository
    #[arg(long, value_name = "BRANCH_NAME")]
    pub branch: Option<String>,
}

#[derive(Args)]
pub struct RemoveArgs {
    /// Dependencies to remove
    #[arg(required = true)]
    pub deps: Vec<String>,
}

#[derive(Args)]
pub struct FmtArgs {
    /// Run clang-format in check mode
    #[arg(long)]
    pub check: bool,

    /// Exclude files from formatting
    #[arg(long, value_name = "FILE")]
    pub exclude: Vec<String>,
}

#[derive(Args)]
pub struct LintArgs {
    /// Exclude files from linting
    #[arg(long, value_name = "FILE")]
    pub exclude: Vec<String>,
}

#[derive(Args)]
pub struct TidyArgs {
    /// Automatically apply lint suggestions
    #[arg(long)]
    pub fix: bool,

    /// Number of parallel jobs
    #[arg(short, long, value_name = "N")]
    pub jobs: Option<usize>,
}

#[derive(Args)]
pub struct SearchArgs {
    /// Query to search for
    pub query: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_short_flag_bundling_is_associative() {
        // -vvj1 must expand exactly like -v -v -j 1.
        let bundled = Cli::parse_from(["cabin", "build", "-vvj1"]);
        let split = Cli::parse_from(["cabin", "build", "-v", "-v", "-j", "1"]);

        assert_eq!(bundled.verbose, 2);
        assert_eq!(split.verbose, 2);
        for cli in [bundled, split] {
            match cli.command {
                Some(Commands::Build(args)) => assert_eq!(args.jobs, Some(1)),
                _ => panic!("expected build subcommand"),
            }
        }
    }

    #[test]
    fn test_version_flag_bundles_with_verbose() {
        let a = Cli::parse_from(["cabin", "-vV"]);
        let b = Cli::parse_from(["cabin", "-Vv"]);
        for cli in [a, b] {
            assert!(cli.version);
            assert_eq!(cli.verbose, 1);
        }
    }

    #[test]
    fn test_run_trailing_args() {
        let cli = Cli::parse_from(["cabin", "run", "-r", "--", "input.txt", "-x"]);
        match cli.command {
            Some(Commands::Run(args)) => {
                assert!(args.release);
                assert_eq!(args.args, vec!["input.txt", "-x"]);
            }
            _ => panic!("expected run subcommand"),
        }
    }

    #[test]
    fn test_subcommand_aliases() {
        assert!(matches!(
            Cli::parse_from(["cabin", "b"]).command,
            Some(Commands::Build(_))
        ));
        assert!(matches!(
            Cli::parse_from(["cabin", "r"]).command,
            Some(Commands::Run(_))
        ));
        assert!(matches!(
            Cli::parse_from(["cabin", "t"]).command,
            Some(Commands::Test(_))
        ));
    }

    #[test]
    fn test_add_tag_rev_conflict() {
        let result =
            Cli::try_parse_from(["cabin", "add", "fmtlib/fmt", "--tag", "x", "--rev", "y"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["cabin", "build", "--quiet"]);
        assert!(cli.quiet);
    }
}

//! Cabin CLI - A Cargo-like package manager and build system for C++

use anyhow::Result;
use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use cabin::util::shell::{ColorChoice, Verbosity};
use cabin::Shell;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() {
    // Argument errors still honor the "0 on success, 1 otherwise" exit
    // contract; help/version renderings are not errors.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            std::process::exit(if err.use_stderr() { 1 } else { 0 });
        }
    };

    // CABIN_LOG overrides the verbosity-derived filter.
    let filter = match std::env::var("CABIN_LOG") {
        Ok(_) => EnvFilter::from_env("CABIN_LOG"),
        Err(_) => EnvFilter::new(match (cli.quiet, cli.verbose) {
            (true, _) => "cabin=error",
            (_, 0) => "cabin=warn",
            (_, 1) => "cabin=debug",
            (_, _) => "cabin=trace",
        }),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    let shell = make_shell(&cli);
    if let Err(err) = run(cli, &shell) {
        report_error(&shell, &err);
        std::process::exit(1);
    }
}

fn make_shell(cli: &Cli) -> Shell {
    let verbosity = if cli.quiet {
        Verbosity::Quiet
    } else {
        match cli.verbose {
            0 => Verbosity::Normal,
            1 => Verbosity::Verbose,
            _ => Verbosity::VeryVerbose,
        }
    };

    // --color wins over CABIN_TERM_COLOR; both default to auto.
    let color = cli
        .color
        .clone()
        .or_else(|| std::env::var("CABIN_TERM_COLOR").ok())
        .map(|value| value.parse::<ColorChoice>())
        .transpose()
        .unwrap_or_else(|err| {
            eprintln!("Warning: {err}");
            Some(ColorChoice::Auto)
        })
        .unwrap_or_default();

    Shell::new(verbosity, color)
}

fn run(cli: Cli, shell: &Shell) -> Result<()> {
    if cli.version {
        return commands::version::execute(shell);
    }
    if cli.list {
        print_subcommand_list();
        return Ok(());
    }

    match cli.command {
        Some(Commands::New(args)) => commands::new::execute(args, shell),
        Some(Commands::Init(args)) => commands::init::execute(args, shell),
        Some(Commands::Build(args)) => commands::build::execute(args, shell),
        Some(Commands::Run(args)) => commands::run::execute(args, shell),
        Some(Commands::Test(args)) => commands::test::execute(args, shell),
        Some(Commands::Clean(args)) => commands::clean::execute(args, shell),
        Some(Commands::Add(args)) => commands::add::execute(args, shell),
        Some(Commands::Remove(args)) => commands::remove::execute(args, shell),
        Some(Commands::Fmt(args)) => commands::fmt::execute(args, shell),
        Some(Commands::Lint(args)) => commands::lint::execute(args, shell),
        Some(Commands::Tidy(args)) => commands::tidy::execute(args, shell),
        Some(Commands::Search(args)) => commands::search::execute(args),
        Some(Commands::Version) => commands::version::execute(shell),
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    }
}

/// Every subcommand, one per line, for `--list`.
fn print_subcommand_list() {
    let cmd = Cli::command();
    for sub in cmd.get_subcommands() {
        let about = sub.get_about().map(ToString::to_string).unwrap_or_default();
        println!("    {:<12} {about}", sub.get_name());
    }
}

/// One red `Error:` line, then the cause chain under a yellow
/// `Caused by:` header.
fn report_error(shell: &Shell, err: &anyhow::Error) {
    shell.error(err);
    let causes: Vec<String> = err.chain().skip(1).map(ToString::to_string).collect();
    if !causes.is_empty() {
        eprintln!();
        eprintln!("{}", shell.colorize_cause_chain("Caused by:"));
        for cause in causes {
            for line in cause.lines() {
                eprintln!("  {line}");
            }
        }
    }
}

//! stashcp - copy files through a federated data namespace

mod commands;
mod exit_code;
mod output;

use clap::{CommandFactory, Parser};
use clap_complete::Shell;
use tracing_subscriber::EnvFilter;

use crate::commands::copy::CopyArgs;
use crate::exit_code::ExitCode;
use crate::output::OutputConfig;

/// Copy files to and from the OSDF / StashCache federation
#[derive(Parser, Debug)]
#[command(name = "stashcp", version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    copy: CopyArgs,

    /// Output JSON instead of human-readable text
    #[arg(long)]
    json: bool,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Only print errors
    #[arg(short, long)]
    quiet: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Print shell completions and exit
    #[arg(long, value_name = "SHELL")]
    completions: Option<Shell>,
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    if let Some(shell) = cli.completions {
        clap_complete::generate(shell, &mut Cli::command(), "stashcp", &mut std::io::stdout());
        return ExitCode::Success.into();
    }

    let output_config = OutputConfig {
        json: cli.json,
        no_color: cli.no_color,
        quiet: cli.quiet,
    };

    commands::copy::execute(cli.copy, output_config).await.into()
}

/// Log to stderr, filtered by `RUST_LOG` unless `--debug` is given
fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_transfer() {
        let cli = Cli::try_parse_from([
            "stashcp",
            "-r",
            "--methods",
            "http,xrootd",
            "--cache",
            "cache.example.org:8000",
            "osdf:///ospool/data",
            "out",
        ])
        .unwrap();

        assert!(cli.copy.recursive);
        assert_eq!(
            cli.copy.methods,
            Some(vec!["http".to_string(), "xrootd".to_string()])
        );
        assert_eq!(cli.copy.caches, vec!["cache.example.org:8000"]);
        assert_eq!(cli.copy.paths, vec!["osdf:///ospool/data", "out"]);
    }

    #[test]
    fn test_destination_required() {
        assert!(Cli::try_parse_from(["stashcp", "osdf:///ospool/a"]).is_err());
    }

    #[test]
    fn test_completions_without_paths() {
        let cli = Cli::try_parse_from(["stashcp", "--completions", "bash"]).unwrap();
        assert_eq!(cli.completions, Some(Shell::Bash));
        assert!(cli.copy.paths.is_empty());
    }
}

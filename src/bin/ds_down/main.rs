//! ds-down - Add download tasks to Synology Download Station.
//!
//! Sends a magnet link, URL, or local torrent file to Download Station via its Web API.
//! Credentials are read from the user config file,
//! with the password given directly or produced by an external command.

mod add;
mod config;
mod credentials;
mod error;
mod synology;
mod task;

#[cfg(test)]
mod test_server;

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, CommandFactory, Parser};
use clap_complete::Shell;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use crate::add::DsDown;
use crate::error::{EXIT_CODE_HELP, Error};

/// Add download tasks to Synology Download Station.
///
/// Accepts a magnet link, a remote URL (http, https, ftp, ...),
/// or a path to a local file such as a `.torrent`.
/// Host and credentials are read from the config file, by default `~/.config/ds-down.toml`.
#[derive(Parser)]
#[command(
    author,
    version,
    name = env!("CARGO_BIN_NAME"),
    about = "Add download tasks to Synology Download Station",
    after_help = EXIT_CODE_HELP
)]
pub struct DsDownArgs {
    /// Magnet link, URL, or local file to download
    #[arg(value_hint = clap::ValueHint::AnyPath, required_unless_present = "completion")]
    target: Option<String>,

    /// Config file [default: ~/.config/ds-down.toml]
    #[arg(
        short = 'c',
        long,
        value_name = "PATH",
        value_hint = clap::ValueHint::FilePath,
        env = "DS_DOWN_CONFIG"
    )]
    config: Option<PathBuf>,

    /// Download Station host URL, overrides the config file
    #[arg(short = 'H', long, value_name = "URL", env = "DS_DOWN_HOST")]
    host: Option<String>,

    /// Account username, overrides the config file
    #[arg(short = 'u', long, value_name = "USER", env = "DS_DOWN_USERNAME")]
    username: Option<String>,

    /// Accept invalid TLS certificates
    #[arg(short = 'k', long)]
    insecure: bool,

    /// Timeout in seconds for network requests and the password command
    #[arg(short = 't', long, value_name = "SECONDS")]
    timeout: Option<u64>,

    /// Print what would be done without contacting Download Station
    #[arg(short = 'p', long)]
    dryrun: bool,

    /// Print more log output, can be repeated
    #[arg(short = 'v', long, action = ArgAction::Count)]
    verbose: u8,

    /// Print less output, can be repeated
    #[arg(short = 'q', long, action = ArgAction::Count)]
    quiet: u8,

    /// Generate shell completion
    #[arg(short = 'l', long, value_name = "SHELL")]
    completion: Option<Shell>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = DsDownArgs::parse();

    // Handle shell completion generation
    if let Some(shell) = args.completion {
        return match ds_down::generate_shell_completion(shell, DsDownArgs::command(), true, env!("CARGO_BIN_NAME")) {
            Ok(()) => ExitCode::SUCCESS,
            Err(error) => report(&Error::Internal(format!("{error:#}"))),
        };
    }

    init_tracing(args.verbose, args.quiet);

    let result = match DsDown::try_from_args(&args) {
        Ok(ds_down) => ds_down.run().await,
        Err(error) => Err(error),
    };

    match result {
        Ok(_) => ExitCode::SUCCESS,
        Err(error) => report(&error),
    }
}

/// Print the error and convert it to the process exit code.
fn report(error: &Error) -> ExitCode {
    ds_down::print_error!("{error}");
    ExitCode::from(error.exit_code())
}

/// Initialize the tracing subscriber for logging to stderr.
///
/// `RUST_LOG` takes priority over the verbosity flags.
fn init_tracing(verbose: u8, quiet: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_directive(verbose, quiet)));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr).with_target(false))
        .with(filter)
        .init();
}

/// Log filter directive for the given number of verbose and quiet flags.
///
/// Other crates stay at `warn` unless quiet mode lowers everything.
fn log_directive(verbose: u8, quiet: u8) -> String {
    let level = match i16::from(verbose) - i16::from(quiet) {
        ..=-2 => "off",
        -1 => "error",
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let dependencies = if quiet > verbose { level } else { "warn" };
    format!("{dependencies},{}={level}", env!("CARGO_CRATE_NAME"))
}


#[cfg(test)]
mod test_args {
    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        DsDownArgs::command().debug_assert();
    }

    #[test]
    fn parses_target_and_flags() {
        let args = DsDownArgs::try_parse_from([
            "ds-down",
            "-vv",
            "-q",
            "--insecure",
            "--timeout",
            "10",
            "-c",
            "/tmp/ds-down.toml",
            "magnet:?xt=urn:btih:abc",
        ])
        .expect("valid arguments");

        assert_eq!(args.target.as_deref(), Some("magnet:?xt=urn:btih:abc"));
        assert_eq!(args.verbose, 2);
        assert_eq!(args.quiet, 1);
        assert!(args.insecure);
        assert_eq!(args.timeout, Some(10));
        assert_eq!(args.config, Some(PathBuf::from("/tmp/ds-down.toml")));
    }

    #[test]
    fn arguments_read_environment_variables() {
        let command = DsDownArgs::command();
        let env_names: Vec<_> = ["config", "host", "username"]
            .iter()
            .map(|id| {
                command
                    .get_arguments()
                    .find(|arg| arg.get_id() == id)
                    .and_then(clap::Arg::get_env)
                    .map(|name| name.to_string_lossy().into_owned())
            })
            .collect();

        assert_eq!(
            env_names,
            vec![
                Some("DS_DOWN_CONFIG".to_string()),
                Some("DS_DOWN_HOST".to_string()),
                Some("DS_DOWN_USERNAME".to_string()),
            ]
        );
    }

    #[test]
    fn target_is_required() {
        assert!(DsDownArgs::try_parse_from(["ds-down"]).is_err());
    }

    #[test]
    fn completion_does_not_need_target() {
        let args = DsDownArgs::try_parse_from(["ds-down", "--completion", "bash"]).expect("valid arguments");
        assert_eq!(args.completion, Some(Shell::Bash));
    }
}

use std::ffi::OsString;
use std::process::ExitCode;

use clap::{Arg, ArgAction, ArgMatches, Command};
use tracing_subscriber::EnvFilter;

use crate::commands;
use crate::context::{CliSession, ConfigOverrides, Verbosity};
use crate::error::{CliError, ExitStatus};
use crate::formatter::{OutputFormat, emit_result};

const NAME: &str = "benchtrack";

pub fn run() -> ExitCode {
    match run_cli(std::env::args()) {
        Ok(code) => code,
        Err(err) => {
            err.print();
            err.exit_code()
        }
    }
}

/// Parses arguments, builds the loader configuration and dispatches to a command.
/// Failures are reported through `sysexits`-compatible exit codes.
pub fn run_cli<I, S>(args: I) -> Result<ExitCode, CliError>
where
    I: IntoIterator<Item = S>,
    S: Into<OsString> + Clone,
{
    let command = build_cli();
    let matches = command.try_get_matches_from(args)?;

    let verbosity = Verbosity {
        json: matches.get_flag("json"),
        verbose: matches.get_flag("verbose"),
    };
    init_tracing(verbosity.verbose);
    let output = if verbosity.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    let overrides = ConfigOverrides {
        config_file: matches.get_one::<String>("config").cloned(),
        track: matches.get_one::<String>("track").cloned(),
        offline: matches.get_flag("offline"),
        distribution_version: matches.get_one::<String>("distribution-version").cloned(),
        data_dir: matches.get_one::<String>("data-dir").cloned(),
    };
    let session = CliSession::bootstrap(overrides, verbosity)?;
    if session.verbosity.verbose {
        let config = session.loader.config();
        tracing::debug!(
            tracks_dir = %config.repository.tracks_dir().display(),
            dataset_cache = %config.dataset_cache.display(),
            offline = config.offline,
            track = %config.track,
            "resolved loader configuration"
        );
    }

    let result = dispatch(&session, &matches)?;
    emit_result(result, output)
}

/// Logs go to stderr so that `--json` output stays machine readable. `RUST_LOG` wins over
/// `--verbose`.
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn build_cli() -> Command {
    Command::new(NAME)
        .about("Loads, inspects and prepares benchmark tracks")
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("FILE")
                .global(true)
                .help("YAML file with loader settings. Flags override its values."),
        )
        .arg(
            Arg::new("track")
                .long("track")
                .value_name("NAME")
                .global(true)
                .help("Track to load."),
        )
        .arg(
            Arg::new("offline")
                .long("offline")
                .action(ArgAction::SetTrue)
                .global(true)
                .help("Never contact the track repository remote or download data."),
        )
        .arg(
            Arg::new("distribution-version")
                .long("distribution-version")
                .value_name("VERSION")
                .global(true)
                .help("Version of the benchmarked system; selects the matching track revision."),
        )
        .arg(
            Arg::new("data-dir")
                .long("data-dir")
                .value_name("PATH")
                .global(true)
                .help("Local dataset cache directory."),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .action(ArgAction::SetTrue)
                .global(true)
                .help("Emit JSON instead of human-readable text."),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .action(ArgAction::SetTrue)
                .global(true)
                .help("Log at debug level unless RUST_LOG says otherwise."),
        )
        .subcommand_required(true)
        .subcommand(commands::list::command())
        .subcommand(commands::info::command())
        .subcommand(commands::prepare::command())
}

fn dispatch(
    session: &CliSession,
    matches: &ArgMatches,
) -> Result<commands::CommandResult, CliError> {
    match matches.subcommand() {
        Some(("list", sub)) => commands::list::run(session, sub),
        Some(("info", sub)) => commands::info::run(session, sub),
        Some(("prepare", sub)) => commands::prepare::run(session, sub),
        _ => Err(CliError::new("missing command", ExitStatus::Usage)),
    }
}

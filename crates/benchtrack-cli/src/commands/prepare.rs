use clap::{ArgMatches, Command};

use benchtrack::HttpDownloader;

use crate::commands::CommandResult;
use crate::context::CliSession;
use crate::error::CliError;

pub fn command() -> Command {
    Command::new("prepare")
        .about("Download, verify and decompress the datasets of the configured track")
}

pub fn run(session: &CliSession, _matches: &ArgMatches) -> Result<CommandResult, CliError> {
    let (registry, _) = session.plugin_registry()?;
    let track = session.loader.load_track(&registry)?;
    let report = session.loader.prepare_track(&track, HttpDownloader)?;
    Ok(CommandResult::Prepared {
        track: track.name,
        report,
    })
}

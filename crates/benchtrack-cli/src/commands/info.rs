use clap::{Arg, ArgMatches, Command};

use crate::commands::CommandResult;
use crate::context::CliSession;
use crate::error::{CliError, ExitStatus};

pub fn command() -> Command {
    Command::new("info")
        .about("Show indices, operations and challenge schedules of the configured track")
        .arg(
            Arg::new("challenge")
                .long("challenge")
                .value_name("NAME")
                .help("Only show this challenge"),
        )
}

pub fn run(session: &CliSession, matches: &ArgMatches) -> Result<CommandResult, CliError> {
    let (registry, plugin) = session.plugin_registry()?;
    let mut track = session.loader.load_track(&registry)?;

    if let Some(name) = matches.get_one::<String>("challenge") {
        if track.challenge(name).is_none() {
            let known: Vec<_> = track.challenges.iter().map(|c| c.name.as_str()).collect();
            return Err(CliError::new(
                format!(
                    "track '{}' has no challenge '{name}' (available: {})",
                    track.name,
                    known.join(", ")
                ),
                ExitStatus::Usage,
            ));
        }
        track.challenges.retain(|c| &c.name == name);
    }

    Ok(CommandResult::TrackInfo { plugin, track })
}

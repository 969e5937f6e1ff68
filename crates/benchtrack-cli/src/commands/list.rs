use clap::{ArgMatches, Command};
use serde::Serialize;

use benchtrack::{Registry, Track};

use crate::commands::CommandResult;
use crate::context::CliSession;
use crate::error::CliError;

#[derive(Clone, Debug, Serialize)]
pub struct TrackSummary {
    pub name: String,
    pub description: String,
    pub challenges: Vec<String>,
}

impl From<&Track> for TrackSummary {
    fn from(track: &Track) -> Self {
        Self {
            name: track.name.clone(),
            description: track.short_description.clone(),
            challenges: track.challenges.iter().map(|c| c.name.clone()).collect(),
        }
    }
}

pub fn command() -> Command {
    Command::new("list").about("List the tracks available for the configured distribution version")
}

pub fn run(session: &CliSession, _matches: &ArgMatches) -> Result<CommandResult, CliError> {
    let tracks = session.loader.list_tracks(&Registry::new())?;
    Ok(CommandResult::TrackList {
        tracks: tracks.iter().map(TrackSummary::from).collect(),
    })
}

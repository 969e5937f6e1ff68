use serde::Serialize;

use crate::error::ExitStatus;

pub mod info;
pub mod list;
pub mod prepare;

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CommandResult {
    TrackList {
        tracks: Vec<list::TrackSummary>,
    },
    TrackInfo {
        #[serde(skip_serializing_if = "Option::is_none")]
        plugin: Option<String>,
        track: benchtrack::Track,
    },
    Prepared {
        track: String,
        report: benchtrack::StagingReport,
    },
}

impl CommandResult {
    pub fn exit_status(&self) -> ExitStatus {
        ExitStatus::Ok
    }
}

use std::sync::Arc;

use crate::config::LoaderConfig;
use crate::error::TrackError;
use crate::plugin::{PluginCatalog, PluginLoader};
use crate::reader::TrackFileReader;
use crate::registry::{ParamSourceBinding, Registry};
use crate::repository::TrackRepository;
use crate::stager::{AssetStager, Downloader, StagingReport};
use crate::track::{Operation, ParamMap, Track};
use crate::vcs::{GitCli, VersionControl};

pub const PROGRAM_NAME: &str = "benchtrack";

pub type SharedVcs = Arc<dyn VersionControl>;

/// Entry point tying the repository, plugins, parser and stager together for one
/// configuration.
pub struct TrackLoader {
    config: LoaderConfig,
    vcs: SharedVcs,
}

impl TrackLoader {
    pub fn new(config: LoaderConfig, vcs: SharedVcs) -> Self {
        Self { config, vcs }
    }

    /// Uses the `git` executable for version control.
    pub fn with_git(config: LoaderConfig) -> Self {
        Self::new(config, Arc::new(GitCli::new()))
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    fn repository(&self, fetch: bool) -> Result<TrackRepository<SharedVcs>, TrackError> {
        TrackRepository::open(
            &self.config.repository,
            self.config.offline,
            self.vcs.clone(),
            fetch,
        )
    }

    /// Loads the configured track. Plugins must already be registered in `registry`.
    pub fn load_track(&self, registry: &Registry) -> Result<Track, TrackError> {
        let repo = self.repository(true)?;
        let reader = TrackFileReader::new(registry)?;
        self.read_track(&repo, &self.config.track, &reader)
    }

    /// Every track available for the configured distribution version.
    pub fn list_tracks(&self, registry: &Registry) -> Result<Vec<Track>, TrackError> {
        let repo = self.repository(true)?;
        let version = self.config.distribution_version.as_deref();
        let reader = TrackFileReader::new(registry)?;
        repo.list_available_tracks(version)?
            .iter()
            .map(|name| self.read_track(&repo, name, &reader))
            .collect()
    }

    /// Loads the plugin of the configured track into `registry`. The repository is not
    /// fetched; the plugin file is read from whatever revision is checked out.
    pub fn load_track_plugins(
        &self,
        catalog: &PluginCatalog,
        registry: &mut Registry,
    ) -> Result<Option<String>, TrackError> {
        let repo = self.repository(false)?;
        let plugin_file = repo.resolve_plugin_file(&self.config.track);
        PluginLoader::new(catalog).load(&plugin_file, registry)
    }

    /// Makes every dataset of `track` available locally.
    pub fn prepare_track<D: Downloader>(
        &self,
        track: &Track,
        downloader: D,
    ) -> Result<StagingReport, TrackError> {
        AssetStager::new(downloader, self.config.offline).stage(track)
    }

    fn read_track(
        &self,
        repo: &TrackRepository<SharedVcs>,
        track_name: &str,
        reader: &TrackFileReader<'_>,
    ) -> Result<Track, TrackError> {
        let version = self.config.distribution_version.as_deref();
        let spec_file = repo.resolve_spec_file(track_name, version)?;
        if !spec_file.is_file() {
            tracing::error!("Cannot load track [{track_name}]: [{}] does not exist.", spec_file.display());
            return Err(TrackError::Setup(format!(
                "Cannot load track {track_name}. List the available tracks with {PROGRAM_NAME} list."
            )));
        }

        reader.read(
            track_name,
            &spec_file,
            &repo.resolve_track_dir(track_name),
            &self.config.data_dir(track_name),
        )
    }
}

/// Produces the request parameters of `operation`. A named parameter source is invoked
/// with the track's indices; otherwise the declaration is handed on unchanged for the
/// engine's built-in source of the operation type.
pub fn operation_parameters(
    track: &Track,
    operation: &Operation,
    registry: &Registry,
) -> Result<ParamMap, TrackError> {
    match registry.param_source_for(operation)? {
        ParamSourceBinding::Registered { name, source } => {
            source.params(&track.indices, &operation.params).map_err(|err| {
                TrackError::Setup(format!(
                    "parameter source '{name}' failed for operation '{}': {err}",
                    operation.name
                ))
            })
        }
        ParamSourceBinding::OperationType(_) => Ok(operation.params.clone()),
    }
}

use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::config::RepositorySettings;
use crate::error::TrackError;
use crate::vcs::VersionControl;
use crate::versions;

pub const TRACK_FILE_NAME: &str = "track.json";
pub const PLUGIN_FILE_NAME: &str = "track-plugin.yaml";

/// Where the checked-out revision was found.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum RevisionOrigin {
    /// Matched against remote branches and rebased onto the remote.
    Remote,
    /// Matched against local branches because the repository is offline or local-only.
    Local,
    /// The remote had no match, so local branches were searched instead.
    LocalFallback,
}

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct ResolvedRevision {
    pub branch: String,
    pub origin: RevisionOrigin,
}

/// Local working copy of a version-controlled track repository.
///
/// Checkout and rebase mutate the working copy, so callers must not run two instances
/// against the same directory concurrently.
pub struct TrackRepository<V: VersionControl> {
    name: String,
    url: Option<String>,
    offline: bool,
    tracks_dir: PathBuf,
    vcs: V,
}

impl<V: VersionControl> TrackRepository<V> {
    /// Opens the repository, cloning or fetching first when a remote is reachable and
    /// `fetch` is requested.
    pub fn open(
        settings: &RepositorySettings,
        offline: bool,
        vcs: V,
        fetch: bool,
    ) -> Result<Self, TrackError> {
        let url = settings.remote_url().map(str::to_string);
        let tracks_dir = settings.tracks_dir();

        match &url {
            Some(url) if !offline && fetch => {
                if vcs.is_working_copy(&tracks_dir) {
                    tracing::info!(dir = %tracks_dir.display(), "fetching track repository");
                    vcs.fetch(&tracks_dir).map_err(|err| {
                        err.context(format!("Cannot update track data in [{}]", tracks_dir.display()))
                    })?;
                } else {
                    tracing::info!(%url, dir = %tracks_dir.display(), "cloning track repository");
                    vcs.clone_repository(url, &tracks_dir).map_err(|err| {
                        err.context(format!("Cannot clone track data into [{}]", tracks_dir.display()))
                    })?;
                }
            }
            _ => {
                if !vcs.is_working_copy(&tracks_dir) {
                    return Err(TrackError::Setup(format!(
                        "[{src}] must be a git repository.\n\nPlease run:\ngit -C {src} init",
                        src = tracks_dir.display()
                    )));
                }
            }
        }

        Ok(Self {
            name: settings.name.clone(),
            url,
            offline,
            tracks_dir,
            vcs,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tracks_dir(&self) -> &Path {
        &self.tracks_dir
    }

    fn is_remote(&self) -> bool {
        self.url.is_some()
    }

    pub fn resolve_track_dir(&self, track_name: &str) -> PathBuf {
        self.tracks_dir.join(track_name)
    }

    /// Checks out the revision for `distribution_version` and returns the path of the track file.
    pub fn resolve_spec_file(
        &self,
        track_name: &str,
        distribution_version: Option<&str>,
    ) -> Result<PathBuf, TrackError> {
        self.update(distribution_version)?;
        Ok(self.resolve_track_dir(track_name).join(TRACK_FILE_NAME))
    }

    /// The plugin file lives next to the track file. The checkout is left untouched; it is
    /// expected to have been updated by a preceding resolution.
    pub fn resolve_plugin_file(&self, track_name: &str) -> PathBuf {
        self.resolve_track_dir(track_name).join(PLUGIN_FILE_NAME)
    }

    /// Names of every non-hidden track directory at the matching revision, sorted.
    pub fn list_available_tracks(
        &self,
        distribution_version: Option<&str>,
    ) -> Result<Vec<String>, TrackError> {
        self.update(distribution_version)?;

        let walker = WalkBuilder::new(&self.tracks_dir)
            .standard_filters(false)
            .hidden(true)
            .max_depth(Some(1))
            .build();

        let mut names = Vec::new();
        for entry in walker {
            let entry = entry.map_err(|err| {
                TrackError::Setup(format!(
                    "cannot list tracks in {}: {err}",
                    self.tracks_dir.display()
                ))
            })?;
            let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());
            if entry.depth() == 1 && is_dir {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Moves the working copy to the revision that best matches `distribution_version`.
    pub fn update(
        &self,
        distribution_version: Option<&str>,
    ) -> Result<ResolvedRevision, TrackError> {
        self.try_update(distribution_version).map_err(|err| match err {
            TrackError::Supply(msg) => TrackError::Supply(format!(
                "Cannot update track data in [{}]. {msg}",
                self.tracks_dir.display()
            )),
            other => other,
        })
    }

    fn try_update(
        &self,
        distribution_version: Option<&str>,
    ) -> Result<ResolvedRevision, TrackError> {
        let version_label = distribution_version.unwrap_or("unspecified");
        let mut origin = RevisionOrigin::Local;

        if self.is_remote() && !self.offline {
            let remote_branches = self.vcs.branches(&self.tracks_dir, true)?;
            if let Some(branch) = versions::best_match(&remote_branches, distribution_version) {
                tracing::info!(
                    %branch,
                    dir = %self.tracks_dir.display(),
                    distribution_version = version_label,
                    "checking out track revision"
                );
                self.vcs.checkout(&self.tracks_dir, &branch)?;
                tracing::info!(%branch, dir = %self.tracks_dir.display(), "rebasing onto remote");
                if let Err(err) = self.vcs.rebase(&self.tracks_dir, &branch) {
                    tracing::warn!(
                        error = %err,
                        "Local changes in [{}] prevent track update from remote. Please commit your changes.",
                        self.tracks_dir.display()
                    );
                }
                return Ok(ResolvedRevision {
                    branch,
                    origin: RevisionOrigin::Remote,
                });
            }
            tracing::warn!(
                "Could not find track data remotely for distribution version [{version_label}]. \
                 Trying to find track data locally."
            );
            origin = RevisionOrigin::LocalFallback;
        }

        let local_branches = self.vcs.branches(&self.tracks_dir, false)?;
        match versions::best_match(&local_branches, distribution_version) {
            Some(branch) => {
                tracing::info!(
                    %branch,
                    dir = %self.tracks_dir.display(),
                    distribution_version = version_label,
                    "checking out track revision"
                );
                self.vcs.checkout(&self.tracks_dir, &branch)?;
                Ok(ResolvedRevision { branch, origin })
            }
            None => Err(TrackError::Setup(format!(
                "Cannot find track data for distribution version {version_label}"
            ))),
        }
    }
}

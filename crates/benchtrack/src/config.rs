use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::TrackError;

/// Settings for the track repository working copy.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RepositorySettings {
    pub name: String,
    /// Remote to clone and fetch from. Blank or absent means a local-only repository.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub root_dir: PathBuf,
    /// Directory below `root_dir` that holds every track repository.
    pub dir: String,
}

impl Default for RepositorySettings {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            url: None,
            root_dir: default_root_dir(),
            dir: "tracks".to_string(),
        }
    }
}

impl RepositorySettings {
    /// `<root_dir>/<dir>/<name>`
    pub fn tracks_dir(&self) -> PathBuf {
        self.root_dir.join(&self.dir).join(&self.name)
    }

    pub fn remote_url(&self) -> Option<&str> {
        self.url.as_deref().map(str::trim).filter(|url| !url.is_empty())
    }
}

/// Every option the loading pipeline consumes.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoaderConfig {
    pub repository: RepositorySettings,
    pub offline: bool,
    pub dataset_cache: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distribution_version: Option<String>,
    pub track: String,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            repository: RepositorySettings::default(),
            offline: false,
            dataset_cache: default_root_dir().join("data"),
            distribution_version: None,
            track: "geonames".to_string(),
        }
    }
}

impl LoaderConfig {
    pub fn from_yaml_str(raw: &str) -> Result<Self, TrackError> {
        serde_yaml::from_str(raw).map_err(|err| {
            TrackError::Serialization(format!("invalid loader configuration: {err}"))
        })
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, TrackError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|err| {
            TrackError::Setup(format!(
                "cannot read configuration file {}: {err}",
                path.display()
            ))
        })?;
        Self::from_yaml_str(&raw).map_err(|err| err.context(path.display()))
    }

    /// `<dataset_cache>/<track name, lowercased>`
    pub fn data_dir(&self, track_name: &str) -> PathBuf {
        self.dataset_cache.join(track_name.to_lowercase())
    }
}

fn default_root_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".benchtrack")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config = LoaderConfig::from_yaml_str(
            "track: NYC_Taxis\noffline: true\nrepository:\n  url: ' '\n  root_dir: /srv/bench\n",
        )
        .unwrap();

        assert!(config.offline);
        assert_eq!(config.repository.name, "default");
        assert_eq!(config.repository.remote_url(), None);
        assert_eq!(
            config.repository.tracks_dir(),
            PathBuf::from("/srv/bench/tracks/default")
        );
        assert_eq!(
            config.data_dir(&config.track),
            config.dataset_cache.join("nyc_taxis")
        );
    }

    #[test]
    fn malformed_yaml_is_a_serialization_error() {
        let err = LoaderConfig::from_yaml_str("offline: [").unwrap_err();
        assert!(matches!(err, TrackError::Serialization(_)));
    }
}

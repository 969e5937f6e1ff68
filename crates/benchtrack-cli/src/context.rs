use std::path::PathBuf;

use benchtrack::{LoaderConfig, PluginCatalog, Registry, TrackLoader};

use crate::error::{CliError, ExitStatus};

#[derive(Clone, Copy, Debug, Default)]
pub struct Verbosity {
    pub json: bool,
    pub verbose: bool,
}

/// Command-line values that take precedence over the configuration file.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub config_file: Option<String>,
    pub track: Option<String>,
    pub offline: bool,
    pub distribution_version: Option<String>,
    pub data_dir: Option<String>,
}

impl ConfigOverrides {
    fn resolve(self) -> Result<LoaderConfig, CliError> {
        let mut config = match &self.config_file {
            Some(path) => LoaderConfig::from_yaml_file(path)
                .map_err(|err| CliError::new(err.to_string(), ExitStatus::Config))?,
            None => LoaderConfig::default(),
        };
        if let Some(track) = self.track {
            config.track = track;
        }
        if self.offline {
            config.offline = true;
        }
        if let Some(version) = self.distribution_version {
            config.distribution_version = Some(version);
        }
        if let Some(data_dir) = self.data_dir {
            config.dataset_cache = PathBuf::from(data_dir);
        }
        Ok(config)
    }
}

pub struct CliSession {
    pub loader: TrackLoader,
    /// Plugins compiled into this binary. Tracks can only select from these.
    pub catalog: PluginCatalog,
    pub verbosity: Verbosity,
}

impl CliSession {
    pub fn bootstrap(overrides: ConfigOverrides, verbosity: Verbosity) -> Result<Self, CliError> {
        let config = overrides.resolve()?;
        Ok(Self {
            loader: TrackLoader::with_git(config),
            catalog: PluginCatalog::new(),
            verbosity,
        })
    }

    /// Registry filled with the configured track's plugin, if it has one.
    pub fn plugin_registry(&self) -> Result<(Registry, Option<String>), CliError> {
        let mut registry = Registry::new();
        let plugin = self
            .loader
            .load_track_plugins(&self.catalog, &mut registry)?;
        Ok((registry, plugin))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn flags_override_configuration_file() {
        let temp = tempfile::tempdir().unwrap();
        let file = temp.path().join("benchtrack.yaml");
        fs::write(
            &file,
            "track: geonames\noffline: false\ndistribution_version: \"5.4.1\"\nrepository:\n  name: custom\n",
        )
        .unwrap();

        let config = ConfigOverrides {
            config_file: Some(file.to_string_lossy().into_owned()),
            track: Some("nyc_taxis".into()),
            offline: true,
            distribution_version: None,
            data_dir: Some("/var/lib/benchtrack".into()),
        }
        .resolve()
        .unwrap();

        assert_eq!(config.track, "nyc_taxis");
        assert!(config.offline);
        assert_eq!(config.distribution_version.as_deref(), Some("5.4.1"));
        assert_eq!(config.repository.name, "custom");
        assert_eq!(config.dataset_cache, PathBuf::from("/var/lib/benchtrack"));
    }

    #[test]
    fn unreadable_configuration_is_a_config_error() {
        let err = ConfigOverrides {
            config_file: Some("/nonexistent/benchtrack.yaml".into()),
            ..Default::default()
        }
        .resolve()
        .unwrap_err();
        assert_eq!(err.status(), ExitStatus::Config);
    }
}

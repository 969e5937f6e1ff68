use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::TrackError;
use crate::registry::{PluginRegistrar, Registry};

/// Extension point for a track: contributes runners and parameter sources.
///
/// Plugins are compiled into the binary and looked up by name in a [`PluginCatalog`];
/// a track can only select one of them, never ship code of its own.
pub trait TrackPlugin: Send + Sync {
    fn register(&self, registrar: &mut dyn PluginRegistrar) -> Result<(), TrackError>;
}

/// Contents of a track's plugin file.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PluginManifest {
    pub plugin: String,
}

/// Plugins available to tracks, keyed by the name a plugin file refers to.
#[derive(Default, Clone)]
pub struct PluginCatalog {
    plugins: BTreeMap<String, Arc<dyn TrackPlugin>>,
}

impl PluginCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, plugin: Arc<dyn TrackPlugin>) -> Self {
        self.insert(name, plugin);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, plugin: Arc<dyn TrackPlugin>) {
        self.plugins.insert(name.into(), plugin);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn TrackPlugin>> {
        self.plugins.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.plugins.keys().map(String::as_str)
    }
}

pub struct PluginLoader<'a> {
    catalog: &'a PluginCatalog,
}

impl<'a> PluginLoader<'a> {
    pub fn new(catalog: &'a PluginCatalog) -> Self {
        Self { catalog }
    }

    /// Loads the plugin selected by `plugin_file`, if the track has one, and lets it
    /// register into `registry`. Returns the plugin name that was loaded.
    pub fn load(
        &self,
        plugin_file: &Path,
        registry: &mut Registry,
    ) -> Result<Option<String>, TrackError> {
        if !plugin_file.is_file() {
            tracing::info!(
                "Skipping plugin detection for this track ([{}] does not exist).",
                plugin_file.display()
            );
            return Ok(None);
        }

        tracing::info!("Reading track plugin file [{}].", plugin_file.display());
        let raw = fs::read_to_string(plugin_file)?;
        let manifest: PluginManifest = serde_yaml::from_str(&raw).map_err(|err| {
            TrackError::Syntax(format!(
                "invalid track plugin file {}: {err}",
                plugin_file.display()
            ))
        })?;

        let plugin = self.catalog.get(&manifest.plugin).ok_or_else(|| {
            let known: Vec<_> = self.catalog.names().collect();
            TrackError::Setup(format!(
                "track plugin '{}' referenced by {} is not available (known plugins: [{}])",
                manifest.plugin,
                plugin_file.display(),
                known.join(", ")
            ))
        })?;

        plugin
            .register(registry)
            .map_err(|err| err.context(format!("track plugin '{}'", manifest.plugin)))?;
        tracing::info!(plugin = %manifest.plugin, "registered track plugin");
        Ok(Some(manifest.plugin))
    }
}

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::TrackError;
use crate::track::{Index, Operation, OperationType, ParamMap};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Executes one operation kind against the benchmark target. Implemented by the
/// execution engine or by track plugins.
pub trait Runner: Send + Sync {
    fn run(&self, params: &ParamMap) -> Result<Value, BoxError>;
}

/// Turns the raw declaration of an operation into request parameters.
pub trait ParamSource: Send + Sync {
    fn params(&self, indices: &[Index], params: &ParamMap) -> Result<ParamMap, BoxError>;
}

/// Registration surface handed to track plugins.
pub trait PluginRegistrar {
    fn register_param_source(&mut self, name: &str, source: Arc<dyn ParamSource>);
    fn register_runner(&mut self, name: &str, runner: Arc<dyn Runner>);
}

/// Runners and parameter sources contributed by plugins.
///
/// Filled through `&mut` before a track is parsed and only read afterwards; wrap it in an
/// `Arc` to share the frozen registry with concurrent readers.
#[derive(Default)]
pub struct Registry {
    runners: BTreeMap<String, Arc<dyn Runner>>,
    param_sources: BTreeMap<String, Arc<dyn ParamSource>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn runner(&self, name: &str) -> Option<&Arc<dyn Runner>> {
        self.runners.get(name)
    }

    pub fn param_source(&self, name: &str) -> Option<&Arc<dyn ParamSource>> {
        self.param_sources.get(name)
    }

    pub fn runner_names(&self) -> impl Iterator<Item = &str> {
        self.runners.keys().map(String::as_str)
    }

    pub fn param_source_names(&self) -> impl Iterator<Item = &str> {
        self.param_sources.keys().map(String::as_str)
    }

    /// Picks the parameter source for an operation: the named one if the operation
    /// declares it, otherwise the engine's built-in source for the operation type.
    pub fn param_source_for(&self, operation: &Operation) -> Result<ParamSourceBinding, TrackError> {
        match &operation.param_source {
            Some(name) => {
                tracing::debug!(param_source = %name, "creating parameter source by name");
                self.param_source(name)
                    .map(|source| ParamSourceBinding::Registered {
                        name: name.clone(),
                        source: source.clone(),
                    })
                    .ok_or_else(|| {
                        TrackError::Setup(format!(
                            "operation '{}' uses unknown parameter source '{name}'",
                            operation.name
                        ))
                    })
            }
            None => {
                tracing::debug!(operation_type = %operation.operation_type, "creating parameter source for operation type");
                Ok(ParamSourceBinding::OperationType(operation.operation_type.clone()))
            }
        }
    }
}

impl PluginRegistrar for Registry {
    fn register_param_source(&mut self, name: &str, source: Arc<dyn ParamSource>) {
        if self.param_sources.insert(name.to_string(), source).is_some() {
            tracing::warn!(name, "replacing previously registered parameter source");
        }
    }

    fn register_runner(&mut self, name: &str, runner: Arc<dyn Runner>) {
        if self.runners.insert(name.to_string(), runner).is_some() {
            tracing::warn!(name, "replacing previously registered runner");
        }
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("runners", &self.runners.keys().collect::<Vec<_>>())
            .field("param_sources", &self.param_sources.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Outcome of [`Registry::param_source_for`].
pub enum ParamSourceBinding {
    Registered {
        name: String,
        source: Arc<dyn ParamSource>,
    },
    /// No named source; the engine derives parameters from the operation type.
    OperationType(OperationType),
}

impl fmt::Debug for ParamSourceBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamSourceBinding::Registered { name, .. } => {
                f.debug_tuple("Registered").field(name).finish()
            }
            ParamSourceBinding::OperationType(kind) => {
                f.debug_tuple("OperationType").field(kind).finish()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    impl ParamSource for Echo {
        fn params(&self, _indices: &[Index], params: &ParamMap) -> Result<ParamMap, BoxError> {
            Ok(params.clone())
        }
    }

    fn operation(param_source: Option<&str>) -> Operation {
        Operation {
            name: "op".into(),
            operation_type: OperationType::Search,
            param_source: param_source.map(str::to_string),
            params: ParamMap::new(),
        }
    }

    #[test]
    fn named_param_source_must_be_registered() {
        let mut registry = Registry::new();
        let err = registry
            .param_source_for(&operation(Some("echo")))
            .unwrap_err();
        assert!(matches!(err, TrackError::Setup(_)));

        registry.register_param_source("echo", Arc::new(Echo));
        let binding = registry.param_source_for(&operation(Some("echo"))).unwrap();
        assert!(matches!(binding, ParamSourceBinding::Registered { ref name, .. } if name == "echo"));
    }

    #[test]
    fn falls_back_to_operation_type() {
        let registry = Registry::new();
        let binding = registry.param_source_for(&operation(None)).unwrap();
        assert!(matches!(
            binding,
            ParamSourceBinding::OperationType(OperationType::Search)
        ));
    }
}

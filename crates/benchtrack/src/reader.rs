use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::cursor::Cursor;
use crate::error::TrackError;
use crate::registry::Registry;
use crate::schema::TrackSchema;
use crate::template::TrackTemplateRenderer;
use crate::track::{
    Challenge, DocumentGroup, Index, Operation, OperationType, ParallelBlock, ScheduleEntry, Task,
    Track,
};

/// Creates a track from its specification file: render, parse, validate, build.
pub struct TrackFileReader<'r> {
    schema: TrackSchema,
    renderer: TrackTemplateRenderer,
    specification: TrackSpecificationReader<'r>,
}

impl<'r> TrackFileReader<'r> {
    pub fn new(registry: &'r Registry) -> Result<Self, TrackError> {
        Ok(Self {
            schema: TrackSchema::bundled()?,
            renderer: TrackTemplateRenderer::new(),
            specification: TrackSpecificationReader::new(registry),
        })
    }

    pub fn with_renderer(mut self, renderer: TrackTemplateRenderer) -> Self {
        self.renderer = renderer;
        self
    }

    /// * `mapping_dir` - where the track's mapping files live locally.
    /// * `data_dir` - where the track's data files are stored locally.
    pub fn read(
        &self,
        track_name: &str,
        spec_file: &Path,
        mapping_dir: &Path,
        data_dir: &Path,
    ) -> Result<Track, TrackError> {
        tracing::info!("Reading track specification file [{}].", spec_file.display());
        let rendered = self.renderer.render_file(spec_file)?;
        tracing::debug!("Final rendered track for '{}': {rendered}", spec_file.display());

        let document: Value = serde_json::from_str(&rendered).map_err(|err| {
            TrackError::Syntax(format!("Could not load '{}': {err}", spec_file.display()))
        })?;
        self.schema.validate(track_name, &document)?;
        self.specification
            .read(track_name, &document, mapping_dir, data_dir)
    }
}

#[derive(Clone, Copy)]
struct TaskDefaults {
    warmup_iterations: u64,
    iterations: u64,
}

impl Default for TaskDefaults {
    fn default() -> Self {
        Self {
            warmup_iterations: 0,
            iterations: 1,
        }
    }
}

/// Builds a [`Track`] from an already validated document.
pub struct TrackSpecificationReader<'r> {
    registry: &'r Registry,
}

impl<'r> TrackSpecificationReader<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self { registry }
    }

    pub fn read(
        &self,
        track_name: &str,
        spec: &Value,
        mapping_dir: &Path,
        data_dir: &Path,
    ) -> Result<Track, TrackError> {
        let root = Cursor::new(track_name);
        let short_description = root.mandatory_str(spec, "meta.short-description")?;
        let description = root.mandatory_str(spec, "meta.description")?;
        let source_root_url = root.mandatory_str(spec, "meta.data-url")?;

        let indices_cursor = root.child("indices");
        let indices = root
            .mandatory_array(spec, "indices")?
            .iter()
            .map(|index| self.create_index(&indices_cursor, index, mapping_dir, data_dir))
            .collect::<Result<Vec<_>, _>>()?;

        let operations = self.parse_operations(&root, root.mandatory_array(spec, "operations")?)?;
        let challenges = self.create_challenges(&root, spec, &operations)?;

        Ok(Track {
            name: track_name.to_string(),
            short_description: short_description.to_string(),
            description: description.to_string(),
            source_root_url: source_root_url.to_string(),
            indices,
            challenges,
            operations,
        })
    }

    fn create_index(
        &self,
        cursor: &Cursor<'_>,
        index_spec: &Value,
        mapping_dir: &Path,
        data_dir: &Path,
    ) -> Result<Index, TrackError> {
        let name = cursor.mandatory_str(index_spec, "name")?;
        let index_cursor = cursor.child(name);
        let types = index_cursor
            .mandatory_array(index_spec, "types")?
            .iter()
            .map(|group| self.create_document_group(&index_cursor, group, mapping_dir, data_dir))
            .collect::<Result<Vec<_>, _>>()?;

        let index = Index {
            name: name.to_string(),
            types,
        };
        if !index.has_document_data() {
            tracing::warn!(
                "None of the types for index [{name}] defines documents. Please check that you either don't want to \
                 index data or parameter sources are defined for indexing."
            );
        }
        Ok(index)
    }

    fn create_document_group(
        &self,
        cursor: &Cursor<'_>,
        group_spec: &Value,
        mapping_dir: &Path,
        data_dir: &Path,
    ) -> Result<DocumentGroup, TrackError> {
        let name = cursor.mandatory_str(group_spec, "name")?;
        let group_cursor = cursor.child(name);
        let mapping = group_cursor.mandatory_str(group_spec, "mapping")?;
        let compressed_size_in_bytes = group_cursor.optional_u64(group_spec, "compressed-bytes")?;
        let uncompressed_size_in_bytes =
            group_cursor.optional_u64(group_spec, "uncompressed-bytes")?;

        let (document_archive, document_file) =
            match group_cursor.optional_str(group_spec, "documents")? {
                Some(archive) => {
                    if compressed_size_in_bytes.is_none() || uncompressed_size_in_bytes.is_none() {
                        return Err(group_cursor.error(format!(
                            "Document archive '{archive}' in '{}' requires both 'compressed-bytes' and 'uncompressed-bytes'.",
                            group_cursor.breadcrumb()
                        )));
                    }
                    let (archive_path, file_path) = document_paths(data_dir, archive)
                        .ok_or_else(|| {
                            group_cursor.error(format!(
                                "Document archive '{archive}' in '{}' has no file extension.",
                                group_cursor.breadcrumb()
                            ))
                        })?;
                    (Some(archive_path), Some(file_path))
                }
                None => (None, None),
            };

        Ok(DocumentGroup {
            name: name.to_string(),
            mapping_file: mapping_dir.join(mapping),
            document_file,
            document_archive,
            number_of_documents: group_cursor.u64_or(group_spec, "document-count", 0)?,
            compressed_size_in_bytes,
            uncompressed_size_in_bytes,
        })
    }

    fn parse_operations(
        &self,
        root: &Cursor<'_>,
        op_specs: &[Value],
    ) -> Result<BTreeMap<String, Operation>, TrackError> {
        let cursor = root.child("operations");
        let mut operations = BTreeMap::new();
        for op_spec in op_specs {
            let name = cursor.mandatory_str(op_spec, "name")?;
            let op_cursor = cursor.child(name);
            let raw_type = op_cursor.mandatory_str(op_spec, "operation-type")?;
            let operation_type = OperationType::parse(raw_type);
            match &operation_type {
                OperationType::Custom(kind) => {
                    tracing::info!("Using user-provided operation type [{kind}] for operation [{name}].");
                    if self.registry.runner(kind).is_none() {
                        tracing::warn!(
                            "No runner is registered for operation type [{kind}] of operation [{name}]."
                        );
                    }
                }
                built_in => {
                    tracing::debug!("Using built-in operation type [{built_in}] for operation [{name}].");
                }
            }

            let param_source = op_cursor.optional_str(op_spec, "param-source")?;
            if let Some(source) = param_source {
                if self.registry.param_source(source).is_none() {
                    tracing::warn!(
                        "Parameter source [{source}] of operation [{name}] is not registered."
                    );
                }
            }

            let params = op_spec
                .as_object()
                .cloned()
                .ok_or_else(|| cursor.error(format!("Operation '{name}' must be an object.")))?;
            let operation = Operation {
                name: name.to_string(),
                operation_type,
                param_source: param_source.map(str::to_string),
                params,
            };
            if operations.insert(name.to_string(), operation).is_some() {
                return Err(cursor.error(format!(
                    "Duplicate operation with name '{name}'. Operation names must be unique."
                )));
            }
        }
        Ok(operations)
    }

    fn create_challenges(
        &self,
        root: &Cursor<'_>,
        spec: &Value,
        operations: &BTreeMap<String, Operation>,
    ) -> Result<Vec<Challenge>, TrackError> {
        let cursor = root.child("challenges");
        let mut challenges: Vec<Challenge> = Vec::new();
        for challenge_spec in root.mandatory_array(spec, "challenges")? {
            let name = cursor.mandatory_str(challenge_spec, "name")?;
            if challenges.iter().any(|c| c.name == name) {
                return Err(cursor.error(format!(
                    "Duplicate challenge with name '{name}'. Challenge names must be unique."
                )));
            }
            let challenge_cursor = cursor.child(name);
            let description = challenge_cursor.mandatory_str(challenge_spec, "description")?;
            let index_settings = challenge_cursor
                .optional_object(challenge_spec, "index-settings")?
                .cloned();

            let mut schedule = Vec::new();
            for entry in challenge_cursor.mandatory_array(challenge_spec, "schedule")? {
                let parsed = match entry.get("parallel") {
                    Some(block) => ScheduleEntry::Parallel(self.parse_parallel(
                        &challenge_cursor,
                        name,
                        block,
                        operations,
                    )?),
                    None => ScheduleEntry::Task(self.parse_task(
                        &challenge_cursor,
                        name,
                        entry,
                        operations,
                        TaskDefaults::default(),
                    )?),
                };
                schedule.push(parsed);
            }

            challenges.push(Challenge {
                name: name.to_string(),
                description: description.to_string(),
                index_settings,
                schedule,
            });
        }
        Ok(challenges)
    }

    fn parse_parallel(
        &self,
        challenge_cursor: &Cursor<'_>,
        challenge_name: &str,
        block_spec: &Value,
        operations: &BTreeMap<String, Operation>,
    ) -> Result<ParallelBlock, TrackError> {
        let cursor = challenge_cursor.child("parallel");
        let warmup_iterations = cursor.optional_u64(block_spec, "warmup-iterations")?;
        let iterations = cursor.optional_u64(block_spec, "iterations")?;
        let clients = cursor.optional_u64(block_spec, "clients")?;

        let fallback = TaskDefaults::default();
        let defaults = TaskDefaults {
            warmup_iterations: warmup_iterations.unwrap_or(fallback.warmup_iterations),
            iterations: iterations.unwrap_or(fallback.iterations),
        };

        let tasks = cursor
            .mandatory_array(block_spec, "tasks")?
            .iter()
            .map(|task| self.parse_task(&cursor, challenge_name, task, operations, defaults))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ParallelBlock {
            tasks,
            warmup_iterations,
            iterations,
            clients,
        })
    }

    fn parse_task(
        &self,
        cursor: &Cursor<'_>,
        challenge_name: &str,
        task_spec: &Value,
        operations: &BTreeMap<String, Operation>,
        defaults: TaskDefaults,
    ) -> Result<Task, TrackError> {
        let op_name = cursor.mandatory_str(task_spec, "operation")?;
        if !operations.contains_key(op_name) {
            return Err(cursor.error(format!(
                "'schedule' for challenge '{challenge_name}' contains a non-existing operation '{op_name}'. \
                 Please add an operation '{op_name}' to the 'operations' block."
            )));
        }

        let task_cursor = cursor.child(op_name);
        Ok(Task {
            operation: op_name.to_string(),
            warmup_iterations: task_cursor.u64_or(
                task_spec,
                "warmup-iterations",
                defaults.warmup_iterations,
            )?,
            warmup_time_period: task_cursor.optional_u64(task_spec, "warmup-time-period")?,
            iterations: task_cursor.u64_or(task_spec, "iterations", defaults.iterations)?,
            clients: task_cursor.u64_or(task_spec, "clients", 1)?,
            target_throughput: task_cursor.optional_f64(task_spec, "target-throughput")?,
        })
    }
}

/// `data_dir/<archive>` and its extension-stripped sibling.
fn document_paths(data_dir: &Path, archive: &str) -> Option<(PathBuf, PathBuf)> {
    let archive_path = data_dir.join(archive);
    archive_path.extension()?;
    let file_path = archive_path.with_extension("");
    Some((archive_path, file_path))
}

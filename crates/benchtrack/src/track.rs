use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub type ParamMap = serde_json::Map<String, serde_json::Value>;

/// A fully parsed benchmark track. Built once per load and never mutated afterwards.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct Track {
    pub name: String,
    pub short_description: String,
    pub description: String,
    /// Base URL that dataset archives are downloaded from.
    pub source_root_url: String,
    pub indices: Vec<Index>,
    pub challenges: Vec<Challenge>,
    /// Operations table keyed by operation name. Schedules refer to entries by name.
    pub operations: BTreeMap<String, Operation>,
}

impl Track {
    pub fn challenge(&self, name: &str) -> Option<&Challenge> {
        self.challenges.iter().find(|c| c.name == name)
    }

    /// The first declared challenge, used when the caller did not pick one.
    pub fn default_challenge(&self) -> Option<&Challenge> {
        self.challenges.first()
    }

    pub fn operation(&self, name: &str) -> Option<&Operation> {
        self.operations.get(name)
    }

    /// Resolves the operation a task refers to. The parser guarantees the lookup succeeds.
    pub fn operation_for(&self, task: &Task) -> Option<&Operation> {
        self.operations.get(&task.operation)
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct Index {
    pub name: String,
    pub types: Vec<DocumentGroup>,
}

impl Index {
    /// An index may legitimately be query-only, so this is informational.
    pub fn has_document_data(&self) -> bool {
        self.types.iter().any(DocumentGroup::has_valid_document_data)
    }
}

/// Indexable data plus its mapping definition within an index.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct DocumentGroup {
    pub name: String,
    pub mapping_file: PathBuf,
    /// Decompressed document file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_file: Option<PathBuf>,
    /// Compressed archive the document file is extracted from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_archive: Option<PathBuf>,
    pub number_of_documents: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compressed_size_in_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uncompressed_size_in_bytes: Option<u64>,
}

impl DocumentGroup {
    pub fn has_valid_document_data(&self) -> bool {
        self.document_file.is_some()
    }
}

/// Operation kinds known to the loader plus an explicit escape hatch for plugin-defined ones.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
pub enum OperationType {
    Index,
    ForceMerge,
    IndexStats,
    NodeStats,
    Search,
    Custom(String),
}

impl OperationType {
    const BUILT_IN: [OperationType; 5] = [
        OperationType::Index,
        OperationType::ForceMerge,
        OperationType::IndexStats,
        OperationType::NodeStats,
        OperationType::Search,
    ];

    /// Matches built-in kinds ignoring case, hyphens and underscores; anything else is
    /// kept verbatim as a custom kind.
    pub fn parse(raw: &str) -> Self {
        let normalized: String = raw
            .chars()
            .filter(|ch| *ch != '-' && *ch != '_')
            .collect::<String>()
            .to_ascii_lowercase();
        Self::BUILT_IN
            .into_iter()
            .find(|kind| kind.as_str().replace('-', "") == normalized)
            .unwrap_or_else(|| OperationType::Custom(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        match self {
            OperationType::Index => "index",
            OperationType::ForceMerge => "force-merge",
            OperationType::IndexStats => "index-stats",
            OperationType::NodeStats => "node-stats",
            OperationType::Search => "search",
            OperationType::Custom(name) => name,
        }
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, OperationType::Custom(_))
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct Operation {
    pub name: String,
    pub operation_type: OperationType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub param_source: Option<String>,
    /// The raw declaration, handed unchanged to parameter sources.
    pub params: ParamMap,
}

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct Challenge {
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_settings: Option<ParamMap>,
    pub schedule: Vec<ScheduleEntry>,
}

impl Challenge {
    /// Every task of the schedule in declaration order, flattening parallel blocks.
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.schedule.iter().flat_map(|entry| match entry {
            ScheduleEntry::Task(task) => std::slice::from_ref(task).iter(),
            ScheduleEntry::Parallel(block) => block.tasks.iter(),
        })
    }
}

impl fmt::Display for Challenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Top-level entries run in order; tasks inside a parallel block run concurrently.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScheduleEntry {
    Task(Task),
    Parallel(ParallelBlock),
}

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct Task {
    /// Name of the referenced entry in [`Track::operations`].
    pub operation: String,
    pub warmup_iterations: u64,
    /// Warmup duration in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warmup_time_period: Option<u64>,
    pub iterations: u64,
    pub clients: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_throughput: Option<f64>,
}

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct ParallelBlock {
    pub tasks: Vec<Task>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warmup_iterations: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iterations: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clients: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_type_matches_built_ins_loosely() {
        assert_eq!(OperationType::parse("force-merge"), OperationType::ForceMerge);
        assert_eq!(OperationType::parse("ForceMerge"), OperationType::ForceMerge);
        assert_eq!(OperationType::parse("INDEX_STATS"), OperationType::IndexStats);
        assert_eq!(OperationType::parse("search"), OperationType::Search);
    }

    #[test]
    fn unknown_operation_type_is_kept_verbatim() {
        let kind = OperationType::parse("Cluster-Health");
        assert_eq!(kind, OperationType::Custom("Cluster-Health".into()));
        assert!(kind.is_custom());
        assert_eq!(kind.to_string(), "Cluster-Health");
    }

    #[test]
    fn challenge_tasks_flatten_parallel_blocks() {
        let task = |op: &str| Task {
            operation: op.into(),
            warmup_iterations: 0,
            warmup_time_period: None,
            iterations: 1,
            clients: 1,
            target_throughput: None,
        };
        let challenge = Challenge {
            name: "c".into(),
            description: String::new(),
            index_settings: None,
            schedule: vec![
                ScheduleEntry::Task(task("a")),
                ScheduleEntry::Parallel(ParallelBlock {
                    tasks: vec![task("b"), task("c")],
                    warmup_iterations: None,
                    iterations: None,
                    clients: None,
                }),
            ],
        };
        let names: Vec<_> = challenge.tasks().map(|t| t.operation.as_str()).collect();
        assert_eq!(names, ["a", "b", "c"]);
    }
}

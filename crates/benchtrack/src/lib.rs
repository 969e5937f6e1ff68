pub mod config;
pub mod cursor;
pub mod error;
pub mod loader;
pub mod offsets;
pub mod plugin;
pub mod reader;
pub mod registry;
pub mod repository;
pub mod schema;
pub mod stager;
pub mod template;
pub mod track;
pub mod vcs;
pub mod versions;

pub use config::{LoaderConfig, RepositorySettings};
pub use cursor::Cursor;
pub use error::TrackError;
pub use loader::{PROGRAM_NAME, SharedVcs, TrackLoader, operation_parameters};
pub use offsets::{OffsetTable, prepare_file_offset_table};
pub use plugin::{PluginCatalog, PluginLoader, PluginManifest, TrackPlugin};
pub use reader::{TrackFileReader, TrackSpecificationReader};
pub use registry::{BoxError, ParamSource, ParamSourceBinding, PluginRegistrar, Registry, Runner};
pub use repository::{
    PLUGIN_FILE_NAME, ResolvedRevision, RevisionOrigin, TRACK_FILE_NAME, TrackRepository,
};
pub use schema::TrackSchema;
pub use stager::{AssetStager, Downloader, HttpDownloader, StagedGroup, StagingReport};
pub use template::{TokenMap, TrackTemplateRenderer};
pub use track::{
    Challenge, DocumentGroup, Index, Operation, OperationType, ParallelBlock, ParamMap,
    ScheduleEntry, Task, Track,
};
pub use vcs::{GitCli, VersionControl};
pub use versions::{MASTER_BRANCH, best_match, parse_version};

use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use benchtrack::{
    LoaderConfig, OperationType, PluginCatalog, PluginRegistrar, Registry, RepositorySettings,
    ScheduleEntry, TrackError, TrackLoader, TrackPlugin, VersionControl, operation_parameters,
};
use benchtrack::{BoxError, Index, ParamMap, ParamSource, Runner};
use serde_json::{Value, json};

const PERCOLATOR_TRACK: &str = r#"{
  "meta": {
    "short-description": "Percolator benchmark",
    "description": "Percolates queries generated until {{days_before 1}}",
    "data-url": "http://benchmarks.example.org/corpora/percolator"
  },
  "indices": [
    {
      "name": "queries",
      "types": [
        {
          "name": "percolator",
          "mapping": "queries-mapping.json",
          "documents": "queries.json.zst",
          "document-count": 2000000,
          "compressed-bytes": 123,
          "uncompressed-bytes": 456
        }
      ]
    }
  ],
  "operations": [
    {"name": "index-append", "operation-type": "index", "bulk-size": 5000},
    {"name": "percolate", "operation-type": "percolate", "param-source": "random-queries"}
  ],
  "challenges": [
    {
      "name": "append-and-percolate",
      "description": "Indexes queries, then percolates",
      "schedule": [
        {"operation": "index-append", "clients": 8},
        {"parallel": {"iterations": 100, "tasks": [{"operation": "percolate"}]}}
      ]
    }
  ]
}"#;

const GEOPOINT_TRACK: &str = r#"{
  "meta": {
    "short-description": "Point coordinates from PlanetOSM",
    "description": "Geo points",
    "data-url": "http://benchmarks.example.org/corpora/geopoint"
  },
  "indices": [{"name": "osmgeopoints", "types": [{"name": "type", "mapping": "mappings.json"}]}],
  "operations": [{"name": "stats", "operation-type": "index-stats"}],
  "challenges": [{"name": "stats-only", "description": "Index stats", "schedule": [{"operation": "stats"}]}]
}"#;

#[derive(Default)]
struct FakeVcs {
    remote_branches: Vec<String>,
    local_branches: Vec<String>,
    calls: Mutex<Vec<String>>,
}

impl FakeVcs {
    fn local(branches: &[&str]) -> Self {
        Self {
            local_branches: branches.iter().map(|b| b.to_string()).collect(),
            ..Default::default()
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl VersionControl for FakeVcs {
    fn is_working_copy(&self, dir: &Path) -> bool {
        dir.join(".git").is_dir()
    }

    fn clone_repository(&self, remote: &str, _dir: &Path) -> Result<(), TrackError> {
        self.calls.lock().unwrap().push(format!("clone {remote}"));
        Ok(())
    }

    fn fetch(&self, _dir: &Path) -> Result<(), TrackError> {
        self.calls.lock().unwrap().push("fetch".into());
        Ok(())
    }

    fn checkout(&self, _dir: &Path, branch: &str) -> Result<(), TrackError> {
        self.calls.lock().unwrap().push(format!("checkout {branch}"));
        Ok(())
    }

    fn rebase(&self, _dir: &Path, branch: &str) -> Result<(), TrackError> {
        self.calls.lock().unwrap().push(format!("rebase {branch}"));
        Ok(())
    }

    fn branches(&self, _dir: &Path, remote: bool) -> Result<Vec<String>, TrackError> {
        Ok(if remote {
            self.remote_branches.clone()
        } else {
            self.local_branches.clone()
        })
    }
}

struct RandomQueries;

impl ParamSource for RandomQueries {
    fn params(&self, indices: &[Index], params: &ParamMap) -> Result<ParamMap, BoxError> {
        let mut out = params.clone();
        out.insert("index".into(), Value::from(indices[0].name.clone()));
        out.insert("query".into(), json!({"match_all": {}}));
        Ok(out)
    }
}

struct Percolate;

impl Runner for Percolate {
    fn run(&self, _params: &ParamMap) -> Result<Value, BoxError> {
        Ok(json!({"weight": 1}))
    }
}

struct PercolatorPlugin;

impl TrackPlugin for PercolatorPlugin {
    fn register(&self, registrar: &mut dyn PluginRegistrar) -> Result<(), TrackError> {
        registrar.register_param_source("random-queries", Arc::new(RandomQueries));
        registrar.register_runner("percolate", Arc::new(Percolate));
        Ok(())
    }
}

/// Lays out `<root>/tracks/default/{percolator,geopoint,.github}` as a working copy.
fn workspace(root: &Path) -> LoaderConfig {
    let tracks = root.join("tracks").join("default");
    fs::create_dir_all(tracks.join(".git")).unwrap();
    fs::create_dir_all(tracks.join(".github")).unwrap();

    let percolator = tracks.join("percolator");
    fs::create_dir_all(&percolator).unwrap();
    fs::write(percolator.join("track.json"), PERCOLATOR_TRACK).unwrap();
    fs::write(percolator.join("track-plugin.yaml"), "plugin: percolator\n").unwrap();

    let geopoint = tracks.join("geopoint");
    fs::create_dir_all(&geopoint).unwrap();
    fs::write(geopoint.join("track.json"), GEOPOINT_TRACK).unwrap();

    LoaderConfig {
        repository: RepositorySettings {
            name: "default".into(),
            url: None,
            root_dir: root.to_path_buf(),
            dir: "tracks".into(),
        },
        offline: false,
        dataset_cache: root.join("data"),
        distribution_version: Some("5.4.1".into()),
        track: "percolator".into(),
    }
}

#[test]
fn loads_track_with_its_plugin() {
    let temp = tempfile::tempdir().unwrap();
    let config = workspace(temp.path());
    let vcs = Arc::new(FakeVcs::local(&["master", "5"]));
    let loader = TrackLoader::new(config, vcs.clone());
    let catalog = PluginCatalog::new().with("percolator", Arc::new(PercolatorPlugin));

    let mut registry = Registry::new();
    let plugin = loader.load_track_plugins(&catalog, &mut registry).unwrap();
    assert_eq!(plugin.as_deref(), Some("percolator"));
    assert!(vcs.calls().is_empty(), "plugin loading must not touch the checkout");

    let track = loader.load_track(&registry).unwrap();
    assert_eq!(vcs.calls(), ["checkout 5"]);
    assert_eq!(track.name, "percolator");
    assert_eq!(track.indices.len(), 1);
    assert_eq!(track.operations.len(), 2);
    assert!(track.description.starts_with("Percolates queries generated until "));

    let group = &track.indices[0].types[0];
    let tracks_dir = temp.path().join("tracks").join("default").join("percolator");
    assert_eq!(group.mapping_file, tracks_dir.join("queries-mapping.json"));
    let data_dir = temp.path().join("data").join("percolator");
    assert_eq!(group.document_archive.as_deref(), Some(data_dir.join("queries.json.zst").as_path()));
    assert_eq!(group.document_file.as_deref(), Some(data_dir.join("queries.json").as_path()));

    let challenge = track.default_challenge().unwrap();
    let ScheduleEntry::Parallel(block) = &challenge.schedule[1] else {
        panic!("expected parallel block");
    };
    assert_eq!(block.tasks[0].iterations, 100);

    let percolate = track.operation("percolate").unwrap();
    assert_eq!(percolate.operation_type, OperationType::Custom("percolate".into()));
    assert!(registry.runner(percolate.operation_type.as_str()).is_some());
    let params = operation_parameters(&track, percolate, &registry).unwrap();
    assert_eq!(params["index"], json!("queries"));
}

#[test]
fn lists_every_visible_track() {
    let temp = tempfile::tempdir().unwrap();
    let mut config = workspace(temp.path());
    config.distribution_version = None;
    let vcs = Arc::new(FakeVcs::local(&["master"]));
    let loader = TrackLoader::new(config, vcs.clone());

    let tracks = loader.list_tracks(&Registry::new()).unwrap();
    let names: Vec<_> = tracks.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, ["geopoint", "percolator"]);
    assert_eq!(tracks[0].short_description, "Point coordinates from PlanetOSM");
    assert!(vcs.calls().iter().all(|call| call == "checkout master"));
}

#[test]
fn unknown_track_points_to_list_command() {
    let temp = tempfile::tempdir().unwrap();
    let mut config = workspace(temp.path());
    config.track = "nyc_taxis".into();
    let loader = TrackLoader::new(config, Arc::new(FakeVcs::local(&["master", "5"])));

    let err = loader.load_track(&Registry::new()).unwrap_err();
    assert!(matches!(err, TrackError::Setup(_)));
    assert_eq!(
        err.to_string(),
        "setup error: Cannot load track nyc_taxis. List the available tracks with benchtrack list."
    );
}

#[test]
fn falls_back_to_local_branch_when_remote_has_no_match() {
    let temp = tempfile::tempdir().unwrap();
    let mut config = workspace(temp.path());
    config.repository.url = Some("https://git.example.org/tracks.git".into());
    let vcs = Arc::new(FakeVcs {
        remote_branches: vec!["master".into(), "6".into()],
        local_branches: vec!["master".into(), "5".into()],
        ..Default::default()
    });
    let loader = TrackLoader::new(config, vcs.clone());

    loader.load_track(&Registry::new()).unwrap();
    assert_eq!(vcs.calls(), ["fetch", "checkout 5"]);
}

#[test]
fn offline_repository_without_working_copy_is_a_setup_error() {
    let temp = tempfile::tempdir().unwrap();
    let mut config = workspace(temp.path());
    config.repository.name = "missing".into();
    config.offline = true;
    let loader = TrackLoader::new(config, Arc::new(FakeVcs::local(&["master"])));

    let err = loader.load_track(&Registry::new()).unwrap_err();
    assert!(matches!(err, TrackError::Setup(_)));
    assert!(err.to_string().contains("must be a git repository"), "{err}");
}

#[test]
fn unregistered_plugin_code_still_parses() {
    let temp = tempfile::tempdir().unwrap();
    let config = workspace(temp.path());
    let loader = TrackLoader::new(config, Arc::new(FakeVcs::local(&["master", "5"])));

    let registry = Registry::new();
    let track = loader.load_track(&registry).unwrap();
    let percolate = track.operation("percolate").unwrap();
    let err = operation_parameters(&track, percolate, &registry).unwrap_err();
    assert!(err.to_string().contains("unknown parameter source 'random-queries'"), "{err}");
}

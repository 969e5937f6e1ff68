use serde_json::{Map, Value};

use crate::error::TrackError;

/// Position inside a track document while it is being parsed.
///
/// Each level of recursion pushes the name of the entity it descends into, so every
/// error can say where it happened without the caller inspecting the raw input.
#[derive(Clone, Debug)]
pub struct Cursor<'t> {
    track: &'t str,
    trail: Vec<String>,
}

impl<'t> Cursor<'t> {
    pub fn new(track: &'t str) -> Self {
        Self {
            track,
            trail: Vec::new(),
        }
    }

    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut trail = self.trail.clone();
        trail.push(segment.into());
        Self {
            track: self.track,
            trail,
        }
    }

    pub fn track(&self) -> &'t str {
        self.track
    }

    pub fn breadcrumb(&self) -> String {
        self.trail.join(" > ")
    }

    pub fn error(&self, message: impl AsRef<str>) -> TrackError {
        TrackError::Syntax(format!(
            "Track '{}' is invalid. {}",
            self.track,
            message.as_ref()
        ))
    }

    fn located(&self, message: String) -> TrackError {
        if self.trail.is_empty() {
            self.error(format!("{message}."))
        } else {
            self.error(format!("{message} in '{}'.", self.breadcrumb()))
        }
    }

    /// Follows a dotted path. `null` counts as absent.
    pub fn lookup<'v>(&self, root: &'v Value, path: &str) -> Option<&'v Value> {
        path.split('.')
            .try_fold(root, |node, key| node.get(key))
            .filter(|value| !value.is_null())
    }

    pub fn mandatory<'v>(&self, root: &'v Value, path: &str) -> Result<&'v Value, TrackError> {
        self.lookup(root, path)
            .ok_or_else(|| self.located(format!("Mandatory element '{path}' is missing")))
    }

    fn mismatch(&self, path: &str, expected: &str) -> TrackError {
        self.located(format!("Element '{path}' must be {expected}"))
    }

    pub fn mandatory_str<'v>(&self, root: &'v Value, path: &str) -> Result<&'v str, TrackError> {
        self.mandatory(root, path)?
            .as_str()
            .ok_or_else(|| self.mismatch(path, "a string"))
    }

    pub fn optional_str<'v>(
        &self,
        root: &'v Value,
        path: &str,
    ) -> Result<Option<&'v str>, TrackError> {
        self.lookup(root, path)
            .map(|value| value.as_str().ok_or_else(|| self.mismatch(path, "a string")))
            .transpose()
    }

    pub fn mandatory_array<'v>(
        &self,
        root: &'v Value,
        path: &str,
    ) -> Result<&'v Vec<Value>, TrackError> {
        self.mandatory(root, path)?
            .as_array()
            .ok_or_else(|| self.mismatch(path, "a list"))
    }

    pub fn optional_object<'v>(
        &self,
        root: &'v Value,
        path: &str,
    ) -> Result<Option<&'v Map<String, Value>>, TrackError> {
        self.lookup(root, path)
            .map(|value| value.as_object().ok_or_else(|| self.mismatch(path, "an object")))
            .transpose()
    }

    pub fn optional_u64(&self, root: &Value, path: &str) -> Result<Option<u64>, TrackError> {
        self.lookup(root, path)
            .map(|value| {
                value
                    .as_u64()
                    .ok_or_else(|| self.mismatch(path, "a non-negative integer"))
            })
            .transpose()
    }

    /// Optional integer that falls back to `default` when absent.
    pub fn u64_or(&self, root: &Value, path: &str, default: u64) -> Result<u64, TrackError> {
        Ok(self.optional_u64(root, path)?.unwrap_or(default))
    }

    pub fn optional_f64(&self, root: &Value, path: &str) -> Result<Option<f64>, TrackError> {
        self.lookup(root, path)
            .map(|value| value.as_f64().ok_or_else(|| self.mismatch(path, "a number")))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resolves_dotted_paths() {
        let doc = json!({"meta": {"data-url": "http://example.org"}});
        let cursor = Cursor::new("t");
        assert_eq!(
            cursor.mandatory_str(&doc, "meta.data-url").unwrap(),
            "http://example.org"
        );
        assert_eq!(cursor.optional_str(&doc, "meta.missing").unwrap(), None);
    }

    #[test]
    fn missing_mandatory_element_names_path_and_breadcrumb() {
        let cursor = Cursor::new("geonames").child("challenges").child("append-only");
        let err = cursor.mandatory(&json!({}), "schedule").unwrap_err();
        assert_eq!(
            err.to_string(),
            "track syntax error: Track 'geonames' is invalid. Mandatory element 'schedule' is missing in 'challenges > append-only'."
        );
    }

    #[test]
    fn root_level_error_has_no_breadcrumb() {
        let err = Cursor::new("t").mandatory(&json!({}), "meta.description").unwrap_err();
        assert!(
            err.to_string()
                .ends_with("Mandatory element 'meta.description' is missing."),
            "{err}"
        );
    }

    #[test]
    fn null_is_treated_as_absent() {
        let doc = json!({"clients": null});
        let cursor = Cursor::new("t");
        assert_eq!(cursor.u64_or(&doc, "clients", 1).unwrap(), 1);
        assert!(cursor.mandatory(&doc, "clients").is_err());
    }

    #[test]
    fn type_mismatch_is_attributed() {
        let doc = json!({"iterations": "ten"});
        let err = Cursor::new("t")
            .child("bulk")
            .optional_u64(&doc, "iterations")
            .unwrap_err();
        assert!(err.is_syntax());
        assert!(err.to_string().contains("'iterations' must be a non-negative integer in 'bulk'"), "{err}");
    }
}

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use handlebars::{
    Context, Handlebars, Helper, HelperDef, HelperResult, Output, RenderContext, RenderError,
};
use serde_json::Value;

use crate::error::TrackError;

pub type TokenMap = BTreeMap<String, Value>;

const DEFAULT_INPUT_FORMAT: &str = "%d/%m/%Y";
const DEFAULT_OUTPUT_FORMAT: &str = "%Y-%m-%d";

/// Expands track specification templates.
///
/// Besides caller-supplied variables, every template sees `now` (evaluation time in UNIX
/// epoch seconds) and the `days_ago` / `days_before` helpers.
pub struct TrackTemplateRenderer {
    registry: Handlebars<'static>,
    now: DateTime<Utc>,
    vars: TokenMap,
}

impl Default for TrackTemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackTemplateRenderer {
    pub fn new() -> Self {
        Self::with_now(Utc::now())
    }

    /// Pins the evaluation time.
    pub fn with_now(now: DateTime<Utc>) -> Self {
        let mut registry = Handlebars::new();
        registry.register_escape_fn(handlebars::no_escape);
        registry.register_helper("days_ago", Box::new(days_ago));
        registry.register_helper("days_before", Box::new(DaysBefore { now }));
        Self {
            registry,
            now,
            vars: TokenMap::new(),
        }
    }

    pub fn with_vars(mut self, vars: TokenMap) -> Self {
        self.vars = vars;
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub fn render_str(&self, raw: &str) -> Result<String, RenderError> {
        let mut data = self.vars.clone();
        data.insert("now".to_string(), Value::from(self.now.timestamp()));
        self.registry.render_template(raw, &data)
    }

    pub fn render_file(&self, path: &Path) -> Result<String, TrackError> {
        let raw = fs::read_to_string(path)?;
        self.render_str(&raw).map_err(|err| TrackError::Template {
            file: path.to_path_buf(),
            message: err.to_string(),
        })
    }
}

/// `{{days_ago start end [format]}}`: whole days from `start` to `end`.
fn days_ago(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let format = string_param(h, 2).unwrap_or(DEFAULT_INPUT_FORMAT);
    let start = date_param(h, 0, format)?;
    let end = date_param(h, 1, format)?;
    out.write(&(end - start).num_days().to_string())?;
    Ok(())
}

/// `{{days_before n [format]}}`: the date `n` days before evaluation time.
struct DaysBefore {
    now: DateTime<Utc>,
}

impl HelperDef for DaysBefore {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'reg, 'rc>,
        _: &'reg Handlebars<'reg>,
        _: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        let days = h
            .param(0)
            .and_then(|p| p.value().as_i64())
            .ok_or_else(|| RenderError::new("days_before expects a whole number of days"))?;
        let format = string_param(h, 1).unwrap_or(DEFAULT_OUTPUT_FORMAT);
        let date = TimeDelta::try_days(days)
            .and_then(|delta| self.now.checked_sub_signed(delta))
            .ok_or_else(|| RenderError::new("days_before: day count out of range"))?;
        out.write(&date.format(format).to_string())?;
        Ok(())
    }
}

fn string_param<'a>(h: &'a Helper, idx: usize) -> Option<&'a str> {
    h.param(idx).and_then(|p| p.value().as_str())
}

fn date_param(h: &Helper, idx: usize, format: &str) -> Result<NaiveDate, RenderError> {
    let value = h
        .param(idx)
        .map(|p| p.value())
        .ok_or_else(|| RenderError::new(format!("days_ago is missing argument {}", idx + 1)))?;
    match value {
        Value::Number(n) => n
            .as_f64()
            .and_then(|secs| DateTime::from_timestamp(secs as i64, 0))
            .map(|dt| dt.date_naive())
            .ok_or_else(|| RenderError::new(format!("days_ago cannot interpret timestamp {n}"))),
        Value::String(s) => NaiveDate::parse_from_str(s, format).map_err(|err| {
            RenderError::new(format!("days_ago cannot parse '{s}' with format '{format}': {err}"))
        }),
        other => Err(RenderError::new(format!(
            "days_ago expects a date or timestamp, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn renderer() -> TrackTemplateRenderer {
        TrackTemplateRenderer::with_now(Utc.with_ymd_and_hms(2017, 3, 15, 12, 0, 0).unwrap())
    }

    #[test]
    fn exposes_now_as_epoch_seconds() {
        let rendered = renderer().render_str(r#"{"ts": {{now}}}"#).unwrap();
        assert_eq!(rendered, r#"{"ts": 1489579200}"#);
    }

    #[test]
    fn days_ago_counts_days_until_now() {
        let rendered = renderer()
            .render_str(r#"{{days_ago "01/03/2017" now}}"#)
            .unwrap();
        assert_eq!(rendered, "14");
    }

    #[test]
    fn days_ago_accepts_custom_format() {
        let rendered = renderer()
            .render_str(r#"{{days_ago "2017-01-01" "2017-01-31" "%Y-%m-%d"}}"#)
            .unwrap();
        assert_eq!(rendered, "30");
    }

    #[test]
    fn days_before_formats_relative_dates() {
        let rendered = renderer()
            .render_str(r#"logs-{{days_before 15}}|{{days_before 1 "%d.%m.%Y"}}"#)
            .unwrap();
        assert_eq!(rendered, "logs-2017-02-28|14.03.2017");
    }

    #[test]
    fn days_before_rejects_out_of_range_day_counts() {
        let err = renderer()
            .render_str("{{days_before 9223372036854775807}}")
            .unwrap_err();
        assert!(err.to_string().contains("day count out of range"), "{err}");

        // representable as a delta, but before the earliest date chrono supports
        let err = renderer()
            .render_str("{{days_before 200000000}}")
            .unwrap_err();
        assert!(err.to_string().contains("day count out of range"), "{err}");
    }

    #[test]
    fn out_of_range_day_count_is_a_template_error_naming_the_file() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("track.json");
        fs::write(&path, r#"{"index": "logs-{{days_before 9223372036854775807}}"}"#).unwrap();

        let err = renderer().render_file(&path).unwrap_err();
        assert!(err.is_syntax());
        match err {
            TrackError::Template { file, message } => {
                assert_eq!(file, path);
                assert!(message.contains("day count out of range"), "{message}");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn substitutes_variables_and_control_flow_without_escaping() {
        let mut vars = TokenMap::new();
        vars.insert("shards".into(), Value::from(2));
        vars.insert("indices".into(), serde_json::json!(["a", "b"]));
        let rendered = renderer()
            .with_vars(vars)
            .render_str(r#"{{shards}} {{#each indices}}"{{this}}"{{#unless @last}},{{/unless}}{{/each}}"#)
            .unwrap();
        assert_eq!(rendered, r#"2 "a","b""#);
    }

    #[test]
    fn syntax_errors_name_the_file() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("track.json");
        fs::write(&path, "{{#each indices}} unterminated").unwrap();

        let err = renderer().render_file(&path).unwrap_err();
        assert!(err.is_syntax());
        match err {
            TrackError::Template { file, .. } => assert_eq!(file, path),
            other => panic!("unexpected error {other:?}"),
        }
    }
}

//! Turns an arbitrary pipeline document into a canonical [`Pipeline`].
//!
//! Normalization is a fixed sequence of passes over the raw document followed
//! by per-job field passes (see [`job`]). The order matters: each pass relies
//! on what the passes before it established.
//!
//! | Pass | Pre-condition | Post-condition |
//! |------|---------------|----------------|
//! | filter templates | root is a mapping | every key is a string not starting with `.` |
//! | coerce image | - | `image` is a string |
//! | scan stages | - | `stages` is a non-empty unique list; every mapping job has a stage from it |
//! | listify scripts | - | list-valued jobs become `{script: [...]}` |
//! | scan stages (again) | listified jobs are mappings | every job has a stage |
//! | before/after script | stages scanned | non-empty `before_script`/`after_script` are synthetic jobs with their own stage |
//!
//! Anything malformed beyond a non-mapping root is coerced to a default or dropped.

mod job;

pub(crate) use job::combine_variables;

use crate::coerce::{as_string, as_string_list, string_list, string_map, string_or};
use crate::config::Settings;
use crate::error::{CiError, Result};
use crate::model::*;
use indexmap::IndexMap;
use job::{build_job, JobContext};
use serde_yaml::{Mapping, Value};

/// Job key of the synthetic job built from `before_script`.
pub const BEFORE_SCRIPT_JOB: &str = "before:script";
/// Job key of the synthetic job built from `after_script`.
pub const AFTER_SCRIPT_JOB: &str = "after:script";

type DocumentPass = fn(&Normalizer, Mapping) -> Mapping;

const DOCUMENT_PASSES: &[(&str, DocumentPass)] = &[
    ("filter-templates", Normalizer::filter_templates),
    ("coerce-image", Normalizer::coerce_image),
    ("scan-stages", Normalizer::scan_stages),
    ("listify-scripts", Normalizer::listify_scripts),
    ("scan-stages", Normalizer::scan_stages),
    ("before-after-script", Normalizer::convert_before_after_script),
];

/// Normalizes pipeline documents with fixed defaults and forced variables.
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    settings: Settings,
    forced_variables: Variables,
}

impl Normalizer {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            forced_variables: Variables::new(),
        }
    }

    /// Variables that override anything the pipeline declares. Empty values are dropped.
    pub fn with_forced_variables(mut self, variables: Variables) -> Self {
        self.forced_variables = variables
            .into_iter()
            .filter(|(_, value)| !value.is_empty())
            .collect();
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn forced_variables(&self) -> &Variables {
        &self.forced_variables
    }

    /// Parse YAML text and normalize it.
    pub fn normalize_str(&self, content: &str) -> Result<Pipeline> {
        let document: Value = serde_yaml::from_str(content)?;
        self.normalize(document)
    }

    /// Normalize a parsed document. Fails only when the root is not a mapping.
    pub fn normalize(&self, document: Value) -> Result<Pipeline> {
        let mapping = match document {
            Value::Mapping(mapping) => mapping,
            other => {
                return Err(CiError::InvalidInput(format!(
                    "expected a mapping at the root, got {}",
                    kind(&other)
                )))
            }
        };

        let mapping = DOCUMENT_PASSES.iter().fold(mapping, |doc, (name, pass)| {
            log::debug!("Normalization pass: {}", name);
            pass(self, doc)
        });

        Ok(self.assemble(mapping))
    }

    /// Drop non-string keys and `.`-prefixed template jobs.
    fn filter_templates(&self, doc: Mapping) -> Mapping {
        doc.into_iter()
            .filter(|(key, _)| matches!(key.as_str(), Some(k) if !k.starts_with('.')))
            .collect()
    }

    /// Resolve `image` to a single string.
    fn coerce_image(&self, mut doc: Mapping) -> Mapping {
        let image = string_or(doc.get(KEY_IMAGE), &self.settings.default_image);
        doc.insert(key(KEY_IMAGE), Value::String(image));
        doc
    }

    /// Collect declared stages plus any stage first seen on a job, then give
    /// every mapping job a stage from that list.
    fn scan_stages(&self, doc: Mapping) -> Mapping {
        let (declared, doc) = take_key(doc, KEY_STAGES);

        let mut stages: Vec<String> = Vec::new();
        let job_stages = doc
            .iter()
            .filter(|(k, _)| is_job_key(k))
            .filter_map(|(_, v)| v.as_mapping())
            .filter_map(|job| job.get(JOB_STAGE).and_then(as_string));
        for stage in string_list(declared.as_ref()).into_iter().chain(job_stages) {
            if !stage.is_empty() && !stages.contains(&stage) {
                stages.push(stage);
            }
        }
        if stages.is_empty() {
            stages.push(self.settings.default_stage.clone());
        }

        let mut doc = map_jobs(doc, |_, value| match value {
            Value::Mapping(mut job) => {
                let stage = job
                    .get(JOB_STAGE)
                    .and_then(as_string)
                    .filter(|s| stages.contains(s))
                    .unwrap_or_else(|| stages[0].clone());
                job.insert(key(JOB_STAGE), Value::String(stage));
                Value::Mapping(job)
            }
            other => other,
        });

        doc.insert(key(KEY_STAGES), string_sequence(stages));
        doc
    }

    /// A job given as a bare list of commands becomes `{script: [...]}`.
    fn listify_scripts(&self, doc: Mapping) -> Mapping {
        map_jobs(doc, |_, value| match value {
            Value::Sequence(_) => match as_string_list(&value) {
                Some(script) if !script.is_empty() => {
                    let mut job = Mapping::new();
                    job.insert(key(JOB_SCRIPT), string_sequence(script));
                    Value::Mapping(job)
                }
                _ => value,
            },
            other => other,
        })
    }

    /// Turn non-empty `before_script`/`after_script` into synthetic jobs whose
    /// stage is spliced at the front/back of `stages`.
    fn convert_before_after_script(&self, doc: Mapping) -> Mapping {
        let (before, doc) = take_key(doc, KEY_BEFORE_SCRIPT);
        let (after, doc) = take_key(doc, KEY_AFTER_SCRIPT);
        let (stages, mut doc) = take_key(doc, KEY_STAGES);
        let mut stages = string_list(stages.as_ref());

        for (source, job_key, prepend) in [
            (before, BEFORE_SCRIPT_JOB, true),
            (after, AFTER_SCRIPT_JOB, false),
        ] {
            let script = string_list(source.as_ref());
            if script.is_empty() {
                continue;
            }

            let stage = if prepend { KEY_BEFORE_SCRIPT } else { KEY_AFTER_SCRIPT };
            stages.retain(|s| s != stage);
            if prepend {
                stages.insert(0, stage.to_string());
            } else {
                stages.push(stage.to_string());
            }

            let mut job = Mapping::new();
            job.insert(key(JOB_STAGE), Value::String(stage.to_string()));
            job.insert(key(JOB_SCRIPT), string_sequence(script));
            doc.insert(key(job_key), Value::Mapping(job));
        }

        doc.insert(key(KEY_STAGES), string_sequence(stages));
        doc
    }

    /// Build the typed pipeline. Pipeline-level `variables` are distributed to
    /// the jobs here and do not survive into the result.
    fn assemble(&self, doc: Mapping) -> Pipeline {
        let image = string_or(doc.get(KEY_IMAGE), &self.settings.default_image);
        let stages = string_list(doc.get(KEY_STAGES));
        let pipeline_variables = string_map(doc.get(KEY_VARIABLES));

        let ctx = JobContext {
            settings: &self.settings,
            stages: &stages,
            pipeline_variables: &pipeline_variables,
            forced_variables: &self.forced_variables,
        };

        let mut jobs = IndexMap::new();
        for (name, value) in &doc {
            let Some(name) = name.as_str().filter(|n| !is_reserved(n)) else {
                continue;
            };
            match value {
                Value::Mapping(raw) => {
                    jobs.insert(name.to_string(), build_job(raw, &ctx));
                }
                other => {
                    log::warn!("Dropping job '{}': expected a mapping, got {}", name, kind(other));
                }
            }
        }

        Pipeline {
            image,
            stages,
            jobs,
        }
    }
}

fn key(name: &str) -> Value {
    Value::String(name.to_string())
}

fn is_job_key(key: &Value) -> bool {
    key.as_str().is_some_and(|k| !is_reserved(k))
}

fn string_sequence(items: Vec<String>) -> Value {
    Value::Sequence(items.into_iter().map(Value::String).collect())
}

/// Remove `name` from the document, keeping the order of the other keys.
fn take_key(doc: Mapping, name: &str) -> (Option<Value>, Mapping) {
    let mut taken = None;
    let rest = doc
        .into_iter()
        .filter_map(|(k, v)| {
            if k.as_str() == Some(name) {
                taken = Some(v);
                None
            } else {
                Some((k, v))
            }
        })
        .collect();
    (taken, rest)
}

/// Rewrite the value of every job entry, leaving reserved keys untouched.
fn map_jobs(doc: Mapping, mut f: impl FnMut(&str, Value) -> Value) -> Mapping {
    doc.into_iter()
        .map(|(k, v)| {
            let v = match k.as_str() {
                Some(name) if !is_reserved(name) => f(name, v),
                _ => v,
            };
            (k, v)
        })
        .collect()
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

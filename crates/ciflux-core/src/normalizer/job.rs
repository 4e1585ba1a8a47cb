//! Per-job field passes. Each one reads the raw job mapping and produces one
//! fully-populated field of [`Job`].

use crate::coerce::{as_string, string_list, string_map, string_or};
use crate::config::Settings;
use crate::model::*;
use serde_yaml::{Mapping, Value};

const ARTIFACTS_NAME: &str = "name";
const ARTIFACTS_EXPIRE_IN: &str = "expire_in";
const ARTIFACTS_PATHS: &str = "paths";
const ONLY_REFS: &str = "refs";
const ONLY_VARIABLES: &str = "variables";

/// Pipeline-wide inputs shared by every job of one normalization.
pub(crate) struct JobContext<'a> {
    pub settings: &'a Settings,
    pub stages: &'a [String],
    pub pipeline_variables: &'a Variables,
    pub forced_variables: &'a Variables,
}

pub(crate) fn build_job(raw: &Mapping, ctx: &JobContext<'_>) -> Job {
    Job {
        stage: stage(raw, ctx.stages, &ctx.settings.default_stage),
        script: string_list(raw.get(JOB_SCRIPT)),
        variables: combine_variables(
            string_map(raw.get(JOB_VARIABLES)),
            ctx.pipeline_variables,
            ctx.forced_variables,
        ),
        tags: tags(raw),
        dependencies: string_list(raw.get(JOB_DEPENDENCIES)),
        artifacts: artifacts(raw, ctx.settings),
        only: only(raw),
    }
}

/// The job's stage when it is a known one, otherwise the first stage.
fn stage(raw: &Mapping, stages: &[String], fallback: &str) -> String {
    raw.get(JOB_STAGE)
        .and_then(as_string)
        .filter(|s| stages.contains(s))
        .or_else(|| stages.first().cloned())
        .unwrap_or_else(|| fallback.to_string())
}

fn tags(raw: &Mapping) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for tag in string_list(raw.get(JOB_TAGS)) {
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    tags
}

/// Pipeline variables only fill gaps; forced variables always win.
pub(crate) fn combine_variables(
    mut own: Variables,
    pipeline: &Variables,
    forced: &Variables,
) -> Variables {
    for (name, value) in pipeline {
        own.entry(name.clone()).or_insert_with(|| value.clone());
    }
    for (name, value) in forced {
        own.insert(name.clone(), value.clone());
    }
    own
}

fn artifacts(raw: &Mapping, settings: &Settings) -> Artifacts {
    let mut artifacts = Artifacts {
        name: settings.default_artifact_name.clone(),
        expire_in: settings.default_artifact_expire_in.clone(),
        paths: Vec::new(),
    };

    match raw.get(JOB_ARTIFACTS) {
        Some(value @ Value::Sequence(_)) => {
            artifacts.paths = string_list(Some(value));
        }
        Some(Value::Mapping(declared)) => {
            artifacts.paths = string_list(declared.get(ARTIFACTS_PATHS));
            artifacts.name =
                string_or(declared.get(ARTIFACTS_NAME), &settings.default_artifact_name);
            artifacts.expire_in = string_or(
                declared.get(ARTIFACTS_EXPIRE_IN),
                &settings.default_artifact_expire_in,
            );
        }
        _ => {}
    }

    artifacts
}

/// Flatten every token under `only` and split it: `$`-prefixed tokens are
/// variable conditions, the rest are refs.
fn only(raw: &Mapping) -> Only {
    let mut found = Vec::new();
    match raw.get(JOB_ONLY) {
        Some(Value::Mapping(declared)) => {
            found.extend(string_list(declared.get(ONLY_VARIABLES)));
            found.extend(string_list(declared.get(ONLY_REFS)));
        }
        other => found.extend(string_list(other)),
    }
    found.retain(|token| token != ONLY_REFS && token != ONLY_VARIABLES);

    let (variables, refs): (Vec<String>, Vec<String>) =
        found.into_iter().partition(|token| token.starts_with('$'));
    Only { refs, variables }
}

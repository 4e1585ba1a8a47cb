use crate::model::Variables;
use regex::Regex;
use std::sync::LazyLock;

/// Pipeline sources that count as a triggered pipeline (as opposed to a push).
pub const TRIGGERED_SOURCES: &[&str] = &["trigger", "api", "pipeline", "schedule", "web"];

const SLUG_MAX_LEN: usize = 63;
const DESCRIPTION_FULL_BELOW: usize = 100;

static NON_ALNUM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^0-9a-z]+").expect("valid slug regex"));

/// Facts about the commit/event a pipeline runs for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildInfo {
    /// Branch or tag name the project is built for
    pub commit_ref_name: String,
    /// How the pipeline was triggered: push, web, trigger, schedule, api, pipeline
    pub pipeline_source: String,
    pub commit_message: String,
    pub commit_sha: String,
    /// Present only when building a tag
    pub commit_tag: Option<String>,
}

impl BuildInfo {
    pub fn new(
        commit_ref_name: impl Into<String>,
        pipeline_source: impl Into<String>,
        commit_message: impl Into<String>,
        commit_sha: impl Into<String>,
    ) -> Self {
        Self {
            commit_ref_name: commit_ref_name.into(),
            pipeline_source: pipeline_source.into(),
            commit_message: commit_message.into(),
            commit_sha: commit_sha.into(),
            commit_tag: None,
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.commit_tag = Some(tag.into());
        self
    }

    pub fn is_triggered(&self) -> bool {
        TRIGGERED_SOURCES.contains(&self.pipeline_source.as_str())
    }

    /// The predefined `CI_*` variables for this run.
    pub fn variables(&self) -> Variables {
        let mut vars = Variables::new();
        vars.insert("CI".to_string(), "true".to_string());
        vars.insert("CI_COMMIT_REF_NAME".to_string(), self.commit_ref_name.clone());
        vars.insert("CI_PIPELINE_SOURCE".to_string(), self.pipeline_source.clone());
        vars.insert("CI_COMMIT_MESSAGE".to_string(), self.commit_message.clone());
        vars.insert("CI_COMMIT_SHA".to_string(), self.commit_sha.clone());
        vars.insert("CI_COMMIT_REF_SLUG".to_string(), ref_slug(&self.commit_ref_name));
        vars.insert("CI_COMMIT_TITLE".to_string(), commit_title(&self.commit_message));
        vars.insert(
            "CI_COMMIT_DESCRIPTION".to_string(),
            commit_description(&self.commit_message),
        );
        vars.insert(
            "CI_PIPELINE_TRIGGERED".to_string(),
            self.is_triggered().to_string(),
        );
        if let Some(tag) = self.commit_tag.as_ref().filter(|t| !t.is_empty()) {
            vars.insert("CI_COMMIT_TAG".to_string(), tag.clone());
        }
        vars
    }
}

/// Lowercase, runs outside `[0-9a-z]` collapsed to `-`, at most 63 characters,
/// no leading or trailing `-`.
pub fn ref_slug(ref_name: &str) -> String {
    let lowered = ref_name.to_lowercase();
    let replaced = NON_ALNUM.replace_all(&lowered, "-");
    let truncated: String = replaced.chars().take(SLUG_MAX_LEN).collect();
    truncated.trim_matches('-').to_string()
}

/// First line of the commit message.
pub fn commit_title(message: &str) -> String {
    message.split('\n').next().unwrap_or_default().to_string()
}

/// Full message when short, otherwise the message without its first line.
pub fn commit_description(message: &str) -> String {
    if message.chars().count() < DESCRIPTION_FULL_BELOW {
        return message.to_string();
    }
    match message.split_once('\n') {
        Some((_, rest)) => rest.to_string(),
        None => message.to_string(),
    }
}

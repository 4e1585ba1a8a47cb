//! Decides per job whether it may run for the current build.
//!
//! Evaluation reads only the job's own resolved variables, so jobs and
//! pipelines can be evaluated independently (and concurrently).

pub mod condition;

pub use condition::{substitute, Condition};

use crate::model::{Job, Pipeline};

/// Ref that matches when the pipeline was triggered (see `CI_PIPELINE_TRIGGERED`).
pub const REF_TRIGGERS: &str = "triggers";
/// Ref that matches when a commit tag is being built.
pub const REF_TAGS: &str = "tags";

/// The three independent checks a job must pass to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Eligibility {
    /// The job has a script, or relays artifacts from its dependencies.
    pub script: bool,
    /// `only.refs` admits the current ref.
    pub refs: bool,
    /// At least one `only.variables` condition holds.
    pub variables: bool,
}

impl Eligibility {
    pub fn evaluate(job: &Job) -> Self {
        Self {
            script: script_eligible(job),
            refs: ref_eligible(job),
            variables: variables_eligible(job),
        }
    }

    pub fn is_runnable(&self) -> bool {
        self.script && self.refs && self.variables
    }

    /// Name of the first failed check.
    pub fn failed_check(&self) -> Option<&'static str> {
        if !self.script {
            Some("no script")
        } else if !self.refs {
            Some("ref not matched")
        } else if !self.variables {
            Some("no variable condition matched")
        } else {
            None
        }
    }
}

fn script_eligible(job: &Job) -> bool {
    // every normalized job carries an artifacts record, so a dependency is enough
    !job.script.is_empty() || !job.dependencies.is_empty()
}

fn ref_eligible(job: &Job) -> bool {
    if job.only.is_unrestricted() {
        return true;
    }

    let vars = &job.variables;
    job.only.refs.iter().any(|r| match r.as_str() {
        REF_TRIGGERS => vars
            .get("CI_PIPELINE_TRIGGERED")
            .is_some_and(|v| v == "true"),
        REF_TAGS => vars.contains_key("CI_COMMIT_TAG"),
        name => vars
            .get("CI_COMMIT_REF_NAME")
            .is_some_and(|current| current == name),
    })
}

/// Conditions are disjunctive: any single match is enough.
fn variables_eligible(job: &Job) -> bool {
    if job.only.variables.is_empty() {
        return true;
    }
    job.only
        .variables
        .iter()
        .any(|raw| Condition::parse(raw).matches(&job.variables))
}

/// Remove every job that fails one of its checks.
pub fn retain_eligible(mut pipeline: Pipeline) -> Pipeline {
    pipeline.jobs.retain(|name, job| {
        let eligibility = Eligibility::evaluate(job);
        if let Some(reason) = eligibility.failed_check() {
            log::debug!("Removing job '{}': {}", name, reason);
        }
        eligibility.is_runnable()
    });
    pipeline
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Artifacts, Only, Variables};
    use indexmap::IndexMap;

    fn job(script: &[&str], refs: &[&str], conditions: &[&str], vars: &[(&str, &str)]) -> Job {
        Job {
            stage: "test".to_string(),
            script: script.iter().map(|s| s.to_string()).collect(),
            variables: vars
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<Variables>(),
            tags: Vec::new(),
            dependencies: Vec::new(),
            artifacts: Artifacts {
                name: "a".to_string(),
                expire_in: "1 day".to_string(),
                paths: Vec::new(),
            },
            only: Only {
                refs: refs.iter().map(|s| s.to_string()).collect(),
                variables: conditions.iter().map(|s| s.to_string()).collect(),
            },
        }
    }

    #[test]
    fn test_unrestricted_job_runs() {
        let eligibility = Eligibility::evaluate(&job(&["make"], &[], &[], &[]));
        assert!(eligibility.is_runnable());
        assert_eq!(eligibility.failed_check(), None);
    }

    #[test]
    fn test_script_required() {
        let eligibility = Eligibility::evaluate(&job(&[], &[], &[], &[]));
        assert!(!eligibility.script);
        assert_eq!(eligibility.failed_check(), Some("no script"));
    }

    #[test]
    fn test_artifact_relay_job_without_script() {
        let mut relay = job(&[], &[], &[], &[]);
        assert!(!Eligibility::evaluate(&relay).script);

        relay.dependencies = vec!["build".to_string()];
        assert!(relay.artifacts.paths.is_empty());
        assert!(Eligibility::evaluate(&relay).script);
    }

    #[test]
    fn test_ref_name_match() {
        let main = [("CI_COMMIT_REF_NAME", "main")];
        let dev = [("CI_COMMIT_REF_NAME", "dev")];
        assert!(Eligibility::evaluate(&job(&["x"], &["main"], &[], &main)).refs);
        assert!(!Eligibility::evaluate(&job(&["x"], &["main"], &[], &dev)).refs);
    }

    #[test]
    fn test_triggers_ref() {
        let triggered = [("CI_PIPELINE_TRIGGERED", "true")];
        let pushed = [("CI_PIPELINE_TRIGGERED", "false")];
        assert!(Eligibility::evaluate(&job(&["x"], &["triggers"], &[], &triggered)).refs);
        assert!(!Eligibility::evaluate(&job(&["x"], &["triggers"], &[], &pushed)).refs);
    }

    #[test]
    fn test_tags_ref() {
        let tagged = [("CI_COMMIT_TAG", "v1.0"), ("CI_COMMIT_REF_NAME", "v1.0")];
        let untagged = [("CI_COMMIT_REF_NAME", "tags")];
        assert!(Eligibility::evaluate(&job(&["x"], &["tags"], &[], &tagged)).refs);
        // the keyword never falls back to a plain ref-name comparison
        assert!(!Eligibility::evaluate(&job(&["x"], &["tags"], &[], &untagged)).refs);
    }

    #[test]
    fn test_variable_conditions_are_disjunctive() {
        let vars = [("CI_COMMIT_REF_NAME", "main"), ("B", "1")];
        let eligibility =
            Eligibility::evaluate(&job(&["x"], &["main"], &["$A", "$B == \"1\""], &vars));
        assert!(eligibility.variables);

        let eligibility = Eligibility::evaluate(&job(&["x"], &["main"], &["$A", "$C"], &vars));
        assert!(!eligibility.variables);
        assert_eq!(eligibility.failed_check(), Some("no variable condition matched"));
    }

    #[test]
    fn test_variables_without_refs_are_not_ref_eligible() {
        let eligibility = Eligibility::evaluate(&job(&["x"], &[], &["$A"], &[("A", "1")]));
        assert!(eligibility.variables);
        assert!(!eligibility.refs);
    }

    #[test]
    fn test_retain_eligible() {
        let vars = [("CI_COMMIT_REF_NAME", "dev")];
        let mut jobs = IndexMap::new();
        jobs.insert("always".to_string(), job(&["make"], &[], &[], &vars));
        jobs.insert("main_only".to_string(), job(&["deploy"], &["main"], &[], &vars));
        let pipeline = Pipeline {
            image: "alpine".to_string(),
            stages: vec!["test".to_string()],
            jobs,
        };

        let pipeline = retain_eligible(pipeline);
        assert_eq!(pipeline.job_names(), vec!["always"]);
    }
}

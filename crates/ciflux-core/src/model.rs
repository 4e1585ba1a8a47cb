use crate::error::Result;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;

/// Ordered `NAME -> value` variable bindings.
pub type Variables = IndexMap<String, String>;

pub const KEY_STAGES: &str = "stages";
pub const KEY_IMAGE: &str = "image";
pub const KEY_VARIABLES: &str = "variables";
pub const KEY_BEFORE_SCRIPT: &str = "before_script";
pub const KEY_AFTER_SCRIPT: &str = "after_script";
pub const KEY_SERVICES: &str = "services";

pub const JOB_STAGE: &str = "stage";
pub const JOB_SCRIPT: &str = "script";
pub const JOB_VARIABLES: &str = "variables";
pub const JOB_TAGS: &str = "tags";
pub const JOB_DEPENDENCIES: &str = "dependencies";
pub const JOB_ARTIFACTS: &str = "artifacts";
pub const JOB_ONLY: &str = "only";

/// Top-level keys of a pipeline definition that are never job names.
pub const RESERVED_KEYS: &[&str] = &[
    KEY_STAGES,
    KEY_IMAGE,
    KEY_BEFORE_SCRIPT,
    KEY_AFTER_SCRIPT,
    KEY_VARIABLES,
    KEY_SERVICES,
];

pub fn is_reserved(key: &str) -> bool {
    RESERVED_KEYS.contains(&key)
}

/// Artifact archive produced by a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifacts {
    pub name: String,
    pub expire_in: String,
    pub paths: Vec<String>,
}

/// Run restrictions of a job.
///
/// `variables` holds the `$`-prefixed conditions, `refs` everything else
/// (branch names, `tags`, `triggers`).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Only {
    pub refs: Vec<String>,
    pub variables: Vec<String>,
}

impl Only {
    pub fn is_unrestricted(&self) -> bool {
        self.refs.is_empty() && self.variables.is_empty()
    }
}

/// A normalized job. Every field is always present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub stage: String,
    pub script: Vec<String>,
    pub variables: Variables,
    pub tags: Vec<String>,
    pub dependencies: Vec<String>,
    pub artifacts: Artifacts,
    pub only: Only,
}

/// A normalized pipeline definition.
///
/// Serializes back into the same document shape it was built from, with the
/// jobs flattened next to `image` and `stages`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pipeline {
    pub image: String,
    pub stages: Vec<String>,
    #[serde(flatten)]
    pub jobs: IndexMap<String, Job>,
}

impl Pipeline {
    /// Get a job by name.
    pub fn get_job(&self, name: &str) -> Option<&Job> {
        self.jobs.get(name)
    }

    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    pub fn job_names(&self) -> Vec<String> {
        self.jobs.keys().cloned().collect()
    }

    /// Jobs of one stage, in definition order.
    pub fn jobs_in_stage<'a>(
        &'a self,
        stage: &'a str,
    ) -> impl Iterator<Item = (&'a String, &'a Job)> {
        self.jobs.iter().filter(move |(_, job)| job.stage == stage)
    }

    /// Convert back into a document value that normalizes to the same pipeline.
    pub fn to_document(&self) -> Result<Value> {
        Ok(serde_yaml::to_value(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_job(stage: &str) -> Job {
        Job {
            stage: stage.to_string(),
            script: vec!["make".to_string()],
            variables: Variables::new(),
            tags: Vec::new(),
            dependencies: Vec::new(),
            artifacts: Artifacts {
                name: "archive".to_string(),
                expire_in: "1 day".to_string(),
                paths: Vec::new(),
            },
            only: Only::default(),
        }
    }

    #[test]
    fn test_reserved_keys() {
        assert!(is_reserved("stages"));
        assert!(is_reserved("services"));
        assert!(!is_reserved("build"));
    }

    #[test]
    fn test_jobs_in_stage_keeps_order() {
        let mut jobs = IndexMap::new();
        jobs.insert("b".to_string(), sample_job("build"));
        jobs.insert("t".to_string(), sample_job("test"));
        jobs.insert("a".to_string(), sample_job("build"));
        let pipeline = Pipeline {
            image: "alpine".to_string(),
            stages: vec!["build".to_string(), "test".to_string()],
            jobs,
        };

        let names: Vec<&String> = pipeline.jobs_in_stage("build").map(|(n, _)| n).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(pipeline.job_count(), 3);
    }

    #[test]
    fn test_document_flattens_jobs() {
        let mut jobs = IndexMap::new();
        jobs.insert("compile".to_string(), sample_job("build"));
        let pipeline = Pipeline {
            image: "alpine".to_string(),
            stages: vec!["build".to_string()],
            jobs,
        };

        let doc = pipeline.to_document().unwrap();
        assert_eq!(doc["image"].as_str(), Some("alpine"));
        assert_eq!(doc["compile"]["stage"].as_str(), Some("build"));
        assert_eq!(doc["compile"]["artifacts"]["expire_in"].as_str(), Some("1 day"));

        let back: Pipeline = serde_yaml::from_value(doc).unwrap();
        assert_eq!(back, pipeline);
    }
}

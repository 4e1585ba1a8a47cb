use crate::buildinfo::BuildInfo;
use crate::config::Settings;
use crate::eligibility::retain_eligible;
use crate::error::Result;
use crate::ids::IdGenerator;
use crate::model::{Pipeline, Variables};
use crate::normalizer::{combine_variables, Normalizer};
use crate::prune::prune_orphans;
use serde_yaml::Value;
use std::sync::Arc;

/// Normalizes pipeline definitions and prepares them for a concrete build.
///
/// Typical use:
/// 1. build one planner per project, sharing the project's [`IdGenerator`]
/// 2. [`Planner::normalize`] the definition
/// 3. [`Planner::prepare`] it once the commit details are known
/// 4. hand the result (or its [`crate::Matrix`]) to whatever runs the jobs
#[derive(Debug, Clone)]
pub struct Planner {
    normalizer: Normalizer,
    ids: Arc<IdGenerator>,
}

impl Planner {
    pub fn new(settings: Settings, ids: Arc<IdGenerator>) -> Self {
        Self {
            normalizer: Normalizer::new(settings),
            ids,
        }
    }

    /// Variables supplied from outside (e.g. a trigger API). They override
    /// everything the definition declares.
    pub fn with_forced_variables(mut self, variables: Variables) -> Self {
        self.normalizer = self.normalizer.with_forced_variables(variables);
        self
    }

    pub fn ids(&self) -> &Arc<IdGenerator> {
        &self.ids
    }

    pub fn normalize(&self, document: Value) -> Result<Pipeline> {
        self.normalizer.normalize(document)
    }

    pub fn normalize_str(&self, content: &str) -> Result<Pipeline> {
        self.normalizer.normalize_str(content)
    }

    /// Inject build variables, drop jobs that may not run or whose
    /// dependencies are gone, then number the remaining jobs.
    pub fn prepare(&self, pipeline: Pipeline, build: &BuildInfo) -> Pipeline {
        let defined = pipeline.job_count();

        let pipeline = self.inject_build_variables(pipeline, build);
        let pipeline = retain_eligible(pipeline);
        let pipeline = prune_orphans(pipeline);
        let (pipeline, pipeline_id) = self.assign_ids(pipeline);

        log::info!(
            "Prepared pipeline {} for '{}': {} of {} jobs will run",
            pipeline_id,
            build.commit_ref_name,
            pipeline.job_count(),
            defined
        );
        pipeline
    }

    /// [`Planner::normalize`] followed by [`Planner::prepare`].
    pub fn plan(&self, document: Value, build: &BuildInfo) -> Result<Pipeline> {
        let pipeline = self.normalize(document)?;
        Ok(self.prepare(pipeline, build))
    }

    fn inject_build_variables(&self, mut pipeline: Pipeline, build: &BuildInfo) -> Pipeline {
        // forced variables first, build variables on top
        let mut overrides = self.normalizer.forced_variables().clone();
        overrides.extend(build.variables());
        overrides.retain(|_, value| !value.is_empty());

        for (name, job) in pipeline.jobs.iter_mut() {
            let own = std::mem::take(&mut job.variables);
            let mut vars = combine_variables(own, &Variables::new(), &overrides);
            vars.insert("CI_JOB_NAME".to_string(), name.clone());
            vars.insert("CI_JOB_STAGE".to_string(), job.stage.clone());
            job.variables = vars;
        }
        pipeline
    }

    /// One pipeline id per run; job ids in stage order.
    fn assign_ids(&self, mut pipeline: Pipeline) -> (Pipeline, u64) {
        let pipeline_id = self.ids.next_pipeline_id();
        let matrix = pipeline.to_matrix();

        for (_, jobs) in matrix.stage_groups() {
            for name in jobs.keys() {
                if let Some(job) = pipeline.jobs.get_mut(name) {
                    job.variables
                        .insert("CI_PIPELINE_ID".to_string(), pipeline_id.to_string());
                    job.variables
                        .insert("CI_JOB_ID".to_string(), self.ids.next_job_id().to_string());
                }
            }
        }
        (pipeline, pipeline_id)
    }
}

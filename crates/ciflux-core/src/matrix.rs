use crate::model::{Job, Pipeline};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Stage-ordered view of a pipeline: `jobs[i]` holds the jobs of `stages[i]`.
///
/// A matrix is a copy; changing it does not affect the pipeline it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Matrix {
    pub image: String,
    pub stages: Vec<String>,
    pub jobs: Vec<IndexMap<String, Job>>,
}

/// Commands of one job, for dry-run style reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobListing {
    pub name: String,
    pub script: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageListing {
    pub stage: String,
    pub jobs: Vec<JobListing>,
}

impl Matrix {
    pub fn from_pipeline(pipeline: &Pipeline) -> Self {
        let jobs = pipeline
            .stages
            .iter()
            .map(|stage| {
                pipeline
                    .jobs_in_stage(stage)
                    .map(|(name, job)| (name.clone(), job.clone()))
                    .collect()
            })
            .collect();

        Self {
            image: pipeline.image.clone(),
            stages: pipeline.stages.clone(),
            jobs,
        }
    }

    /// Each stage paired with its jobs, in execution order.
    pub fn stage_groups(&self) -> impl Iterator<Item = (&String, &IndexMap<String, Job>)> {
        self.stages.iter().zip(self.jobs.iter())
    }

    pub fn job_count(&self) -> usize {
        self.jobs.iter().map(IndexMap::len).sum()
    }

    pub fn run_listing(&self) -> Vec<StageListing> {
        self.stage_groups()
            .map(|(stage, jobs)| StageListing {
                stage: stage.clone(),
                jobs: jobs
                    .iter()
                    .map(|(name, job)| JobListing {
                        name: name.clone(),
                        script: job.script.clone(),
                    })
                    .collect(),
            })
            .collect()
    }
}

impl Pipeline {
    pub fn to_matrix(&self) -> Matrix {
        Matrix::from_pipeline(self)
    }
}

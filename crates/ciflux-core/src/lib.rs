pub mod buildinfo;
pub mod coerce;
pub mod config;
pub mod eligibility;
pub mod error;
pub mod ids;
pub mod matrix;
pub mod model;
pub mod normalizer;
pub mod planner;
pub mod prune;

pub use buildinfo::BuildInfo;
pub use config::Settings;
pub use eligibility::Eligibility;
pub use error::{CiError, Result};
pub use ids::{IdGenerator, IdSnapshot};
pub use matrix::{JobListing, Matrix, StageListing};
pub use model::{Artifacts, Job, Only, Pipeline, Variables};
pub use normalizer::Normalizer;
pub use planner::Planner;

//! Data model shared by every pipeline stage.

mod competency;
mod criticality;
mod finding;
mod job;
mod mapping;
pub mod text;

pub use competency::{Competency, CompetencyStatus, ProficiencyLevel, SourceTier};
pub use criticality::{CriticalityScore, FACTOR_MAX, FactorScores};
pub use finding::{FindingStatus, OverlapClass, OverlapFinding};
pub use job::{Category, Importance, JobInput, JobProfile, Responsibility, responsibility_id};
pub use mapping::{Contribution, Mapping, RelevanceScore, ScoreBreakdown};
pub use text::normalize;

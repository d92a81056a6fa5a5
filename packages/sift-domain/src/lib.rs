//! Pure evidence-retrieval logic: the candidate model, query planning, normalization and
//! de-duplication, static lexicons, and deterministic fact-anchor extraction.

pub mod anchors;
pub mod candidate;
pub mod lexicon;
pub mod normalize;
pub mod planner;
pub mod text;

pub use candidate::{
	Candidate, DeepDiveResult, DeepDiveScores, DomainFlags, Evidence, FactAnchor, Preference,
	RawRecord, ResultOrigin, ScoreBreakdown, SourceKind,
};
pub use normalize::DedupStats;
pub use planner::{PlanInput, QueryPlan, QuerySlot, QueryVariant};

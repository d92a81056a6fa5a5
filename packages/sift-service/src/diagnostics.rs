use std::time::Duration;

use serde::{Deserialize, Serialize};

use sift_domain::{Preference, SourceKind};

use crate::{caps::PipelineCaps, pipeline::Strategy};

/// Degradation and sizing report attached to every response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
	pub request_id: String,
	pub strategy: Option<Strategy>,
	pub preference: Preference,
	pub deadline_ms: u64,
	pub elapsed_ms: u64,
	pub budget_exhausted: bool,
	pub disabled_features: Vec<String>,
	pub synonyms_used: usize,
	pub plan_fallback: bool,
	pub harvest: HarvestDiagnostics,
	pub pool_size: usize,
	pub exact_duplicates_removed: usize,
	pub near_duplicates_removed: usize,
	pub caps: Option<PipelineCaps>,
	pub shortlist_size: usize,
	pub subject_gate_relaxed: bool,
	pub rerank_mode: RerankMode,
	pub interest_vector_used: bool,
	pub deep_dive: DeepDiveDiagnostics,
	pub deep_dive_count: usize,
	pub synthesis: SynthesisDiagnostics,
	pub stage_timings: Vec<StageTiming>,
	pub graph_steps: u32,
	pub fallback_used: bool,
	pub fallback_reason: Option<String>,
}
impl Diagnostics {
	pub fn record_stage(&mut self, stage: &'static str, elapsed: Duration) {
		self.stage_timings
			.push(StageTiming { stage: stage.to_string(), elapsed_ms: elapsed.as_millis() as u64 });
	}

	pub fn disable(&mut self, feature: impl Into<String>) {
		let feature = feature.into();

		if !self.disabled_features.contains(&feature) {
			self.disabled_features.push(feature);
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageTiming {
	pub stage: String,
	pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HarvestDiagnostics {
	pub queries_issued: usize,
	pub raw_records: usize,
	pub relaxed_queries: usize,
	pub failed_queries: usize,
	pub timed_out_queries: usize,
	pub retried_queries: usize,
	pub cache_hits: usize,
	pub top_up: bool,
	pub sources: Vec<SourcePool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourcePool {
	pub source: SourceKind,
	pub records: usize,
	pub ceiling: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RerankMode {
	Model,
	Heuristic,
	#[default]
	None,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntailmentMode {
	Model,
	#[default]
	Lexical,
	/// The model was tried but at least one item fell back to the lexical check.
	Mixed,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeepDiveDiagnostics {
	pub attempted: usize,
	pub fallback_count: usize,
	pub corrected_count: usize,
	pub timed_out_count: usize,
	pub anchors_dropped: usize,
	pub stopped_early: bool,
	pub entailment_mode: EntailmentMode,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SynthesisDiagnostics {
	pub ran: bool,
	pub skipped_reason: Option<String>,
	pub lenses_run: Vec<String>,
	pub lenses_skipped: Vec<String>,
	pub merged: bool,
}

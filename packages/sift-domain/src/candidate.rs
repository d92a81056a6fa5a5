use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
	Bibliographic,
	ClinicalTrials,
	Patents,
	Web,
}
impl SourceKind {
	pub const ALL: [Self; 4] = [Self::Bibliographic, Self::ClinicalTrials, Self::Patents, Self::Web];

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Bibliographic => "bibliographic",
			Self::ClinicalTrials => "clinical_trials",
			Self::Patents => "patents",
			Self::Web => "web",
		}
	}

	pub fn config(self, sources: &sift_config::Sources) -> Option<&sift_config::SourceConfig> {
		match self {
			Self::Bibliographic => sources.bibliographic.as_ref(),
			Self::ClinicalTrials => sources.clinical_trials.as_ref(),
			Self::Patents => sources.patents.as_ref(),
			Self::Web => sources.web.as_ref(),
		}
	}
}
impl fmt::Display for SourceKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preference {
	#[default]
	Precision,
	Recall,
}
impl Preference {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Precision => "precision",
			Self::Recall => "recall",
		}
	}
}

/// A search hit as returned by a literature source, before canonicalization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawRecord {
	pub title: Option<String>,
	pub abstract_text: Option<String>,
	pub year: Option<i32>,
	pub external_id: Option<String>,
	pub url: Option<String>,
	pub citations: Option<u32>,
	#[serde(default)]
	pub origin_query: String,
	#[serde(default)]
	pub origin_slot: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DomainFlags {
	pub subject_hit: bool,
	pub subject_mechanism: bool,
	pub review_framing: bool,
	pub drift: bool,
	pub domain_drift: bool,
	pub domain_reinforced: bool,
	pub objective_overlap_missing: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
	/// Objective similarity remapped to [0, 1].
	pub similarity: f32,
	pub mechanism_hits: u32,
	pub mechanism_density: f32,
	pub citations_per_year: f32,
	pub citation_velocity: f32,
	pub recency: f32,
	pub base: f32,
	pub adjustment: f32,
	pub secondary: Option<f32>,
	pub flags: DomainFlags,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
	pub title: String,
	pub abstract_text: String,
	pub year: i32,
	pub external_id: Option<String>,
	pub url: String,
	pub citations: u32,
	pub source: SourceKind,
	pub origin_query: String,
	pub origin_slot: String,
	pub score: f32,
	pub breakdown: ScoreBreakdown,
}
impl Candidate {
	/// Stable identity used to tie deep-dive results back to their candidate.
	pub fn key(&self) -> String {
		if let Some(id) = self.external_id.as_deref().filter(|id| !id.trim().is_empty()) {
			return format!("{}:{}", self.source, id.trim().to_lowercase());
		}

		format!("{}:{}", self.source, crate::normalize::normalize_title(&self.title))
	}

	/// Title and abstract joined for embedding and lexical matching.
	pub fn text(&self) -> String {
		if self.abstract_text.is_empty() {
			return self.title.clone();
		}

		format!("{}. {}", self.title, self.abstract_text)
	}

	pub fn provenance(&self) -> String {
		format!("{}/{}", self.source, self.origin_slot)
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
	pub title: String,
	pub year: i32,
	pub id: Option<String>,
	pub quote: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactAnchor {
	pub claim: String,
	pub evidence: Evidence,
}
impl FactAnchor {
	pub fn from_candidate(candidate: &Candidate, claim: &str, quote: &str) -> Self {
		Self {
			claim: claim.trim().to_string(),
			evidence: Evidence {
				title: candidate.title.clone(),
				year: candidate.year,
				id: candidate.external_id.clone(),
				quote: quote.trim().to_string(),
			},
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultOrigin {
	Model,
	Corrected,
	Fallback,
}

/// Four sub-scores, each in [0, 100].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DeepDiveScores {
	pub objective_similarity: f32,
	pub recency: f32,
	pub impact: f32,
	pub contextual_match: f32,
}
impl DeepDiveScores {
	/// Derives scores from the triage breakdown when the completion output has none.
	pub fn from_breakdown(breakdown: &ScoreBreakdown) -> Self {
		let contextual = if breakdown.flags.subject_hit { 0.5 } else { 0.0 }
			+ breakdown.mechanism_density * 0.5;

		Self {
			objective_similarity: to_percent(breakdown.similarity),
			recency: to_percent(breakdown.recency),
			impact: to_percent(breakdown.citation_velocity),
			contextual_match: to_percent(contextual),
		}
	}

	/// Fills gaps from `fallback` and clamps everything into [0, 100].
	pub fn merge(
		objective_similarity: Option<f32>,
		recency: Option<f32>,
		impact: Option<f32>,
		contextual_match: Option<f32>,
		fallback: Self,
	) -> Self {
		let pick = |value: Option<f32>, default: f32| {
			value.filter(|value| value.is_finite()).map(clamp_percent).unwrap_or(default)
		};

		Self {
			objective_similarity: pick(objective_similarity, fallback.objective_similarity),
			recency: pick(recency, fallback.recency),
			impact: pick(impact, fallback.impact),
			contextual_match: pick(contextual_match, fallback.contextual_match),
		}
	}
}

fn to_percent(unit: f32) -> f32 {
	clamp_percent(unit * 100.0)
}

fn clamp_percent(value: f32) -> f32 {
	if value.is_finite() { value.clamp(0.0, 100.0) } else { 0.0 }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeepDiveResult {
	pub candidate_key: String,
	pub summary: String,
	pub relevance_justification: String,
	pub fact_anchors: Vec<FactAnchor>,
	pub scores: DeepDiveScores,
	pub origin: ResultOrigin,
}

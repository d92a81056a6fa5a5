use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub service: Service,
	pub providers: Providers,
	#[serde(default)]
	pub sources: Sources,
	#[serde(default)]
	pub pipeline: Pipeline,
	#[serde(default)]
	pub planner: Planner,
	#[serde(default)]
	pub harvest: Harvest,
	#[serde(default)]
	pub dedup: Dedup,
	#[serde(default)]
	pub ranking: Ranking,
	#[serde(default)]
	pub caps: Caps,
	#[serde(default)]
	pub deep_dive: DeepDive,
	#[serde(default)]
	pub synthesis: Synthesis,
	#[serde(default)]
	pub cache: Cache,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Service {
	pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
	pub completion: LlmProviderConfig,
	/// Optional pairwise relevance model used by the triage re-rank.
	pub rerank: Option<ProviderConfig>,
	/// Optional entailment model used by the fact-anchor filter.
	pub entailment: Option<ProviderConfig>,
	/// Optional controlled-vocabulary lookup used for synonym expansion.
	pub vocabulary: Option<ProviderConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	#[serde(default)]
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}
impl ProviderConfig {
	pub fn is_configured(&self) -> bool {
		!self.api_key.trim().is_empty()
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub temperature: f32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Sources {
	pub bibliographic: Option<SourceConfig>,
	pub clinical_trials: Option<SourceConfig>,
	pub patents: Option<SourceConfig>,
	pub web: Option<SourceConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
	pub api_base: String,
	/// A blank key disables the source at request time.
	#[serde(default)]
	pub api_key: String,
	pub path: String,
	pub timeout_ms: u64,
	#[serde(default = "default_source_max_results")]
	pub max_results: u32,
	/// Upper bound on records kept from this source per request.
	#[serde(default = "default_source_pool_ceiling")]
	pub pool_ceiling: u32,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}
impl SourceConfig {
	pub fn is_configured(&self) -> bool {
		!self.api_key.trim().is_empty()
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Pipeline {
	pub default_deadline_ms: u64,
	/// Preferred orchestration strategy: "function" or "graph".
	pub strategy: String,
	pub graph_enabled: bool,
	pub max_graph_steps: u32,
	/// Share of the remaining time handed to the harvester.
	pub harvest_budget_fraction: f32,
	pub vocabulary_timeout_ms: u64,
	pub max_supporting_candidates: u32,
}
impl Default for Pipeline {
	fn default() -> Self {
		Self {
			default_deadline_ms: 45_000,
			strategy: "graph".to_string(),
			graph_enabled: true,
			max_graph_steps: 16,
			harvest_budget_fraction: 0.35,
			vocabulary_timeout_ms: 1_500,
			max_supporting_candidates: 3,
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Planner {
	pub max_synonyms: u32,
	pub min_synonym_chars: u32,
	pub max_synonym_chars: u32,
	pub max_objective_terms: u32,
}
impl Default for Planner {
	fn default() -> Self {
		Self { max_synonyms: 5, min_synonym_chars: 3, max_synonym_chars: 40, max_objective_terms: 8 }
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Harvest {
	/// Queries returning fewer items are retried once with their recall variant.
	pub min_items_per_query: u32,
	/// Pools smaller than this trigger a further-relaxed top-up round.
	pub min_pool: u32,
	pub min_top_up_ms: u64,
	pub retry_jitter_min_ms: u64,
	pub retry_jitter_max_ms: u64,
}
impl Default for Harvest {
	fn default() -> Self {
		Self {
			min_items_per_query: 3,
			min_pool: 20,
			min_top_up_ms: 1_500,
			retry_jitter_min_ms: 50,
			retry_jitter_max_ms: 250,
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Dedup {
	pub near_duplicate_threshold: f32,
	pub window: u32,
}
impl Default for Dedup {
	fn default() -> Self {
		Self { near_duplicate_threshold: 0.95, window: 64 }
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Ranking {
	pub similarity_weight: f32,
	pub mechanism_weight: f32,
	pub citation_weight: f32,
	pub recency_weight: f32,
	pub mechanism_hit_cap: u32,
	/// Citations per year at which the velocity term saturates.
	pub citation_velocity_cap: f32,
	pub recency_base_year: i32,
	pub interest_weight: f32,
	pub subject_mechanism_bonus: f32,
	pub review_penalty: f32,
	pub drift_penalty: f32,
	pub domain_drift_penalty: f32,
	pub domain_reinforce_bonus: f32,
	pub precision_overlap_penalty: f32,
	pub precision_subject_penalty: f32,
	pub recall_overlap_penalty: f32,
	pub recall_subject_penalty: f32,
	pub gate_min_pool: u32,
	pub rerank_window: u32,
	pub rerank_primary_weight: f32,
}
impl Default for Ranking {
	fn default() -> Self {
		Self {
			similarity_weight: 0.45,
			mechanism_weight: 0.2,
			citation_weight: 0.15,
			recency_weight: 0.2,
			mechanism_hit_cap: 4,
			citation_velocity_cap: 50.0,
			recency_base_year: 2000,
			interest_weight: 0.15,
			subject_mechanism_bonus: 0.08,
			review_penalty: 0.06,
			drift_penalty: 0.1,
			domain_drift_penalty: 0.08,
			domain_reinforce_bonus: 0.05,
			precision_overlap_penalty: 0.12,
			precision_subject_penalty: 0.1,
			recall_overlap_penalty: 0.04,
			recall_subject_penalty: 0.03,
			gate_min_pool: 3,
			rerank_window: 40,
			rerank_primary_weight: 0.7,
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Caps {
	pub precision: CapProfile,
	pub recall: CapProfile,
	/// Remaining time at or above which caps are not compressed.
	pub comfortable_ms: u64,
	pub min_pressure_factor: f32,
	pub deep_dive_estimate_ms: u64,
	pub synthesis_reserve_ms: u64,
}
impl Default for Caps {
	fn default() -> Self {
		Self {
			precision: CapProfile {
				shortlist_fraction: 0.5,
				shortlist_min: 8,
				shortlist_max: 20,
				deep_dive_fraction: 0.6,
				deep_dive_min: 5,
				deep_dive_max: 10,
			},
			recall: CapProfile {
				shortlist_fraction: 0.8,
				shortlist_min: 10,
				shortlist_max: 40,
				deep_dive_fraction: 0.5,
				deep_dive_min: 6,
				deep_dive_max: 16,
			},
			comfortable_ms: 30_000,
			min_pressure_factor: 0.25,
			deep_dive_estimate_ms: 2_500,
			synthesis_reserve_ms: 4_000,
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct CapProfile {
	pub shortlist_fraction: f32,
	pub shortlist_min: u32,
	pub shortlist_max: u32,
	pub deep_dive_fraction: f32,
	pub deep_dive_min: u32,
	pub deep_dive_max: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DeepDive {
	pub per_item_timeout_ms: u64,
	/// The loop stops once less than this remains before the deadline.
	pub safety_floor_ms: u64,
	pub use_entailment_model: bool,
	pub entailment_threshold: f32,
	pub entailment_min_remaining_ms: u64,
	pub lexical_min_overlap: f32,
	pub max_abstract_chars: u32,
}
impl Default for DeepDive {
	fn default() -> Self {
		Self {
			per_item_timeout_ms: 8_000,
			safety_floor_ms: 2_000,
			use_entailment_model: true,
			entailment_threshold: 0.5,
			entailment_min_remaining_ms: 3_000,
			lexical_min_overlap: 0.5,
			max_abstract_chars: 4_000,
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Synthesis {
	pub min_results: u32,
	pub per_lens_timeout_ms: u64,
	pub merge_timeout_ms: u64,
	/// Lenses are skipped when less than this remains.
	pub min_lens_time_ms: u64,
	pub max_findings_per_lens: u32,
}
impl Default for Synthesis {
	fn default() -> Self {
		Self {
			min_results: 3,
			per_lens_timeout_ms: 6_000,
			merge_timeout_ms: 8_000,
			min_lens_time_ms: 1_500,
			max_findings_per_lens: 12,
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Cache {
	pub embedding_capacity: u32,
	pub source_ttl_secs: u64,
	pub source_capacity: u32,
	pub vocabulary_ttl_secs: u64,
	pub vocabulary_capacity: u32,
}
impl Default for Cache {
	fn default() -> Self {
		Self {
			embedding_capacity: 4_096,
			source_ttl_secs: 900,
			source_capacity: 256,
			vocabulary_ttl_secs: 3_600,
			vocabulary_capacity: 512,
		}
	}
}

fn default_source_max_results() -> u32 {
	25
}

fn default_source_pool_ceiling() -> u32 {
	60
}

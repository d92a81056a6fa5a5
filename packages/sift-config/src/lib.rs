mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Cache, CapProfile, Caps, Config, DeepDive, Dedup, EmbeddingProviderConfig, Harvest,
	LlmProviderConfig, Pipeline, Planner, ProviderConfig, Providers, Ranking, Service,
	SourceConfig, Sources, Synthesis,
};

use std::{fs, path::Path};

pub const STRATEGIES: &str = "function, graph";

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.log_level.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.log_level must be non-empty.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}

	for (label, key) in [
		("embedding", &cfg.providers.embedding.api_key),
		("completion", &cfg.providers.completion.api_key),
	] {
		if key.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("Provider {label} api_key must be non-empty."),
			});
		}
	}

	if !matches!(cfg.pipeline.strategy.as_str(), "function" | "graph") {
		return Err(Error::UnknownValue {
			field: "pipeline.strategy",
			expected: STRATEGIES,
			value: cfg.pipeline.strategy.clone(),
		});
	}
	if cfg.pipeline.default_deadline_ms == 0 {
		return Err(Error::Validation {
			message: "pipeline.default_deadline_ms must be greater than zero.".to_string(),
		});
	}
	if cfg.pipeline.max_graph_steps == 0 {
		return Err(Error::Validation {
			message: "pipeline.max_graph_steps must be greater than zero.".to_string(),
		});
	}

	validate_fraction("pipeline.harvest_budget_fraction", cfg.pipeline.harvest_budget_fraction)?;

	if cfg.planner.min_synonym_chars > cfg.planner.max_synonym_chars {
		return Err(Error::Validation {
			message: "planner.min_synonym_chars must not exceed planner.max_synonym_chars."
				.to_string(),
		});
	}
	if cfg.planner.max_objective_terms == 0 {
		return Err(Error::Validation {
			message: "planner.max_objective_terms must be greater than zero.".to_string(),
		});
	}
	if cfg.harvest.retry_jitter_min_ms > cfg.harvest.retry_jitter_max_ms {
		return Err(Error::Validation {
			message: "harvest.retry_jitter_min_ms must not exceed harvest.retry_jitter_max_ms."
				.to_string(),
		});
	}

	for (label, source) in [
		("sources.bibliographic", cfg.sources.bibliographic.as_ref()),
		("sources.clinical_trials", cfg.sources.clinical_trials.as_ref()),
		("sources.patents", cfg.sources.patents.as_ref()),
		("sources.web", cfg.sources.web.as_ref()),
	] {
		let Some(source) = source else { continue };

		if source.max_results == 0 || source.pool_ceiling == 0 {
			return Err(Error::Validation {
				message: format!("{label} max_results and pool_ceiling must be greater than zero."),
			});
		}
	}

	validate_fraction("dedup.near_duplicate_threshold", cfg.dedup.near_duplicate_threshold)?;

	if cfg.dedup.window == 0 {
		return Err(Error::Validation {
			message: "dedup.window must be greater than zero.".to_string(),
		});
	}

	validate_ranking(cfg)?;
	validate_caps(cfg)?;

	validate_fraction("deep_dive.entailment_threshold", cfg.deep_dive.entailment_threshold)?;
	validate_fraction("deep_dive.lexical_min_overlap", cfg.deep_dive.lexical_min_overlap)?;

	if cfg.deep_dive.per_item_timeout_ms == 0 {
		return Err(Error::Validation {
			message: "deep_dive.per_item_timeout_ms must be greater than zero.".to_string(),
		});
	}
	if cfg.synthesis.min_results < 3 {
		return Err(Error::Validation {
			message: "synthesis.min_results must be at least 3.".to_string(),
		});
	}
	if cfg.cache.embedding_capacity == 0 || cfg.cache.source_capacity == 0 {
		return Err(Error::Validation {
			message: "cache capacities must be greater than zero.".to_string(),
		});
	}

	Ok(())
}

fn validate_ranking(cfg: &Config) -> Result<()> {
	let ranking = &cfg.ranking;

	for (label, value) in [
		("ranking.similarity_weight", ranking.similarity_weight),
		("ranking.mechanism_weight", ranking.mechanism_weight),
		("ranking.citation_weight", ranking.citation_weight),
		("ranking.recency_weight", ranking.recency_weight),
		("ranking.subject_mechanism_bonus", ranking.subject_mechanism_bonus),
		("ranking.review_penalty", ranking.review_penalty),
		("ranking.drift_penalty", ranking.drift_penalty),
		("ranking.domain_drift_penalty", ranking.domain_drift_penalty),
		("ranking.domain_reinforce_bonus", ranking.domain_reinforce_bonus),
		("ranking.precision_overlap_penalty", ranking.precision_overlap_penalty),
		("ranking.precision_subject_penalty", ranking.precision_subject_penalty),
		("ranking.recall_overlap_penalty", ranking.recall_overlap_penalty),
		("ranking.recall_subject_penalty", ranking.recall_subject_penalty),
	] {
		if !value.is_finite() {
			return Err(Error::Validation { message: format!("{label} must be a finite number.") });
		}
		if value < 0.0 {
			return Err(Error::Validation { message: format!("{label} must be zero or greater.") });
		}
	}

	let weight_sum = ranking.similarity_weight
		+ ranking.mechanism_weight
		+ ranking.citation_weight
		+ ranking.recency_weight;

	if weight_sum <= 0.0 {
		return Err(Error::Validation {
			message: "ranking weights must not all be zero.".to_string(),
		});
	}
	if !(0.0..=1.0).contains(&ranking.interest_weight) {
		return Err(Error::Validation {
			message: "ranking.interest_weight must be in the range 0.0-1.0.".to_string(),
		});
	}
	if !(0.0..=1.0).contains(&ranking.rerank_primary_weight) {
		return Err(Error::Validation {
			message: "ranking.rerank_primary_weight must be in the range 0.0-1.0.".to_string(),
		});
	}
	if ranking.mechanism_hit_cap == 0 {
		return Err(Error::Validation {
			message: "ranking.mechanism_hit_cap must be greater than zero.".to_string(),
		});
	}
	if !ranking.citation_velocity_cap.is_finite() || ranking.citation_velocity_cap <= 0.0 {
		return Err(Error::Validation {
			message: "ranking.citation_velocity_cap must be a positive finite number.".to_string(),
		});
	}

	let shortlist_max = cfg.caps.precision.shortlist_max.max(cfg.caps.recall.shortlist_max);

	if ranking.rerank_window < shortlist_max {
		return Err(Error::Validation {
			message: format!(
				"ranking.rerank_window must be at least the largest shortlist_max ({shortlist_max})."
			),
		});
	}

	Ok(())
}

fn validate_caps(cfg: &Config) -> Result<()> {
	for (label, profile) in [("caps.precision", &cfg.caps.precision), ("caps.recall", &cfg.caps.recall)]
	{
		validate_fraction("caps shortlist_fraction", profile.shortlist_fraction)?;
		validate_fraction("caps deep_dive_fraction", profile.deep_dive_fraction)?;

		if profile.shortlist_min == 0 || profile.shortlist_min > profile.shortlist_max {
			return Err(Error::Validation {
				message: format!("{label}.shortlist_min must be in 1..=shortlist_max."),
			});
		}
		if profile.deep_dive_min > profile.deep_dive_max {
			return Err(Error::Validation {
				message: format!("{label}.deep_dive_min must not exceed deep_dive_max."),
			});
		}
		if profile.deep_dive_max > profile.shortlist_max {
			return Err(Error::Validation {
				message: format!("{label}.deep_dive_max must not exceed shortlist_max."),
			});
		}
	}

	validate_fraction("caps.min_pressure_factor", cfg.caps.min_pressure_factor)?;

	if cfg.caps.comfortable_ms == 0 || cfg.caps.deep_dive_estimate_ms == 0 {
		return Err(Error::Validation {
			message: "caps.comfortable_ms and caps.deep_dive_estimate_ms must be greater than zero."
				.to_string(),
		});
	}

	Ok(())
}

fn validate_fraction(label: &str, value: f32) -> Result<()> {
	if !value.is_finite() || value <= 0.0 || value > 1.0 {
		return Err(Error::Validation {
			message: format!("{label} must be in the range (0.0, 1.0]."),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	cfg.pipeline.strategy = cfg.pipeline.strategy.trim().to_ascii_lowercase();

	if cfg.service.log_level.trim().is_empty() {
		cfg.service.log_level = "info".to_string();
	}

	for provider in
		[&mut cfg.providers.rerank, &mut cfg.providers.entailment, &mut cfg.providers.vocabulary]
	{
		if provider.as_ref().map(|p| p.api_base.trim().is_empty()).unwrap_or(false) {
			*provider = None;
		}
	}
}

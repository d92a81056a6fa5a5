use std::time::Duration;

use sift_domain::{PlanInput, QueryPlan, SourceKind, planner};

use crate::{Diagnostics, Error, PipelineContext, SearchRequest, SiftService};

impl SiftService {
	/// Sources with a usable credential, in fixed order. The rest are reported as disabled.
	pub(crate) fn enabled_sources(&self, diagnostics: &mut Diagnostics) -> Vec<SourceKind> {
		let mut enabled = Vec::new();

		for source in SourceKind::ALL {
			match source.config(&self.cfg.sources) {
				Some(cfg) if cfg.is_configured() => enabled.push(source),
				Some(_) => {
					let err = Error::Configuration {
						message: format!("Source {source} has no API key."),
					};

					tracing::warn!(error = %err, source = %source, "Disabling literature source.");
					diagnostics.disable(format!("source.{source}"));
				},
				None => diagnostics.disable(format!("source.{source}")),
			}
		}

		enabled
	}

	pub(crate) fn note_optional_models(&self, diagnostics: &mut Diagnostics) {
		let providers = &self.cfg.providers;
		let optional = [
			("rerank", providers.rerank.as_ref()),
			("entailment", providers.entailment.as_ref()),
			("vocabulary", providers.vocabulary.as_ref()),
		];

		for (feature, cfg) in optional {
			if !cfg.map(|cfg| cfg.is_configured()).unwrap_or(false) {
				diagnostics.disable(feature);
			}
		}

		if !self.cfg.deep_dive.use_entailment_model {
			diagnostics.disable("entailment");
		}
	}

	pub(crate) async fn plan_queries(
		&self,
		ctx: &PipelineContext,
		request: &SearchRequest,
		diagnostics: &mut Diagnostics,
	) -> QueryPlan {
		let sources = self.enabled_sources(diagnostics);
		let synonyms = match request.subject.as_deref() {
			Some(subject) => self.lookup_synonyms(ctx, subject).await,
			None => Vec::new(),
		};
		let plan = planner::plan(
			PlanInput {
				objective: &request.objective,
				subject: request.subject.as_deref(),
				synonyms: &synonyms,
				sources: &sources,
			},
			&self.cfg.planner,
		);

		diagnostics.synonyms_used = plan.synonyms.len();
		diagnostics.plan_fallback = plan.fallback;

		tracing::info!(
			request_id = %ctx.request_id(),
			slots = plan.slots.len(),
			signals = ?plan.signals,
			synonyms = plan.synonyms.len(),
			fallback = plan.fallback,
			"Query plan built."
		);

		plan
	}

	/// Vocabulary expansion for a single-component subject. Any failure yields no synonyms.
	async fn lookup_synonyms(&self, ctx: &PipelineContext, raw_subject: &str) -> Vec<String> {
		let Some(cfg) = self.cfg.providers.vocabulary.as_ref().filter(|cfg| cfg.is_configured())
		else {
			return Vec::new();
		};
		let subject = planner::sanitize_subject(raw_subject);

		if subject.is_empty() || planner::split_components(&subject).len() != 1 {
			return Vec::new();
		}

		let cache_key = subject.to_lowercase();

		if let Some(cached) = self.caches.vocabulary.get(&cache_key) {
			return cached;
		}

		let ceiling = Duration::from_millis(self.cfg.pipeline.vocabulary_timeout_ms.min(cfg.timeout_ms));
		let budget = ctx.call_budget(ceiling, Duration::ZERO);

		if budget.is_zero() {
			return Vec::new();
		}

		match tokio::time::timeout(budget, self.providers.vocabulary.synonyms(cfg, &subject)).await {
			Ok(Ok(synonyms)) => {
				self.caches.vocabulary.insert(cache_key, synonyms.clone());

				synonyms
			},
			Ok(Err(err)) => {
				tracing::warn!(error = %err, subject = %subject, "Vocabulary lookup failed.");

				Vec::new()
			},
			Err(_) => {
				tracing::warn!(subject = %subject, "Vocabulary lookup timed out.");

				Vec::new()
			},
		}
	}
}

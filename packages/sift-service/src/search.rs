use std::time::Duration;

use serde::{Deserialize, Serialize};

use sift_domain::{Candidate, DeepDiveResult, Preference, QuerySlot};

use crate::{
	Diagnostics, PipelineContext, Result, SiftService,
	pipeline::{FunctionPipeline, GraphPipeline, Pipeline, Strategy},
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchRequest {
	pub objective: String,
	#[serde(default)]
	pub subject: Option<String>,
	#[serde(default)]
	pub preference: Preference,
	/// Bypasses cached source results for this request.
	#[serde(default)]
	pub force_refresh: bool,
	/// Overrides `pipeline.strategy`.
	#[serde(default)]
	pub strategy: Option<Strategy>,
	/// Overrides `pipeline.default_deadline_ms`.
	#[serde(default)]
	pub deadline_ms: Option<u64>,
	/// Texts of previously accepted items; their mean embedding steers similarity.
	#[serde(default)]
	pub positive_examples: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResponse {
	pub queries: Vec<QuerySlot>,
	pub sections: Vec<ResultSection>,
	/// Every deep-dive result in shortlist order.
	pub deep_dives: Vec<DeepDiveResult>,
	pub executive_summary: String,
	pub diagnostics: Diagnostics,
}

/// Shortlisted candidates that came from one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSection {
	pub origin_query: String,
	/// `<source>/<slot>` of the top candidate.
	pub provenance: String,
	pub top_candidate: Candidate,
	pub deep_dive: Option<DeepDiveResult>,
	pub supporting: Vec<Candidate>,
}

/// Groups the ranked shortlist by originating query. Sections appear in the rank order of
/// their best candidate.
pub fn build_sections(
	shortlist: &[Candidate],
	results: &[DeepDiveResult],
	max_supporting: usize,
) -> Vec<ResultSection> {
	let mut sections: Vec<ResultSection> = Vec::new();

	for candidate in shortlist {
		if let Some(section) =
			sections.iter_mut().find(|section| section.origin_query == candidate.origin_query)
		{
			if section.supporting.len() < max_supporting {
				section.supporting.push(candidate.clone());
			}

			continue;
		}

		let key = candidate.key();

		sections.push(ResultSection {
			origin_query: candidate.origin_query.clone(),
			provenance: candidate.provenance(),
			top_candidate: candidate.clone(),
			deep_dive: results.iter().find(|result| result.candidate_key == key).cloned(),
			supporting: Vec::new(),
		});
	}

	sections
}

/// Why a response counts as materially incomplete, if it does.
pub fn incompleteness(diagnostics: &Diagnostics) -> Option<String> {
	if diagnostics.pool_size == 0 {
		return None;
	}
	if diagnostics.shortlist_size == 0 {
		return Some(format!("Empty shortlist from a pool of {}.", diagnostics.pool_size));
	}
	if diagnostics.deep_dive_count == 0 {
		return Some(format!(
			"No deep-dive results from a shortlist of {}.",
			diagnostics.shortlist_size
		));
	}

	None
}

impl SiftService {
	/// Runs one request end to end. Never fails: degradation is reported in diagnostics and the
	/// worst case is an empty response.
	pub async fn search(&self, request: SearchRequest) -> SearchResponse {
		let budget = Duration::from_millis(
			request.deadline_ms.unwrap_or(self.cfg.pipeline.default_deadline_ms),
		);
		let ctx = PipelineContext::new(request.preference, budget);

		self.search_with_context(&request, &ctx).await
	}

	/// Runs the preferred strategy and, on error or an incomplete result, the other one against
	/// the same deadline.
	pub async fn search_with_context(
		&self,
		request: &SearchRequest,
		ctx: &PipelineContext,
	) -> SearchResponse {
		let preferred =
			request.strategy.unwrap_or_else(|| Strategy::from_config(&self.cfg.pipeline));
		let first = self.run_strategy(preferred, request, ctx).await;
		let reason = match &first {
			Ok(response) => incompleteness(&response.diagnostics),
			Err(err) => Some(err.to_string()),
		};
		let Some(reason) = reason else {
			return self.finish(first.unwrap_or_default(), ctx, None);
		};
		let alternate = preferred.other();

		if !self.strategy_available(alternate) || ctx.is_expired() {
			tracing::warn!(
				request_id = %ctx.request_id(),
				strategy = %preferred,
				reason = %reason,
				"Strategy result is incomplete and no fallback is available."
			);

			return self.finish(first.unwrap_or_default(), ctx, Some(reason));
		}

		tracing::warn!(
			request_id = %ctx.request_id(),
			from = %preferred,
			to = %alternate,
			reason = %reason,
			"Falling back to the alternate strategy."
		);

		let second = self.run_strategy(alternate, request, ctx).await;
		let chosen = match (first, second) {
			(Ok(first), Ok(second)) => {
				if incompleteness(&second.diagnostics).is_none()
					|| second.diagnostics.deep_dive_count > first.diagnostics.deep_dive_count
				{
					second
				} else {
					first
				}
			},
			(Ok(first), Err(err)) => {
				tracing::warn!(error = %err, strategy = %alternate, "Fallback strategy failed.");

				first
			},
			(Err(_), Ok(second)) => second,
			(Err(first), Err(second)) => {
				tracing::warn!(
					request_id = %ctx.request_id(),
					first = %first,
					second = %second,
					"Both strategies failed; returning an empty response."
				);

				SearchResponse::default()
			},
		};

		self.finish(chosen, ctx, Some(reason))
	}

	fn strategy_available(&self, strategy: Strategy) -> bool {
		match strategy {
			Strategy::Function => true,
			Strategy::Graph => self.cfg.pipeline.graph_enabled,
		}
	}

	async fn run_strategy(
		&self,
		strategy: Strategy,
		request: &SearchRequest,
		ctx: &PipelineContext,
	) -> Result<SearchResponse> {
		let function = FunctionPipeline;
		let graph = GraphPipeline::new(self.cfg.pipeline.max_graph_steps);
		let pipeline: &dyn Pipeline = match strategy {
			Strategy::Function => &function,
			Strategy::Graph => &graph,
		};

		tracing::info!(
			request_id = %ctx.request_id(),
			strategy = %pipeline.strategy(),
			remaining_ms = ctx.remaining_ms(),
			"Running pipeline."
		);

		pipeline.execute(self, request, ctx).await
	}

	fn finish(
		&self,
		mut response: SearchResponse,
		ctx: &PipelineContext,
		fallback_reason: Option<String>,
	) -> SearchResponse {
		let diagnostics = &mut response.diagnostics;

		diagnostics.request_id = ctx.request_id().to_string();
		diagnostics.preference = ctx.preference();
		diagnostics.deadline_ms = ctx.budget().as_millis() as u64;
		diagnostics.elapsed_ms = ctx.elapsed().as_millis() as u64;
		diagnostics.budget_exhausted = ctx.is_expired();
		diagnostics.fallback_used = fallback_reason.is_some();
		diagnostics.fallback_reason = fallback_reason;

		tracing::info!(
			request_id = %diagnostics.request_id,
			strategy = ?diagnostics.strategy,
			pool = diagnostics.pool_size,
			shortlist = diagnostics.shortlist_size,
			deep_dives = diagnostics.deep_dive_count,
			elapsed_ms = diagnostics.elapsed_ms,
			fallback = diagnostics.fallback_used,
			"Search finished."
		);

		response
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use sift_domain::{ResultOrigin, ScoreBreakdown, SourceKind};

	fn candidate(id: &str, query: &str) -> Candidate {
		Candidate {
			title: format!("Title {id}"),
			abstract_text: String::new(),
			year: 2020,
			external_id: Some(id.to_string()),
			url: format!("https://example.org/{id}"),
			citations: 0,
			source: SourceKind::Web,
			origin_query: query.to_string(),
			origin_slot: "web.broad".to_string(),
			score: 0.0,
			breakdown: ScoreBreakdown::default(),
		}
	}

	#[test]
	fn sections_group_by_query_in_rank_order() {
		let shortlist = vec![
			candidate("a", "q1"),
			candidate("b", "q2"),
			candidate("c", "q1"),
			candidate("d", "q1"),
			candidate("e", "q1"),
		];
		let results = vec![DeepDiveResult {
			candidate_key: shortlist[1].key(),
			summary: "s".to_string(),
			relevance_justification: "j".to_string(),
			fact_anchors: Vec::new(),
			scores: Default::default(),
			origin: ResultOrigin::Fallback,
		}];
		let sections = build_sections(&shortlist, &results, 2);

		assert_eq!(sections.len(), 2);
		assert_eq!(sections[0].origin_query, "q1");
		assert_eq!(sections[0].supporting.len(), 2);
		assert!(sections[0].deep_dive.is_none());
		assert_eq!(sections[1].provenance, "web/web.broad");
		assert!(sections[1].deep_dive.is_some());
	}

	#[test]
	fn incomplete_only_with_a_pool() {
		let mut diagnostics = Diagnostics::default();

		assert!(incompleteness(&diagnostics).is_none());

		diagnostics.pool_size = 5;

		assert!(incompleteness(&diagnostics).is_some());

		diagnostics.shortlist_size = 5;
		diagnostics.deep_dive_count = 2;

		assert!(incompleteness(&diagnostics).is_none());
	}
}

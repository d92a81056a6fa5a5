//! Grounded per-candidate analysis: summary, justification, fact anchors, and sub-scores.
//!
//! Items run sequentially, each under its own ceiling. Schema violations get one corrective
//! re-prompt; anything else (or a second violation) yields the deterministic fallback result,
//! so every attempted candidate is covered.

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use sift_domain::{
	Candidate, DeepDiveResult, DeepDiveScores, FactAnchor, QueryPlan, ResultOrigin, anchors,
	lexicon, text,
};

use crate::{
	Error, PipelineContext, Result, SiftService,
	diagnostics::{DeepDiveDiagnostics, EntailmentMode},
};

#[derive(Debug, Deserialize)]
struct DeepDiveOutput {
	summary: String,
	relevance_justification: String,
	fact_anchors: Vec<AnchorOutput>,
	#[serde(default)]
	scores: Option<ScoresOutput>,
}

#[derive(Debug, Deserialize)]
struct AnchorOutput {
	claim: String,
	quote: String,
}

#[derive(Debug, Default, Deserialize)]
struct ScoresOutput {
	objective_similarity: Option<f32>,
	recency: Option<f32>,
	impact: Option<f32>,
	contextual_match: Option<f32>,
}

#[derive(Debug, Default)]
struct EntailmentUse {
	model: bool,
	lexical: bool,
}
impl EntailmentUse {
	fn mode(&self) -> EntailmentMode {
		match (self.model, self.lexical) {
			(true, true) => EntailmentMode::Mixed,
			(true, false) => EntailmentMode::Model,
			_ => EntailmentMode::Lexical,
		}
	}
}

impl SiftService {
	/// Analyzes up to `limit` shortlisted candidates in rank order. Stops before starting an
	/// item once less than the safety floor remains.
	pub(crate) async fn deep_dive(
		&self,
		ctx: &PipelineContext,
		plan: &QueryPlan,
		shortlist: &[Candidate],
		limit: usize,
		diagnostics: &mut DeepDiveDiagnostics,
	) -> Vec<DeepDiveResult> {
		let cfg = &self.cfg.deep_dive;
		let floor = Duration::from_millis(cfg.safety_floor_ms);
		let ceiling = Duration::from_millis(cfg.per_item_timeout_ms);
		let mut entailment = EntailmentUse::default();
		let mut results = Vec::new();

		for candidate in shortlist.iter().take(limit) {
			if ctx.remaining() < floor {
				diagnostics.stopped_early = true;

				tracing::warn!(
					request_id = %ctx.request_id(),
					completed = results.len(),
					limit,
					remaining_ms = ctx.remaining_ms(),
					"Deep-dive stopped at the safety floor."
				);

				break;
			}

			diagnostics.attempted += 1;

			let signals = matched_signals(plan, candidate);

			if anchors::is_effectively_empty(&candidate.abstract_text) {
				diagnostics.fallback_count += 1;

				results.push(anchors::fallback_result(candidate, &signals));

				continue;
			}

			let budget = ctx.call_budget(ceiling, floor);
			let drafted =
				match tokio::time::timeout(budget, self.draft_result(plan, candidate, &signals)).await {
					Ok(Ok(result)) => Some(result),
					Ok(Err(err)) => {
						tracing::warn!(
							request_id = %ctx.request_id(),
							error = %err,
							candidate = %candidate.key(),
							"Deep-dive fell back to deterministic extraction."
						);

						None
					},
					Err(_) => {
						tracing::warn!(
							request_id = %ctx.request_id(),
							candidate = %candidate.key(),
							timeout_ms = budget.as_millis() as u64,
							"Deep-dive item timed out."
						);

						diagnostics.timed_out_count += 1;

						None
					},
				};
			let Some(mut result) = drafted else {
				diagnostics.fallback_count += 1;

				results.push(anchors::fallback_result(candidate, &signals));

				continue;
			};

			if result.origin == ResultOrigin::Corrected {
				diagnostics.corrected_count += 1;
			}

			let drafted_anchors = std::mem::take(&mut result.fact_anchors);
			let before = drafted_anchors.len();
			let kept = self.filter_anchors(ctx, candidate, drafted_anchors, &mut entailment).await;

			diagnostics.anchors_dropped += before - kept.len();
			result.fact_anchors =
				anchors::top_up(kept, &anchors::fallback_anchors(candidate, anchors::MAX_ANCHORS));

			results.push(result);
		}

		diagnostics.entailment_mode = entailment.mode();

		tracing::info!(
			request_id = %ctx.request_id(),
			results = results.len(),
			fallback = diagnostics.fallback_count,
			corrected = diagnostics.corrected_count,
			timed_out = diagnostics.timed_out_count,
			"Deep-dive finished."
		);

		results
	}

	/// One completion call plus at most one corrective re-prompt.
	async fn draft_result(
		&self,
		plan: &QueryPlan,
		candidate: &Candidate,
		signals: &[String],
	) -> Result<DeepDiveResult> {
		let llm_cfg = &self.cfg.providers.completion;
		let messages = build_messages(plan, candidate, signals, self.cfg.deep_dive.max_abstract_chars);
		let first = self
			.providers
			.completion
			.complete_json(llm_cfg, &messages)
			.await
			.and_then(|raw| parse_output(&raw));
		let message = match first {
			Ok(output) => return Ok(into_result(candidate, output, ResultOrigin::Model)),
			Err(Error::MalformedModelOutput { message }) => message,
			Err(err) => return Err(err),
		};

		tracing::info!(
			candidate = %candidate.key(),
			reason = %message,
			"Re-prompting after invalid deep-dive output."
		);

		let corrective = corrective_messages(messages, &message);
		let raw = self.providers.completion.complete_json(llm_cfg, &corrective).await?;
		let output = parse_output(&raw)?;

		Ok(into_result(candidate, output, ResultOrigin::Corrected))
	}

	/// Drops anchors the abstract does not support. The entailment model is used when
	/// configured and time allows; any model failure falls back to the lexical check.
	async fn filter_anchors(
		&self,
		ctx: &PipelineContext,
		candidate: &Candidate,
		drafted: Vec<FactAnchor>,
		usage: &mut EntailmentUse,
	) -> Vec<FactAnchor> {
		let cfg = &self.cfg.deep_dive;

		if drafted.is_empty() {
			return drafted;
		}

		let premise = text::truncate_chars(&candidate.abstract_text, cfg.max_abstract_chars as usize);

		if let Some(model_cfg) = self.cfg.providers.entailment.as_ref().filter(|model_cfg| {
			model_cfg.is_configured()
				&& cfg.use_entailment_model
				&& ctx.remaining_ms() >= cfg.entailment_min_remaining_ms
		}) {
			let hypotheses = drafted.iter().map(|anchor| anchor.claim.clone()).collect::<Vec<_>>();
			let budget = ctx.call_budget(
				Duration::from_millis(model_cfg.timeout_ms),
				Duration::from_millis(cfg.safety_floor_ms),
			);
			let scored = if budget.is_zero() {
				None
			} else {
				match tokio::time::timeout(
					budget,
					self.providers.entailment.entail(model_cfg, &premise, &hypotheses),
				)
				.await
				{
					Ok(Ok(scores)) if scores.len() == drafted.len() => Some(scores),
					Ok(Ok(scores)) => {
						tracing::warn!(
							expected = drafted.len(),
							actual = scores.len(),
							"Entailment returned the wrong number of scores; using lexical check."
						);

						None
					},
					Ok(Err(err)) => {
						tracing::warn!(error = %err, "Entailment failed; using lexical check.");

						None
					},
					Err(_) => {
						tracing::warn!(
							timeout_ms = budget.as_millis() as u64,
							"Entailment timed out; using lexical check."
						);

						None
					},
				}
			};

			if let Some(scores) = scored {
				usage.model = true;

				return drafted
					.into_iter()
					.zip(scores)
					.filter(|(_, score)| *score >= cfg.entailment_threshold)
					.map(|(anchor, _)| anchor)
					.collect();
			}
		}

		usage.lexical = true;

		drafted
			.into_iter()
			.filter(|anchor| anchors::lexically_entailed(&premise, anchor, cfg.lexical_min_overlap))
			.collect()
	}
}

/// Objective domains the candidate also mentions, plus subject components it names.
pub fn matched_signals(plan: &QueryPlan, candidate: &Candidate) -> Vec<String> {
	let folded = text::fold_for_matching(&candidate.text());
	let mut out = plan
		.signals
		.iter()
		.filter(|signal| {
			lexicon::domain_by_name(signal)
				.map(|domain| !lexicon::matched_keywords(domain, &folded).is_empty())
				.unwrap_or(false)
		})
		.cloned()
		.collect::<Vec<_>>();

	for component in &plan.components {
		if text::contains_term(&folded, component) && !out.contains(component) {
			out.push(component.clone());
		}
	}

	out
}

fn build_messages(
	plan: &QueryPlan,
	candidate: &Candidate,
	signals: &[String],
	max_abstract_chars: u32,
) -> Vec<Value> {
	let schema = serde_json::json!({
		"summary": "string, 2-3 sentences tailored to the objective",
		"relevance_justification": "string naming the matched signals and why this item over alternatives",
		"fact_anchors": [
			{ "claim": "one atomic claim", "quote": "verbatim span copied from the abstract" }
		],
		"scores": {
			"objective_similarity": "number 0-100",
			"recency": "number 0-100",
			"impact": "number 0-100",
			"contextual_match": "number 0-100"
		}
	});
	let system_prompt = "You analyze one scientific record for a research objective. \
Output must be valid JSON only and must match the provided schema exactly. \
Ground every statement in the given abstract; do not use outside knowledge. \
Provide 3 to 5 fact anchors. Each quote must be copied verbatim from the abstract and must support its claim. \
Preserve numbers, percentages, p-values, confidence intervals, and ratios exactly.";
	let record = serde_json::json!({
		"title": candidate.title,
		"year": candidate.year,
		"id": candidate.external_id,
		"source": candidate.source.as_str(),
		"abstract": text::truncate_chars(&candidate.abstract_text, max_abstract_chars as usize),
	});
	let user_prompt = format!(
		"Return JSON matching this exact schema:\n{schema}\nObjective: {objective}\nSubject: {subject}\nMatched signals: {signals}\nRecord:\n{record}",
		objective = plan.objective,
		subject = plan.subject.as_deref().unwrap_or("none"),
		signals = if signals.is_empty() { "none".to_string() } else { signals.join(", ") },
	);

	vec![
		serde_json::json!({ "role": "system", "content": system_prompt }),
		serde_json::json!({ "role": "user", "content": user_prompt }),
	]
}

fn corrective_messages(mut messages: Vec<Value>, problem: &str) -> Vec<Value> {
	messages.push(serde_json::json!({
		"role": "user",
		"content": format!(
			"Your previous reply was rejected: {problem} Reply again with JSON only, matching the schema exactly, with 3 to 5 fact anchors."
		),
	}));

	messages
}

fn parse_output(raw: &Value) -> Result<DeepDiveOutput> {
	let output: DeepDiveOutput = serde_json::from_value(raw.clone()).map_err(|err| {
		Error::MalformedModelOutput { message: format!("Deep-dive output does not match schema: {err}.") }
	})?;

	if output.summary.trim().is_empty() {
		return Err(Error::MalformedModelOutput { message: "Summary is empty.".to_string() });
	}
	if output.relevance_justification.trim().is_empty() {
		return Err(Error::MalformedModelOutput {
			message: "Relevance justification is empty.".to_string(),
		});
	}

	let count = output.fact_anchors.len();

	if !(anchors::MIN_ANCHORS..=anchors::MAX_ANCHORS).contains(&count) {
		return Err(Error::MalformedModelOutput {
			message: format!("Expected 3 to 5 fact anchors, got {count}."),
		});
	}
	if output
		.fact_anchors
		.iter()
		.any(|anchor| anchor.claim.trim().is_empty() || anchor.quote.trim().is_empty())
	{
		return Err(Error::MalformedModelOutput {
			message: "Every fact anchor needs a claim and a quote.".to_string(),
		});
	}

	Ok(output)
}

fn into_result(candidate: &Candidate, output: DeepDiveOutput, origin: ResultOrigin) -> DeepDiveResult {
	let scores = output.scores.unwrap_or_default();

	DeepDiveResult {
		candidate_key: candidate.key(),
		summary: output.summary.trim().to_string(),
		relevance_justification: output.relevance_justification.trim().to_string(),
		fact_anchors: output
			.fact_anchors
			.iter()
			.map(|anchor| FactAnchor::from_candidate(candidate, &anchor.claim, &anchor.quote))
			.collect(),
		scores: DeepDiveScores::merge(
			scores.objective_similarity,
			scores.recency,
			scores.impact,
			scores.contextual_match,
			DeepDiveScores::from_breakdown(&candidate.breakdown),
		),
		origin,
	}
}

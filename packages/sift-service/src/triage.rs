//! Scoring, gating, and re-ranking of the de-duplicated pool.
//!
//! The primary score is a weighted sum of objective similarity, mechanism-keyword density,
//! citation velocity, and recency, normalized by the total weight, plus additive adjustments
//! for subject and domain fit. A secondary score from the relevance model (or a lightweight
//! heuristic) is blended over the head of the ranking before truncation.

use std::{cmp::Ordering, collections::HashSet, time::Duration};

use sift_config::Ranking;
use sift_domain::{
	Candidate, DomainFlags, Preference, QueryPlan, ScoreBreakdown, lexicon, normalize, text,
};

use crate::{
	PipelineContext, SearchRequest, SiftService, caps,
	diagnostics::{Diagnostics, RerankMode},
};

const MAX_EMBED_CHARS: usize = 2_000;
const MAX_RERANK_DOC_CHARS: usize = 1_000;
const MAX_OBJECTIVE_TERMS: usize = 8;

/// Request-level facts every candidate is scored against.
#[derive(Debug, Clone)]
pub struct TriageInput {
	pub objective_terms: Vec<String>,
	pub subject_tokens: Vec<String>,
	pub signals: Vec<String>,
	pub preference: Preference,
	pub current_year: i32,
}
impl TriageInput {
	pub fn from_plan(plan: &QueryPlan, preference: Preference, current_year: i32) -> Self {
		let objective_terms = if plan.objective_terms.is_empty() {
			text::tokenize(&plan.objective, MAX_OBJECTIVE_TERMS)
		} else {
			plan.objective_terms.clone()
		};

		Self {
			objective_terms,
			subject_tokens: plan.subject_tokens(),
			signals: plan.signals.clone(),
			preference,
			current_year,
		}
	}
}

/// Optional vectors for one candidate.
#[derive(Debug, Clone, Copy, Default)]
pub struct Vectors<'a> {
	pub objective: Option<&'a [f32]>,
	pub candidate: Option<&'a [f32]>,
	pub interest: Option<&'a [f32]>,
}

fn unit_similarity(lhs: Option<&[f32]>, rhs: Option<&[f32]>) -> Option<f32> {
	let cosine = text::cosine_similarity(lhs?, rhs?)?;

	Some(((cosine + 1.0) / 2.0).clamp(0.0, 1.0))
}

pub fn recency(cfg: &Ranking, year: i32, current_year: i32) -> f32 {
	if year <= cfg.recency_base_year {
		return 0.0;
	}

	let span = (current_year - cfg.recency_base_year).max(1) as f32;

	((year - cfg.recency_base_year) as f32 / span).clamp(0.0, 1.0)
}

pub fn citations_per_year(cfg: &Ranking, candidate: &Candidate, current_year: i32) -> f32 {
	let age = if candidate.year > 0 {
		(current_year - candidate.year + 1).max(1)
	} else {
		(current_year - cfg.recency_base_year).max(1)
	};

	candidate.citations as f32 / age as f32
}

/// Fills `candidate.breakdown` and `candidate.score`.
pub fn score_candidate(
	cfg: &Ranking,
	input: &TriageInput,
	candidate: &mut Candidate,
	vectors: Vectors<'_>,
) {
	let body = candidate.text();
	let folded = text::fold_for_matching(&body);
	let terms = text::term_set(&body);
	let lexical = text::lexical_overlap_ratio(&input.objective_terms, &terms);
	let mut similarity = unit_similarity(vectors.objective, vectors.candidate).unwrap_or(lexical);

	if let Some(interest) = unit_similarity(vectors.interest, vectors.candidate) {
		let weight = cfg.interest_weight.clamp(0.0, 1.0);

		similarity = (1.0 - weight) * similarity + weight * interest;
	}

	let mechanism_hits = text::count_terms(&folded, lexicon::MECHANISM_TERMS);
	let hit_cap = cfg.mechanism_hit_cap.max(1);
	let mechanism_density = mechanism_hits.min(hit_cap) as f32 / hit_cap as f32;
	let citations_per_year = citations_per_year(cfg, candidate, input.current_year);
	let citation_velocity = if cfg.citation_velocity_cap > 0.0 {
		(citations_per_year / cfg.citation_velocity_cap).clamp(0.0, 1.0)
	} else {
		0.0
	};
	let recency = recency(cfg, candidate.year, input.current_year);
	let weight_sum =
		cfg.similarity_weight + cfg.mechanism_weight + cfg.citation_weight + cfg.recency_weight;
	let weighted = cfg.similarity_weight * similarity
		+ cfg.mechanism_weight * mechanism_density
		+ cfg.citation_weight * citation_velocity
		+ cfg.recency_weight * recency;
	let base = if weight_sum > 0.0 { weighted / weight_sum } else { 0.0 };
	let flags = domain_flags(input, &folded, &terms, &candidate.title, mechanism_hits);
	let adjustment = adjustment(cfg, input, &flags);

	candidate.score = base + adjustment;
	candidate.breakdown = ScoreBreakdown {
		similarity,
		mechanism_hits,
		mechanism_density,
		citations_per_year,
		citation_velocity,
		recency,
		base,
		adjustment,
		secondary: None,
		flags,
	};
}

fn domain_flags(
	input: &TriageInput,
	folded: &str,
	terms: &HashSet<String>,
	title: &str,
	mechanism_hits: u32,
) -> DomainFlags {
	let subject_hit = input.subject_tokens.iter().any(|token| text::contains_term(folded, token));
	let folded_title = text::fold_for_matching(title);
	let review_framing = text::count_terms(&folded_title, lexicon::REVIEW_TERMS) > 0;
	let drift = text::count_terms(folded, lexicon::DRIFT_TERMS) > 0;
	let candidate_domains = lexicon::match_domains(folded);
	let domain_reinforced = candidate_domains
		.iter()
		.any(|domain| input.signals.iter().any(|signal| signal == domain.name));
	let domain_drift =
		!input.signals.is_empty() && !candidate_domains.is_empty() && !domain_reinforced;
	let specific_terms = input
		.objective_terms
		.iter()
		.filter(|term| !input.subject_tokens.contains(term))
		.cloned()
		.collect::<Vec<_>>();
	let objective_overlap_missing =
		!specific_terms.is_empty() && text::lexical_overlap_ratio(&specific_terms, terms) == 0.0;

	DomainFlags {
		subject_hit,
		subject_mechanism: subject_hit && mechanism_hits > 0,
		review_framing,
		drift,
		domain_drift,
		domain_reinforced,
		objective_overlap_missing,
	}
}

fn adjustment(cfg: &Ranking, input: &TriageInput, flags: &DomainFlags) -> f32 {
	let has_subject = !input.subject_tokens.is_empty();
	let mut adjustment = 0.0;

	if flags.subject_mechanism {
		adjustment += cfg.subject_mechanism_bonus;
	}
	if flags.review_framing && !flags.subject_hit {
		adjustment -= cfg.review_penalty;
	}
	if flags.drift && !flags.subject_hit {
		adjustment -= cfg.drift_penalty;
	}
	if flags.domain_drift {
		adjustment -= cfg.domain_drift_penalty;
	}
	if flags.domain_reinforced {
		adjustment += cfg.domain_reinforce_bonus;
	}

	let (overlap_penalty, subject_penalty) = match input.preference {
		Preference::Precision => (cfg.precision_overlap_penalty, cfg.precision_subject_penalty),
		Preference::Recall => (cfg.recall_overlap_penalty, cfg.recall_subject_penalty),
	};

	if flags.objective_overlap_missing {
		adjustment -= overlap_penalty;
	}
	if has_subject && !flags.subject_hit {
		adjustment -= subject_penalty;
	}

	adjustment
}

/// Score descending, then normalized title, then url.
pub fn compare(lhs: &Candidate, rhs: &Candidate) -> Ordering {
	rhs.score
		.total_cmp(&lhs.score)
		.then_with(|| normalize::normalize_title(&lhs.title).cmp(&normalize::normalize_title(&rhs.title)))
		.then_with(|| lhs.url.cmp(&rhs.url))
}

pub fn sort_candidates(candidates: &mut [Candidate]) {
	candidates.sort_by(compare);
}

/// Under precision, keeps only candidates naming the subject. Returns the input unchanged and
/// `true` when fewer than `min_pool` would survive.
pub fn subject_gate(
	candidates: Vec<Candidate>,
	input: &TriageInput,
	min_pool: usize,
) -> (Vec<Candidate>, bool) {
	if input.preference != Preference::Precision || input.subject_tokens.is_empty() {
		return (candidates, false);
	}

	let survivors = candidates.iter().filter(|candidate| candidate.breakdown.flags.subject_hit).count();

	if survivors < min_pool.max(1) {
		return (candidates, true);
	}

	(candidates.into_iter().filter(|candidate| candidate.breakdown.flags.subject_hit).collect(), false)
}

/// Lightweight secondary score: objective-term hits in title and abstract, recency, and
/// citation rate.
pub fn heuristic_secondary(input: &TriageInput, candidate: &Candidate) -> f32 {
	let title_hits =
		text::lexical_overlap_ratio(&input.objective_terms, &text::term_set(&candidate.title));
	let abstract_hits = text::lexical_overlap_ratio(
		&input.objective_terms,
		&text::term_set(&candidate.abstract_text),
	);

	0.4 * title_hits
		+ 0.2 * abstract_hits
		+ 0.25 * candidate.breakdown.recency
		+ 0.15 * candidate.breakdown.citation_velocity
}

fn min_max(values: &[f32]) -> Vec<f32> {
	let min = values.iter().copied().fold(f32::INFINITY, f32::min);
	let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
	let span = max - min;

	if !span.is_finite() || span <= f32::EPSILON {
		return vec![1.0; values.len()];
	}

	values.iter().map(|value| (value - min) / span).collect()
}

/// Blends min-max normalized primary and secondary scores over `window` and re-sorts it.
pub fn blend(window: &mut [Candidate], secondary: &[f32], primary_weight: f32) {
	if window.is_empty() || window.len() != secondary.len() {
		return;
	}

	let primary = min_max(&window.iter().map(|candidate| candidate.score).collect::<Vec<_>>());
	let normalized_secondary = min_max(secondary);
	let weight = primary_weight.clamp(0.0, 1.0);

	for (idx, candidate) in window.iter_mut().enumerate() {
		candidate.breakdown.secondary = Some(secondary[idx]);
		candidate.score = weight * primary[idx] + (1.0 - weight) * normalized_secondary[idx];
	}

	sort_candidates(window);
}

impl SiftService {
	/// Scores the pool, applies the subject gate, re-ranks the head, and truncates to the
	/// shortlist cap.
	pub(crate) async fn triage(
		&self,
		ctx: &PipelineContext,
		request: &SearchRequest,
		plan: &QueryPlan,
		pool: &[Candidate],
		diagnostics: &mut Diagnostics,
	) -> Vec<Candidate> {
		let cfg = &self.cfg.ranking;
		let caps = caps::compute(&self.cfg.caps, ctx.preference(), pool.len(), ctx.remaining());

		diagnostics.caps = Some(caps);

		if pool.is_empty() || caps.shortlist == 0 {
			return Vec::new();
		}

		let input = TriageInput::from_plan(plan, ctx.preference(), ctx.current_year());
		let mut texts = vec![plan.objective.clone()];

		texts.extend(pool.iter().map(|candidate| text::truncate_chars(&candidate.text(), MAX_EMBED_CHARS)));

		let vectors = self.embed_texts(ctx, &texts).await;
		let interest = self.interest_vector(ctx, &request.positive_examples).await;

		diagnostics.interest_vector_used = interest.is_some();

		let objective_vector = vectors.first().and_then(|vector| vector.as_deref());
		let mut scored = pool.to_vec();

		for (candidate, vector) in scored.iter_mut().zip(vectors.iter().skip(1)) {
			score_candidate(
				cfg,
				&input,
				candidate,
				Vectors {
					objective: objective_vector,
					candidate: vector.as_deref(),
					interest: interest.as_deref(),
				},
			);
		}

		let (mut ranked, relaxed) = subject_gate(scored, &input, cfg.gate_min_pool as usize);

		if relaxed {
			tracing::info!(
				request_id = %ctx.request_id(),
				min_pool = cfg.gate_min_pool,
				"Subject gate relaxed to the ungated pool."
			);
		}

		diagnostics.subject_gate_relaxed = relaxed;

		sort_candidates(&mut ranked);

		diagnostics.rerank_mode =
			self.rerank_head(ctx, &input, &plan.objective, caps.shortlist, &mut ranked).await;

		ranked.truncate(caps.shortlist);

		tracing::info!(
			request_id = %ctx.request_id(),
			pool = pool.len(),
			shortlist = ranked.len(),
			rerank_mode = ?diagnostics.rerank_mode,
			"Triage finished."
		);

		ranked
	}

	async fn interest_vector(&self, ctx: &PipelineContext, examples: &[String]) -> Option<Vec<f32>> {
		let examples = examples
			.iter()
			.map(|example| example.trim())
			.filter(|example| !example.is_empty())
			.map(|example| text::truncate_chars(example, MAX_EMBED_CHARS))
			.collect::<Vec<_>>();

		if examples.is_empty() {
			return None;
		}

		let vectors = self.embed_texts(ctx, &examples).await.into_iter().flatten().collect::<Vec<_>>();

		text::mean_vector(&vectors)
	}

	async fn rerank_head(
		&self,
		ctx: &PipelineContext,
		input: &TriageInput,
		objective: &str,
		shortlist: usize,
		ranked: &mut [Candidate],
	) -> RerankMode {
		let window_len =
			rerank_window_len(self.cfg.ranking.rerank_window as usize, shortlist, ranked.len());

		if window_len < 2 {
			return RerankMode::None;
		}

		let window = &mut ranked[..window_len];
		let weight = self.cfg.ranking.rerank_primary_weight;

		if let Some(cfg) = self.cfg.providers.rerank.as_ref().filter(|cfg| cfg.is_configured()) {
			let docs = window
				.iter()
				.map(|candidate| text::truncate_chars(&candidate.text(), MAX_RERANK_DOC_CHARS))
				.collect::<Vec<_>>();
			let budget = ctx.call_budget(Duration::from_millis(cfg.timeout_ms), Duration::ZERO);

			if !budget.is_zero() {
				match tokio::time::timeout(budget, self.providers.rerank.rerank(cfg, objective, &docs))
					.await
				{
					Ok(Ok(scores)) if scores.len() == window_len => {
						blend(window, &scores, weight);

						return RerankMode::Model;
					},
					Ok(Ok(scores)) => tracing::warn!(
						expected = window_len,
						actual = scores.len(),
						"Rerank returned the wrong number of scores; using heuristic."
					),
					Ok(Err(err)) => {
						tracing::warn!(error = %err, "Rerank failed; using heuristic.")
					},
					Err(_) => tracing::warn!(
						timeout_ms = budget.as_millis() as u64,
						"Rerank timed out; using heuristic."
					),
				}
			}
		}

		let secondary =
			window.iter().map(|candidate| heuristic_secondary(input, candidate)).collect::<Vec<_>>();

		blend(window, &secondary, weight);

		RerankMode::Heuristic
	}
}

/// The blended head always spans the shortlist, so every kept score sits on the same scale.
pub fn rerank_window_len(configured: usize, shortlist: usize, available: usize) -> usize {
	configured.max(shortlist).min(available)
}

#[cfg(test)]
mod tests {
	use super::*;
	use sift_domain::SourceKind;

	fn candidate(title: &str, abstract_text: &str, year: i32, citations: u32) -> Candidate {
		Candidate {
			title: title.to_string(),
			abstract_text: abstract_text.to_string(),
			year,
			external_id: None,
			url: format!("https://example.org/{}", title.len()),
			citations,
			source: SourceKind::Bibliographic,
			origin_query: "q".to_string(),
			origin_slot: "bibliographic.broad".to_string(),
			score: 0.0,
			breakdown: ScoreBreakdown::default(),
		}
	}

	fn input(preference: Preference) -> TriageInput {
		TriageInput {
			objective_terms: vec!["sotorasib".to_string(), "resistance".to_string(), "lung".to_string()],
			subject_tokens: vec!["sotorasib".to_string()],
			signals: vec!["oncology".to_string()],
			preference,
			current_year: 2025,
		}
	}

	#[test]
	fn subject_and_mechanism_outscore_drift() {
		let cfg = Ranking::default();
		let input = input(Preference::Precision);
		let mut on_topic = candidate(
			"Sotorasib resistance pathway in lung cancer",
			"Sotorasib inhibits KRAS signaling; resistance emerges via MAPK pathway reactivation.",
			2023,
			40,
		);
		let mut drift = candidate(
			"Crop soil microbiome review",
			"A review of soil bacteria in agricultural crops.",
			2023,
			40,
		);

		score_candidate(&cfg, &input, &mut on_topic, Vectors::default());
		score_candidate(&cfg, &input, &mut drift, Vectors::default());

		assert!(on_topic.breakdown.flags.subject_mechanism);
		assert!(on_topic.breakdown.flags.domain_reinforced);
		assert!(drift.breakdown.flags.drift);
		assert!(drift.breakdown.adjustment < 0.0);
		assert!(on_topic.score > drift.score);
	}

	#[test]
	fn recall_penalizes_less_than_precision() {
		let cfg = Ranking::default();
		let mut precise = candidate("Unrelated heart trial", "Blood pressure outcomes.", 2020, 5);
		let mut recall = precise.clone();

		score_candidate(&cfg, &input(Preference::Precision), &mut precise, Vectors::default());
		score_candidate(&cfg, &input(Preference::Recall), &mut recall, Vectors::default());

		assert!(recall.breakdown.adjustment > precise.breakdown.adjustment);
	}

	#[test]
	fn gate_relaxes_when_too_few_survive() {
		let cfg = Ranking::default();
		let input = input(Preference::Precision);
		let mut pool = vec![
			candidate("Sotorasib in lung cancer", "Sotorasib data.", 2022, 1),
			candidate("Other lung study", "No subject here.", 2022, 1),
			candidate("Third lung study", "Nothing.", 2022, 1),
		];

		for item in &mut pool {
			score_candidate(&cfg, &input, item, Vectors::default());
		}

		let (gated, relaxed) = subject_gate(pool.clone(), &input, 3);

		assert!(relaxed);
		assert_eq!(gated.len(), 3);

		let (gated, relaxed) = subject_gate(pool, &input, 1);

		assert!(!relaxed);
		assert_eq!(gated.len(), 1);
	}

	#[test]
	fn ordering_breaks_ties_by_title_then_url() {
		let mut items = vec![
			candidate("Beta", "", 0, 0),
			candidate("alpha", "", 0, 0),
			candidate("Alpha", "", 0, 0),
		];

		items[1].url = "https://b".to_string();
		items[2].url = "https://a".to_string();

		sort_candidates(&mut items);

		assert_eq!(items[0].url, "https://a");
		assert_eq!(items[1].url, "https://b");
		assert_eq!(items[2].title, "Beta");
	}

	#[test]
	fn blend_uses_normalized_scores() {
		let mut window = vec![candidate("a", "", 0, 0), candidate("b", "", 0, 0)];

		window[0].score = 10.0;
		window[1].score = 0.0;

		blend(&mut window, &[0.0, 1.0], 0.7);

		assert_eq!(window[0].title, "a");
		assert!((window[0].score - 0.7).abs() < 1e-6);
		assert!((window[1].score - 0.3).abs() < 1e-6);
		assert_eq!(window[1].breakdown.secondary, Some(1.0));
	}

	#[test]
	fn blended_head_covers_the_shortlist() {
		assert_eq!(rerank_window_len(2, 4, 10), 4);
		assert_eq!(rerank_window_len(40, 4, 10), 10);

		let mut ranked = (0..6)
			.map(|idx| {
				let mut item = candidate(&format!("t{idx}"), "", 0, 0);

				item.score = 5.0 - idx as f32;

				item
			})
			.collect::<Vec<_>>();
		let window_len = rerank_window_len(2, 4, ranked.len());
		let secondary = vec![0.5; window_len];

		blend(&mut ranked[..window_len], &secondary, 0.7);
		ranked.truncate(4);

		assert!(ranked.windows(2).all(|pair| pair[0].score >= pair[1].score));
		assert!(ranked.iter().all(|item| item.breakdown.secondary.is_some()));
	}

	#[test]
	fn recency_ramps_from_base_year() {
		let cfg = Ranking::default();

		assert_eq!(recency(&cfg, 1999, 2025), 0.0);
		assert_eq!(recency(&cfg, 2025, 2025), 1.0);
		assert!((recency(&cfg, 2010, 2020) - 0.5).abs() < 1e-6);
	}
}

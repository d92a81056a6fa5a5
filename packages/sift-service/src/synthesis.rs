//! Specialist lens briefs merged into one executive narrative.

use std::time::Duration;

use serde_json::Value;

use sift_domain::{Candidate, DeepDiveResult, QueryPlan, text};

use crate::{PipelineContext, SiftService, diagnostics::SynthesisDiagnostics};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lens {
	Mechanism,
	Efficacy,
	Limitations,
	ClinicalContext,
	Commercial,
}
impl Lens {
	pub const ALL: [Self; 5] =
		[Self::Mechanism, Self::Efficacy, Self::Limitations, Self::ClinicalContext, Self::Commercial];
	pub const DEFAULT: [Self; 3] = [Self::Mechanism, Self::Efficacy, Self::Limitations];

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Mechanism => "mechanism",
			Self::Efficacy => "efficacy",
			Self::Limitations => "limitations",
			Self::ClinicalContext => "clinical_context",
			Self::Commercial => "commercial",
		}
	}

	pub fn title(self) -> &'static str {
		match self {
			Self::Mechanism => "Mechanism",
			Self::Efficacy => "Biomarkers and efficacy",
			Self::Limitations => "Resistance and limitations",
			Self::ClinicalContext => "Clinical context",
			Self::Commercial => "IP and commercial",
		}
	}

	fn cues(self) -> &'static [&'static str] {
		match self {
			Self::Mechanism =>
				&["mechanism", "pathway", "signaling", "signalling", "mode of action", "target"],
			Self::Efficacy =>
				&["efficacy", "biomarker", "response", "survival", "outcome", "endpoint", "effective"],
			Self::Limitations =>
				&["resistance", "limitation", "adverse", "toxicit", "safety", "failure", "relapse"],
			Self::ClinicalContext =>
				&["clinical", "patient", "trial", "guideline", "standard of care", "dosing"],
			Self::Commercial =>
				&["patent", "commercial", "market", "licens", "competit", "intellectual property"],
		}
	}

	fn instruction(self) -> &'static str {
		match self {
			Self::Mechanism => "Explain the mechanisms of action and pathways the findings support.",
			Self::Efficacy => "Summarize efficacy signals, endpoints, and biomarkers with their numbers.",
			Self::Limitations => "Summarize resistance, safety signals, and methodological limitations.",
			Self::ClinicalContext => "Place the findings in clinical context: populations, settings, and trial stage.",
			Self::Commercial => "Summarize patent, licensing, and competitive signals.",
		}
	}

	fn first_cue(self, folded_objective: &str) -> Option<usize> {
		self.cues()
			.iter()
			.filter_map(|cue| folded_objective.find(&format!(" {}", cue.to_lowercase())))
			.min()
	}
}

/// Lenses cued by the objective, ordered by where their earliest cue appears. Falls back to
/// mechanism, efficacy, limitations.
pub fn select_lenses(objective: &str) -> Vec<Lens> {
	let folded = text::fold_for_matching(objective);
	let mut cued =
		Lens::ALL.iter().filter_map(|lens| lens.first_cue(&folded).map(|pos| (pos, *lens))).collect::<Vec<_>>();

	if cued.is_empty() {
		return Lens::DEFAULT.to_vec();
	}

	cued.sort_by_key(|(pos, _)| *pos);

	cued.into_iter().map(|(_, lens)| lens).collect()
}

/// One line per result, most lens-relevant first, capped at `limit`.
pub fn lens_findings(
	lens: Lens,
	shortlist: &[Candidate],
	results: &[DeepDiveResult],
	limit: usize,
) -> Vec<String> {
	let mut findings = results
		.iter()
		.map(|result| {
			let label = shortlist
				.iter()
				.find(|candidate| candidate.key() == result.candidate_key)
				.map(|candidate| format!("{} ({})", candidate.title, candidate.year))
				.unwrap_or_else(|| result.candidate_key.clone());
			let claims =
				result.fact_anchors.iter().map(|anchor| anchor.claim.as_str()).collect::<Vec<_>>();
			let line = if claims.is_empty() {
				format!("[{label}] {}", result.summary)
			} else {
				format!("[{label}] {} Facts: {}", result.summary, claims.join("; "))
			};
			let folded = text::fold_for_matching(&line);
			let hits = text::count_terms(&folded, lens.cues());

			(hits, line)
		})
		.collect::<Vec<_>>();

	findings.sort_by(|a, b| b.0.cmp(&a.0));
	findings.into_iter().take(limit).map(|(_, line)| line).collect()
}

pub(crate) fn skip_reason(found: usize, needed: u32) -> String {
	format!("Only {found} deep-dive result(s); synthesis needs {needed}.")
}

/// Briefs under lens headings, used when the merge pass produced nothing.
pub fn join_briefs(briefs: &[(Lens, String)]) -> String {
	briefs
		.iter()
		.map(|(lens, brief)| format!("## {}\n\n{}", lens.title(), brief.trim()))
		.collect::<Vec<_>>()
		.join("\n\n")
}

impl SiftService {
	/// Returns the executive narrative, or an empty string when there is nothing to report.
	pub(crate) async fn synthesize(
		&self,
		ctx: &PipelineContext,
		plan: &QueryPlan,
		shortlist: &[Candidate],
		results: &[DeepDiveResult],
		diagnostics: &mut SynthesisDiagnostics,
	) -> String {
		let cfg = &self.cfg.synthesis;

		if results.len() < cfg.min_results as usize {
			diagnostics.skipped_reason = Some(skip_reason(results.len(), cfg.min_results));

			return String::new();
		}

		diagnostics.ran = true;

		let min_lens_time = Duration::from_millis(cfg.min_lens_time_ms);
		let mut briefs = Vec::new();

		for lens in select_lenses(&plan.objective) {
			if ctx.remaining() < min_lens_time {
				diagnostics.lenses_skipped.push(lens.as_str().to_string());

				continue;
			}

			let findings = lens_findings(lens, shortlist, results, cfg.max_findings_per_lens as usize);
			let brief = self.run_lens(ctx, plan, lens, &findings).await;

			if brief.is_empty() {
				diagnostics.lenses_skipped.push(lens.as_str().to_string());
			} else {
				diagnostics.lenses_run.push(lens.as_str().to_string());
				briefs.push((lens, brief));
			}
		}

		if briefs.is_empty() {
			return String::new();
		}

		if ctx.remaining() >= min_lens_time {
			let merged = self.merge_briefs(ctx, plan, &briefs).await;

			if !merged.is_empty() {
				diagnostics.merged = true;

				return merged;
			}
		}

		join_briefs(&briefs)
	}

	async fn run_lens(
		&self,
		ctx: &PipelineContext,
		plan: &QueryPlan,
		lens: Lens,
		findings: &[String],
	) -> String {
		let system_prompt = format!(
			"You are a {} analyst. {} Use only the findings given. \
If the findings say nothing relevant, reply with an empty message.",
			lens.title().to_lowercase(),
			lens.instruction()
		);
		let user_prompt = format!(
			"Objective: {}\nFindings:\n- {}",
			plan.objective,
			findings.join("\n- ")
		);
		let messages = chat(&system_prompt, &user_prompt);

		self.complete_bounded(ctx, &messages, self.cfg.synthesis.per_lens_timeout_ms, lens.as_str())
			.await
	}

	async fn merge_briefs(
		&self,
		ctx: &PipelineContext,
		plan: &QueryPlan,
		briefs: &[(Lens, String)],
	) -> String {
		let system_prompt = "You write executive research summaries. Merge the specialist briefs into one \
coherent narrative that answers the objective. Keep numbers exact and do not add facts.";
		let user_prompt = format!("Objective: {}\n\n{}", plan.objective, join_briefs(briefs));
		let messages = chat(system_prompt, &user_prompt);

		self.complete_bounded(ctx, &messages, self.cfg.synthesis.merge_timeout_ms, "merge").await
	}

	/// A text completion under `ceiling_ms`. Failures and timeouts read as "nothing to report".
	async fn complete_bounded(
		&self,
		ctx: &PipelineContext,
		messages: &[Value],
		ceiling_ms: u64,
		step: &'static str,
	) -> String {
		let budget = ctx.call_budget(Duration::from_millis(ceiling_ms), Duration::ZERO);

		if budget.is_zero() {
			return String::new();
		}

		match tokio::time::timeout(
			budget,
			self.providers.completion.complete_text(&self.cfg.providers.completion, messages),
		)
		.await
		{
			Ok(Ok(reply)) => reply.trim().to_string(),
			Ok(Err(err)) => {
				tracing::warn!(request_id = %ctx.request_id(), error = %err, step, "Synthesis step failed.");

				String::new()
			},
			Err(_) => {
				tracing::warn!(
					request_id = %ctx.request_id(),
					step,
					timeout_ms = budget.as_millis() as u64,
					"Synthesis step timed out."
				);

				String::new()
			},
		}
	}
}

fn chat(system_prompt: &str, user_prompt: &str) -> Vec<Value> {
	vec![
		serde_json::json!({ "role": "system", "content": system_prompt }),
		serde_json::json!({ "role": "user", "content": user_prompt }),
	]
}

//! Deterministic summaries and fact anchors drawn from an abstract, plus the lexical
//! entailment check applied to model-produced anchors.

use std::collections::HashSet;

use regex::Regex;
use unicode_segmentation::UnicodeSegmentation;

use crate::{Candidate, DeepDiveResult, DeepDiveScores, FactAnchor, ResultOrigin, text};

pub const MIN_ANCHORS: usize = 3;
pub const MAX_ANCHORS: usize = 5;

const MIN_ABSTRACT_WORDS: usize = 3;
const MAX_QUOTE_CHARS: usize = 320;
const EFFECT_VERBS: &[&str] = &[
	"increased", "decreased", "reduced", "improved", "inhibited", "suppressed", "enhanced",
	"elevated", "lowered", "associated", "correlated", "resulted", "showed", "demonstrated",
	"prolonged", "extended", "achieved", "induced", "abrogated", "restored",
];
const QUANT_PATTERNS: &[(&str, u32)] = &[
	(r"\d+(\.\d+)?\s*%", 3),
	(r"(?i)\bp\s*[<=>≤]\s*0?\.\d+", 3),
	(r"(?i)\b(95\s*%\s*)?(ci|confidence interval)\b", 2),
	(r"(?i)\b(hazard ratio|odds ratio|risk ratio|(hr|or|rr)\s*[=:]?\s*\d)", 3),
	(r"(?i)\b(n\s*=\s*\d+|\d+\s+(patients|participants|subjects|mice|cells))\b", 2),
	(r"\d", 1),
];

/// An abstract with fewer than three words carries nothing to anchor on. Words follow Unicode
/// segmentation, so each ideograph of an unspaced script counts as one.
pub fn is_effectively_empty(abstract_text: &str) -> bool {
	abstract_text.unicode_words().take(MIN_ABSTRACT_WORDS).count() < MIN_ABSTRACT_WORDS
}

/// First two sentences of the abstract, else the title. Never empty for a canonical candidate.
pub fn fallback_summary(candidate: &Candidate) -> String {
	let sentences = text::sentences(&candidate.abstract_text);

	if sentences.is_empty() {
		return candidate.title.clone();
	}

	sentences.into_iter().take(2).collect::<Vec<_>>().join(" ")
}

pub fn fallback_justification(candidate: &Candidate, matched_signals: &[String]) -> String {
	let mut reasons = Vec::new();

	if !matched_signals.is_empty() {
		reasons.push(format!("mentions {}", matched_signals.join(", ")));
	}
	if candidate.breakdown.flags.subject_hit {
		reasons.push("names the research subject".to_string());
	}
	if candidate.breakdown.mechanism_hits > 0 {
		reasons.push(format!("carries {} mechanism cue(s)", candidate.breakdown.mechanism_hits));
	}

	if reasons.is_empty() {
		return format!("Ranked by objective similarity ({:.2}).", candidate.breakdown.similarity);
	}

	format!(
		"Selected because it {} (objective similarity {:.2}).",
		reasons.join(" and "),
		candidate.breakdown.similarity
	)
}

fn cue_score(passage: &str, patterns: &[(Regex, u32)]) -> u32 {
	let folded = text::fold_for_matching(passage);
	let pattern_score: u32 =
		patterns.iter().filter(|(re, _)| re.is_match(passage)).map(|(_, weight)| *weight).sum();

	pattern_score + text::count_terms(&folded, EFFECT_VERBS)
}

fn split_clauses(sentence: &str) -> Vec<String> {
	sentence
		.split([';', ',', ':', '；', '，', '：'])
		.map(str::trim)
		.filter(|clause| !clause.is_empty())
		.map(str::to_string)
		.collect()
}

/// Verbatim slices of the abstract covering `count` runs of consecutive words.
fn word_windows(abstract_text: &str, count: usize) -> Vec<String> {
	let words = abstract_text
		.unicode_word_indices()
		.map(|(start, word)| (start, start + word.len()))
		.collect::<Vec<_>>();

	if words.is_empty() {
		return Vec::new();
	}

	let count = count.clamp(1, words.len());

	(0..count)
		.filter_map(|i| {
			let (start, _) = words.get(i * words.len() / count)?;
			let (_, end) = words.get((i + 1) * words.len() / count - 1)?;

			abstract_text.get(*start..*end).map(str::to_string)
		})
		.filter(|window| !window.is_empty())
		.collect()
}

/// Sentences first; clauses, then word windows, when the abstract is too short to yield three.
fn passages(abstract_text: &str) -> Vec<String> {
	let sentences = text::sentences(abstract_text);

	if sentences.len() >= MIN_ANCHORS {
		return sentences;
	}

	let clauses = sentences.iter().flat_map(|sentence| split_clauses(sentence)).collect::<Vec<_>>();

	if clauses.len() >= MIN_ANCHORS {
		return clauses;
	}

	word_windows(abstract_text, MIN_ANCHORS)
}

/// Verbatim anchors taken from the abstract's most quantitative passages, at most `limit`.
/// Returns nothing for an effectively empty abstract.
pub fn fallback_anchors(candidate: &Candidate, limit: usize) -> Vec<FactAnchor> {
	if is_effectively_empty(&candidate.abstract_text) {
		return Vec::new();
	}

	let patterns = QUANT_PATTERNS
		.iter()
		.filter_map(|(pattern, weight)| Regex::new(pattern).ok().map(|re| (re, *weight)))
		.collect::<Vec<_>>();
	let mut scored = passages(&candidate.abstract_text)
		.into_iter()
		.enumerate()
		.map(|(idx, passage)| (cue_score(&passage, &patterns), idx, passage))
		.collect::<Vec<_>>();

	scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));

	let mut seen = HashSet::new();
	let mut out = Vec::new();

	for (_, _, passage) in scored {
		let quote = text::truncate_chars(passage.trim(), MAX_QUOTE_CHARS);

		if !seen.insert(quote_key(&quote)) {
			continue;
		}

		out.push(FactAnchor::from_candidate(candidate, &quote, &quote));

		if out.len() >= limit {
			break;
		}
	}

	out
}

fn quote_key(quote: &str) -> String {
	text::collapse_whitespace(quote).to_lowercase()
}

/// The quote must occur in the abstract, and the claim's content tokens must overlap the quote by
/// at least `min_overlap`.
pub fn lexically_entailed(abstract_text: &str, anchor: &FactAnchor, min_overlap: f32) -> bool {
	let quote = quote_key(&anchor.evidence.quote);

	if quote.is_empty() || !quote_key(abstract_text).contains(&quote) {
		return false;
	}

	let mut claim_tokens = text::content_tokens(&anchor.claim, usize::MAX);

	if claim_tokens.is_empty() {
		claim_tokens = text::tokenize(&anchor.claim, usize::MAX);
	}

	text::lexical_overlap_ratio(&claim_tokens, &text::term_set(&anchor.evidence.quote))
		>= min_overlap
}

/// Appends fallback anchors not already quoted until `MIN_ANCHORS` are present, then caps the
/// list at `MAX_ANCHORS`.
pub fn top_up(mut anchors: Vec<FactAnchor>, fallback: &[FactAnchor]) -> Vec<FactAnchor> {
	let mut seen = anchors.iter().map(|anchor| quote_key(&anchor.evidence.quote)).collect::<HashSet<_>>();

	for anchor in fallback {
		if anchors.len() >= MIN_ANCHORS {
			break;
		}
		if seen.insert(quote_key(&anchor.evidence.quote)) {
			anchors.push(anchor.clone());
		}
	}

	anchors.truncate(MAX_ANCHORS);

	anchors
}

/// A complete result built without any network call.
pub fn fallback_result(candidate: &Candidate, matched_signals: &[String]) -> DeepDiveResult {
	DeepDiveResult {
		candidate_key: candidate.key(),
		summary: fallback_summary(candidate),
		relevance_justification: fallback_justification(candidate, matched_signals),
		fact_anchors: fallback_anchors(candidate, MAX_ANCHORS),
		scores: DeepDiveScores::from_breakdown(&candidate.breakdown),
		origin: ResultOrigin::Fallback,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{ScoreBreakdown, SourceKind};

	fn candidate(title: &str, abstract_text: &str) -> Candidate {
		Candidate {
			title: title.to_string(),
			abstract_text: abstract_text.to_string(),
			year: 2021,
			external_id: Some("PMID:7".to_string()),
			url: String::new(),
			citations: 12,
			source: SourceKind::Bibliographic,
			origin_query: "q".to_string(),
			origin_slot: "bibliographic.review".to_string(),
			score: 0.0,
			breakdown: ScoreBreakdown::default(),
		}
	}

	#[test]
	fn quantitative_sentences_rank_first() {
		let item = candidate(
			"Trial",
			"Background is described here. Treatment reduced tumor volume by 42% (p < 0.01). \
			 Patients were enrolled. Median survival was 14.2 months (HR 0.61, 95% CI 0.45-0.82).",
		);
		let anchors = fallback_anchors(&item, MAX_ANCHORS);

		assert_eq!(anchors.len(), 4);
		assert!(anchors[0].evidence.quote.contains("HR 0.61"));
		assert!(anchors[1].evidence.quote.contains("42%"));
		assert!(anchors[2].evidence.quote.starts_with("Background"));
		assert_eq!(anchors[0].evidence.id.as_deref(), Some("PMID:7"));
	}

	#[test]
	fn short_abstracts_split_into_clauses_or_windows() {
		let clauses = fallback_anchors(
			&candidate("t", "Drug X lowered LDL by 30%, raised HDL, and was well tolerated."),
			MAX_ANCHORS,
		);

		assert_eq!(clauses.len(), 3);

		let windows = fallback_anchors(&candidate("t", "Modest benefit observed overall"), MAX_ANCHORS);

		assert_eq!(windows.len(), 3);
		assert!(fallback_anchors(&candidate("t", "Too short"), MAX_ANCHORS).is_empty());
	}

	#[test]
	fn unspaced_scripts_still_yield_anchors() {
		let abstract_text = "索托拉西布抑制了KRAS信号通路。客观缓解率为37%。中位生存期为12.5个月。";
		let item = candidate("索托拉西布", abstract_text);
		let anchors = fallback_anchors(&item, MAX_ANCHORS);

		assert!(!is_effectively_empty(abstract_text));
		assert_eq!(anchors.len(), 3);
		assert!(anchors[0].evidence.quote.contains("37%"));
		assert_eq!(fallback_result(&item, &[]).fact_anchors.len(), 3);

		let single = "索托拉西布抑制了信号通路";
		let windows = fallback_anchors(&candidate("t", single), MAX_ANCHORS);

		assert_eq!(windows.len(), 3);
		assert!(windows.iter().all(|anchor| single.contains(&anchor.evidence.quote)));
	}

	#[test]
	fn lexical_entailment_requires_verbatim_quote() {
		let abstract_text = "Inhibition of KRAS G12C reduced ERK phosphorylation in vitro.";
		let item = candidate("t", abstract_text);
		let supported = FactAnchor::from_candidate(
			&item,
			"KRAS G12C inhibition reduced ERK phosphorylation",
			"KRAS G12C reduced ERK  phosphorylation",
		);
		let invented = FactAnchor::from_candidate(&item, "Survival doubled", "survival doubled");
		let off_claim = FactAnchor::from_candidate(
			&item,
			"Survival doubled in mice",
			"reduced ERK phosphorylation",
		);

		assert!(lexically_entailed(abstract_text, &supported, 0.5));
		assert!(!lexically_entailed(abstract_text, &invented, 0.5));
		assert!(!lexically_entailed(abstract_text, &off_claim, 0.5));
	}

	#[test]
	fn top_up_fills_to_three_and_caps_at_five() {
		let item = candidate("t", "a b c");
		let anchor = |quote: &str| FactAnchor::from_candidate(&item, quote, quote);
		let fallback = vec![anchor("one"), anchor("two"), anchor("three")];
		let topped = top_up(vec![anchor("One")], &fallback);

		assert_eq!(
			topped.iter().map(|a| a.evidence.quote.as_str()).collect::<Vec<_>>(),
			vec!["One", "two", "three"]
		);

		let many = (0..7).map(|i| anchor(&format!("q{i}"))).collect::<Vec<_>>();

		assert_eq!(top_up(many, &fallback).len(), MAX_ANCHORS);
	}

	#[test]
	fn fallback_summary_prefers_abstract() {
		let item = candidate("Title only", "First. Second sentence. Third.");

		assert_eq!(fallback_summary(&item), "First. Second sentence.");
		assert_eq!(fallback_summary(&candidate("Title only", "")), "Title only");
	}
}

//! Per-source query construction from a research objective and an optional subject term.
//!
//! Planning is pure: synonyms are looked up by the caller and passed in. The planner never
//! fails; when nothing usable survives sanitization it degrades to a bag-of-words query built
//! from the raw objective.

use std::collections::HashSet;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{SourceKind, lexicon, text};

const MAX_SIGNAL_TERMS: usize = 4;
const MAX_RELAXED_TERMS: usize = 6;
const MECHANISM_CLAUSE: &str = "(mechanism OR pathway OR signaling)";
const MECHANISM_TERMS: [&str; 3] = ["mechanism", "pathway", "signaling"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryVariant {
	/// Strict and filtered.
	Review,
	Mechanism,
	Broad,
}
impl QueryVariant {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Review => "review",
			Self::Mechanism => "mechanism",
			Self::Broad => "broad",
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuerySlot {
	/// `<source>.<variant>`.
	pub name: String,
	pub source: SourceKind,
	pub variant: QueryVariant,
	pub query: String,
	/// Same intent with filters and signal clauses removed.
	pub recall: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryPlan {
	pub objective: String,
	pub subject: Option<String>,
	pub components: Vec<String>,
	pub synonyms: Vec<String>,
	/// Lexicon domains matched by the objective.
	pub signals: Vec<String>,
	pub signal_terms: Vec<String>,
	pub objective_terms: Vec<String>,
	pub slots: Vec<QuerySlot>,
	/// True when neither subject nor objective keywords survived sanitization.
	pub fallback: bool,
}
impl QueryPlan {
	/// Lowercased tokens naming the subject, its components, and accepted synonyms.
	pub fn subject_tokens(&self) -> Vec<String> {
		let mut out = Vec::new();
		let mut seen = HashSet::new();

		for phrase in self.components.iter().chain(self.synonyms.iter()) {
			for token in text::content_tokens(phrase, usize::MAX) {
				if seen.insert(token.clone()) {
					out.push(token);
				}
			}
		}

		out
	}

	pub fn slot(&self, name: &str) -> Option<&QuerySlot> {
		self.slots.iter().find(|slot| slot.name == name)
	}
}

pub struct PlanInput<'a> {
	pub objective: &'a str,
	pub subject: Option<&'a str>,
	pub synonyms: &'a [String],
	pub sources: &'a [SourceKind],
}

pub fn plan(input: PlanInput<'_>, cfg: &sift_config::Planner) -> QueryPlan {
	let objective = text::collapse_whitespace(input.objective);
	let subject = input.subject.map(sanitize_subject).filter(|value| !value.is_empty());
	let components = subject.as_deref().map(split_components).unwrap_or_default();
	let synonyms = match (subject.as_deref(), components.len()) {
		(Some(subject), 1) => filter_synonyms(subject, input.synonyms, cfg),
		_ => Vec::new(),
	};
	let folded_objective = text::fold_for_matching(&objective);
	let domains = lexicon::match_domains(&folded_objective);
	let signals = domains.iter().map(|domain| domain.name.to_string()).collect::<Vec<_>>();
	let signal_terms = domains
		.iter()
		.flat_map(|domain| lexicon::matched_keywords(domain, &folded_objective))
		.take(MAX_SIGNAL_TERMS)
		.map(str::to_string)
		.collect::<Vec<_>>();
	let objective_terms = text::content_tokens(&objective, cfg.max_objective_terms as usize);
	let mut fallback = false;
	let core = if !components.is_empty() {
		subject_clause(&components, &synonyms)
	} else if !objective_terms.is_empty() {
		objective_terms.join(" ")
	} else {
		fallback = true;

		bag_of_words(&objective, cfg.max_objective_terms as usize)
	};
	let signal_clause = or_clause(&signal_terms);
	let broad_extra = objective_terms
		.iter()
		.filter(|term| !core.to_lowercase().contains(term.as_str()))
		.cloned()
		.collect::<Vec<_>>();
	let mut slots = Vec::new();

	for source in input.sources {
		for &variant in variants_for(*source) {
			let (query, recall) = match variant {
				QueryVariant::Review => (
					compose(&[core.as_str(), signal_clause.as_str()], filters_for(*source)),
					compose(&[core.as_str()], &[]),
				),
				QueryVariant::Mechanism => (
					compose(
						&[core.as_str(), MECHANISM_CLAUSE, signal_clause.as_str()],
						filters_for(*source),
					),
					compose(&[core.as_str(), MECHANISM_CLAUSE], &[]),
				),
				QueryVariant::Broad => {
					let broad = if broad_extra.is_empty() {
						core.clone()
					} else {
						format!("{core} {}", broad_extra.join(" "))
					};

					(broad.clone(), broad)
				},
			};

			if query.trim().is_empty() {
				continue;
			}

			slots.push(QuerySlot {
				name: format!("{}.{}", source.as_str(), variant.as_str()),
				source: *source,
				variant,
				query,
				recall,
			});
		}
	}

	QueryPlan {
		objective,
		subject,
		components,
		synonyms,
		signals,
		signal_terms,
		objective_terms,
		slots,
		fallback,
	}
}

/// Drops parenthetical aliases and punctuation that is not a combination delimiter.
pub fn sanitize_subject(raw: &str) -> String {
	let without_aliases = Regex::new(r"\([^)]*\)|\[[^\]]*\]")
		.map(|re| re.replace_all(raw, " ").into_owned())
		.unwrap_or_else(|_| raw.to_string());
	let mut out = String::with_capacity(without_aliases.len());

	for ch in without_aliases.chars() {
		if ch.is_alphanumeric() || ch.is_whitespace() || matches!(ch, '-' | '+' | '/' | '&' | ',') {
			out.push(ch);
		} else {
			out.push(' ');
		}
	}

	text::collapse_whitespace(&out)
		.trim_matches(|c: char| matches!(c, ',' | '+' | '/' | '&' | ' '))
		.to_string()
}

/// Splits a multi-part subject ("drug A + drug B", "X combined with Y") into components.
pub fn split_components(subject: &str) -> Vec<String> {
	let parts: Vec<String> =
		Regex::new(r"(?i)\s*(?:\+|/|&|,|\bcombined\s+with\b|\band\b|\bplus\b|\bwith\b)\s*")
			.map(|re| re.split(subject).map(str::to_string).collect())
			.unwrap_or_else(|_| vec![subject.to_string()]);
	let mut out = Vec::new();
	let mut seen = HashSet::new();

	for part in parts {
		let cleaned =
			text::collapse_whitespace(part.trim_matches(|c: char| c == '-' || c.is_whitespace()));

		if cleaned.is_empty() {
			continue;
		}
		if seen.insert(cleaned.to_lowercase()) {
			out.push(cleaned);
		}
	}

	out
}

/// Applies the synonym cap and drops lookups that are too short, too long, or noisy.
pub fn filter_synonyms(subject: &str, raw: &[String], cfg: &sift_config::Planner) -> Vec<String> {
	let mut out = Vec::new();
	let mut seen = HashSet::from([subject.to_lowercase()]);

	for candidate in raw {
		if out.len() >= cfg.max_synonyms as usize {
			break;
		}

		let cleaned = text::collapse_whitespace(candidate);
		let chars = cleaned.chars().count() as u32;

		if chars < cfg.min_synonym_chars || chars > cfg.max_synonym_chars {
			continue;
		}
		if cleaned.split_whitespace().count() > 4 {
			continue;
		}
		if !cleaned.chars().any(char::is_alphabetic) {
			continue;
		}
		if cleaned.chars().any(|c| matches!(c, '(' | ')' | '[' | ']' | ':' | ';' | '"' | '|')) {
			continue;
		}
		if seen.insert(cleaned.to_lowercase()) {
			out.push(cleaned);
		}
	}

	out
}

/// Removes `term[tag]` filter tokens and any boolean operator they leave dangling.
pub fn strip_filters(query: &str) -> String {
	let stripped = Regex::new(r"\S*\[[^\]]*\]")
		.map(|re| re.replace_all(query, " ").into_owned())
		.unwrap_or_else(|_| query.to_string());
	let mut words: Vec<&str> = stripped.split_whitespace().collect();

	while matches!(words.last(), Some(&"AND") | Some(&"OR")) {
		words.pop();
	}
	while matches!(words.first(), Some(&"AND") | Some(&"OR")) {
		words.remove(0);
	}

	let mut out: Vec<&str> = Vec::with_capacity(words.len());

	for word in words {
		let is_operator = matches!(word, "AND" | "OR");

		if is_operator && matches!(out.last(), Some(&"AND") | Some(&"OR")) {
			continue;
		}

		out.push(word);
	}

	out.join(" ")
}

/// The last relaxation step: filters, quoting, and boolean structure removed.
pub fn relax_further(query: &str) -> String {
	let without_filters = strip_filters(query);
	let mut terms = Vec::new();
	let mut seen = HashSet::new();

	for word in without_filters.split_whitespace() {
		if matches!(word, "AND" | "OR" | "NOT") {
			continue;
		}

		for token in text::content_tokens(word, usize::MAX) {
			if MECHANISM_TERMS.contains(&token.as_str()) {
				continue;
			}
			if seen.insert(token.clone()) {
				terms.push(token);
			}
		}
	}

	terms.truncate(MAX_RELAXED_TERMS);

	terms.join(" ")
}

fn subject_clause(components: &[String], synonyms: &[String]) -> String {
	if components.len() > 1 {
		return components.iter().map(|c| quote(c)).collect::<Vec<_>>().join(" AND ");
	}

	let head = quote(&components[0]);

	if synonyms.is_empty() {
		return head;
	}

	let alternatives =
		std::iter::once(head).chain(synonyms.iter().map(|s| quote(s))).collect::<Vec<_>>();

	format!("({})", alternatives.join(" OR "))
}

fn or_clause(terms: &[String]) -> String {
	match terms.len() {
		0 => String::new(),
		1 => terms[0].clone(),
		_ => format!("({})", terms.join(" OR ")),
	}
}

fn quote(phrase: &str) -> String {
	format!("\"{}\"", phrase.replace('"', ""))
}

fn bag_of_words(objective: &str, max_terms: usize) -> String {
	let tokens = text::tokenize(objective, max_terms.max(1));

	if tokens.is_empty() {
		return objective.trim().to_string();
	}

	tokens.join(" ")
}

fn compose(parts: &[&str], filters: &[&str]) -> String {
	let clauses = parts
		.iter()
		.map(|part| part.trim())
		.filter(|part| !part.is_empty())
		.chain(filters.iter().copied())
		.collect::<Vec<_>>();

	clauses.join(" AND ")
}

fn variants_for(source: SourceKind) -> &'static [QueryVariant] {
	match source {
		SourceKind::Bibliographic =>
			&[QueryVariant::Review, QueryVariant::Mechanism, QueryVariant::Broad],
		SourceKind::ClinicalTrials => &[QueryVariant::Review, QueryVariant::Broad],
		SourceKind::Patents => &[QueryVariant::Mechanism, QueryVariant::Broad],
		SourceKind::Web => &[QueryVariant::Broad],
	}
}

fn filters_for(source: SourceKind) -> &'static [&'static str] {
	match source {
		SourceKind::Bibliographic => &["review[pt]", "english[la]"],
		SourceKind::ClinicalTrials => &["interventional[study_type]"],
		SourceKind::Patents => &["granted[status]"],
		SourceKind::Web => &[],
	}
}

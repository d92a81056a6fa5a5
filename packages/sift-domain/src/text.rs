use std::collections::HashSet;

use unicode_segmentation::UnicodeSegmentation;

const STOPWORDS: &[&str] = &[
	"a", "about", "across", "after", "against", "all", "an", "and", "any", "are", "as", "at", "be",
	"between", "by", "can", "could", "do", "does", "during", "each", "for", "from", "has", "have",
	"how", "in", "into", "is", "it", "its", "may", "more", "most", "of", "on", "or", "our",
	"over", "should", "such", "than", "that", "the", "their", "them", "these", "this", "those",
	"through", "to", "under", "us", "using", "via", "was", "we", "were", "what", "when", "where",
	"which", "while", "who", "why", "will", "with", "within", "would",
];

/// Words that describe the request rather than the subject matter.
const GENERIC_TERMS: &[&str] = &[
	"analysis", "approach", "assess", "data", "effect", "effects", "evaluate", "evidence",
	"explore", "find", "identify", "investigate", "literature", "novel", "potential", "research",
	"role", "studies", "study", "understand", "use",
];

pub fn is_stopword(token: &str) -> bool {
	STOPWORDS.contains(&token)
}

pub fn is_generic(token: &str) -> bool {
	GENERIC_TERMS.contains(&token)
}

fn fold_ascii(text: &str) -> String {
	let mut normalized = String::with_capacity(text.len());

	for ch in text.chars() {
		if ch.is_ascii_alphanumeric() || ch == '-' {
			normalized.push(ch.to_ascii_lowercase());
		} else {
			normalized.push(' ');
		}
	}

	normalized
}

/// Lowercased, de-duplicated tokens in first-seen order.
pub fn tokenize(text: &str, max_terms: usize) -> Vec<String> {
	let normalized = fold_ascii(text);
	let mut out = Vec::new();
	let mut seen = HashSet::new();

	for token in normalized.split_whitespace() {
		let token = token.trim_matches('-');

		if token.len() < 2 {
			continue;
		}
		if seen.insert(token) {
			out.push(token.to_string());
		}
		if out.len() >= max_terms {
			break;
		}
	}

	out
}

/// Tokens that carry topic: stopwords and request boilerplate removed.
pub fn content_tokens(text: &str, max_terms: usize) -> Vec<String> {
	tokenize(text, usize::MAX)
		.into_iter()
		.filter(|token| !is_stopword(token) && !is_generic(token))
		.take(max_terms)
		.collect()
}

/// Every token plus the parts of hyphenated compounds.
pub fn term_set(text: &str) -> HashSet<String> {
	let mut out = HashSet::new();

	for token in tokenize(text, usize::MAX) {
		if token.contains('-') {
			for part in token.split('-').filter(|part| part.len() >= 2) {
				out.insert(part.to_string());
			}
		}

		out.insert(token);
	}

	out
}

pub fn lexical_overlap_ratio(query_tokens: &[String], text_terms: &HashSet<String>) -> f32 {
	if query_tokens.is_empty() || text_terms.is_empty() {
		return 0.0;
	}

	let matched = query_tokens.iter().filter(|token| text_terms.contains(token.as_str())).count();

	matched as f32 / query_tokens.len() as f32
}

/// Case-insensitive prefix match anchored at a word start; multi-word terms must appear
/// contiguously. `folded_text` must come from `fold_for_matching`.
pub fn contains_term(folded_text: &str, term: &str) -> bool {
	let folded_term = fold_ascii(term);
	let words = folded_term.split_whitespace().collect::<Vec<_>>();

	if words.is_empty() {
		return false;
	}

	folded_text.contains(format!(" {}", words.join(" ")).as_str())
}

/// Folds text the same way `contains_term` folds its needle, padded so every word starts after
/// a space.
pub fn fold_for_matching(text: &str) -> String {
	let folded = fold_ascii(text);

	format!(" {} ", folded.split_whitespace().collect::<Vec<_>>().join(" "))
}

pub fn count_terms(folded_text: &str, terms: &[&str]) -> u32 {
	terms.iter().filter(|term| contains_term(folded_text, term)).count() as u32
}

pub fn cosine_similarity(lhs: &[f32], rhs: &[f32]) -> Option<f32> {
	if lhs.is_empty() || lhs.len() != rhs.len() {
		return None;
	}

	let mut dot = 0.0_f32;
	let mut lhs_norm = 0.0_f32;
	let mut rhs_norm = 0.0_f32;

	for (l, r) in lhs.iter().zip(rhs.iter()) {
		dot += l * r;
		lhs_norm += l * l;
		rhs_norm += r * r;
	}

	if lhs_norm <= f32::EPSILON || rhs_norm <= f32::EPSILON {
		return None;
	}

	Some((dot / (lhs_norm.sqrt() * rhs_norm.sqrt())).clamp(-1.0, 1.0))
}

pub fn mean_vector(vectors: &[Vec<f32>]) -> Option<Vec<f32>> {
	let first = vectors.first()?;
	let dim = first.len();

	if dim == 0 || vectors.iter().any(|vec| vec.len() != dim) {
		return None;
	}

	let mut out = vec![0.0_f32; dim];

	for vec in vectors {
		for (acc, value) in out.iter_mut().zip(vec.iter()) {
			*acc += value;
		}
	}

	let count = vectors.len() as f32;

	for value in &mut out {
		*value /= count;
	}

	Some(out)
}

pub fn sentences(text: &str) -> Vec<String> {
	text.unicode_sentences()
		.map(|sentence| sentence.trim().to_string())
		.filter(|sentence| !sentence.is_empty())
		.collect()
}

pub fn collapse_whitespace(text: &str) -> String {
	text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn truncate_chars(text: &str, max_chars: usize) -> String {
	if text.chars().count() <= max_chars {
		return text.to_string();
	}

	text.chars().take(max_chars).collect()
}

use std::collections::{HashMap, VecDeque};

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

use crate::{Candidate, RawRecord, ScoreBreakdown, SourceKind, text};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DedupStats {
	pub exact_removed: usize,
	pub near_removed: usize,
}

/// NFKC, lowercase, alphanumerics only, single spaces.
pub fn normalize_title(title: &str) -> String {
	let composed: String = title.nfkc().collect();
	let mut out = String::with_capacity(composed.len());

	for ch in composed.chars() {
		if ch.is_alphanumeric() {
			out.extend(ch.to_lowercase());
		} else {
			out.push(' ');
		}
	}

	text::collapse_whitespace(&out)
}

fn clean_abstract(raw: &str) -> String {
	let without_tags = Regex::new(r"<[^>]{0,200}>")
		.map(|re| re.replace_all(raw, " ").into_owned())
		.unwrap_or_else(|_| raw.to_string());

	text::collapse_whitespace(&without_tags)
}

/// Converts a raw source record into a candidate; records with neither title nor abstract are
/// dropped.
pub fn canonicalize(raw: RawRecord, source: SourceKind) -> Option<Candidate> {
	let title = raw.title.as_deref().map(text::collapse_whitespace).unwrap_or_default();
	let abstract_text = raw.abstract_text.as_deref().map(clean_abstract).unwrap_or_default();

	if title.is_empty() && abstract_text.is_empty() {
		return None;
	}

	let title = if title.is_empty() {
		text::truncate_chars(&abstract_text, 120)
	} else {
		title
	};
	let external_id =
		raw.external_id.map(|id| id.trim().to_string()).filter(|id| !id.is_empty());

	Some(Candidate {
		title,
		abstract_text,
		year: raw.year.filter(|year| *year > 0).unwrap_or(0),
		external_id,
		url: raw.url.map(|url| url.trim().to_string()).unwrap_or_default(),
		citations: raw.citations.unwrap_or(0),
		source,
		origin_query: raw.origin_query,
		origin_slot: raw.origin_slot,
		score: 0.0,
		breakdown: ScoreBreakdown::default(),
	})
}

fn richness(candidate: &Candidate) -> (usize, u32, bool) {
	(candidate.abstract_text.len(), candidate.citations, candidate.year > 0)
}

/// Removes exact duplicates sharing an external id or a normalized title. The richer record of a
/// colliding pair survives in the earlier position and inherits the keys of the record it
/// displaced, so later duplicates of either still collide. Runs to a fixed point, which leaves no
/// two survivors sharing a key.
pub fn dedup_exact(candidates: Vec<Candidate>) -> (Vec<Candidate>, usize) {
	let before = candidates.len();
	let mut pool = candidates;

	loop {
		let len = pool.len();

		pool = merge_exact(pool);

		if pool.len() == len {
			break;
		}
	}

	let removed = before - pool.len();

	(pool, removed)
}

fn exact_keys(candidate: &Candidate) -> Vec<String> {
	let mut keys = Vec::with_capacity(2);

	if let Some(id) = candidate.external_id.as_deref() {
		keys.push(format!("id:{}", id.to_lowercase()));
	}

	let title = normalize_title(&candidate.title);

	if !title.is_empty() {
		keys.push(format!("title:{title}"));
	}

	keys
}

fn merge_exact(candidates: Vec<Candidate>) -> Vec<Candidate> {
	let mut out: Vec<Candidate> = Vec::with_capacity(candidates.len());
	let mut index: HashMap<String, usize> = HashMap::new();

	for candidate in candidates {
		let keys = exact_keys(&candidate);
		let Some(pos) = keys.iter().find_map(|key| index.get(key).copied()) else {
			for key in keys {
				index.insert(key, out.len());
			}

			out.push(candidate);

			continue;
		};

		for key in keys {
			index.entry(key).or_insert(pos);
		}

		if richness(&candidate) > richness(&out[pos]) {
			out[pos] = candidate;
		}
	}

	out
}

/// Drops candidates whose title vector is within `threshold` cosine of any of the last `window`
/// accepted title vectors. Candidates without a vector are kept and never compared. Returns the
/// indices of the kept candidates.
pub fn near_duplicate_keep(vectors: &[Option<Vec<f32>>], threshold: f32, window: usize) -> Vec<usize> {
	let mut accepted: VecDeque<&[f32]> = VecDeque::with_capacity(window.max(1));
	let mut keep = Vec::with_capacity(vectors.len());

	for (idx, vector) in vectors.iter().enumerate() {
		let Some(vector) = vector.as_deref() else {
			keep.push(idx);

			continue;
		};
		let duplicate = accepted.iter().any(|prior| {
			text::cosine_similarity(vector, prior).map(|sim| sim >= threshold).unwrap_or(false)
		});

		if duplicate {
			continue;
		}

		keep.push(idx);

		if window > 0 {
			if accepted.len() == window {
				accepted.pop_front();
			}

			accepted.push_back(vector);
		}
	}

	keep
}

/// Applies `near_duplicate_keep` to a candidate list with aligned title vectors.
pub fn dedup_near(
	candidates: Vec<Candidate>,
	vectors: &[Option<Vec<f32>>],
	threshold: f32,
	window: usize,
) -> (Vec<Candidate>, usize) {
	if candidates.len() != vectors.len() {
		return (candidates, 0);
	}

	let keep = near_duplicate_keep(vectors, threshold, window);
	let removed = candidates.len() - keep.len();
	let mut keep_iter = keep.into_iter().peekable();
	let mut out = Vec::with_capacity(candidates.len() - removed);

	for (idx, candidate) in candidates.into_iter().enumerate() {
		if keep_iter.peek() == Some(&idx) {
			keep_iter.next();
			out.push(candidate);
		}
	}

	(out, removed)
}

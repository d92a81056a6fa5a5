//! Deterministic fixtures shared by the workspace's integration tests.

use serde_json::Map;

use sift_config::{
	Cache, Caps, Config, DeepDive, Dedup, EmbeddingProviderConfig, Harvest, LlmProviderConfig,
	Pipeline, Planner, ProviderConfig, Providers, Ranking, Service, SourceConfig, Sources,
	Synthesis,
};
use sift_domain::{RawRecord, text};

pub const EMBEDDING_DIMENSIONS: u32 = 256;

/// A valid configuration with every source enabled and no optional models.
pub fn sample_config() -> Config {
	Config {
		service: Service { log_level: "info".to_string() },
		providers: Providers {
			embedding: EmbeddingProviderConfig {
				provider_id: "test".to_string(),
				api_base: "http://localhost".to_string(),
				api_key: "embedding-key".to_string(),
				path: "/embeddings".to_string(),
				model: "hash-embed".to_string(),
				dimensions: EMBEDDING_DIMENSIONS,
				timeout_ms: 1_000,
				default_headers: Map::new(),
			},
			completion: LlmProviderConfig {
				provider_id: "test".to_string(),
				api_base: "http://localhost".to_string(),
				api_key: "completion-key".to_string(),
				path: "/chat/completions".to_string(),
				model: "scripted".to_string(),
				temperature: 0.0,
				timeout_ms: 1_000,
				default_headers: Map::new(),
			},
			rerank: None,
			entailment: None,
			vocabulary: None,
		},
		sources: Sources {
			bibliographic: Some(source_config("bibliographic")),
			clinical_trials: Some(source_config("clinical_trials")),
			patents: Some(source_config("patents")),
			web: Some(source_config("web")),
		},
		pipeline: Pipeline::default(),
		planner: Planner::default(),
		harvest: Harvest::default(),
		dedup: Dedup::default(),
		ranking: Ranking::default(),
		caps: Caps::default(),
		deep_dive: DeepDive::default(),
		synthesis: Synthesis::default(),
		cache: Cache::default(),
	}
}

pub fn provider_config(provider_id: &str) -> ProviderConfig {
	ProviderConfig {
		provider_id: provider_id.to_string(),
		api_base: "http://localhost".to_string(),
		api_key: format!("{provider_id}-key"),
		path: "/".to_string(),
		model: "m".to_string(),
		timeout_ms: 1_000,
		default_headers: Map::new(),
	}
}

pub fn source_config(name: &str) -> SourceConfig {
	SourceConfig {
		api_base: "http://localhost".to_string(),
		api_key: format!("{name}-key"),
		path: "/search".to_string(),
		timeout_ms: 1_000,
		max_results: 25,
		pool_ceiling: 60,
		default_headers: Map::new(),
	}
}

/// Builder for raw source records; unset fields stay `None` as a real catalog would leave them.
#[derive(Debug, Clone, Default)]
pub struct RecordBuilder {
	record: RawRecord,
}
impl RecordBuilder {
	pub fn new(title: &str) -> Self {
		Self { record: RawRecord { title: Some(title.to_string()), ..Default::default() } }
	}

	pub fn abstract_text(mut self, abstract_text: &str) -> Self {
		self.record.abstract_text = Some(abstract_text.to_string());

		self
	}

	pub fn year(mut self, year: i32) -> Self {
		self.record.year = Some(year);

		self
	}

	pub fn citations(mut self, citations: u32) -> Self {
		self.record.citations = Some(citations);

		self
	}

	pub fn id(mut self, id: &str) -> Self {
		self.record.external_id = Some(id.to_string());

		self
	}

	pub fn url(mut self, url: &str) -> Self {
		self.record.url = Some(url.to_string());

		self
	}

	pub fn build(self) -> RawRecord {
		self.record
	}
}

const TREES: &[&str] = &[
	"alder", "birch", "cedar", "dogwood", "elm", "fir", "ginkgo", "hazel", "ilex", "juniper",
	"kapok", "larch", "maple", "nutmeg", "oak", "pine", "quince", "rowan", "spruce", "teak",
	"ulmus", "viburnum", "willow", "yew", "zelkova", "acacia", "baobab", "cypress", "ebony",
	"hemlock", "laurel", "magnolia", "olive", "poplar", "redwood", "sequoia", "tamarind",
	"walnut", "aspen", "banyan",
];
const MINERALS: &[&str] = &[
	"agate", "basalt", "cobalt", "diorite", "emerald", "feldspar", "garnet", "gypsum", "jasper",
	"kyanite", "lapis", "mica", "nickel", "onyx", "pyrite", "quartz", "rutile", "slate", "topaz",
	"umber", "zircon", "beryl", "calcite", "dolomite", "galena", "halite", "jade", "marble",
	"obsidian", "opal", "peridot", "ruby", "sapphire", "talc", "tourmaline", "amber", "chert",
	"flint", "gneiss", "shale",
];

/// A word pair unique to record `i`, so fixture titles never look like near duplicates.
fn title_words(i: usize) -> (&'static str, &'static str) {
	(TREES[i % TREES.len()], MINERALS[(i / TREES.len() + i * 7 + 3) % MINERALS.len()])
}

/// `count` distinct records about `topic`, each with a quantitative multi-sentence abstract.
pub fn topic_records(topic: &str, count: usize) -> Vec<RawRecord> {
	(0..count)
		.map(|i| {
			let (first, second) = title_words(i);

			RecordBuilder::new(&format!("{topic} {first} {second} study"))
				.abstract_text(&format!(
					"We examined {topic} in cohort {i}. Treatment reduced progression by {}% \
					 (p < 0.05). Signaling through the pathway was inhibited in {} patients. \
					 Follow-up continued for {} months.",
					10 + i,
					20 + i * 3,
					6 + i
				))
				.year(2010 + (i % 14) as i32)
				.citations((i * 5) as u32)
				.id(&format!("{}-{i}", topic.replace(' ', "-")))
				.url(&format!("https://example.org/{}/{i}", topic.replace(' ', "-")))
				.build()
		})
		.collect()
}

/// Hashed bag-of-words embedding: deterministic, L2-normalized, and similar for texts that
/// share vocabulary.
pub fn hash_embed(input: &str, dims: u32) -> Vec<f32> {
	let dims = dims.max(1) as usize;
	let mut vec = vec![0.0_f32; dims];

	for token in text::tokenize(input, usize::MAX) {
		let hash = blake3::hash(token.as_bytes());
		let bytes = hash.as_bytes();
		let bucket = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize % dims;
		let sign = if bytes[4] & 1 == 0 { 1.0 } else { -1.0 };

		vec[bucket] += sign;
	}

	let norm = vec.iter().map(|value| value * value).sum::<f32>().sqrt();

	if norm > f32::EPSILON {
		for value in &mut vec {
			*value /= norm;
		}
	} else {
		vec[0] = 1.0;
	}

	vec
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn topic_record_titles_survive_near_dedup() {
		let dedup = sample_config().dedup;

		for (topic, count) in [("sotorasib", 30), ("stalled", 10)] {
			let vectors = topic_records(topic, count)
				.iter()
				.map(|record| {
					Some(hash_embed(record.title.as_deref().unwrap_or_default(), EMBEDDING_DIMENSIONS))
				})
				.collect::<Vec<_>>();
			let kept = sift_domain::normalize::near_duplicate_keep(
				&vectors,
				dedup.near_duplicate_threshold,
				dedup.window as usize,
			);

			assert_eq!(kept.len(), count, "{topic}");
		}
	}
}

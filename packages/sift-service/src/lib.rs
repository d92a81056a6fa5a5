pub mod cache;
pub mod caps;
pub mod context;
pub mod deep_dive;
pub mod diagnostics;
pub mod error;
pub mod pipeline;
pub mod search;
pub mod synthesis;
pub mod triage;

mod dedup;
mod embeddings;
mod harvest;
mod planning;

pub use caps::PipelineCaps;
pub use context::PipelineContext;
pub use diagnostics::Diagnostics;
pub use error::{Error, Result};
pub use pipeline::Strategy;
pub use search::{ResultSection, SearchRequest, SearchResponse};

use std::{future::Future, pin::Pin, sync::Arc, time::Duration};

use serde_json::Value;

use cache::{EmbeddingCache, TtlCache};
use sift_config::{
	Config, EmbeddingProviderConfig, LlmProviderConfig, ProviderConfig, SourceConfig,
};
use sift_domain::{RawRecord, SourceKind};
use sift_providers::{completion, embedding, entailment, rerank, sources, vocabulary};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Vec<f32>>>>;
}

pub trait CompletionProvider
where
	Self: Send + Sync,
{
	/// Forces structured output; the reply must be a JSON object.
	fn complete_json<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, Result<Value>>;

	fn complete_text<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, Result<String>>;
}

pub trait RerankProvider
where
	Self: Send + Sync,
{
	fn rerank<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
		query: &'a str,
		docs: &'a [String],
	) -> BoxFuture<'a, Result<Vec<f32>>>;
}

pub trait EntailmentProvider
where
	Self: Send + Sync,
{
	fn entail<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
		premise: &'a str,
		hypotheses: &'a [String],
	) -> BoxFuture<'a, Result<Vec<f32>>>;
}

pub trait VocabularyProvider
where
	Self: Send + Sync,
{
	fn synonyms<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
		term: &'a str,
	) -> BoxFuture<'a, Result<Vec<String>>>;
}

pub trait SourceProvider
where
	Self: Send + Sync,
{
	fn search<'a>(
		&'a self,
		cfg: &'a SourceConfig,
		source: SourceKind,
		query: &'a str,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<RawRecord>>>;
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub completion: Arc<dyn CompletionProvider>,
	pub rerank: Arc<dyn RerankProvider>,
	pub entailment: Arc<dyn EntailmentProvider>,
	pub vocabulary: Arc<dyn VocabularyProvider>,
	pub sources: Arc<dyn SourceProvider>,
}
impl Providers {
	pub fn new(
		embedding: Arc<dyn EmbeddingProvider>,
		completion: Arc<dyn CompletionProvider>,
		sources: Arc<dyn SourceProvider>,
	) -> Self {
		let defaults = Arc::new(DefaultProviders);

		Self {
			embedding,
			completion,
			rerank: defaults.clone(),
			entailment: defaults.clone(),
			vocabulary: defaults,
			sources,
		}
	}

	pub fn with_rerank(mut self, rerank: Arc<dyn RerankProvider>) -> Self {
		self.rerank = rerank;

		self
	}

	pub fn with_entailment(mut self, entailment: Arc<dyn EntailmentProvider>) -> Self {
		self.entailment = entailment;

		self
	}

	pub fn with_vocabulary(mut self, vocabulary: Arc<dyn VocabularyProvider>) -> Self {
		self.vocabulary = vocabulary;

		self
	}
}
impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders);

		Self {
			embedding: provider.clone(),
			completion: provider.clone(),
			rerank: provider.clone(),
			entailment: provider.clone(),
			vocabulary: provider.clone(),
			sources: provider,
		}
	}
}

/// Process-local caches shared by every request served by one `SiftService`.
pub struct Caches {
	pub embeddings: EmbeddingCache,
	pub sources: TtlCache<Vec<RawRecord>>,
	pub vocabulary: TtlCache<Vec<String>>,
}
impl Caches {
	pub fn new(cfg: &sift_config::Cache) -> Self {
		Self {
			embeddings: EmbeddingCache::new(cfg.embedding_capacity as usize),
			sources: TtlCache::new(
				Duration::from_secs(cfg.source_ttl_secs),
				cfg.source_capacity as usize,
			),
			vocabulary: TtlCache::new(
				Duration::from_secs(cfg.vocabulary_ttl_secs),
				cfg.vocabulary_capacity as usize,
			),
		}
	}
}

pub struct SiftService {
	pub cfg: Config,
	pub providers: Providers,
	pub caches: Caches,
}
impl SiftService {
	pub fn new(cfg: Config) -> Self {
		Self::with_providers(cfg, Providers::default())
	}

	pub fn with_providers(cfg: Config, providers: Providers) -> Self {
		let caches = Caches::new(&cfg.cache);

		Self { cfg, providers, caches }
	}
}

struct DefaultProviders;
impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Vec<f32>>>> {
		Box::pin(async move { Ok(embedding::embed(cfg, texts).await?) })
	}
}
impl CompletionProvider for DefaultProviders {
	fn complete_json<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, Result<Value>> {
		Box::pin(async move { Ok(completion::complete_json(cfg, messages).await?) })
	}

	fn complete_text<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, Result<String>> {
		Box::pin(async move { Ok(completion::complete_text(cfg, messages).await?) })
	}
}
impl RerankProvider for DefaultProviders {
	fn rerank<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
		query: &'a str,
		docs: &'a [String],
	) -> BoxFuture<'a, Result<Vec<f32>>> {
		Box::pin(async move { Ok(rerank::rerank(cfg, query, docs).await?) })
	}
}
impl EntailmentProvider for DefaultProviders {
	fn entail<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
		premise: &'a str,
		hypotheses: &'a [String],
	) -> BoxFuture<'a, Result<Vec<f32>>> {
		Box::pin(async move { Ok(entailment::entail(cfg, premise, hypotheses).await?) })
	}
}
impl VocabularyProvider for DefaultProviders {
	fn synonyms<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
		term: &'a str,
	) -> BoxFuture<'a, Result<Vec<String>>> {
		Box::pin(async move { Ok(vocabulary::synonyms(cfg, term).await?) })
	}
}
impl SourceProvider for DefaultProviders {
	fn search<'a>(
		&'a self,
		cfg: &'a SourceConfig,
		source: SourceKind,
		query: &'a str,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<RawRecord>>> {
		Box::pin(async move { Ok(sources::search(cfg, source, query, limit).await?) })
	}
}

pub(crate) fn hash_key(payload: &Value) -> String {
	let raw = serde_json::to_vec(payload).unwrap_or_else(|_| payload.to_string().into_bytes());

	blake3::hash(&raw).to_hex().to_string()
}

pub(crate) fn key_prefix(key: &str) -> &str {
	let len = key.len().min(12);

	&key[..len]
}

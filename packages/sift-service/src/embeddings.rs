use std::time::Duration;

use crate::{PipelineContext, SiftService, cache::EmbeddingCache};

impl SiftService {
	/// Embeds `texts` through the cache. Slots stay `None` when the provider fails, times out,
	/// or returns a vector of the wrong dimension.
	pub(crate) async fn embed_texts(
		&self,
		ctx: &PipelineContext,
		texts: &[String],
	) -> Vec<Option<Vec<f32>>> {
		let cfg = &self.cfg.providers.embedding;
		let mut out: Vec<Option<Vec<f32>>> = vec![None; texts.len()];
		let mut missing_idx = Vec::new();
		let mut missing_text = Vec::new();
		let mut keys = Vec::with_capacity(texts.len());

		for (idx, text) in texts.iter().enumerate() {
			let key = EmbeddingCache::key(cfg, text);

			match self.caches.embeddings.get(&key) {
				Some(vector) => out[idx] = Some(vector),
				None => {
					missing_idx.push(idx);
					missing_text.push(text.clone());
				},
			}

			keys.push(key);
		}

		if missing_text.is_empty() {
			return out;
		}

		let budget = ctx.call_budget(Duration::from_millis(cfg.timeout_ms), Duration::ZERO);

		if budget.is_zero() {
			tracing::warn!(
				request_id = %ctx.request_id(),
				missing = missing_text.len(),
				"Skipping embedding call because the deadline has passed."
			);

			return out;
		}

		let vectors = match tokio::time::timeout(
			budget,
			self.providers.embedding.embed(cfg, &missing_text),
		)
		.await
		{
			Ok(Ok(vectors)) => vectors,
			Ok(Err(err)) => {
				tracing::warn!(request_id = %ctx.request_id(), error = %err, "Embedding call failed.");

				return out;
			},
			Err(_) => {
				tracing::warn!(
					request_id = %ctx.request_id(),
					timeout_ms = budget.as_millis() as u64,
					"Embedding call timed out."
				);

				return out;
			},
		};

		if vectors.len() != missing_text.len() {
			tracing::warn!(
				request_id = %ctx.request_id(),
				expected = missing_text.len(),
				actual = vectors.len(),
				"Embedding provider returned the wrong number of vectors."
			);

			return out;
		}

		for (idx, vector) in missing_idx.into_iter().zip(vectors) {
			if vector.len() != cfg.dimensions as usize {
				tracing::warn!(
					request_id = %ctx.request_id(),
					expected = cfg.dimensions,
					actual = vector.len(),
					"Embedding vector dimension mismatch."
				);

				continue;
			}

			self.caches.embeddings.insert(keys[idx].clone(), vector.clone());

			out[idx] = Some(vector);
		}

		out
	}
}

//! Bounded in-process caches. Entries are advisory: a miss only costs a remote call.

use std::{
	sync::Mutex,
	time::{Duration, Instant},
};

use ahash::AHashMap;

/// Least-recently-used cache of embedding vectors keyed by a content hash.
pub struct EmbeddingCache {
	capacity: usize,
	inner: Mutex<EmbeddingEntries>,
}

#[derive(Default)]
struct EmbeddingEntries {
	tick: u64,
	map: AHashMap<String, (u64, Vec<f32>)>,
}

impl EmbeddingCache {
	pub fn new(capacity: usize) -> Self {
		Self { capacity, inner: Mutex::new(EmbeddingEntries::default()) }
	}

	/// Cache key for one text under one embedding model and dimension.
	pub fn key(cfg: &sift_config::EmbeddingProviderConfig, text: &str) -> String {
		crate::hash_key(&serde_json::json!({
			"kind": "embedding",
			"provider_id": cfg.provider_id,
			"model": cfg.model,
			"dimensions": cfg.dimensions,
			"text": text,
		}))
	}

	pub fn get(&self, key: &str) -> Option<Vec<f32>> {
		let mut entries = self.inner.lock().unwrap_or_else(|err| err.into_inner());

		entries.tick += 1;

		let tick = entries.tick;
		let (last_used, vector) = entries.map.get_mut(key)?;

		*last_used = tick;

		Some(vector.clone())
	}

	pub fn insert(&self, key: String, vector: Vec<f32>) {
		if self.capacity == 0 {
			return;
		}

		let mut entries = self.inner.lock().unwrap_or_else(|err| err.into_inner());

		entries.tick += 1;

		let tick = entries.tick;

		if !entries.map.contains_key(&key) && entries.map.len() >= self.capacity {
			let oldest = entries
				.map
				.iter()
				.min_by_key(|(_, (last_used, _))| *last_used)
				.map(|(key, _)| key.clone());

			if let Some(oldest) = oldest {
				entries.map.remove(&oldest);
			}
		}

		entries.map.insert(key, (tick, vector));
	}

	pub fn len(&self) -> usize {
		self.inner.lock().unwrap_or_else(|err| err.into_inner()).map.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

/// Time-bounded cache with oldest-insert eviction.
pub struct TtlCache<V> {
	ttl: Duration,
	capacity: usize,
	inner: Mutex<AHashMap<String, (Instant, V)>>,
}
impl<V> TtlCache<V>
where
	V: Clone,
{
	pub fn new(ttl: Duration, capacity: usize) -> Self {
		Self { ttl, capacity, inner: Mutex::new(AHashMap::new()) }
	}

	pub fn get(&self, key: &str) -> Option<V> {
		let mut map = self.inner.lock().unwrap_or_else(|err| err.into_inner());
		let expired = map.get(key).map(|(stored_at, _)| stored_at.elapsed() >= self.ttl)?;

		if expired {
			map.remove(key);

			return None;
		}

		map.get(key).map(|(_, value)| value.clone())
	}

	pub fn insert(&self, key: String, value: V) {
		if self.capacity == 0 || self.ttl.is_zero() {
			return;
		}

		let mut map = self.inner.lock().unwrap_or_else(|err| err.into_inner());
		let ttl = self.ttl;

		map.retain(|_, (stored_at, _)| stored_at.elapsed() < ttl);

		if !map.contains_key(&key) && map.len() >= self.capacity {
			let oldest = map
				.iter()
				.min_by_key(|(_, (stored_at, _))| *stored_at)
				.map(|(key, _)| key.clone());

			if let Some(oldest) = oldest {
				map.remove(&oldest);
			}
		}

		map.insert(key, (Instant::now(), value));
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn embedding_cache_evicts_least_recently_used() {
		let cache = EmbeddingCache::new(2);

		cache.insert("a".to_string(), vec![1.0]);
		cache.insert("b".to_string(), vec![2.0]);

		assert_eq!(cache.get("a"), Some(vec![1.0]));

		cache.insert("c".to_string(), vec![3.0]);

		assert_eq!(cache.get("b"), None);
		assert_eq!(cache.get("a"), Some(vec![1.0]));
		assert_eq!(cache.len(), 2);
	}

	#[test]
	fn ttl_cache_expires_entries() {
		let cache = TtlCache::new(Duration::from_millis(0), 4);

		cache.insert("k".to_string(), 1_u32);

		assert_eq!(cache.get("k"), None);

		let cache = TtlCache::new(Duration::from_secs(60), 1);

		cache.insert("a".to_string(), 1_u32);
		cache.insert("b".to_string(), 2_u32);

		assert_eq!(cache.get("a"), None);
		assert_eq!(cache.get("b"), Some(2));
	}
}

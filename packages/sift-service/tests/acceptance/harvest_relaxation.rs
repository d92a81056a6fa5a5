use std::{
	sync::{Arc, Mutex},
	time::Duration,
};

use sift_config::SourceConfig;
use sift_domain::{Preference, RawRecord, SourceKind};
use sift_service::{BoxFuture, Providers, SearchRequest, SiftService, SourceProvider};

use super::{HashEmbedding, Script, ScriptedCompletion};

/// A catalog that answers by query syntax: filtered queries find one record, quoted queries a
/// few, and bag-of-words queries the most.
#[derive(Default)]
struct SparseCatalog {
	queries: Mutex<Vec<String>>,
}
impl SourceProvider for SparseCatalog {
	fn search<'a>(
		&'a self,
		_cfg: &'a SourceConfig,
		_source: SourceKind,
		query: &'a str,
		limit: u32,
	) -> BoxFuture<'a, sift_service::Result<Vec<RawRecord>>> {
		self.queries.lock().expect("Query log lock poisoned.").push(query.to_string());

		let records = if query.contains('[') {
			sift_testkit::topic_records("sotorasib filtered", 1)
		} else if query.contains('"') && query.contains("outcomes") {
			sift_testkit::topic_records("sotorasib broad", 2)
		} else if query.contains('"') {
			sift_testkit::topic_records("sotorasib recall", 3)
		} else {
			sift_testkit::topic_records("sotorasib relaxed", 8)
		};

		Box::pin(async move { Ok(records.into_iter().take(limit as usize).collect()) })
	}
}

#[tokio::test]
async fn sparse_queries_are_relaxed_and_topped_up() {
	let mut cfg = super::config();

	cfg.sources.clinical_trials = None;
	cfg.sources.patents = None;
	cfg.sources.web = None;
	cfg.caps.comfortable_ms = 1;
	cfg.caps.recall.shortlist_fraction = 1.0;
	cfg.caps.recall.shortlist_min = 40;
	cfg.caps.recall.shortlist_max = 40;
	cfg.pipeline.max_supporting_candidates = 50;

	let catalog = Arc::new(SparseCatalog::default());
	let providers = Providers::new(
		Arc::new(HashEmbedding::default()),
		Arc::new(ScriptedCompletion::new(Script::Valid)),
		catalog.clone(),
	);
	let service = SiftService::with_providers(cfg, providers);
	let request = SearchRequest {
		objective: "sotorasib outcomes".to_string(),
		subject: Some(super::SUBJECT.to_string()),
		preference: Preference::Recall,
		..Default::default()
	};
	let response = super::run(&service, &request, Duration::from_secs(60)).await;
	let harvest = &response.diagnostics.harvest;

	// Two recall retries for the filtered slots, then two bag-of-words top-up queries.
	assert_eq!(harvest.relaxed_queries, 4, "{harvest:?}");
	assert!(harvest.top_up);
	assert_eq!(response.diagnostics.pool_size, 14);

	let queries = catalog.queries.lock().expect("Query log lock poisoned.").clone();

	assert!(queries.iter().any(|query| query == "\"sotorasib\""), "{queries:?}");
	assert!(queries.iter().any(|query| query == "sotorasib"), "{queries:?}");

	let slots = response
		.sections
		.iter()
		.flat_map(|section| std::iter::once(&section.top_candidate).chain(&section.supporting))
		.map(|candidate| candidate.origin_slot.as_str())
		.collect::<Vec<_>>();

	assert_eq!(slots.len(), 14);

	for slot in [
		"bibliographic.review",
		"bibliographic.broad",
		"bibliographic.review.recall",
		"bibliographic.review.relaxed",
	] {
		assert!(slots.contains(&slot), "Missing {slot} in {slots:?}.");
	}
}

use std::{
	sync::{Arc, atomic::Ordering},
	time::Duration,
};

use sift_domain::{Preference, SourceKind};
use sift_service::{
	Providers, SiftService,
	diagnostics::{EntailmentMode, RerankMode},
};

use super::{
	FixedEntailment, FixedVocabulary, HashEmbedding, PositionRerank, Script, ScriptedCompletion,
	ScriptedSources,
};

#[tokio::test]
async fn all_sources_failing_yields_an_empty_response() {
	let sources = SourceKind::ALL
		.iter()
		.fold(ScriptedSources::default(), |sources, kind| sources.failing(*kind));
	let service = super::service(
		super::config(),
		Arc::new(sources),
		Arc::new(ScriptedCompletion::new(Script::Valid)),
	);
	let response =
		super::run(&service, &super::request(Preference::Recall), Duration::from_secs(20)).await;

	assert!(response.sections.is_empty());
	assert!(response.deep_dives.is_empty());
	assert_eq!(response.diagnostics.pool_size, 0);
	assert!(response.diagnostics.harvest.failed_queries > 0);
	assert!(!response.diagnostics.fallback_used);
}

#[tokio::test]
async fn blank_credentials_and_missing_models_are_reported() {
	let mut cfg = super::config();

	if let Some(source) = cfg.sources.patents.as_mut() {
		source.api_key = String::new();
	}

	let service = super::service(
		cfg,
		Arc::new(super::bibliographic(12)),
		Arc::new(ScriptedCompletion::new(Script::Valid)),
	);
	let response =
		super::run(&service, &super::request(Preference::Precision), Duration::from_secs(30)).await;
	let disabled = &response.diagnostics.disabled_features;

	assert!(disabled.contains(&"source.patents".to_string()));
	assert!(disabled.contains(&"rerank".to_string()));
	assert!(disabled.contains(&"entailment".to_string()));
	assert!(disabled.contains(&"vocabulary".to_string()));
	assert!(response.queries.iter().all(|slot| slot.source != SourceKind::Patents));
	assert_eq!(response.diagnostics.rerank_mode, RerankMode::Heuristic);
	assert_eq!(response.diagnostics.deep_dive.entailment_mode, EntailmentMode::Lexical);
}

#[tokio::test]
async fn optional_models_are_used_when_configured() {
	let mut cfg = super::config();

	cfg.providers.rerank = Some(sift_testkit::provider_config("rerank"));
	cfg.providers.entailment = Some(sift_testkit::provider_config("entailment"));
	cfg.providers.vocabulary = Some(sift_testkit::provider_config("vocabulary"));

	let rerank = Arc::new(PositionRerank::default());
	let providers = Providers::new(
		Arc::new(HashEmbedding::default()),
		Arc::new(ScriptedCompletion::new(Script::Valid)),
		Arc::new(super::bibliographic(30)),
	)
	.with_rerank(rerank.clone())
	.with_entailment(Arc::new(FixedEntailment { score: 0.0 }))
	.with_vocabulary(Arc::new(FixedVocabulary {
		synonyms: vec!["AMG 510".to_string(), "Lumakras".to_string()],
	}));
	let service = SiftService::with_providers(cfg, providers);
	let response =
		super::run(&service, &super::request(Preference::Precision), Duration::from_secs(60)).await;
	let diagnostics = &response.diagnostics;

	assert_eq!(rerank.calls.load(Ordering::SeqCst), 1);
	assert_eq!(diagnostics.rerank_mode, RerankMode::Model);
	assert_eq!(diagnostics.synonyms_used, 2);
	assert_eq!(diagnostics.deep_dive.entailment_mode, EntailmentMode::Model);
	assert_eq!(diagnostics.deep_dive.anchors_dropped, 3 * diagnostics.deep_dive_count);
	assert!(diagnostics.disabled_features.is_empty());

	for result in &response.deep_dives {
		super::assert_result_contract(result);
	}
	for section in &response.sections {
		assert!(section.top_candidate.breakdown.secondary.is_some());
	}
}

#[tokio::test]
async fn positive_examples_build_an_interest_vector() {
	let service = super::service(
		super::config(),
		Arc::new(super::bibliographic(20)),
		Arc::new(ScriptedCompletion::new(Script::Valid)),
	);
	let request = sift_service::SearchRequest {
		positive_examples: vec!["Sotorasib signaling pathway inhibition in patients".to_string()],
		..super::request(Preference::Precision)
	};
	let response = super::run(&service, &request, Duration::from_secs(30)).await;

	assert!(response.diagnostics.interest_vector_used);
	assert!(response.diagnostics.shortlist_size > 0);
}

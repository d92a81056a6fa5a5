use std::{sync::Arc, time::Duration};

use sift_domain::{Preference, SourceKind};

use super::{Script, ScriptedCompletion, ScriptedSources};

#[tokio::test]
async fn stalled_source_does_not_fail_the_request() {
	let mut cfg = super::config();

	if let Some(source) = cfg.sources.bibliographic.as_mut() {
		source.timeout_ms = 100;
	}

	let sources = ScriptedSources::default()
		.with_records(SourceKind::Bibliographic, sift_testkit::topic_records("stalled", 10))
		.with_delay(SourceKind::Bibliographic, Duration::from_secs(30))
		.with_records(SourceKind::Web, sift_testkit::topic_records(super::SUBJECT, 12));
	let service = super::service(
		cfg,
		Arc::new(sources),
		Arc::new(ScriptedCompletion::new(Script::Valid)),
	);
	let response =
		super::run(&service, &super::request(Preference::Precision), Duration::from_secs(20)).await;
	let harvest = &response.diagnostics.harvest;

	assert!(harvest.timed_out_queries > 0, "{harvest:?}");
	assert!(harvest.retried_queries > 0);
	assert_eq!(response.diagnostics.pool_size, 12);
	assert!(!response.sections.is_empty());
	assert!(
		response
			.sections
			.iter()
			.all(|section| section.top_candidate.source == SourceKind::Web)
	);
	assert!(
		harvest
			.sources
			.iter()
			.any(|pool| pool.source == SourceKind::Bibliographic && pool.records == 0)
	);
}

#[tokio::test]
async fn repeated_queries_are_served_from_cache() {
	let sources = Arc::new(super::bibliographic(12));
	let service = super::service(
		super::config(),
		sources.clone(),
		Arc::new(ScriptedCompletion::new(Script::Valid)),
	);
	let request = super::request(Preference::Precision);
	let first = super::run(&service, &request, Duration::from_secs(30)).await;
	let calls = sources.calls.load(std::sync::atomic::Ordering::SeqCst);
	let second = super::run(&service, &request, Duration::from_secs(30)).await;

	assert_eq!(first.diagnostics.harvest.cache_hits, 0);
	assert!(second.diagnostics.harvest.cache_hits > 0);
	assert_eq!(sources.calls.load(std::sync::atomic::Ordering::SeqCst), calls);

	let refreshed = super::run(
		&service,
		&sift_service::SearchRequest { force_refresh: true, ..request },
		Duration::from_secs(30),
	)
	.await;

	assert_eq!(refreshed.diagnostics.harvest.cache_hits, 0);
	assert!(sources.calls.load(std::sync::atomic::Ordering::SeqCst) > calls);
}

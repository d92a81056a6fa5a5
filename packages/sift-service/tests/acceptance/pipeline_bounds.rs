use std::{sync::Arc, time::Duration};

use sift_domain::{Preference, ResultOrigin};
use sift_service::Strategy;

use super::{Script, ScriptedCompletion};

#[tokio::test]
async fn precision_pool_of_thirty_stays_within_caps() {
	let completion = Arc::new(ScriptedCompletion::new(Script::Valid));
	let service = super::service(super::config(), Arc::new(super::bibliographic(30)), completion);
	let response =
		super::run(&service, &super::request(Preference::Precision), Duration::from_secs(120)).await;
	let diagnostics = &response.diagnostics;

	assert_eq!(diagnostics.pool_size, 30);
	assert!((8..=28).contains(&diagnostics.shortlist_size), "{diagnostics:?}");
	assert!((5..=13).contains(&diagnostics.deep_dive_count), "{diagnostics:?}");
	assert!(diagnostics.deep_dive_count <= diagnostics.shortlist_size);
	assert_eq!(response.deep_dives.len(), diagnostics.deep_dive_count);
	assert_eq!(diagnostics.strategy, Some(Strategy::Graph));
	assert_eq!(diagnostics.graph_steps, 7);
	assert!(!diagnostics.fallback_used);
	assert_eq!(diagnostics.deep_dive.anchors_dropped, 0);

	for result in &response.deep_dives {
		super::assert_result_contract(result);

		assert_eq!(result.origin, ResultOrigin::Model);
		assert_eq!(result.scores.objective_similarity, 82.0);
		assert_eq!(result.scores.recency, 100.0);
	}

	assert!(!response.sections.is_empty());
	assert!(response.sections.iter().any(|section| section.deep_dive.is_some()));
	assert!(diagnostics.synthesis.ran);
	assert!(diagnostics.synthesis.merged);
	assert_eq!(response.executive_summary, "Merged narrative across lenses.");
	assert_eq!(diagnostics.synthesis.lenses_run, vec!["mechanism", "limitations"]);
}

#[tokio::test]
async fn recall_shortlists_more_than_precision() {
	let precision = super::service(
		super::config(),
		Arc::new(super::bibliographic(40)),
		Arc::new(ScriptedCompletion::new(Script::Valid)),
	);
	let recall = super::service(
		super::config(),
		Arc::new(super::bibliographic(40)),
		Arc::new(ScriptedCompletion::new(Script::Valid)),
	);
	let precise =
		super::run(&precision, &super::request(Preference::Precision), Duration::from_secs(120))
			.await;
	let broad =
		super::run(&recall, &super::request(Preference::Recall), Duration::from_secs(120)).await;

	assert!(broad.diagnostics.shortlist_size > precise.diagnostics.shortlist_size);
	assert!(broad.diagnostics.deep_dive_count >= precise.diagnostics.deep_dive_count);
	assert!(broad.diagnostics.shortlist_size <= broad.diagnostics.pool_size);
}

#[tokio::test]
async fn stage_timings_cover_every_stage() {
	let service = super::service(
		super::config(),
		Arc::new(super::bibliographic(12)),
		Arc::new(ScriptedCompletion::new(Script::Valid)),
	);
	let response =
		super::run(&service, &super::request(Preference::Precision), Duration::from_secs(60)).await;
	let stages = response
		.diagnostics
		.stage_timings
		.iter()
		.map(|timing| timing.stage.as_str())
		.collect::<Vec<_>>();

	assert_eq!(stages, vec!["plan", "harvest", "dedup", "rank", "deep_dive", "synthesize", "assemble"]);
	assert!(!response.queries.is_empty());
	assert!(response.diagnostics.caps.is_some());
}

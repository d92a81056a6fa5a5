use std::{sync::Arc, time::Duration};

use sift_domain::{Preference, ResultOrigin};
use sift_service::Strategy;

use super::{Script, ScriptedCompletion};

#[tokio::test]
async fn deadline_mid_deep_dive_returns_partial_results() {
	let mut cfg = super::config();

	cfg.caps.comfortable_ms = 1_000;
	cfg.caps.synthesis_reserve_ms = 0;
	cfg.caps.deep_dive_estimate_ms = 100;
	cfg.deep_dive.per_item_timeout_ms = 300;
	cfg.deep_dive.safety_floor_ms = 1_500;

	let completion =
		Arc::new(ScriptedCompletion::new(Script::Valid).with_json_delay(Duration::from_secs(10)));
	let service = super::service(cfg, Arc::new(super::bibliographic(30)), completion);
	let request = sift_service::SearchRequest {
		strategy: Some(Strategy::Function),
		..super::request(Preference::Precision)
	};
	let response = super::run(&service, &request, Duration::from_millis(3_000)).await;
	let diagnostics = &response.diagnostics;
	let caps = diagnostics.caps.expect("Expected caps to be computed.");

	assert!(diagnostics.deep_dive.stopped_early, "{diagnostics:?}");
	assert!(diagnostics.deep_dive_count >= 1);
	assert!(diagnostics.deep_dive_count < caps.deep_dive);
	assert!(diagnostics.deep_dive_count < diagnostics.shortlist_size);
	assert_eq!(diagnostics.deep_dive.timed_out_count, diagnostics.deep_dive_count);

	for result in &response.deep_dives {
		super::assert_result_contract(result);

		assert_eq!(result.origin, ResultOrigin::Fallback);
	}
}

#[tokio::test]
async fn exhausted_budget_still_returns_a_response() {
	let service = super::service(
		super::config(),
		Arc::new(super::bibliographic(30)),
		Arc::new(ScriptedCompletion::new(Script::Valid)),
	);
	let response =
		super::run(&service, &super::request(Preference::Recall), Duration::ZERO).await;

	assert!(response.diagnostics.budget_exhausted);
	assert_eq!(response.diagnostics.pool_size, 0);
	assert!(response.sections.is_empty());
	assert!(response.executive_summary.is_empty());
}

use std::{
	sync::{Arc, atomic::Ordering},
	time::Duration,
};

use sift_domain::{Preference, ResultOrigin, SourceKind};

use super::{Script, ScriptedCompletion, ScriptedSources};

#[tokio::test]
async fn invalid_output_twice_yields_fallback_results() {
	let completion = Arc::new(ScriptedCompletion::new(Script::InvalidAlways));
	let service =
		super::service(super::config(), Arc::new(super::bibliographic(30)), completion.clone());
	let response =
		super::run(&service, &super::request(Preference::Precision), Duration::from_secs(60)).await;
	let deep_dive = &response.diagnostics.deep_dive;

	assert!(response.diagnostics.deep_dive_count > 0);
	assert_eq!(deep_dive.fallback_count, response.diagnostics.deep_dive_count);
	assert_eq!(deep_dive.corrected_count, 0);
	assert_eq!(completion.json_calls.load(Ordering::SeqCst), 2 * deep_dive.attempted);
	assert!(!response.diagnostics.fallback_used);

	for result in &response.deep_dives {
		super::assert_result_contract(result);

		assert_eq!(result.origin, ResultOrigin::Fallback);
	}
}

#[tokio::test]
async fn corrective_prompt_recovers_output() {
	let completion = Arc::new(ScriptedCompletion::new(Script::InvalidThenValid));
	let service =
		super::service(super::config(), Arc::new(super::bibliographic(30)), completion.clone());
	let response =
		super::run(&service, &super::request(Preference::Precision), Duration::from_secs(60)).await;
	let deep_dive = &response.diagnostics.deep_dive;

	assert!(response.diagnostics.deep_dive_count > 0);
	assert_eq!(deep_dive.corrected_count, response.diagnostics.deep_dive_count);
	assert_eq!(deep_dive.fallback_count, 0);

	for result in &response.deep_dives {
		super::assert_result_contract(result);

		assert_eq!(result.origin, ResultOrigin::Corrected);
	}
}

#[tokio::test]
async fn empty_abstracts_yield_no_anchors_without_model_calls() {
	let records = (0..5)
		.map(|idx| {
			sift_testkit::RecordBuilder::new(&format!("Sotorasib case note {idx} cohort {}", idx * 11))
				.id(&format!("note-{idx}"))
				.year(2022)
				.build()
		})
		.collect();
	let completion = Arc::new(ScriptedCompletion::new(Script::Valid));
	let service = super::service(
		super::config(),
		Arc::new(ScriptedSources::default().with_records(SourceKind::Bibliographic, records)),
		completion.clone(),
	);
	let response =
		super::run(&service, &super::request(Preference::Precision), Duration::from_secs(60)).await;

	assert_eq!(response.diagnostics.pool_size, 5);
	assert!(response.diagnostics.deep_dive_count > 0);
	assert_eq!(completion.json_calls.load(Ordering::SeqCst), 0);

	for result in &response.deep_dives {
		assert!(result.fact_anchors.is_empty());
		assert!(!result.summary.is_empty());
		assert_eq!(result.origin, ResultOrigin::Fallback);
	}
}

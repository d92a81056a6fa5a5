use std::{sync::Arc, time::Duration};

use sift_domain::Preference;
use sift_service::{SearchRequest, SearchResponse, Strategy};

use super::{Script, ScriptedCompletion};

fn keys(response: &SearchResponse) -> Vec<String> {
	response.deep_dives.iter().map(|result| result.candidate_key.clone()).collect()
}

fn section_keys(response: &SearchResponse) -> Vec<String> {
	response.sections.iter().map(|section| section.top_candidate.key()).collect()
}

async fn run_with(cfg: sift_config::Config, strategy: Option<Strategy>) -> SearchResponse {
	let service = super::service(
		cfg,
		Arc::new(super::bibliographic(30)),
		Arc::new(ScriptedCompletion::new(Script::Valid)),
	);
	let request = SearchRequest { strategy, ..super::request(Preference::Precision) };

	super::run(&service, &request, Duration::from_secs(60)).await
}

#[tokio::test]
async fn disabled_graph_falls_back_to_function() {
	let mut cfg = super::config();

	cfg.pipeline.graph_enabled = false;

	let response = run_with(cfg, Some(Strategy::Graph)).await;
	let diagnostics = &response.diagnostics;

	assert_eq!(diagnostics.strategy, Some(Strategy::Function));
	assert!(diagnostics.fallback_used);
	assert!(diagnostics.fallback_reason.as_deref().unwrap_or_default().contains("disabled"));
	assert!(diagnostics.deep_dive_count > 0);
	assert_eq!(diagnostics.graph_steps, 0);
}

#[tokio::test]
async fn graph_step_limit_falls_back_to_function() {
	let mut cfg = super::config();

	cfg.pipeline.max_graph_steps = 3;

	let response = run_with(cfg, None).await;

	assert_eq!(response.diagnostics.strategy, Some(Strategy::Function));
	assert!(
		response
			.diagnostics
			.fallback_reason
			.as_deref()
			.unwrap_or_default()
			.contains("Step limit")
	);
	assert!(!response.sections.is_empty());
}

#[tokio::test]
async fn strategies_produce_the_same_ranking() {
	let function = run_with(super::config(), Some(Strategy::Function)).await;
	let graph = run_with(super::config(), Some(Strategy::Graph)).await;

	assert_eq!(function.diagnostics.strategy, Some(Strategy::Function));
	assert_eq!(graph.diagnostics.strategy, Some(Strategy::Graph));
	assert_eq!(keys(&function), keys(&graph));
	assert_eq!(section_keys(&function), section_keys(&graph));
	assert_eq!(function.diagnostics.shortlist_size, graph.diagnostics.shortlist_size);
	assert_eq!(function.executive_summary, graph.executive_summary);
	assert!(!function.diagnostics.fallback_used && !graph.diagnostics.fallback_used);
}

#[tokio::test]
async fn ranking_is_deterministic_across_runs() {
	let first = run_with(super::config(), None).await;
	let second = run_with(super::config(), None).await;

	assert_eq!(keys(&first), keys(&second));
	assert_eq!(section_keys(&first), section_keys(&second));
	assert_eq!(first.diagnostics.rerank_mode, second.diagnostics.rerank_mode);
}

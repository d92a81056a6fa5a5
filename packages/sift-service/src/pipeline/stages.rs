use std::time::Instant;

use sift_domain::{Candidate, DeepDiveResult, QueryPlan, RawRecord, SourceKind};

use crate::{
	Diagnostics, PipelineContext, SearchRequest, SearchResponse, SiftService, pipeline::Strategy,
	search, synthesis,
};

/// Everything one run accumulates between stages.
#[derive(Debug, Default)]
pub(crate) struct RunState {
	pub(crate) plan: QueryPlan,
	pub(crate) raw: Vec<(SourceKind, RawRecord)>,
	pub(crate) pool: Vec<Candidate>,
	pub(crate) shortlist: Vec<Candidate>,
	pub(crate) results: Vec<DeepDiveResult>,
	pub(crate) executive_summary: String,
	pub(crate) diagnostics: Diagnostics,
}

/// Timed stage steps shared by both strategies.
pub(crate) struct Stages<'a> {
	pub(crate) service: &'a SiftService,
	pub(crate) request: &'a SearchRequest,
	pub(crate) ctx: &'a PipelineContext,
}
impl Stages<'_> {
	pub(crate) async fn plan(&self, state: &mut RunState) {
		let started = Instant::now();

		self.service.note_optional_models(&mut state.diagnostics);

		state.plan = self.service.plan_queries(self.ctx, self.request, &mut state.diagnostics).await;

		state.diagnostics.record_stage("plan", started.elapsed());
	}

	pub(crate) async fn harvest(&self, state: &mut RunState) {
		let started = Instant::now();

		state.raw = self
			.service
			.harvest(
				self.ctx,
				&state.plan,
				self.request.force_refresh,
				&mut state.diagnostics.harvest,
			)
			.await;

		state.diagnostics.record_stage("harvest", started.elapsed());
	}

	pub(crate) async fn dedup(&self, state: &mut RunState) {
		let started = Instant::now();
		let raw = std::mem::take(&mut state.raw);
		let (pool, stats) = self.service.normalize_pool(self.ctx, raw).await;

		state.diagnostics.pool_size = pool.len();
		state.diagnostics.exact_duplicates_removed = stats.exact_removed;
		state.diagnostics.near_duplicates_removed = stats.near_removed;
		state.pool = pool;

		state.diagnostics.record_stage("dedup", started.elapsed());
	}

	pub(crate) async fn rank(&self, state: &mut RunState) {
		let started = Instant::now();

		state.shortlist = self
			.service
			.triage(self.ctx, self.request, &state.plan, &state.pool, &mut state.diagnostics)
			.await;
		state.diagnostics.shortlist_size = state.shortlist.len();

		state.diagnostics.record_stage("rank", started.elapsed());
	}

	pub(crate) async fn deep_dive(&self, state: &mut RunState) {
		let started = Instant::now();
		let limit = state.diagnostics.caps.map(|caps| caps.deep_dive).unwrap_or(0);

		state.results = self
			.service
			.deep_dive(
				self.ctx,
				&state.plan,
				&state.shortlist,
				limit,
				&mut state.diagnostics.deep_dive,
			)
			.await;
		state.diagnostics.deep_dive_count = state.results.len();

		state.diagnostics.record_stage("deep_dive", started.elapsed());
	}

	pub(crate) fn synthesis_ready(&self, state: &RunState) -> bool {
		state.results.len() >= self.service.cfg.synthesis.min_results as usize
	}

	pub(crate) fn skip_synthesis(&self, state: &mut RunState) {
		state.diagnostics.synthesis.skipped_reason = Some(synthesis::skip_reason(
			state.results.len(),
			self.service.cfg.synthesis.min_results,
		));
	}

	pub(crate) async fn synthesize(&self, state: &mut RunState) {
		let started = Instant::now();

		state.executive_summary = self
			.service
			.synthesize(
				self.ctx,
				&state.plan,
				&state.shortlist,
				&state.results,
				&mut state.diagnostics.synthesis,
			)
			.await;

		state.diagnostics.record_stage("synthesize", started.elapsed());
	}

	pub(crate) fn assemble(&self, state: RunState, strategy: Strategy) -> SearchResponse {
		let started = Instant::now();
		let mut diagnostics = state.diagnostics;
		let sections = search::build_sections(
			&state.shortlist,
			&state.results,
			self.service.cfg.pipeline.max_supporting_candidates as usize,
		);

		diagnostics.strategy = Some(strategy);
		diagnostics.record_stage("assemble", started.elapsed());

		SearchResponse {
			queries: state.plan.slots,
			sections,
			deep_dives: state.results,
			executive_summary: state.executive_summary,
			diagnostics,
		}
	}
}

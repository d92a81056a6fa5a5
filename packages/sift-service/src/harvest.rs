//! Concurrent, deadline-bounded source queries with progressive relaxation.

use std::{
	collections::HashSet,
	time::{Duration, Instant},
};

use futures::future;
use rand::Rng;

use sift_domain::{QueryPlan, RawRecord, SourceKind, planner};

use crate::{
	PipelineContext, SiftService,
	diagnostics::{HarvestDiagnostics, SourcePool},
};

#[derive(Debug, Clone)]
struct QueryJob {
	source: SourceKind,
	slot: String,
	query: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QueryStatus {
	Fetched,
	Cached,
	Failed,
	TimedOut,
	Skipped,
}

struct QueryOutcome {
	records: Vec<RawRecord>,
	status: QueryStatus,
	retried: bool,
}
impl QueryOutcome {
	fn empty(status: QueryStatus, retried: bool) -> Self {
		Self { records: Vec::new(), status, retried }
	}
}

/// Per-source buckets bounded by each source's pool ceiling.
struct SourcePools {
	pools: Vec<(SourceKind, usize, Vec<RawRecord>)>,
}
impl SourcePools {
	fn new(service: &SiftService, plan: &QueryPlan) -> Self {
		let mut pools: Vec<(SourceKind, usize, Vec<RawRecord>)> = Vec::new();

		for slot in &plan.slots {
			if pools.iter().any(|(source, _, _)| *source == slot.source) {
				continue;
			}

			let ceiling = slot
				.source
				.config(&service.cfg.sources)
				.map(|cfg| cfg.pool_ceiling as usize)
				.unwrap_or(0);

			pools.push((slot.source, ceiling, Vec::new()));
		}

		Self { pools }
	}

	fn extend(&mut self, source: SourceKind, records: Vec<RawRecord>) {
		let Some((_, ceiling, bucket)) = self.pools.iter_mut().find(|(kind, _, _)| *kind == source)
		else {
			return;
		};
		let room = ceiling.saturating_sub(bucket.len());

		bucket.extend(records.into_iter().take(room));
	}

	fn total(&self) -> usize {
		self.pools.iter().map(|(_, _, bucket)| bucket.len()).sum()
	}

	fn into_records(self, diagnostics: &mut HarvestDiagnostics) -> Vec<(SourceKind, RawRecord)> {
		let mut out = Vec::new();

		for (source, ceiling, bucket) in self.pools {
			diagnostics.sources.push(SourcePool { source, records: bucket.len(), ceiling });
			out.extend(bucket.into_iter().map(|record| (source, record)));
		}

		out
	}
}

impl SiftService {
	/// Runs every planned query within a sub-budget of the remaining time. Failures and timeouts
	/// degrade to empty result lists; the harvest itself never fails.
	pub(crate) async fn harvest(
		&self,
		ctx: &PipelineContext,
		plan: &QueryPlan,
		force_refresh: bool,
		diagnostics: &mut HarvestDiagnostics,
	) -> Vec<(SourceKind, RawRecord)> {
		let cfg = &self.cfg.harvest;
		let deadline = ctx.sub_deadline(self.cfg.pipeline.harvest_budget_fraction);
		let mut pools = SourcePools::new(self, plan);
		let mut issued: HashSet<(SourceKind, String)> = HashSet::new();
		let primary = plan
			.slots
			.iter()
			.map(|slot| QueryJob {
				source: slot.source,
				slot: slot.name.clone(),
				query: slot.query.clone(),
			})
			.collect::<Vec<_>>();
		let outcomes = self.run_round(ctx, deadline, &primary, force_refresh, &mut issued).await;
		let mut relaxed = Vec::new();

		for ((slot, job), outcome) in plan.slots.iter().zip(&primary).zip(outcomes) {
			record_outcome(diagnostics, &outcome);

			if outcome.records.len() < cfg.min_items_per_query as usize
				&& !slot.recall.is_empty()
				&& !issued.contains(&(slot.source, slot.recall.clone()))
				&& !relaxed
					.iter()
					.any(|job: &QueryJob| job.source == slot.source && job.query == slot.recall)
			{
				relaxed.push(QueryJob {
					source: slot.source,
					slot: format!("{}.recall", slot.name),
					query: slot.recall.clone(),
				});
			}

			pools.extend(job.source, outcome.records);
		}

		if !relaxed.is_empty() {
			diagnostics.relaxed_queries += relaxed.len();

			let outcomes =
				self.run_round(ctx, deadline, &relaxed, force_refresh, &mut issued).await;

			for (job, outcome) in relaxed.iter().zip(outcomes) {
				record_outcome(diagnostics, &outcome);
				pools.extend(job.source, outcome.records);
			}
		}

		let top_up_window = ctx.remaining_until(deadline);

		if pools.total() < cfg.min_pool as usize
			&& top_up_window >= Duration::from_millis(cfg.min_top_up_ms)
		{
			let mut top_up = Vec::new();

			for slot in &plan.slots {
				let query = planner::relax_further(&slot.query);

				if query.is_empty()
					|| issued.contains(&(slot.source, query.clone()))
					|| top_up
						.iter()
						.any(|job: &QueryJob| job.source == slot.source && job.query == query)
				{
					continue;
				}

				top_up.push(QueryJob {
					source: slot.source,
					slot: format!("{}.relaxed", slot.name),
					query,
				});
			}

			if !top_up.is_empty() {
				diagnostics.top_up = true;
				diagnostics.relaxed_queries += top_up.len();

				let outcomes =
					self.run_round(ctx, deadline, &top_up, force_refresh, &mut issued).await;

				for (job, outcome) in top_up.iter().zip(outcomes) {
					record_outcome(diagnostics, &outcome);
					pools.extend(job.source, outcome.records);
				}
			}
		}

		let records = pools.into_records(diagnostics);

		diagnostics.raw_records = records.len();

		tracing::info!(
			request_id = %ctx.request_id(),
			raw_records = records.len(),
			queries = diagnostics.queries_issued,
			failed = diagnostics.failed_queries,
			timed_out = diagnostics.timed_out_queries,
			top_up = diagnostics.top_up,
			"Harvest finished."
		);

		records
	}

	async fn run_round(
		&self,
		ctx: &PipelineContext,
		deadline: Instant,
		jobs: &[QueryJob],
		force_refresh: bool,
		issued: &mut HashSet<(SourceKind, String)>,
	) -> Vec<QueryOutcome> {
		for job in jobs {
			issued.insert((job.source, job.query.clone()));
		}

		future::join_all(jobs.iter().map(|job| self.run_query(ctx, deadline, job, force_refresh)))
			.await
	}

	/// One query with a single jittered retry, each attempt bounded by the harvest deadline.
	async fn run_query(
		&self,
		ctx: &PipelineContext,
		deadline: Instant,
		job: &QueryJob,
		force_refresh: bool,
	) -> QueryOutcome {
		let Some(cfg) = job.source.config(&self.cfg.sources) else {
			return QueryOutcome::empty(QueryStatus::Skipped, false);
		};
		let cache_key = crate::hash_key(&serde_json::json!({
			"kind": "source",
			"source": job.source.as_str(),
			"query": job.query,
			"limit": cfg.max_results,
		}));

		if !force_refresh && let Some(records) = self.caches.sources.get(&cache_key) {
			tracing::debug!(
				source = %job.source,
				cache_key_prefix = crate::key_prefix(&cache_key),
				"Source cache hit."
			);

			return QueryOutcome {
				records: stamp(records, job),
				status: QueryStatus::Cached,
				retried: false,
			};
		}

		let mut status = QueryStatus::TimedOut;
		let mut retried = false;

		for attempt in 0..2 {
			let budget = ctx.remaining_until(deadline).min(Duration::from_millis(cfg.timeout_ms));

			if budget.is_zero() {
				break;
			}

			match tokio::time::timeout(
				budget,
				self.providers.sources.search(cfg, job.source, &job.query, cfg.max_results),
			)
			.await
			{
				Ok(Ok(records)) => {
					self.caches.sources.insert(cache_key, records.clone());

					return QueryOutcome {
						records: stamp(records, job),
						status: QueryStatus::Fetched,
						retried,
					};
				},
				Ok(Err(err)) => {
					tracing::warn!(
						error = %err,
						source = %job.source,
						slot = %job.slot,
						attempt,
						"Source query failed."
					);

					status = QueryStatus::Failed;
				},
				Err(_) => {
					tracing::warn!(
						source = %job.source,
						slot = %job.slot,
						attempt,
						timeout_ms = budget.as_millis() as u64,
						"Source query timed out."
					);

					status = QueryStatus::TimedOut;
				},
			}

			if attempt == 0 {
				let pause = retry_jitter(&self.cfg.harvest).min(ctx.remaining_until(deadline));

				tokio::time::sleep(pause).await;

				retried = true;
			}
		}

		QueryOutcome::empty(status, retried)
	}
}

fn retry_jitter(cfg: &sift_config::Harvest) -> Duration {
	let low = cfg.retry_jitter_min_ms.min(cfg.retry_jitter_max_ms);
	let high = cfg.retry_jitter_min_ms.max(cfg.retry_jitter_max_ms);

	Duration::from_millis(rand::thread_rng().gen_range(low..=high))
}

fn stamp(records: Vec<RawRecord>, job: &QueryJob) -> Vec<RawRecord> {
	records
		.into_iter()
		.map(|mut record| {
			record.origin_query = job.query.clone();
			record.origin_slot = job.slot.clone();

			record
		})
		.collect()
}

fn record_outcome(diagnostics: &mut HarvestDiagnostics, outcome: &QueryOutcome) {
	match outcome.status {
		QueryStatus::Skipped => return,
		QueryStatus::Cached => diagnostics.cache_hits += 1,
		QueryStatus::Failed => diagnostics.failed_queries += 1,
		QueryStatus::TimedOut => diagnostics.timed_out_queries += 1,
		QueryStatus::Fetched => {},
	}

	diagnostics.queries_issued += 1;

	if outcome.retried {
		diagnostics.retried_queries += 1;
	}
}

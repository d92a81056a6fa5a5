use sift_domain::{Candidate, DedupStats, RawRecord, SourceKind, normalize};

use crate::{PipelineContext, SiftService};

impl SiftService {
	/// Canonicalizes harvested records, then removes exact and near duplicates. Candidates whose
	/// title could not be embedded are kept.
	pub(crate) async fn normalize_pool(
		&self,
		ctx: &PipelineContext,
		raw: Vec<(SourceKind, RawRecord)>,
	) -> (Vec<Candidate>, DedupStats) {
		let candidates = raw
			.into_iter()
			.filter_map(|(source, record)| normalize::canonicalize(record, source))
			.collect::<Vec<_>>();
		let (exact, exact_removed) = normalize::dedup_exact(candidates);

		if exact.len() < 2 {
			return (exact, DedupStats { exact_removed, near_removed: 0 });
		}

		let titles = exact.iter().map(|candidate| candidate.title.clone()).collect::<Vec<_>>();
		let vectors = self.embed_texts(ctx, &titles).await;
		let (pool, near_removed) = normalize::dedup_near(
			exact,
			&vectors,
			self.cfg.dedup.near_duplicate_threshold,
			self.cfg.dedup.window as usize,
		);

		tracing::info!(
			request_id = %ctx.request_id(),
			pool = pool.len(),
			exact_removed,
			near_removed,
			"Pool de-duplicated."
		);

		(pool, DedupStats { exact_removed, near_removed })
	}
}

use crate::{
	BoxFuture, PipelineContext, Result, SearchRequest, SearchResponse, SiftService,
	pipeline::{
		Pipeline, Strategy,
		stages::{RunState, Stages},
	},
};

/// Runs the stages in order, skipping straight to assembly when the pool is empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct FunctionPipeline;
impl Pipeline for FunctionPipeline {
	fn strategy(&self) -> Strategy {
		Strategy::Function
	}

	fn execute<'a>(
		&'a self,
		service: &'a SiftService,
		request: &'a SearchRequest,
		ctx: &'a PipelineContext,
	) -> BoxFuture<'a, Result<SearchResponse>> {
		Box::pin(async move {
			let stages = Stages { service, request, ctx };
			let mut state = RunState::default();

			stages.plan(&mut state).await;
			stages.harvest(&mut state).await;
			stages.dedup(&mut state).await;

			if !state.pool.is_empty() {
				stages.rank(&mut state).await;
				stages.deep_dive(&mut state).await;

				if stages.synthesis_ready(&state) {
					stages.synthesize(&mut state).await;
				} else {
					stages.skip_synthesis(&mut state);
				}
			}

			Ok(stages.assemble(state, Strategy::Function))
		})
	}
}

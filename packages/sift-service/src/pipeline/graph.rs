use std::fmt;

use crate::{
	BoxFuture, Error, PipelineContext, Result, SearchRequest, SearchResponse, SiftService,
	pipeline::{
		Pipeline, Strategy,
		stages::{RunState, Stages},
	},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Node {
	Plan,
	Harvest,
	Dedup,
	Rank,
	DeepDive,
	Synthesize,
	Assemble,
}
impl Node {
	fn as_str(self) -> &'static str {
		match self {
			Self::Plan => "plan",
			Self::Harvest => "harvest",
			Self::Dedup => "dedup",
			Self::Rank => "rank",
			Self::DeepDive => "deep_dive",
			Self::Synthesize => "synthesize",
			Self::Assemble => "assemble",
		}
	}
}
impl fmt::Display for Node {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Edge taken after `node` has run. `Assemble` is terminal.
pub(crate) fn next(node: Node, pool_size: usize, synthesis_ready: bool) -> Node {
	match node {
		Node::Plan => Node::Harvest,
		Node::Harvest => Node::Dedup,
		Node::Dedup if pool_size == 0 => Node::Assemble,
		Node::Dedup => Node::Rank,
		Node::Rank => Node::DeepDive,
		Node::DeepDive if !synthesis_ready => Node::Assemble,
		Node::DeepDive => Node::Synthesize,
		Node::Synthesize | Node::Assemble => Node::Assemble,
	}
}

/// Walks explicit nodes and conditional edges under a step limit.
#[derive(Debug, Clone, Copy)]
pub struct GraphPipeline {
	max_steps: u32,
}
impl GraphPipeline {
	pub fn new(max_steps: u32) -> Self {
		Self { max_steps }
	}
}
impl Pipeline for GraphPipeline {
	fn strategy(&self) -> Strategy {
		Strategy::Graph
	}

	fn execute<'a>(
		&'a self,
		service: &'a SiftService,
		request: &'a SearchRequest,
		ctx: &'a PipelineContext,
	) -> BoxFuture<'a, Result<SearchResponse>> {
		Box::pin(async move {
			if !service.cfg.pipeline.graph_enabled {
				return Err(Error::GraphUnavailable {
					message: "Graph strategy is disabled by configuration.".to_string(),
				});
			}

			let stages = Stages { service, request, ctx };
			let mut state = RunState::default();
			let mut node = Node::Plan;
			let mut steps = 0;

			loop {
				steps += 1;

				if steps > self.max_steps {
					return Err(Error::GraphUnavailable {
						message: format!("Step limit {} reached at node {node}.", self.max_steps),
					});
				}

				tracing::debug!(request_id = %ctx.request_id(), node = %node, steps, "Entering graph node.");

				match node {
					Node::Plan => stages.plan(&mut state).await,
					Node::Harvest => stages.harvest(&mut state).await,
					Node::Dedup => stages.dedup(&mut state).await,
					Node::Rank => stages.rank(&mut state).await,
					Node::DeepDive => stages.deep_dive(&mut state).await,
					Node::Synthesize => stages.synthesize(&mut state).await,
					Node::Assemble => {
						state.diagnostics.graph_steps = steps;

						return Ok(stages.assemble(state, Strategy::Graph));
					},
				}

				let ready = stages.synthesis_ready(&state);
				let following = next(node, state.pool.len(), ready);

				if node == Node::DeepDive && following == Node::Assemble {
					stages.skip_synthesis(&mut state);
				}

				node = following;
			}
		})
	}
}

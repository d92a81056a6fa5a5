//! Two interchangeable orchestrations of the same stages.

mod function;
mod graph;
mod stages;

pub use function::FunctionPipeline;
pub use graph::GraphPipeline;

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{BoxFuture, Error, PipelineContext, Result, SearchRequest, SearchResponse, SiftService};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
	/// Straight-line stage calls.
	Function,
	/// Explicit nodes and conditional edges.
	Graph,
}
impl Strategy {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Function => "function",
			Self::Graph => "graph",
		}
	}

	pub fn other(self) -> Self {
		match self {
			Self::Function => Self::Graph,
			Self::Graph => Self::Function,
		}
	}

	pub fn from_config(cfg: &sift_config::Pipeline) -> Self {
		cfg.strategy.parse().unwrap_or(Self::Function)
	}
}
impl fmt::Display for Strategy {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}
impl FromStr for Strategy {
	type Err = Error;

	fn from_str(raw: &str) -> Result<Self> {
		match raw.trim().to_ascii_lowercase().as_str() {
			"function" => Ok(Self::Function),
			"graph" => Ok(Self::Graph),
			other => Err(Error::Configuration {
				message: format!(
					"Unknown strategy {other:?}; expected one of {}.",
					sift_config::STRATEGIES
				),
			}),
		}
	}
}

/// One orchestration of plan, harvest, dedup, rank, deep-dive, synthesis, and assembly.
pub trait Pipeline
where
	Self: Send + Sync,
{
	fn strategy(&self) -> Strategy;

	fn execute<'a>(
		&'a self,
		service: &'a SiftService,
		request: &'a SearchRequest,
		ctx: &'a PipelineContext,
	) -> BoxFuture<'a, Result<SearchResponse>>;
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn strategy_parses_case_insensitively() {
		assert_eq!(" Graph ".parse::<Strategy>().ok(), Some(Strategy::Graph));
		assert_eq!("function".parse::<Strategy>().ok(), Some(Strategy::Function));
		assert!(matches!("dag".parse::<Strategy>(), Err(Error::Configuration { .. })));
		assert_eq!(Strategy::Graph.other(), Strategy::Function);
	}
}

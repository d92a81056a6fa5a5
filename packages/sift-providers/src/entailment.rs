use serde_json::Value;

use crate::{Error, Result};

/// Scores how strongly `premise` supports each hypothesis, in input order.
pub async fn entail(
	cfg: &sift_config::ProviderConfig,
	premise: &str,
	hypotheses: &[String],
) -> Result<Vec<f32>> {
	if hypotheses.is_empty() {
		return Ok(Vec::new());
	}

	let client = crate::client(cfg.timeout_ms)?;
	let pairs = hypotheses
		.iter()
		.map(|hypothesis| serde_json::json!({ "premise": premise, "hypothesis": hypothesis }))
		.collect::<Vec<_>>();
	let body = serde_json::json!({ "model": cfg.model, "pairs": pairs });
	let res = client
		.post(crate::endpoint(&cfg.api_base, &cfg.path))
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;

	parse_entailment_response(json, hypotheses.len())
}

fn parse_entailment_response(json: Value, count: usize) -> Result<Vec<f32>> {
	let results = crate::array_field(&json, &["results", "scores", "data"])
		.ok_or_else(|| Error::response("Entailment response is missing results array."))?;
	let mut scores = vec![None; count];

	for (fallback_index, item) in results.iter().enumerate() {
		let index =
			item.get("index").and_then(Value::as_u64).map(|v| v as usize).unwrap_or(fallback_index);
		let score = item
			.as_f64()
			.or_else(|| item.get("entailment").and_then(Value::as_f64))
			.or_else(|| item.get("score").and_then(Value::as_f64))
			.ok_or_else(|| Error::response("Entailment result missing score."))?;

		if index < count {
			scores[index] = Some(score as f32);
		}
	}

	scores
		.into_iter()
		.map(|score| score.ok_or_else(|| Error::response("Entailment response skipped a pair.")))
		.collect()
}

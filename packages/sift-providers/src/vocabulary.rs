use serde_json::Value;

use crate::{Error, Result};

/// Looks up entry terms for `term` in a controlled vocabulary. Order is preserved; filtering is
/// left to the planner.
pub async fn synonyms(cfg: &sift_config::ProviderConfig, term: &str) -> Result<Vec<String>> {
	let client = crate::client(cfg.timeout_ms)?;
	let res = client
		.get(crate::endpoint(&cfg.api_base, &cfg.path))
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.query(&[("term", term), ("model", cfg.model.as_str())])
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;

	parse_vocabulary_response(json)
}

fn parse_vocabulary_response(json: Value) -> Result<Vec<String>> {
	let entries = crate::array_field(&json, &["synonyms", "entry_terms", "results"])
		.ok_or_else(|| Error::response("Vocabulary response is missing a term list."))?;
	let terms = entries
		.iter()
		.filter_map(|entry| {
			entry
				.as_str()
				.or_else(|| entry.get("label").and_then(Value::as_str))
				.or_else(|| entry.get("term").and_then(Value::as_str))
		})
		.map(str::to_string)
		.collect();

	Ok(terms)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn reads_strings_and_labels() {
		let json = serde_json::json!({
			"results": ["AMG 510", { "label": "Lumakras" }, { "id": 3 }]
		});

		assert_eq!(parse_vocabulary_response(json).expect("parse"), vec!["AMG 510", "Lumakras"]);
	}
}

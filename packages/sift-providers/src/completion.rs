//! Chat-completion calls in two shapes: free text, and a JSON object parsed from the message
//! content.

use serde_json::Value;

use crate::{Error, Result};

pub async fn complete_text(cfg: &sift_config::LlmProviderConfig, messages: &[Value]) -> Result<String> {
	let json = send(cfg, messages, false).await?;

	message_content(&json)
		.map(|content| content.trim().to_string())
		.ok_or_else(|| Error::response("Completion response is missing message content."))
}

/// Requests a JSON object. Content that does not parse is reported as `InvalidResponse` so the
/// caller can decide whether to re-prompt.
pub async fn complete_json(cfg: &sift_config::LlmProviderConfig, messages: &[Value]) -> Result<Value> {
	let json = send(cfg, messages, true).await?;

	parse_json_content(json)
}

async fn send(cfg: &sift_config::LlmProviderConfig, messages: &[Value], json_mode: bool) -> Result<Value> {
	let client = crate::client(cfg.timeout_ms)?;
	let mut body = serde_json::json!({
		"model": cfg.model,
		"temperature": cfg.temperature,
		"messages": messages,
	});

	if json_mode {
		body["response_format"] = serde_json::json!({ "type": "json_object" });
	}

	let res = client
		.post(crate::endpoint(&cfg.api_base, &cfg.path))
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;

	Ok(res.error_for_status()?.json().await?)
}

fn message_content(json: &Value) -> Option<&str> {
	json.get("choices")
		.and_then(|v| v.as_array())
		.and_then(|arr| arr.first())
		.and_then(|choice| choice.get("message"))
		.and_then(|msg| msg.get("content"))
		.and_then(|c| c.as_str())
}

fn strip_code_fence(content: &str) -> &str {
	let trimmed = content.trim();
	let Some(body) = trimmed.strip_prefix("```") else {
		return trimmed;
	};
	let body = body.strip_prefix("json").unwrap_or(body);

	body.strip_suffix("```").unwrap_or(body).trim()
}

fn parse_json_content(json: Value) -> Result<Value> {
	if let Some(content) = message_content(&json) {
		let parsed: Value = serde_json::from_str(strip_code_fence(content))
			.map_err(|_| Error::response("Completion content is not valid JSON."))?;

		if !parsed.is_object() {
			return Err(Error::response("Completion content must be a JSON object."));
		}

		return Ok(parsed);
	}

	if json.is_object() && json.get("choices").is_none() {
		return Ok(json);
	}

	Err(Error::response("Completion response is missing JSON content."))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_choice_content_json() {
		let json = serde_json::json!({
			"choices": [
				{ "message": { "content": "```json\n{\"summary\": \"s\"}\n```" } }
			]
		});
		let parsed = parse_json_content(json).expect("parse failed");

		assert_eq!(parsed["summary"], "s");
	}

	#[test]
	fn rejects_prose_content() {
		let json = serde_json::json!({
			"choices": [{ "message": { "content": "I cannot comply." } }]
		});

		assert!(matches!(parse_json_content(json), Err(Error::InvalidResponse { .. })));
	}
}

//! HTTP adapters for the external capabilities the retrieval pipeline consumes.

pub mod completion;
pub mod embedding;
pub mod entailment;
pub mod error;
pub mod rerank;
pub mod sources;
pub mod vocabulary;

pub use error::{Error, Result};

use std::time::Duration;

use reqwest::{
	Client,
	header::{AUTHORIZATION, HeaderMap, HeaderName},
};
use serde_json::{Map, Value};

pub fn auth_headers(api_key: &str, default_headers: &Map<String, Value>) -> Result<HeaderMap> {
	let mut headers = HeaderMap::new();

	if !api_key.trim().is_empty() {
		headers.insert(AUTHORIZATION, format!("Bearer {api_key}").parse()?);
	}

	for (key, value) in default_headers {
		let Some(raw) = value.as_str() else {
			return Err(Error::InvalidConfig {
				message: "Default header values must be strings.".to_string(),
			});
		};

		headers.insert(HeaderName::from_bytes(key.as_bytes())?, raw.parse()?);
	}

	Ok(headers)
}

pub(crate) fn client(timeout_ms: u64) -> Result<Client> {
	Ok(Client::builder().timeout(Duration::from_millis(timeout_ms)).build()?)
}

pub(crate) fn endpoint(api_base: &str, path: &str) -> String {
	format!("{}{}", api_base.trim_end_matches('/'), path)
}

/// Returns the first array found under any of `keys`, or the value itself when it is an array.
pub(crate) fn array_field<'a>(json: &'a Value, keys: &[&str]) -> Option<&'a Vec<Value>> {
	if let Some(array) = json.as_array() {
		return Some(array);
	}

	keys.iter().find_map(|key| json.get(*key).and_then(Value::as_array))
}

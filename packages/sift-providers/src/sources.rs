//! Literature-source search. Each source speaks a small JSON search protocol; field names vary
//! between catalogs, so parsing accepts the common aliases.

use serde_json::Value;

use sift_domain::{RawRecord, SourceKind};

use crate::{Error, Result};

const TITLE_KEYS: &[&str] = &["title", "name", "brief_title", "invention_title"];
const ABSTRACT_KEYS: &[&str] = &["abstract", "abstract_text", "summary", "description", "snippet"];
const YEAR_KEYS: &[&str] = &["year", "publication_year", "pub_year"];
const DATE_KEYS: &[&str] = &["date", "publication_date", "start_date", "published"];
const ID_KEYS: &[&str] = &["id", "pmid", "doi", "nct_id", "patent_number"];
const URL_KEYS: &[&str] = &["url", "link"];
const CITATION_KEYS: &[&str] = &["citations", "citation_count", "cited_by_count"];

pub async fn search(
	cfg: &sift_config::SourceConfig,
	source: SourceKind,
	query: &str,
	limit: u32,
) -> Result<Vec<RawRecord>> {
	let client = crate::client(cfg.timeout_ms)?;
	let limit = limit.min(cfg.max_results).to_string();
	let res = client
		.get(crate::endpoint(&cfg.api_base, &cfg.path))
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.query(&[("q", query), ("limit", limit.as_str()), ("source", source.as_str())])
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;

	parse_search_response(&json)
}

pub fn parse_search_response(json: &Value) -> Result<Vec<RawRecord>> {
	let items = crate::array_field(json, &["results", "records", "items", "data"])
		.ok_or_else(|| Error::response("Search response is missing a result list."))?;

	Ok(items.iter().filter(|item| item.is_object()).map(parse_record).collect())
}

fn parse_record(item: &Value) -> RawRecord {
	RawRecord {
		title: first_string(item, TITLE_KEYS),
		abstract_text: first_string(item, ABSTRACT_KEYS),
		year: first_year(item),
		external_id: first_string(item, ID_KEYS),
		url: first_string(item, URL_KEYS),
		citations: CITATION_KEYS
			.iter()
			.find_map(|key| item.get(*key).and_then(Value::as_u64))
			.map(|count| count.min(u32::MAX as u64) as u32),
		..Default::default()
	}
}

fn first_string(item: &Value, keys: &[&str]) -> Option<String> {
	keys.iter().find_map(|key| match item.get(*key)? {
		Value::String(value) if !value.trim().is_empty() => Some(value.trim().to_string()),
		Value::Number(value) => Some(value.to_string()),
		_ => None,
	})
}

fn first_year(item: &Value) -> Option<i32> {
	let explicit = YEAR_KEYS.iter().find_map(|key| match item.get(*key)? {
		Value::Number(value) => value.as_i64().map(|year| year as i32),
		Value::String(value) => value.trim().parse().ok(),
		_ => None,
	});

	explicit.or_else(|| {
		DATE_KEYS.iter().find_map(|key| {
			let date = item.get(*key)?.as_str()?;

			date.get(..4)?.parse().ok()
		})
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn reads_aliased_fields() {
		let json = serde_json::json!({
			"records": [
				{
					"brief_title": "Adagrasib in NSCLC",
					"summary": "Phase 2 study.",
					"start_date": "2021-06-01",
					"nct_id": "NCT03785249",
					"cited_by_count": 40
				},
				"not an object",
				{ "title": "Bare", "pmid": 123 }
			]
		});
		let records = parse_search_response(&json).expect("parse");

		assert_eq!(records.len(), 2);
		assert_eq!(records[0].title.as_deref(), Some("Adagrasib in NSCLC"));
		assert_eq!(records[0].year, Some(2021));
		assert_eq!(records[0].citations, Some(40));
		assert_eq!(records[1].external_id.as_deref(), Some("123"));
		assert_eq!(records[1].abstract_text, None);
	}
}

use std::{env, fs};

use clap::Parser;

use sift_domain::Preference;
use sift_search::{Args, build_request};
use sift_service::Strategy;

#[test]
fn flags_build_a_request() {
	let args = Args::try_parse_from([
		"sift-search",
		"--config",
		"sift.toml",
		"--objective",
		"KRAS G12C resistance mechanisms",
		"--subject",
		"sotorasib",
		"--preference",
		"recall",
		"--strategy",
		"function",
		"--deadline-ms",
		"20000",
		"--positive-example",
		"Prior accepted abstract.",
	])
	.expect("Expected arguments to parse.");
	let request = build_request(&args).expect("Expected a request.");

	assert_eq!(request.objective, "KRAS G12C resistance mechanisms");
	assert_eq!(request.subject.as_deref(), Some("sotorasib"));
	assert_eq!(request.preference, Preference::Recall);
	assert_eq!(request.strategy, Some(Strategy::Function));
	assert_eq!(request.deadline_ms, Some(20_000));
	assert_eq!(request.positive_examples.len(), 1);
	assert!(!request.force_refresh);
}

#[test]
fn objective_or_request_file_is_required() {
	assert!(Args::try_parse_from(["sift-search", "--config", "sift.toml"]).is_err());
	assert!(
		Args::try_parse_from(["sift-search", "--config", "sift.toml", "--preference", "fuzzy", "-o", "x"])
			.is_err()
	);
}

#[test]
fn flags_override_request_file() {
	let path = env::temp_dir().join(format!("sift-search-request-{}.json", std::process::id()));

	fs::write(
		&path,
		r#"{ "objective": "GLP-1 agonists in obesity", "preference": "precision", "force_refresh": false }"#,
	)
	.expect("Failed to write request fixture.");

	let args = Args::try_parse_from([
		"sift-search".to_string(),
		"--config".to_string(),
		"sift.toml".to_string(),
		"--request".to_string(),
		path.display().to_string(),
		"--preference".to_string(),
		"recall".to_string(),
		"--force-refresh".to_string(),
	])
	.expect("Expected arguments to parse.");
	let request = build_request(&args).expect("Expected a request.");

	fs::remove_file(&path).ok();

	assert_eq!(request.objective, "GLP-1 agonists in obesity");
	assert_eq!(request.preference, Preference::Recall);
	assert!(request.force_refresh);
	assert!(request.subject.is_none());
}

use sift_domain::{
	PlanInput, QueryVariant, RawRecord, SourceKind, anchors, normalize, planner,
};

fn planner_cfg() -> sift_config::Planner {
	sift_config::Planner::default()
}

fn raw(title: &str, id: Option<&str>, abstract_text: &str, year: Option<i32>) -> RawRecord {
	RawRecord {
		title: Some(title.to_string()),
		abstract_text: Some(abstract_text.to_string()),
		year,
		external_id: id.map(str::to_string),
		url: Some(format!("https://example.org/{}", title.len())),
		citations: Some(4),
		origin_query: "q".to_string(),
		origin_slot: "bibliographic.broad".to_string(),
	}
}

#[test]
fn plan_emits_one_slot_per_source_variant() {
	let synonyms = vec!["AMG 510".to_string(), "Lumakras".to_string()];
	let plan = planner::plan(
		PlanInput {
			objective: "Mechanisms of resistance to KRAS G12C inhibitors in lung cancer",
			subject: Some("Sotorasib"),
			synonyms: &synonyms,
			sources: &[SourceKind::Bibliographic, SourceKind::ClinicalTrials],
		},
		&planner_cfg(),
	);
	let names = plan.slots.iter().map(|slot| slot.name.as_str()).collect::<Vec<_>>();

	assert_eq!(
		names,
		vec![
			"bibliographic.review",
			"bibliographic.mechanism",
			"bibliographic.broad",
			"clinical_trials.review",
			"clinical_trials.broad",
		]
	);
	assert_eq!(plan.signals, vec!["oncology"]);
	assert!(!plan.fallback);

	let review = plan.slot("bibliographic.review").expect("review slot");

	assert!(review.query.contains("\"Sotorasib\" OR \"AMG 510\" OR \"Lumakras\""));
	assert!(review.query.ends_with("review[pt] AND english[la]"));
	assert!(!review.recall.contains('['));
	assert_eq!(review.variant, QueryVariant::Review);
}

#[test]
fn combination_subject_skips_synonyms() {
	let synonyms = vec!["Opdivo".to_string()];
	let plan = planner::plan(
		PlanInput {
			objective: "Efficacy in melanoma",
			subject: Some("nivolumab + ipilimumab"),
			synonyms: &synonyms,
			sources: &[SourceKind::Web],
		},
		&planner_cfg(),
	);

	assert_eq!(plan.components, vec!["nivolumab", "ipilimumab"]);
	assert!(plan.synonyms.is_empty());
	assert!(plan.slots[0].query.starts_with("\"nivolumab\" AND \"ipilimumab\""));
}

#[test]
fn empty_inputs_degrade_to_bag_of_words() {
	let plan = planner::plan(
		PlanInput {
			objective: "the of and",
			subject: Some("()"),
			synonyms: &[],
			sources: &[SourceKind::Web],
		},
		&planner_cfg(),
	);

	assert!(plan.fallback);
	assert_eq!(plan.slots.len(), 1);
	assert_eq!(plan.slots[0].query, "the of and");
}

#[test]
fn canonicalize_then_dedup_is_idempotent() {
	let records = vec![
		raw("EGFR exon 20 insertions", Some("PMID:1"), "Short.", Some(2020)),
		raw("EGFR Exon-20 insertions", None, "A longer abstract with more detail.", None),
		raw("Unrelated", Some("PMID:2"), "Other.", Some(2019)),
	];
	let candidates = records
		.into_iter()
		.filter_map(|record| normalize::canonicalize(record, SourceKind::Bibliographic))
		.collect::<Vec<_>>();
	let (once, removed) = normalize::dedup_exact(candidates);
	let (twice, removed_again) = normalize::dedup_exact(once.clone());

	assert_eq!(removed, 1);
	assert_eq!(removed_again, 0);
	assert_eq!(once, twice);
	assert_eq!(once[0].abstract_text, "A longer abstract with more detail.");

	let vectors = vec![Some(vec![1.0, 0.0]), Some(vec![0.999, 0.02])];
	let (near, near_removed) = normalize::dedup_near(once, &vectors, 0.95, 64);
	let near_vectors = vec![Some(vec![1.0, 0.0])];
	let (near_again, _) = normalize::dedup_near(near.clone(), &near_vectors, 0.95, 64);

	assert_eq!(near_removed, 1);
	assert_eq!(near, near_again);
}

#[test]
fn fallback_result_meets_anchor_contract() {
	let candidate = normalize::canonicalize(
		raw(
			"Adagrasib in KRAS G12C NSCLC",
			Some("NCT01"),
			"Objective response was 43% in 112 patients. Median PFS was 6.5 months. \
			 Toxicity was manageable. Responses were durable.",
			Some(2022),
		),
		SourceKind::ClinicalTrials,
	)
	.expect("candidate");
	let result = anchors::fallback_result(&candidate, &["kras".to_string()]);

	assert!((anchors::MIN_ANCHORS..=anchors::MAX_ANCHORS).contains(&result.fact_anchors.len()));
	assert_eq!(result.candidate_key, "clinical_trials:nct01");
	assert!(result.summary.starts_with("Objective response was 43%"));
	assert!(result.relevance_justification.contains("kras"));

	for anchor in &result.fact_anchors {
		assert!(anchors::lexically_entailed(&candidate.abstract_text, anchor, 0.5));
	}

	let serialized = serde_json::to_value(&result).expect("serialize");

	assert_eq!(serialized["origin"], "fallback");
}

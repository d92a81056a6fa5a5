//! Static keyword lexicons used by the planner and the triage ranker.

use crate::text;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Domain {
	pub name: &'static str,
	pub keywords: &'static [&'static str],
}

pub const DOMAINS: &[Domain] = &[
	Domain {
		name: "oncology",
		keywords: &[
			"cancer", "tumor", "tumour", "carcinoma", "oncolog", "neoplas", "metasta", "leukemia",
			"lymphoma", "melanoma", "sarcoma", "glioma",
		],
	},
	Domain {
		name: "immunology",
		keywords: &[
			"immun", "autoimmun", "t cell", "t-cell", "b cell", "cytokine", "interleukin",
			"inflammat", "antibod", "lupus", "rheumatoid",
		],
	},
	Domain {
		name: "cardiovascular",
		keywords: &[
			"cardi", "heart", "vascular", "atheroscler", "hypertens", "arrhythm", "myocard",
			"stroke", "coronary",
		],
	},
	Domain {
		name: "neurology",
		keywords: &[
			"neuro", "alzheimer", "parkinson", "dementia", "epilep", "brain", "cognit",
			"multiple sclerosis", "neuron",
		],
	},
	Domain {
		name: "infectious_disease",
		keywords: &[
			"infect", "viral", "virus", "bacteri", "antimicrob", "antibiotic", "pathogen",
			"sepsis", "tubercul", "hiv",
		],
	},
	Domain {
		name: "metabolic",
		keywords: &[
			"diabet", "obes", "insulin", "metabol", "lipid", "glucose", "fatty liver", "nafld",
			"nash",
		],
	},
];

pub const MECHANISM_TERMS: &[&str] = &[
	"mechanism", "pathway", "signaling", "signalling", "inhibit", "activat", "receptor",
	"binding", "phosphorylat", "expression", "mediat", "regulat", "target", "agonist",
	"antagonist", "downstream", "upstream", "mode of action",
];

/// Terms that usually mark a hit as off-topic unless the subject is also mentioned.
pub const DRIFT_TERMS: &[&str] = &[
	"veterinar", "livestock", "poultry", "plant", "crop", "soil", "agricultur", "aquacultur",
	"wastewater", "dental caries", "cosmetic",
];

pub const REVIEW_TERMS: &[&str] =
	&["review", "overview", "perspective", "narrative review", "state of the art"];

/// Matches objective text against the domain lexicon, returning domains in lexicon order.
pub fn match_domains(folded_text: &str) -> Vec<&'static Domain> {
	DOMAINS
		.iter()
		.filter(|domain| domain.keywords.iter().any(|kw| text::contains_term(folded_text, kw)))
		.collect()
}

pub fn domain_by_name(name: &str) -> Option<&'static Domain> {
	DOMAINS.iter().find(|domain| domain.name == name)
}

/// Keywords of `domain` present in `folded_text`, in lexicon order.
pub fn matched_keywords(domain: &Domain, folded_text: &str) -> Vec<&'static str> {
	domain.keywords.iter().copied().filter(|kw| text::contains_term(folded_text, kw)).collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn objective_maps_to_domains() {
		let folded =
			text::fold_for_matching("Resistance to EGFR inhibitors in lung cancer with T-cell infiltrates");
		let names: Vec<_> = match_domains(&folded).into_iter().map(|d| d.name).collect();

		assert_eq!(names, vec!["oncology", "immunology"]);
	}
}

use std::{fs, path::PathBuf};

use clap::Parser;
use color_eyre::eyre;
use tracing_subscriber::EnvFilter;

use sift_domain::Preference;
use sift_service::{SearchRequest, SiftService, Strategy};

#[derive(Debug, Parser)]
#[command(
	version = sift_cli::VERSION,
	rename_all = "kebab",
	styles = sift_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	/// A JSON search request; flags given alongside it override its fields.
	#[arg(long, short = 'r', value_name = "FILE", required_unless_present = "objective")]
	pub request: Option<PathBuf>,
	#[arg(long, short = 'o', value_name = "TEXT")]
	pub objective: Option<String>,
	#[arg(long, short = 's', value_name = "TEXT")]
	pub subject: Option<String>,
	#[arg(long, short = 'p', value_name = "PREFERENCE", value_parser = ["precision", "recall"])]
	pub preference: Option<String>,
	#[arg(long, value_name = "STRATEGY")]
	pub strategy: Option<Strategy>,
	#[arg(long, value_name = "MS")]
	pub deadline_ms: Option<u64>,
	#[arg(long)]
	pub force_refresh: bool,
	#[arg(long = "positive-example", value_name = "TEXT")]
	pub positive_examples: Vec<String>,
	/// Writes the response here instead of stdout.
	#[arg(long, value_name = "FILE")]
	pub out: Option<PathBuf>,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = sift_config::load(&args.config)?;

	init_tracing(&config)?;

	let request = build_request(&args)?;
	let service = SiftService::new(config);
	let response = service.search(request).await;
	let body = serde_json::to_string_pretty(&response)?;

	match args.out.as_ref() {
		Some(path) => {
			fs::write(path, body)?;

			tracing::info!(path = %path.display(), "Response written.");
		},
		None => println!("{body}"),
	}

	Ok(())
}

/// Reads the request file, if any, then applies command-line overrides.
pub fn build_request(args: &Args) -> color_eyre::Result<SearchRequest> {
	let mut request = match args.request.as_ref() {
		Some(path) => {
			let raw = fs::read_to_string(path)?;

			serde_json::from_str::<SearchRequest>(&raw)?
		},
		None => SearchRequest::default(),
	};

	if let Some(objective) = args.objective.as_ref() {
		request.objective = objective.clone();
	}
	if let Some(subject) = args.subject.as_ref() {
		request.subject = Some(subject.clone());
	}
	if let Some(preference) = args.preference.as_deref() {
		request.preference = parse_preference(preference)?;
	}
	if args.strategy.is_some() {
		request.strategy = args.strategy;
	}
	if args.deadline_ms.is_some() {
		request.deadline_ms = args.deadline_ms;
	}
	if args.force_refresh {
		request.force_refresh = true;
	}
	if !args.positive_examples.is_empty() {
		request.positive_examples = args.positive_examples.clone();
	}
	if request.objective.trim().is_empty() {
		return Err(eyre::eyre!("A non-empty objective is required."));
	}

	Ok(request)
}

fn parse_preference(raw: &str) -> color_eyre::Result<Preference> {
	match raw {
		"precision" => Ok(Preference::Precision),
		"recall" => Ok(Preference::Recall),
		other => Err(eyre::eyre!("Unknown preference {other:?}.")),
	}
}

fn init_tracing(config: &sift_config::Config) -> color_eyre::Result<()> {
	let filter =
		EnvFilter::try_new(&config.service.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

	Ok(())
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failures inside the pipeline. None of these reach the caller of `SiftService::search`; each
/// stage degrades and records the cause in diagnostics.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("External service unavailable: {message}")]
	ExternalServiceUnavailable { message: String },
	#[error("Malformed model output: {message}")]
	MalformedModelOutput { message: String },
	#[error("Budget exhausted during {stage}.")]
	BudgetExhausted { stage: &'static str },
	#[error("Configuration error: {message}")]
	Configuration { message: String },
	#[error("Graph strategy unavailable: {message}")]
	GraphUnavailable { message: String },
}
impl From<sift_providers::Error> for Error {
	fn from(err: sift_providers::Error) -> Self {
		match err {
			sift_providers::Error::InvalidResponse { message } =>
				Self::MalformedModelOutput { message },
			sift_providers::Error::InvalidConfig { message } => Self::Configuration { message },
			other => Self::ExternalServiceUnavailable { message: other.to_string() },
		}
	}
}

//! Crate-wide error types and `Result` alias.

// crates.io
use http::StatusCode;

/// Library-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for both service tiers.
#[allow(missing_docs)]
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	Reqwest(#[from] reqwest::Error),
	#[error(transparent)]
	Serde(#[from] serde_json::Error),
	#[error(transparent)]
	Url(#[from] url::ParseError),
	#[error(transparent)]
	Elapsed(#[from] tokio::time::error::Elapsed),

	#[cfg(feature = "redis")]
	#[error(transparent)]
	Redis(#[from] redis::RedisError),

	#[error("Authentication against the identity provider failed: {reason}")]
	Auth { reason: String },
	#[error("Metrics error: {0}")]
	Metrics(String),
	#[error("{what} not found.")]
	NotFound { what: String },
	#[error("Upstream HTTP status {status} from {url}: {body:?}")]
	UpstreamStatus { status: StatusCode, url: url::Url, body: Option<String> },
	#[error("Validation failed for {field}: {reason}")]
	Validation { field: &'static str, reason: String },
}
impl Error {
	/// HTTP status reported to callers of the service tiers.
	pub fn status_code(&self) -> StatusCode {
		match self {
			Self::NotFound { .. } => StatusCode::NOT_FOUND,
			Self::Validation { .. } => StatusCode::BAD_REQUEST,
			Self::Auth { .. } | Self::UpstreamStatus { .. } | Self::Reqwest(_) =>
				StatusCode::BAD_GATEWAY,
			Self::Elapsed(_) => StatusCode::GATEWAY_TIMEOUT,
			_ => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}

	/// Stable machine-readable code used in error bodies.
	pub fn code(&self) -> &'static str {
		match self {
			Self::NotFound { .. } => "NOT_FOUND",
			Self::Validation { .. } => "VALIDATION",
			Self::Auth { .. } => "AUTH_FAILURE",
			Self::UpstreamStatus { .. } | Self::Reqwest(_) => "UPSTREAM_ERROR",
			Self::Elapsed(_) => "TIMEOUT",
			_ => "INTERNAL_ERROR",
		}
	}

	/// Build a [`Error::NotFound`] for the named resource.
	pub fn not_found(what: impl Into<String>) -> Self {
		Self::NotFound { what: what.into() }
	}
}

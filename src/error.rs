//! Driver-level error types shared across the signer, exchange, and stores.

// self
use crate::_prelude::*;

/// Driver-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical driver error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Provider-reported OAuth problem.
	#[error(transparent)]
	Protocol(#[from] ProtocolError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// A verifier was delivered for a request token that is not on record.
	#[error("Verifier was delivered for an unknown request token `{delivered}`.")]
	VerifierMismatch {
		/// Request token that accompanied the delivered verifier.
		delivered: String,
	},
}

/// Configuration and validation failures raised before any network call.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// A required field is empty or unset.
	#[error("Required field `{field}` is not configured.")]
	Missing {
		/// Name of the missing field.
		field: &'static str,
	},
	/// An endpoint URL cannot be parsed.
	#[error("Endpoint URL `{url}` is invalid.")]
	InvalidUrl {
		/// URL that failed validation.
		url: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// CA bundle file could not be loaded.
	#[error("CA bundle `{path}` could not be loaded.")]
	CaBundle {
		/// Path that failed to load.
		path: String,
		/// Underlying read or parse failure.
		#[source]
		source: BoxError,
	},
	/// RSA-SHA1 was selected but the private key is missing or malformed.
	#[error("RSA private key is missing or malformed.")]
	InvalidRsaKey,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}

/// Provider-reported protocol failures.
#[derive(Debug, ThisError)]
pub enum ProtocolError {
	/// The provider returned an `oauth_problem` parameter.
	#[error("Provider reported an OAuth problem: {problem}.")]
	Provider {
		/// Problem string as delivered by the provider.
		problem: String,
	},
	/// The reply omitted token fields that the exchange requires.
	#[error("Provider reply is missing `{field}`.")]
	MissingReplyField {
		/// Reply field that never arrived.
		field: &'static str,
	},
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the provider.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the provider.")]
	Io(#[from] std::io::Error),
	/// Provider answered with a non-success HTTP status.
	#[error("Provider answered with HTTP status {status}.")]
	Status {
		/// HTTP status code of the reply.
		status: u16,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

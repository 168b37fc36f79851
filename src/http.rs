//! Transport primitives for signed OAuth requests.
//!
//! The driver depends on HTTP only through [`OAuthTransport`]: a GET and a
//! POST, each carrying a prebuilt `Authorization` header. The reqwest-backed
//! implementation configures TLS trust from an explicit CA bundle path and
//! applies a request timeout, so no process-wide state is involved.

// std
#[cfg(feature = "reqwest")]
use std::{fs, path::PathBuf};
// self
#[cfg(feature = "reqwest")]
use crate::error::ConfigError;
use crate::{_prelude::*, error::TransportError};

/// Boxed future returned by [`OAuthTransport`] methods.
pub type TransportFuture<'a, T> =
	Pin<Box<dyn Future<Output = Result<T, TransportError>> + 'a + Send>>;

/// Abstraction over HTTP transports capable of issuing signed OAuth requests.
///
/// Implementations must attach the provided `Authorization` header verbatim
/// and return the response body as text. Non-success statuses are transport
/// errors; the exchange degrades them to the empty-reply path.
pub trait OAuthTransport
where
	Self: 'static + Send + Sync,
{
	/// Issues a GET against the fully signed URL.
	fn get<'a>(&'a self, url: &'a str, authorization: &'a str) -> TransportFuture<'a, String>;

	/// Issues a POST with a form-encoded body.
	fn post<'a>(
		&'a self,
		url: &'a str,
		authorization: &'a str,
		body: &'a str,
	) -> TransportFuture<'a, String>;
}

/// TLS and timeout settings for the reqwest transport.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct TransportConfig {
	/// Optional PEM bundle of additional trusted roots.
	pub ca_bundle: Option<PathBuf>,
	/// Per-request timeout. Token-exchange ticks block for at most this long.
	pub timeout: std::time::Duration,
}
#[cfg(feature = "reqwest")]
impl Default for TransportConfig {
	fn default() -> Self {
		Self { ca_bundle: None, timeout: std::time::Duration::from_secs(30) }
	}
}

/// Thin wrapper around [`ReqwestClient`] satisfying [`OAuthTransport`].
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct ReqwestTransport(ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Builds a transport from the provided configuration.
	pub fn new(config: TransportConfig) -> Result<Self, ConfigError> {
		let mut builder = ReqwestClient::builder()
			.timeout(config.timeout)
			.redirect(reqwest::redirect::Policy::none());

		if let Some(path) = &config.ca_bundle {
			let pem = fs::read(path).map_err(|e| ConfigError::CaBundle {
				path: path.display().to_string(),
				source: Box::new(e),
			})?;

			for certificate in
				reqwest::Certificate::from_pem_bundle(&pem).map_err(|e| ConfigError::CaBundle {
					path: path.display().to_string(),
					source: Box::new(e),
				})? {
				builder = builder.add_root_certificate(certificate);
			}
		}

		Ok(Self(builder.build().map_err(ConfigError::http_client_build)?))
	}

	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	async fn read_body(response: reqwest::Response) -> Result<String, TransportError> {
		let status = response.status();

		if !status.is_success() {
			return Err(TransportError::Status { status: status.as_u16() });
		}

		Ok(response.text().await?)
	}
}
#[cfg(feature = "reqwest")]
impl Default for ReqwestTransport {
	/// Builds a transport from [`TransportConfig::default`], so the default
	/// driver path carries the 30-second timeout and disabled redirects.
	fn default() -> Self {
		match Self::new(TransportConfig::default()) {
			Ok(transport) => transport,
			// Without a CA bundle the build only fails when the TLS backend
			// cannot initialize.
			Err(e) => {
				tracing::warn!(
					"Failed to apply the default transport configuration: {e}; using a stock client.",
				);

				Self(ReqwestClient::new())
			},
		}
	}
}
#[cfg(feature = "reqwest")]
impl OAuthTransport for ReqwestTransport {
	fn get<'a>(&'a self, url: &'a str, authorization: &'a str) -> TransportFuture<'a, String> {
		Box::pin(async move {
			let response =
				self.0.get(url).header("Authorization", authorization).send().await?;

			Self::read_body(response).await
		})
	}

	fn post<'a>(
		&'a self,
		url: &'a str,
		authorization: &'a str,
		body: &'a str,
	) -> TransportFuture<'a, String> {
		Box::pin(async move {
			let response = self
				.0
				.post(url)
				.header("Authorization", authorization)
				.header("Content-Type", "application/x-www-form-urlencoded")
				.body(body.to_owned())
				.send()
				.await?;

			Self::read_body(response).await
		})
	}
}
